//! Unified error types for the steam-symlinker-core library.
//!
//! Uses SNAFU for context-rich error handling, especially useful when the same
//! underlying error type (like `std::io::Error`) appears in different contexts.

use snafu::{ResultExt, Snafu};
use std::path::PathBuf;

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all core library operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Failed to execute a system command.
    #[snafu(display("failed to execute command '{command}'"))]
    CommandExecution {
        command: String,
        source: std::io::Error,
    },

    /// Command executed but returned non-zero exit code.
    #[snafu(display("command '{command}' exited with code {code}: {stderr}"))]
    CommandExit {
        command: String,
        code: i32,
        stderr: String,
    },

    /// A library directory could not be listed.
    #[snafu(display("failed to read directory {}", path.display()))]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No manifest could be parsed from the external library.
    #[snafu(display("no appmanifest files found in {}", path.display()))]
    NoGamesFound { path: PathBuf },

    /// No manifest exists in the local library.
    #[snafu(display("no appmanifest files found in {}", path.display()))]
    NothingToExport { path: PathBuf },

    /// Failed to create a directory.
    #[snafu(display("failed to create directory {}", path.display()))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to inspect a path without following symlinks.
    #[snafu(display("failed to inspect {}", path.display()))]
    Inspect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create a symbolic link.
    #[snafu(display("failed to link {} -> {}", link.display(), target.display()))]
    Symlink {
        link: PathBuf,
        target: PathBuf,
        source: std::io::Error,
    },

    /// Failed to remove an existing file, directory or link.
    #[snafu(display("failed to remove {}", path.display()))]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to copy a file.
    #[snafu(display("failed to copy {} to {}", from.display(), to.display()))]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// Failed to carry timestamps or permissions over to a copy.
    #[snafu(display("failed to preserve metadata on {}", path.display()))]
    PreserveMetadata {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Recursive directory walk failed.
    #[snafu(display("failed to walk {}", path.display()))]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// Compatibility runtime not present on the external drive.
    #[snafu(display("runtime not found on the external drive at {}", path.display()))]
    RuntimeMissing { path: PathBuf },

    /// Failed to read the mount table.
    #[snafu(display("failed to read mount table at {}", path.display()))]
    MountsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No mount contains the given path.
    #[snafu(display("could not determine the mount point for {}", path.display()))]
    MountNotFound { path: PathBuf },

    /// No filesystem UUID could be determined for a device.
    #[snafu(display("unable to detect the UUID for {device}"))]
    UuidNotFound { device: String },

    /// Operation needs an effective UID of 0.
    #[snafu(display("this operation requires root privileges"))]
    NotRoot,

    /// Fstab file cannot be read.
    #[snafu(display("failed to read fstab at {}", path.display()))]
    FstabRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write fstab file.
    #[snafu(display("failed to write fstab at {}", path.display()))]
    FstabWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse fstab entry.
    #[snafu(display("failed to parse fstab entry: {message}"))]
    FstabParse { message: String },

    /// Failed to create backup.
    #[snafu(display("failed to create backup at {}", path.display()))]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Home directory not found.
    #[snafu(display("Could not determine home directory"))]
    HomeDirNotFound,

    /// Failed to read Steam VDF file.
    #[snafu(display("failed to read Steam VDF at {}", path.display()))]
    VdfRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse Steam VDF file.
    #[snafu(display("failed to parse Steam VDF: {message}"))]
    VdfParse { message: String },

    /// Failed to read the settings file.
    #[snafu(display("failed to read settings at {}", path.display()))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Settings file is not valid JSON for [`crate::config::Settings`].
    #[snafu(display("invalid settings in {}", path.display()))]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Systemd operation failed.
    #[snafu(display("systemd operation failed: {message}"))]
    Systemd { message: String },
}

/// Extension trait for adding context to io::Error results.
pub trait IoResultExt<T> {
    /// Add context for command execution errors.
    fn command_context(self, command: impl Into<String>) -> Result<T>;

    /// Add context for directory listing errors.
    fn read_dir_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for directory creation errors.
    fn create_dir_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for `symlink_metadata` / `metadata` errors.
    fn inspect_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for removal errors.
    fn remove_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for fstab read errors.
    fn fstab_read_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for fstab write errors.
    fn fstab_write_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for backup errors.
    fn backup_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn command_context(self, command: impl Into<String>) -> Result<T> {
        self.context(CommandExecutionSnafu {
            command: command.into(),
        })
    }

    fn read_dir_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(ReadDirSnafu { path: path.into() })
    }

    fn create_dir_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(CreateDirSnafu { path: path.into() })
    }

    fn inspect_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(InspectSnafu { path: path.into() })
    }

    fn remove_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(RemoveSnafu { path: path.into() })
    }

    fn fstab_read_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(FstabReadSnafu { path: path.into() })
    }

    fn fstab_write_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(FstabWriteSnafu { path: path.into() })
    }

    fn backup_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(BackupSnafu { path: path.into() })
    }
}
