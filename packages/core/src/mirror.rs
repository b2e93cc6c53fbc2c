//! Directory mirroring.
//!
//! A mirror makes a destination tree an exact copy of a source tree. `rsync`
//! is used when it is installed; otherwise the destination is deleted and
//! rebuilt with an in-process recursive copy.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::process::Command;

use snafu::ResultExt;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result, SymlinkSnafu, WalkSnafu};
use crate::export::copy_preserving;

/// A way of mirroring one directory tree onto another.
pub trait Mirror {
    /// Short name for logs and reports.
    fn name(&self) -> &'static str;

    /// Makes `destination` an exact copy of `source`.
    fn mirror(&self, source: &Path, destination: &Path) -> Result<()>;
}

/// Mirrors through `rsync -a --delete`.
#[derive(Debug, Clone)]
pub struct RsyncMirror {
    program: PathBuf,
}

impl RsyncMirror {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Returns an rsync mirror if `rsync` runs on this system.
    pub fn detect() -> Option<Self> {
        Self::detect_program("rsync")
    }

    /// Returns a mirror running `program` if `program --version` succeeds.
    pub fn detect_program(program: impl Into<PathBuf>) -> Option<Self> {
        let program = program.into();
        let available = Command::new(&program)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        available.then(|| Self::new(program))
    }
}

impl Mirror for RsyncMirror {
    fn name(&self) -> &'static str {
        "rsync"
    }

    fn mirror(&self, source: &Path, destination: &Path) -> Result<()> {
        fs::create_dir_all(destination).create_dir_context(destination)?;

        // Trailing slash: copy the contents, not the directory itself.
        let mut source_arg = source.as_os_str().to_owned();
        source_arg.push("/");

        let command = format!("{} -a --delete", self.program.display());
        let output = Command::new(&self.program)
            .arg("-a")
            .arg("--delete")
            .arg(&source_arg)
            .arg(destination)
            .output()
            .command_context(&command)?;

        if !output.status.success() {
            return Err(Error::CommandExit {
                command,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(())
    }
}

/// Deletes the destination, then copies the source tree in-process.
///
/// Symlinks inside the tree are recreated as symlinks, not followed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyMirror;

impl Mirror for CopyMirror {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn mirror(&self, source: &Path, destination: &Path) -> Result<()> {
        match fs::symlink_metadata(destination) {
            Ok(metadata) if metadata.is_dir() => {
                fs::remove_dir_all(destination).remove_context(destination)?
            }
            Ok(_) => fs::remove_file(destination).remove_context(destination)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).inspect_context(destination),
        }

        for entry in WalkDir::new(source).follow_links(false) {
            let entry = entry.context(WalkSnafu { path: source })?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .unwrap_or_else(|_| Path::new(""));
            let target = destination.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&target).create_dir_context(&target)?;
            } else if file_type.is_symlink() {
                let link = fs::read_link(entry.path()).inspect_context(entry.path())?;
                symlink(&link, &target).context(SymlinkSnafu {
                    link: &target,
                    target: &link,
                })?;
            } else {
                copy_preserving(entry.path(), &target)?;
            }
        }

        Ok(())
    }
}

/// Picks `rsync` when available, the in-process copy otherwise.
///
/// Setting `prefer_external` to false always selects the in-process copy.
pub fn select_mirror(prefer_external: bool) -> Box<dyn Mirror> {
    select_mirror_with(prefer_external, Path::new("rsync"))
}

/// Like [`select_mirror`], running `program` as rsync.
pub fn select_mirror_with(prefer_external: bool, program: &Path) -> Box<dyn Mirror> {
    if prefer_external {
        if let Some(rsync) = RsyncMirror::detect_program(program) {
            debug!(program = %program.display(), "using rsync for mirroring");
            return Box::new(rsync);
        }
        warn!(program = %program.display(), "rsync not available, falling back to built-in copy");
    }
    Box::new(CopyMirror)
}

/// Mirrors `source` onto `destination` with the selected implementation.
pub fn mirror_tree(mirror: &dyn Mirror, source: &Path, destination: &Path) -> Result<()> {
    info!(
        tool = mirror.name(),
        source = %source.display(),
        destination = %destination.display(),
        "mirroring directory tree"
    );
    mirror.mirror(source, destination)
}
