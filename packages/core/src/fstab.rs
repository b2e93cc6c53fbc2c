//! Fstab entry generation for the external drive.
//!
//! Builds an `/etc/fstab` line that mounts the drive holding the external
//! library at boot, and appends it unless an equivalent entry (same `UUID=`
//! device or same mount point) already exists. Writing requires root.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{Error, IoResultExt, Result};
use crate::mount::{self, MountInfo};

/// Default fstab path.
pub const FSTAB_PATH: &str = "/etc/fstab";

/// Represents a single fstab entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstabEntry {
    /// The device identifier (e.g., "UUID=xxx").
    pub fs_spec: String,
    /// Mount point path.
    pub mount_point: PathBuf,
    /// Filesystem type (e.g., "exfat").
    pub vfs_type: String,
    /// Mount options.
    pub mount_options: Vec<String>,
    /// This field is used by dump(8) to determine which filesystems need to be dumped.
    pub dump: u8,
    /// This field is used by fsck(8) to determine the order in which filesystem checks are done at boot time.
    pub fsck_order: u16,
}

impl FstabEntry {
    /// Creates an entry for an external library drive.
    ///
    /// The drive is automounted on access, owned by `uid`/`gid`, and never
    /// blocks boot when absent.
    pub fn for_drive(uuid: &str, mount_point: &Path, fs_type: &str, uid: u32, gid: u32) -> Self {
        let mount_options = format!(
            "rw,nofail,x-systemd.automount,nosuid,nodev,relatime,uid={uid},gid={gid},\
             fmask=0022,dmask=0022,umask=000,iocharset=utf8,errors=remount-ro,x-gvfs-show,exec"
        )
        .split(',')
        .map(str::to_string)
        .collect();

        Self {
            fs_spec: format!("UUID={uuid}"),
            mount_point: mount_point.to_path_buf(),
            vfs_type: fs_type.to_string(),
            mount_options,
            dump: 0,
            fsck_order: 0,
        }
    }

    /// Formats the entry as an fstab line.
    pub fn to_fstab_line(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.fs_spec,
            escape_fstab_path(&self.mount_point.to_string_lossy()),
            self.vfs_type,
            self.mount_options.join(","),
            self.dump,
            self.fsck_order
        )
    }

    /// Parses a single fstab line into an entry.
    ///
    /// Returns None for comments, empty lines and lines with a field count
    /// other than six.
    pub fn from_line(line: &str) -> Result<Option<Self>> {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 6 {
            return Ok(None);
        }

        let dump = parts[4].parse::<u8>().map_err(|e| Error::FstabParse {
            message: format!("failed to parse dump field of line {}: {}", line, e),
        })?;
        let fsck_order = parts[5].parse::<u16>().map_err(|e| Error::FstabParse {
            message: format!("failed to parse fsck_order of line {}: {}", line, e),
        })?;

        Ok(Some(Self {
            fs_spec: parts[0].to_string(),
            mount_point: PathBuf::from(unescape_fstab_path(parts[1])),
            vfs_type: parts[2].to_string(),
            mount_options: parts[3].split(',').map(|s| s.to_string()).collect(),
            dump,
            fsck_order,
        }))
    }

    /// Returns true if `other` targets the same filesystem or mount point.
    pub fn is_equivalent(&self, other: &FstabEntry) -> bool {
        self.fs_spec == other.fs_spec || self.mount_point == other.mount_point
    }
}

/// Escapes special characters in fstab paths using octal sequences.
///
/// Handles space (\040), tab (\011), newline (\012), and backslash (\134).
pub fn escape_fstab_path(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            ' ' => encoded.push_str(r"\040"),
            '\t' => encoded.push_str(r"\011"),
            '\n' => encoded.push_str(r"\012"),
            '\\' => encoded.push_str(r"\134"),
            _ => encoded.push(c),
        }
    }
    encoded
}

/// Unescapes three-digit octal sequences in fstab and mount table paths.
pub fn unescape_fstab_path(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            let octal: String = chars.clone().take(3).collect();
            if octal.len() == 3
                && octal.chars().all(|d| d.is_digit(8))
                && let Ok(byte) = u8::from_str_radix(&octal, 8)
            {
                result.push(byte as char);
                for _ in 0..3 {
                    chars.next();
                }
                continue;
            }
        }
        result.push(c);
    }
    result
}

/// Returns true if `content` already holds an entry equivalent to `entry`.
///
/// Malformed lines are ignored.
pub fn has_equivalent_entry(content: &str, entry: &FstabEntry) -> bool {
    content
        .lines()
        .filter_map(|line| FstabEntry::from_line(line).ok().flatten())
        .any(|existing| existing.is_equivalent(entry))
}

/// Returns true if the fstab at `path` already holds an equivalent entry.
/// A missing file holds nothing.
pub fn contains_equivalent(path: &Path, entry: &FstabEntry) -> Result<bool> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(has_equivalent_entry(&content, entry)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).fstab_read_context(path),
    }
}

/// What [`append_entry`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// An equivalent entry exists; the file was not touched.
    AlreadyPresent,
    /// The entry was appended; a backup was taken if the file existed.
    Appended { backup: Option<PathBuf> },
}

/// Appends `entry` to the fstab at `path` unless an equivalent one exists.
///
/// A missing file is treated as empty. A trailing newline is added to the
/// existing content before appending if it lacks one.
pub fn append_entry(path: &Path, entry: &FstabEntry) -> Result<AppendOutcome> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e).fstab_read_context(path),
    };
    let content = existing.as_deref().unwrap_or_default();

    if has_equivalent_entry(content, entry) {
        debug!(fs_spec = %entry.fs_spec, "equivalent fstab entry present");
        return Ok(AppendOutcome::AlreadyPresent);
    }

    let backup = if existing.is_some() {
        Some(backup_fstab(path)?)
    } else {
        None
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .fstab_write_context(path)?;

    let mut addition = String::new();
    if !content.is_empty() && !content.ends_with('\n') {
        addition.push('\n');
    }
    addition.push_str(&entry.to_fstab_line());
    addition.push('\n');
    file.write_all(addition.as_bytes()).fstab_write_context(path)?;

    info!(path = %path.display(), line = %entry.to_fstab_line(), "fstab entry appended");
    Ok(AppendOutcome::Appended { backup })
}

/// Creates a timestamped backup of the fstab file.
///
/// Returns the path to the backup file.
pub fn backup_fstab(path: &Path) -> Result<PathBuf> {
    let timestamp = chrono_lite_timestamp();
    let backup_name = format!("{}.backup.{}", path.display(), timestamp);
    let backup_path = PathBuf::from(&backup_name);

    fs::copy(path, &backup_path).backup_context(&backup_path)?;

    Ok(backup_path)
}

/// Simple timestamp without external dependencies.
fn chrono_lite_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    format!("{}", duration.as_secs())
}

/// Fails with [`Error::NotRoot`] unless the effective UID is 0.
pub fn require_root() -> Result<()> {
    if nix::unistd::geteuid().is_root() {
        Ok(())
    } else {
        Err(Error::NotRoot)
    }
}

/// UID and GID of the user who invoked the tool, looking through `sudo`.
pub fn invoking_user_ids() -> (u32, u32) {
    let from_env = |var: &str| std::env::var(var).ok().and_then(|v| v.parse::<u32>().ok());
    let uid = from_env("SUDO_UID").unwrap_or_else(|| nix::unistd::getuid().as_raw());
    let gid = from_env("SUDO_GID").unwrap_or_else(|| nix::unistd::getgid().as_raw());
    (uid, gid)
}

/// Determines the filesystem UUID of a mounted device.
///
/// Uses the device string directly for `UUID=` devices, otherwise asks
/// `blkid`. A missing `blkid` counts as an unknown UUID.
pub fn resolve_uuid(device: &str) -> Result<String> {
    if let Some(uuid) = device.strip_prefix("UUID=") {
        return Ok(uuid.to_string());
    }

    let output = match Command::new("blkid")
        .args(["-s", "UUID", "-o", "value", device])
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            debug!(error = %e, "blkid unavailable");
            return Err(Error::UuidNotFound {
                device: device.to_string(),
            });
        }
    };

    let uuid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if uuid.is_empty() {
        return Err(Error::UuidNotFound {
            device: device.to_string(),
        });
    }
    Ok(uuid)
}

/// Builds the entry for the drive mounted as `mount`.
pub fn entry_for_mount(mount: &MountInfo) -> Result<FstabEntry> {
    let uuid = resolve_uuid(&mount.device)?;
    let (uid, gid) = invoking_user_ids();
    Ok(FstabEntry::for_drive(
        &uuid,
        &mount.mount_point,
        &mount.fs_type,
        uid,
        gid,
    ))
}

/// Builds the entry for the drive holding the library at `library`.
pub fn entry_for_library(library: &Path) -> Result<FstabEntry> {
    let mounts = mount::read_mounts(Path::new(mount::PROC_MOUNTS))?;
    let info = mount::find_mount_info(library, &mounts).ok_or_else(|| Error::MountNotFound {
        path: library.to_path_buf(),
    })?;
    debug!(device = %info.device, mount_point = %info.mount_point.display(), "library mount");
    entry_for_mount(&info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE_FSTAB: &str = r#"# /etc/fstab: static file system information.

# <file system>  <mount point>  <type>  <options>  <dump>  <pass>
UUID=abc-123  /  ext4  defaults  0  1
UUID=def-456  /boot/efi  vfat  umask=0077  0  1
"#;

    fn drive_entry() -> FstabEntry {
        FstabEntry::for_drive(
            "1234-ABCD",
            Path::new("/run/media/deck/My Games"),
            "exfat",
            1000,
            1000,
        )
    }

    #[test]
    fn test_for_drive_line() {
        let line = drive_entry().to_fstab_line();
        assert_eq!(
            line,
            "UUID=1234-ABCD /run/media/deck/My\\040Games exfat \
             rw,nofail,x-systemd.automount,nosuid,nodev,relatime,uid=1000,gid=1000,\
             fmask=0022,dmask=0022,umask=000,iocharset=utf8,errors=remount-ro,x-gvfs-show,exec 0 0"
        );
    }

    #[test]
    fn test_line_round_trips() {
        let entry = drive_entry();
        let parsed = FstabEntry::from_line(&entry.to_fstab_line())
            .unwrap()
            .unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_parse_fstab_skip_comments() {
        assert!(
            FstabEntry::from_line("# This is a comment")
                .unwrap()
                .is_none()
        );
        assert!(FstabEntry::from_line("").unwrap().is_none());
        assert!(FstabEntry::from_line("UUID=x /mnt ext4 defaults 0 z").is_err());
    }

    #[test]
    fn test_unescape_fstab_path() {
        assert_eq!(unescape_fstab_path(r"/mnt/My\040Drive"), "/mnt/My Drive");
        assert_eq!(unescape_fstab_path(r"/mnt/a\134b"), r"/mnt/a\b");
        assert_eq!(unescape_fstab_path(r"/mnt/\09x"), r"/mnt/\09x");
        assert_eq!(unescape_fstab_path(r"/mnt/end\04"), r"/mnt/end\04");
    }

    #[test]
    fn test_has_equivalent_entry() {
        let entry = drive_entry();
        assert!(!has_equivalent_entry(SAMPLE_FSTAB, &entry));

        let same_uuid = format!("{SAMPLE_FSTAB}UUID=1234-ABCD /elsewhere exfat defaults 0 0\n");
        assert!(has_equivalent_entry(&same_uuid, &entry));

        let same_mount =
            format!("{SAMPLE_FSTAB}/dev/sdb1 /run/media/deck/My\\040Games exfat defaults 0 0\n");
        assert!(has_equivalent_entry(&same_mount, &entry));

        let commented = format!("{SAMPLE_FSTAB}# UUID=1234-ABCD /x exfat defaults 0 0\n");
        assert!(!has_equivalent_entry(&commented, &entry));
    }

    #[test]
    fn test_append_entry_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fstab");
        fs::write(&path, SAMPLE_FSTAB.trim_end()).unwrap();
        let entry = drive_entry();

        let AppendOutcome::Appended {
            backup: Some(backup),
        } = append_entry(&path, &entry).unwrap()
        else {
            panic!("expected an append with backup");
        };
        assert_eq!(fs::read_to_string(backup).unwrap(), SAMPLE_FSTAB.trim_end());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with(&format!("\n{}\n", entry.to_fstab_line())));
        assert!(content.contains("0  1\nUUID=1234-ABCD"));

        assert_eq!(
            append_entry(&path, &entry).unwrap(),
            AppendOutcome::AlreadyPresent
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_append_entry_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fstab");
        let entry = drive_entry();

        assert!(!contains_equivalent(&path, &entry).unwrap());
        assert_eq!(
            append_entry(&path, &entry).unwrap(),
            AppendOutcome::Appended { backup: None }
        );
        assert!(contains_equivalent(&path, &entry).unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("{}\n", entry.to_fstab_line())
        );
    }

    #[test]
    fn test_resolve_uuid_from_uuid_device() {
        assert_eq!(resolve_uuid("UUID=DEAD-BEEF").unwrap(), "DEAD-BEEF");
    }
}
