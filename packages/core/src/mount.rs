//! Mount table inspection and external library discovery.
//!
//! This module reads `/proc/mounts`, finds exFAT filesystems, and looks for
//! Steam library roots (`steamapps` directories) on them.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use snafu::ResultExt;
use tracing::debug;

use crate::error::{MountsReadSnafu, Result};
use crate::fstab::unescape_fstab_path;
use crate::steam::{self, LibraryFolder};

/// Kernel mount table.
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// Filesystem types reported for exFAT mounts (kernel driver and FUSE).
pub const EXFAT_TYPES: [&str; 3] = ["exfat", "fuse.exfat", "exfat-fuse"];

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// Mounted device (e.g., "/dev/sda1").
    pub device: String,
    /// Mount point, with octal escapes decoded.
    pub mount_point: PathBuf,
    /// Filesystem type as reported by the kernel.
    pub fs_type: String,
}

impl MountInfo {
    /// Parses a mount table line. Returns None for short lines.
    pub fn from_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let device = parts.next()?;
        let mount_point = parts.next()?;
        let fs_type = parts.next()?;

        Some(Self {
            device: device.to_string(),
            mount_point: PathBuf::from(unescape_fstab_path(mount_point)),
            fs_type: fs_type.to_string(),
        })
    }

    /// Returns true if this is an exFAT mount.
    pub fn is_exfat(&self) -> bool {
        let fs_type = self.fs_type.to_lowercase();
        EXFAT_TYPES.contains(&fs_type.as_str())
    }
}

/// Parses mount table content.
pub fn parse_mounts(content: &str) -> Vec<MountInfo> {
    content.lines().filter_map(MountInfo::from_line).collect()
}

/// Reads and parses a mount table file. A missing file yields no mounts.
pub fn read_mounts(path: &Path) -> Result<Vec<MountInfo>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(parse_mounts(&content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).context(MountsReadSnafu { path }),
    }
}

/// Returns exFAT mounts whose mount point currently exists.
pub fn exfat_mounts(mounts: &[MountInfo]) -> Vec<&MountInfo> {
    mounts
        .iter()
        .filter(|m| m.is_exfat() && m.mount_point.exists())
        .collect()
}

/// Collects candidate library roots, de-duplicated by canonical path.
#[derive(Debug, Default)]
struct Candidates {
    seen: HashSet<PathBuf>,
    paths: Vec<PathBuf>,
}

impl Candidates {
    fn register(&mut self, path: PathBuf) {
        if !path.is_dir() {
            return;
        }
        let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if self.seen.insert(key) {
            self.paths.push(path);
        }
    }

    /// Registers `dir` if it is a library root, or `dir/steamapps` if it is
    /// a library folder.
    fn register_named(&mut self, dir: &Path) {
        let Some(name) = dir.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
            return;
        };
        if name == "steamlibrary" {
            self.register(dir.join("steamapps"));
        } else if name == "steamapps" {
            self.register(dir.to_path_buf());
        }
    }
}

/// Subdirectories of `dir`, sorted by name. Unreadable directories yield none.
fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "cannot list directory");
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}

/// Finds Steam library roots on the given mount points.
///
/// Checks the usual layouts first, then any directory named `SteamLibrary`
/// or `steamapps` (case-insensitive) at the top level or one level deeper.
pub fn discover_library_roots<P: AsRef<Path>>(mount_points: &[P]) -> Vec<PathBuf> {
    let mut candidates = Candidates::default();

    for mount in mount_points {
        let mount = mount.as_ref();
        candidates.register(mount.join("SteamLibrary/steamapps"));
        candidates.register(mount.join("steamapps"));
        candidates.register(mount.join("Steam/steamapps"));

        for entry in subdirectories(mount) {
            let name = entry
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if name == "steamlibrary" || name == "steamapps" {
                candidates.register_named(&entry);
            } else {
                for sub in subdirectories(&entry) {
                    candidates.register_named(&sub);
                }
            }
        }
    }

    candidates.paths
}

/// Library roots registered with Steam that live on one of `mount_points`.
pub fn registered_library_roots<P: AsRef<Path>>(
    folders: &[(String, LibraryFolder)],
    mount_points: &[P],
) -> Vec<PathBuf> {
    folders
        .iter()
        .map(|(_, folder)| folder.steamapps())
        .filter(|root| {
            mount_points
                .iter()
                .any(|mount| root.starts_with(mount.as_ref()))
        })
        .filter(|root| root.is_dir())
        .collect()
}

/// Finds the mount containing `path` (longest matching mount point).
pub fn find_mount_info(path: &Path, mounts: &[MountInfo]) -> Option<MountInfo> {
    let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    mounts
        .iter()
        .filter_map(|mount| {
            let candidate = fs::canonicalize(&mount.mount_point)
                .unwrap_or_else(|_| mount.mount_point.clone());
            resolved.starts_with(&candidate).then(|| MountInfo {
                mount_point: candidate,
                ..mount.clone()
            })
        })
        .max_by_key(|mount| mount.mount_point.as_os_str().len())
}

/// Discovers external library candidates on all exFAT mounts.
///
/// Scans the mount points, then appends libraries registered in Steam's
/// `libraryfolders.vdf` that sit on an exFAT mount.
pub fn discover_external_libraries() -> Result<Vec<PathBuf>> {
    let mounts = read_mounts(Path::new(PROC_MOUNTS))?;
    let mount_points: Vec<&Path> = exfat_mounts(&mounts)
        .into_iter()
        .map(|m| m.mount_point.as_path())
        .collect();

    let mut roots = discover_library_roots(&mount_points);

    if let Some(vdf) = steam::library_vdf_path() {
        match steam::parse_library_folders(&vdf) {
            Ok(folders) => {
                let known: HashSet<PathBuf> = roots
                    .iter()
                    .map(|r| fs::canonicalize(r).unwrap_or_else(|_| r.clone()))
                    .collect();
                for root in registered_library_roots(&folders, &mount_points) {
                    let key = fs::canonicalize(&root).unwrap_or_else(|_| root.clone());
                    if !known.contains(&key) {
                        roots.push(root);
                    }
                }
            }
            Err(e) => debug!(path = %vdf.display(), error = %e, "ignoring libraryfolders.vdf"),
        }
    }

    Ok(roots)
}
