//! Symlink reconciliation.
//!
//! Makes a destination path a symbolic link to a source path while protecting
//! real (non-symlink) files and directories that already occupy the
//! destination. The symlink check always happens before the real-object check,
//! so a forced reconcile never recurses through a symlink boundary.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::error::{IoResultExt, Result, SymlinkSnafu};

/// A source path and the local path that should mirror it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl LinkTarget {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Reconciles this pair. See [`reconcile`].
    pub fn reconcile(&self, force: bool) -> Result<LinkOutcome> {
        reconcile(&self.source, &self.destination, force)
    }
}

/// State of a destination relative to its source at inspection time.
///
/// Nothing guarantees the state still holds after inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Nothing at the destination, not even a dangling symlink.
    Absent,
    /// Destination is a symlink resolving to the same canonical path as source.
    CorrectLink,
    /// Destination is a symlink pointing elsewhere, or dangling.
    StaleLink,
    /// Destination is a real file or directory.
    BlockingRealObject,
}

impl LinkState {
    /// Inspects `destination` without following it.
    pub fn inspect(source: &Path, destination: &Path) -> Result<Self> {
        let metadata = match fs::symlink_metadata(destination) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::Absent),
            Err(e) => return Err(e).inspect_context(destination),
        };

        if !metadata.file_type().is_symlink() {
            return Ok(Self::BlockingRealObject);
        }

        match (fs::canonicalize(destination), fs::canonicalize(source)) {
            (Ok(resolved), Ok(expected)) if resolved == expected => Ok(Self::CorrectLink),
            _ => Ok(Self::StaleLink),
        }
    }
}

/// What reconciliation did to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A new symlink was created where nothing existed.
    Linked,
    /// The destination already pointed at the source.
    AlreadyLinked,
    /// A stale or dangling symlink was swapped for a correct one.
    Replaced,
    /// A real object blocks the destination and force was not given.
    Skipped,
    /// A real object was deleted and the symlink created in its place.
    RemovedAndLinked,
}

impl LinkOutcome {
    /// Returns true if a link was created or replaced.
    pub fn is_update(self) -> bool {
        matches!(self, Self::Linked | Self::Replaced | Self::RemovedAndLinked)
    }
}

/// Makes `destination` a symlink to `source`.
///
/// Real files and directories at `destination` are only removed when
/// `force` is set; symlinks are always replaced and never followed.
///
/// A relative `source` is made absolute against the working directory, since
/// a relative link target would resolve from the link's own directory.
pub fn reconcile(source: &Path, destination: &Path, force: bool) -> Result<LinkOutcome> {
    let source = std::path::absolute(source).inspect_context(source)?;
    let source = source.as_path();

    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).create_dir_context(parent)?;
    }

    let state = LinkState::inspect(source, destination)?;
    debug!(
        source = %source.display(),
        destination = %destination.display(),
        ?state,
        "inspected link destination"
    );

    let outcome = match state {
        LinkState::Absent => {
            create_link(source, destination)?;
            LinkOutcome::Linked
        }
        LinkState::CorrectLink => LinkOutcome::AlreadyLinked,
        LinkState::StaleLink => {
            fs::remove_file(destination).remove_context(destination)?;
            create_link(source, destination)?;
            LinkOutcome::Replaced
        }
        LinkState::BlockingRealObject if !force => {
            warn!(destination = %destination.display(), "existing object blocks link, skipping");
            LinkOutcome::Skipped
        }
        LinkState::BlockingRealObject => {
            remove_real_object(destination)?;
            warn!(destination = %destination.display(), "removed existing object");
            create_link(source, destination)?;
            LinkOutcome::RemovedAndLinked
        }
    };

    if outcome.is_update() {
        info!(
            source = %source.display(),
            destination = %destination.display(),
            ?outcome,
            "link updated"
        );
    }

    Ok(outcome)
}

fn create_link(source: &Path, destination: &Path) -> Result<()> {
    symlink(source, destination).context(SymlinkSnafu {
        link: destination,
        target: source,
    })
}

/// Removes a real file or directory tree.
///
/// Callers must have established that `path` itself is not a symlink.
fn remove_real_object(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path).inspect_context(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path).remove_context(path)
    } else {
        fs::remove_file(path).remove_context(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("external/common/Foo");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("game.bin"), b"data").unwrap();
        let destination = dir.path().join("local/common/Foo");
        (dir, source, destination)
    }

    #[test]
    fn test_absent_creates_link_and_parents() {
        let (_dir, source, destination) = setup();

        let outcome = reconcile(&source, &destination, false).unwrap();

        assert_eq!(outcome, LinkOutcome::Linked);
        assert_eq!(fs::read_link(&destination).unwrap(), source);
        assert!(destination.join("game.bin").exists());
    }

    #[test]
    fn test_correct_link_is_untouched() {
        let (_dir, source, destination) = setup();
        reconcile(&source, &destination, false).unwrap();

        assert_eq!(
            LinkState::inspect(&source, &destination).unwrap(),
            LinkState::CorrectLink
        );
        assert_eq!(
            reconcile(&source, &destination, false).unwrap(),
            LinkOutcome::AlreadyLinked
        );
        assert_eq!(
            reconcile(&source, &destination, true).unwrap(),
            LinkOutcome::AlreadyLinked
        );
    }

    #[test]
    fn test_stale_link_is_replaced() {
        let (dir, source, destination) = setup();
        let other = dir.path().join("other");
        fs::create_dir_all(&other).unwrap();
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        symlink(&other, &destination).unwrap();

        let outcome = reconcile(&source, &destination, false).unwrap();

        assert_eq!(outcome, LinkOutcome::Replaced);
        assert_eq!(fs::read_link(&destination).unwrap(), source);
        assert!(other.exists());
    }

    #[test]
    fn test_dangling_link_is_replaced() {
        let (dir, source, destination) = setup();
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        symlink(dir.path().join("missing"), &destination).unwrap();

        assert_eq!(
            LinkState::inspect(&source, &destination).unwrap(),
            LinkState::StaleLink
        );
        assert_eq!(
            reconcile(&source, &destination, false).unwrap(),
            LinkOutcome::Replaced
        );
        assert_eq!(fs::read_link(&destination).unwrap(), source);
    }

    #[test]
    fn test_real_directory_skipped_without_force() {
        let (_dir, source, destination) = setup();
        fs::create_dir_all(&destination).unwrap();
        fs::write(destination.join("save.dat"), b"keep").unwrap();

        let outcome = reconcile(&source, &destination, false).unwrap();

        assert_eq!(outcome, LinkOutcome::Skipped);
        assert!(!fs::symlink_metadata(&destination).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(destination.join("save.dat")).unwrap(), b"keep");
    }

    #[test]
    fn test_real_file_skipped_without_force() {
        let (dir, _source, _destination) = setup();
        let source = dir.path().join("external/appmanifest_1.acf");
        fs::write(&source, b"external").unwrap();
        let destination = dir.path().join("local/appmanifest_1.acf");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, b"local").unwrap();

        assert_eq!(
            reconcile(&source, &destination, false).unwrap(),
            LinkOutcome::Skipped
        );
        assert_eq!(fs::read(&destination).unwrap(), b"local");

        assert_eq!(
            reconcile(&source, &destination, true).unwrap(),
            LinkOutcome::RemovedAndLinked
        );
        assert_eq!(fs::read(&destination).unwrap(), b"external");
    }

    #[test]
    fn test_real_directory_removed_with_force() {
        let (_dir, source, destination) = setup();
        fs::create_dir_all(destination.join("nested")).unwrap();
        fs::write(destination.join("nested/file"), b"x").unwrap();

        let outcome = reconcile(&source, &destination, true).unwrap();

        assert_eq!(outcome, LinkOutcome::RemovedAndLinked);
        assert_eq!(fs::read_link(&destination).unwrap(), source);
        assert!(source.join("game.bin").exists());
    }

    #[test]
    fn test_force_never_recurses_through_symlink() {
        let (dir, source, destination) = setup();
        let precious = dir.path().join("precious");
        fs::create_dir_all(&precious).unwrap();
        fs::write(precious.join("keep.txt"), b"keep").unwrap();
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        symlink(&precious, &destination).unwrap();

        let outcome = reconcile(&source, &destination, true).unwrap();

        assert_eq!(outcome, LinkOutcome::Replaced);
        assert_eq!(fs::read(precious.join("keep.txt")).unwrap(), b"keep");
        assert_eq!(fs::read_link(&destination).unwrap(), source);
    }

    #[test]
    fn test_relative_source_is_linked_absolute() {
        // A directory under the working directory, addressed relatively.
        let dir = TempDir::new_in(".").unwrap();
        let relative = dir
            .path()
            .strip_prefix(std::env::current_dir().unwrap())
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| dir.path().to_path_buf());
        assert!(relative.is_relative());

        let source = relative.join("external/common/Foo");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("game.bin"), b"data").unwrap();
        let destination = relative.join("local/common/Foo");

        let outcome = reconcile(&source, &destination, false).unwrap();

        assert_eq!(outcome, LinkOutcome::Linked);
        assert!(fs::read_link(&destination).unwrap().is_absolute());
        assert_eq!(fs::read(destination.join("game.bin")).unwrap(), b"data");
        assert_eq!(
            reconcile(&source, &destination, false).unwrap(),
            LinkOutcome::AlreadyLinked
        );
    }

    #[test]
    fn test_is_update() {
        assert!(LinkOutcome::Linked.is_update());
        assert!(LinkOutcome::Replaced.is_update());
        assert!(LinkOutcome::RemovedAndLinked.is_update());
        assert!(!LinkOutcome::AlreadyLinked.is_update());
        assert!(!LinkOutcome::Skipped.is_update());
    }
}
