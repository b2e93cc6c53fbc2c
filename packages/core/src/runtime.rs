//! Steam Linux Runtime mirroring.
//!
//! The container runtime does not work from an exFAT drive, so it is copied
//! to a local directory and the local library's `common/` entry is pointed at
//! that copy.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::library::COMMON_DIR;
use crate::link::{self, LinkOutcome};
use crate::mirror::{self, Mirror};
use crate::steam;

/// Runtime shipped as a regular Steam app.
pub const DEFAULT_RUNTIME_NAME: &str = "SteamLinuxRuntime_sniper";

/// Where the runtime comes from, where it is mirrored, and where it is linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLayout {
    /// Runtime directory on the external drive.
    pub source: PathBuf,
    /// Local mirror of the runtime.
    pub mirror_dir: PathBuf,
    /// Entry in the local library's `common/` pointing at the mirror.
    pub link: PathBuf,
}

impl RuntimeLayout {
    /// Layout for the default local mirror location under `~/.steam/runtime`.
    pub fn new(external_root: &Path, local_root: &Path, runtime_name: &str) -> Result<Self> {
        Ok(Self::with_mirror_dir(
            external_root,
            local_root,
            runtime_name,
            steam::runtime_mirror_dir(runtime_name)?,
        ))
    }

    pub fn with_mirror_dir(
        external_root: &Path,
        local_root: &Path,
        runtime_name: &str,
        mirror_dir: PathBuf,
    ) -> Self {
        Self {
            source: external_root.join(COMMON_DIR).join(runtime_name),
            mirror_dir,
            link: local_root.join(COMMON_DIR).join(runtime_name),
        }
    }
}

/// Mirrors the runtime locally and force-links it into the local library.
pub fn sync_runtime(layout: &RuntimeLayout, mirror: &dyn Mirror) -> Result<LinkOutcome> {
    if !layout.source.is_dir() {
        return Err(Error::RuntimeMissing {
            path: layout.source.clone(),
        });
    }

    mirror::mirror_tree(mirror, &layout.source, &layout.mirror_dir)?;
    let outcome = link::reconcile(&layout.mirror_dir, &layout.link, true)?;

    info!(
        mirror = %layout.mirror_dir.display(),
        link = %layout.link.display(),
        ?outcome,
        "runtime ready"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::CopyMirror;
    use std::fs;
    use tempfile::TempDir;

    fn layout(dir: &Path) -> RuntimeLayout {
        RuntimeLayout::with_mirror_dir(
            &dir.join("external"),
            &dir.join("local"),
            DEFAULT_RUNTIME_NAME,
            dir.join("runtime").join(DEFAULT_RUNTIME_NAME),
        )
    }

    #[test]
    fn test_layout_paths() {
        let layout = layout(Path::new("/x"));
        assert_eq!(
            layout.source,
            PathBuf::from("/x/external/common/SteamLinuxRuntime_sniper")
        );
        assert_eq!(
            layout.link,
            PathBuf::from("/x/local/common/SteamLinuxRuntime_sniper")
        );
    }

    #[test]
    fn test_sync_runtime_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = sync_runtime(&layout(dir.path()), &CopyMirror).unwrap_err();
        assert!(matches!(err, Error::RuntimeMissing { .. }));
    }

    #[test]
    fn test_sync_runtime_mirrors_and_links() {
        let dir = TempDir::new().unwrap();
        let layout = layout(dir.path());
        fs::create_dir_all(&layout.source).unwrap();
        fs::write(layout.source.join("_v2-entry-point"), b"entry").unwrap();
        // A real directory left from an earlier install is replaced.
        fs::create_dir_all(&layout.link).unwrap();

        let outcome = sync_runtime(&layout, &CopyMirror).unwrap();

        assert_eq!(outcome, LinkOutcome::RemovedAndLinked);
        assert_eq!(fs::read_link(&layout.link).unwrap(), layout.mirror_dir);
        assert_eq!(
            fs::read(layout.link.join("_v2-entry-point")).unwrap(),
            b"entry"
        );

        let again = sync_runtime(&layout, &CopyMirror).unwrap();
        assert_eq!(again, LinkOutcome::AlreadyLinked);
    }
}
