//! Batch linking of an external library into the local Steam library.
//!
//! For every manifest on the external drive, the manifest file itself and the
//! game's install directory under `common/` are linked into the local
//! library root, each pair reconciled independently.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, IoResultExt, Result};
use crate::link::{LinkOutcome, LinkTarget};
use crate::manifest::{self, GameManifest};

/// Name of the install directory subtree of a library root.
pub const COMMON_DIR: &str = "common";

/// Outcome of one pair within a batch update.
#[derive(Debug)]
pub enum EntryStatus {
    /// Reconciliation ran and produced an outcome.
    Reconciled(LinkOutcome),
    /// The install directory does not exist on the external drive.
    MissingSource,
    /// Reconciliation failed for this pair only.
    Failed(Error),
}

/// One reported pair of a batch update.
#[derive(Debug)]
pub struct UpdateEntry {
    pub game: String,
    pub target: LinkTarget,
    pub status: EntryStatus,
}

/// Everything a batch update did, in processing order.
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub entries: Vec<UpdateEntry>,
}

impl UpdateReport {
    /// Number of links created or replaced.
    pub fn updated(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, EntryStatus::Reconciled(o) if o.is_update()))
            .count()
    }

    /// Number of pairs that failed with an error.
    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, EntryStatus::Failed(_)))
            .count()
    }
}

/// The two link pairs derived from one manifest.
pub fn link_targets(
    game: &GameManifest,
    external_root: &Path,
    local_root: &Path,
) -> (LinkTarget, LinkTarget) {
    let manifest = LinkTarget::new(
        external_root.join(&game.manifest_file_name),
        local_root.join(&game.manifest_file_name),
    );
    let install = LinkTarget::new(
        external_root.join(COMMON_DIR).join(&game.install_dir),
        local_root.join(COMMON_DIR).join(&game.install_dir),
    );
    (manifest, install)
}

/// Links every game of `external_root` into `local_root`.
///
/// Fails with [`Error::NoGamesFound`] before touching the filesystem when no
/// manifest parses. Per-pair failures are recorded and the batch continues.
pub fn update_links(external_root: &Path, local_root: &Path, force: bool) -> Result<UpdateReport> {
    let games = manifest::load_library(external_root)?;
    if games.is_empty() {
        return Err(Error::NoGamesFound {
            path: external_root.to_path_buf(),
        });
    }

    let common_local: PathBuf = local_root.join(COMMON_DIR);
    fs::create_dir_all(&common_local).create_dir_context(&common_local)?;

    let mut report = UpdateReport::default();
    for game in &games {
        let (manifest_pair, install_pair) = link_targets(game, external_root, local_root);

        let status = reconcile_entry(&manifest_pair, force);
        report.entries.push(UpdateEntry {
            game: game.display_name.clone(),
            target: manifest_pair,
            status,
        });

        let status = if install_pair.source.exists() {
            reconcile_entry(&install_pair, force)
        } else {
            warn!(
                game = %game.display_name,
                source = %install_pair.source.display(),
                "install directory missing on external drive"
            );
            EntryStatus::MissingSource
        };
        report.entries.push(UpdateEntry {
            game: game.display_name.clone(),
            target: install_pair,
            status,
        });
    }

    info!(
        games = games.len(),
        updated = report.updated(),
        failed = report.failed(),
        "batch update finished"
    );
    Ok(report)
}

fn reconcile_entry(target: &LinkTarget, force: bool) -> EntryStatus {
    match target.reconcile(force) {
        Ok(outcome) => EntryStatus::Reconciled(outcome),
        Err(e) => {
            warn!(destination = %target.destination.display(), error = %e, "link failed");
            EntryStatus::Failed(e)
        }
    }
}
