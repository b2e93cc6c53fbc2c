//! Export of locally updated manifests back to the external drive.
//!
//! Steam rewrites manifests in the local library (through the symlink, or
//! after the link was replaced by a real file). Exporting copies each backing
//! file to the external library root, refusing to overwrite a strictly newer
//! external copy unless the caller confirms.

use std::fs::{self, File};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::error::{CopySnafu, Error, IoResultExt, PreserveMetadataSnafu, Result};
use crate::manifest;

/// Default slack when comparing modification times across filesystems.
///
/// exFAT timestamps are coarser than those of typical Linux filesystems.
pub const DEFAULT_STALENESS_TOLERANCE: Duration = Duration::from_secs(1);

/// A local manifest's backing file and its external destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportCandidate {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub source_mtime: SystemTime,
    pub dest_mtime: Option<SystemTime>,
}

impl ExportCandidate {
    /// Returns true if the external copy is newer beyond `tolerance`.
    pub fn destination_is_newer(&self, tolerance: Duration) -> bool {
        self.dest_mtime
            .is_some_and(|dest| dest > self.source_mtime + tolerance)
    }
}

/// Per-file export decision.
#[derive(Debug)]
pub enum ExportStatus {
    Copied,
    /// Source and destination are the same filesystem object.
    Identical,
    /// External copy is newer and overwriting was declined.
    SkippedNewer,
    Failed(Error),
}

#[derive(Debug)]
pub struct ExportEntry {
    pub candidate: ExportCandidate,
    pub status: ExportStatus,
}

/// Result of an export run.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub entries: Vec<ExportEntry>,
    /// How many external copies were newer than their local source.
    pub newer_on_external: usize,
}

impl ExportReport {
    /// Number of files actually copied.
    pub fn copied(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, ExportStatus::Copied))
            .count()
    }
}

/// Builds export candidates for every resolvable local manifest.
///
/// Manifests whose backing file is missing or unreadable are dropped.
pub fn collect_candidates(local_root: &Path, external_root: &Path) -> Result<Vec<ExportCandidate>> {
    let files = manifest::list_manifest_files(local_root)?;
    if files.is_empty() {
        return Err(Error::NothingToExport {
            path: local_root.to_path_buf(),
        });
    }

    Ok(files
        .iter()
        .filter_map(|file| candidate_for(file, external_root))
        .collect())
}

fn candidate_for(file: &Path, external_root: &Path) -> Option<ExportCandidate> {
    let is_link = fs::symlink_metadata(file).ok()?.file_type().is_symlink();
    let source = if is_link {
        fs::canonicalize(file).ok()?
    } else {
        file.to_path_buf()
    };

    let source_mtime = match fs::metadata(&source).and_then(|m| m.modified()) {
        Ok(mtime) => mtime,
        Err(e) => {
            debug!(path = %file.display(), error = %e, "dropping unresolvable manifest");
            return None;
        }
    };

    let destination = external_root.join(file.file_name()?);
    let dest_mtime = fs::metadata(&destination)
        .and_then(|m| m.modified())
        .ok();

    Some(ExportCandidate {
        source,
        destination,
        source_mtime,
        dest_mtime,
    })
}

/// Copies local manifests to the external library root.
///
/// When any external copy is newer than its source (beyond `tolerance`),
/// `confirm_overwrite` is called once with that count; returning false skips
/// exactly those files. Files that are the same object on both sides are
/// never copied.
pub fn export_manifests<F>(
    local_root: &Path,
    external_root: &Path,
    tolerance: Duration,
    confirm_overwrite: F,
) -> Result<ExportReport>
where
    F: FnOnce(usize) -> bool,
{
    let candidates = collect_candidates(local_root, external_root)?;
    let newer_on_external = candidates
        .iter()
        .filter(|c| c.destination_is_newer(tolerance))
        .count();

    let allow_overwrite = newer_on_external == 0 || confirm_overwrite(newer_on_external);
    if !allow_overwrite {
        warn!(count = newer_on_external, "keeping newer manifests on external drive");
    }

    let mut report = ExportReport {
        entries: Vec::with_capacity(candidates.len()),
        newer_on_external,
    };

    for candidate in candidates {
        let status = if is_same_file(&candidate.source, &candidate.destination) {
            ExportStatus::Identical
        } else if !allow_overwrite && candidate.destination_is_newer(tolerance) {
            ExportStatus::SkippedNewer
        } else {
            match copy_preserving(&candidate.source, &candidate.destination) {
                Ok(()) => ExportStatus::Copied,
                Err(e) => {
                    warn!(source = %candidate.source.display(), error = %e, "export failed");
                    ExportStatus::Failed(e)
                }
            }
        };
        report.entries.push(ExportEntry { candidate, status });
    }

    info!(copied = report.copied(), "manifest export finished");
    Ok(report)
}

/// Returns true if both paths exist and refer to the same device and inode.
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

/// Copies a file, keeping its permissions and modification time.
pub(crate) fn copy_preserving(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).create_dir_context(parent)?;
    }

    // fs::copy carries permission bits over.
    fs::copy(from, to).context(CopySnafu { from, to })?;

    let metadata = fs::metadata(from).inspect_context(from)?;
    let accessed = metadata.accessed().context(PreserveMetadataSnafu { path: from })?;
    let modified = metadata.modified().context(PreserveMetadataSnafu { path: from })?;
    let times = fs::FileTimes::new()
        .set_accessed(accessed)
        .set_modified(modified);

    // Setting explicit times needs ownership, not write access.
    File::open(to)
        .and_then(|file| file.set_times(times))
        .context(PreserveMetadataSnafu { path: to })
}
