//! Steam app manifest discovery and parsing.
//!
//! Manifests (`appmanifest_<id>.acf`) are loosely structured key/value text.
//! Only the `name` and `installdir` fields matter here, so parsing is a
//! lenient text scan rather than a full VDF parse: a manifest that lacks
//! either field, or cannot be read at all, is dropped from the batch.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{IoResultExt, Result};

/// File name prefix shared by all app manifests.
pub const MANIFEST_PREFIX: &str = "appmanifest_";

/// File name extension of app manifests.
pub const MANIFEST_EXTENSION: &str = ".acf";

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""name"\s+"(.+?)""#).expect("valid name pattern"));

static INSTALLDIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""installdir"\s+"(.+?)""#).expect("valid installdir pattern"));

/// Identity of one installed game, as recorded in its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameManifest {
    /// File name of the manifest (e.g., "appmanifest_730.acf").
    pub manifest_file_name: String,
    /// Human-readable game name.
    pub display_name: String,
    /// Directory name under `common/`.
    pub install_dir: String,
}

impl GameManifest {
    /// Extracts a manifest from raw file text.
    ///
    /// Returns None unless both `name` and `installdir` are present.
    pub fn from_content(manifest_file_name: impl Into<String>, content: &str) -> Option<Self> {
        let display_name = NAME_RE.captures(content)?.get(1)?.as_str();
        let install_dir = INSTALLDIR_RE.captures(content)?.get(1)?.as_str();

        Some(Self {
            manifest_file_name: manifest_file_name.into(),
            display_name: display_name.to_string(),
            install_dir: install_dir.to_string(),
        })
    }
}

/// Returns true if the file name looks like an app manifest.
pub fn is_manifest_file_name(name: &str) -> bool {
    name.starts_with(MANIFEST_PREFIX) && name.ends_with(MANIFEST_EXTENSION)
}

/// Lists manifest files directly inside a library root, sorted by file name.
///
/// Dangling manifest symlinks are listed too; parsing drops them later.
pub fn list_manifest_files(library_root: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(library_root).read_dir_context(library_root)?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(is_manifest_file_name)
        })
        .map(|entry| entry.path())
        .collect();

    files.sort();
    Ok(files)
}

/// Parses manifests from the given files, in input order.
///
/// Unreadable files and files missing a required field are skipped.
pub fn parse_manifests<P: AsRef<Path>>(files: &[P]) -> Vec<GameManifest> {
    files
        .iter()
        .filter_map(|path| {
            let path = path.as_ref();
            let file_name = path.file_name()?.to_string_lossy().into_owned();
            let bytes = match fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable manifest");
                    return None;
                }
            };
            let content = String::from_utf8_lossy(&bytes);
            let manifest = GameManifest::from_content(file_name, &content);
            if manifest.is_none() {
                debug!(path = %path.display(), "manifest lacks name or installdir");
            }
            manifest
        })
        .collect()
}

/// Lists and parses every manifest in a library root.
pub fn load_library(library_root: &Path) -> Result<Vec<GameManifest>> {
    let files = list_manifest_files(library_root)?;
    Ok(parse_manifests(&files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE_ACF: &str = "\"AppState\"\n{\n\t\"appid\"\t\t\"100\"\n\t\"name\"\t\t\"Example Game\"\n\t\"installdir\"\t\t\"ExampleGame\"\n}\n";

    #[test]
    fn test_from_content() {
        let manifest = GameManifest::from_content("appmanifest_100.acf", SAMPLE_ACF).unwrap();
        assert_eq!(manifest.manifest_file_name, "appmanifest_100.acf");
        assert_eq!(manifest.display_name, "Example Game");
        assert_eq!(manifest.install_dir, "ExampleGame");
    }

    #[test]
    fn test_from_content_first_occurrence_wins() {
        let content = "\"name\" \"First\"\n\"installdir\" \"A\"\n\"name\" \"Second\"\n\"installdir\" \"B\"";
        let manifest = GameManifest::from_content("appmanifest_1.acf", content).unwrap();
        assert_eq!(manifest.display_name, "First");
        assert_eq!(manifest.install_dir, "A");
    }

    #[test]
    fn test_from_content_missing_field() {
        assert!(GameManifest::from_content("a.acf", "\"name\"\t\"Only Name\"").is_none());
        assert!(GameManifest::from_content("a.acf", "\"installdir\"\t\"Dir\"").is_none());
        assert!(GameManifest::from_content("a.acf", "").is_none());
    }

    #[test]
    fn test_is_manifest_file_name() {
        assert!(is_manifest_file_name("appmanifest_730.acf"));
        assert!(!is_manifest_file_name("libraryfolders.vdf"));
        assert!(!is_manifest_file_name("appmanifest_730.acf.bak"));
    }

    #[test]
    fn test_load_library_sorted_and_lenient() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("appmanifest_200.acf"),
            "\"name\" \"Bar\"\n\"installdir\" \"BarDir\"",
        )
        .unwrap();
        fs::write(
            dir.path().join("appmanifest_100.acf"),
            "\"name\" \"Foo\"\n\"installdir\" \"FooDir\"",
        )
        .unwrap();
        fs::write(dir.path().join("appmanifest_300.acf"), "\"name\" \"Broken\"").unwrap();
        fs::write(dir.path().join("appmanifest_400.acf"), [0xff, 0xfe, 0x00]).unwrap();
        fs::write(dir.path().join("libraryfolders.vdf"), SAMPLE_ACF).unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("gone.acf"),
            dir.path().join("appmanifest_500.acf"),
        )
        .unwrap();

        let files = list_manifest_files(dir.path()).unwrap();
        assert_eq!(files.len(), 5);

        let games = load_library(dir.path()).unwrap();
        let names: Vec<&str> = games.iter().map(|g| g.display_name.as_str()).collect();
        assert_eq!(names, vec!["Foo", "Bar"]);
    }

    #[test]
    fn test_load_library_missing_root() {
        let dir = TempDir::new().unwrap();
        assert!(load_library(&dir.path().join("nope")).is_err());
    }
}
