//! Local Steam installation paths and library folder parsing.
//!
//! Locates the local `steamapps` directory and the runtime mirror location,
//! and parses Steam's `libraryfolders.vdf` with `keyvalues-serde` so that
//! registered libraries can be offered as external library candidates.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::error::{Error, Result, VdfReadSnafu};
use snafu::ResultExt;

/// One library registered with the Steam client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryFolder {
    /// Library folder; manifests live in its `steamapps` child.
    pub path: PathBuf,
    #[serde(default)]
    pub label: String,
    /// Installed app IDs and their sizes on disk.
    #[serde(default)]
    pub apps: HashMap<String, String>,
}

impl LibraryFolder {
    /// The library root holding manifests and `common/`.
    pub fn steamapps(&self) -> PathBuf {
        self.path.join("steamapps")
    }
}

#[derive(Debug, Deserialize)]
struct LibraryFoldersRoot {
    #[serde(flatten)]
    folders: HashMap<String, LibraryFolder>,
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(Error::HomeDirNotFound)
}

/// Returns the local Steam root (`~/.steam/steam`).
pub fn steam_root() -> Result<PathBuf> {
    Ok(home_dir()?.join(".steam").join("steam"))
}

/// Returns the local library root (`~/.steam/steam/steamapps`).
pub fn local_steamapps_dir() -> Result<PathBuf> {
    Ok(steam_root()?.join("steamapps"))
}

/// Returns the directory the compatibility runtime is mirrored into.
pub fn runtime_mirror_dir(runtime_name: &str) -> Result<PathBuf> {
    Ok(home_dir()?.join(".steam").join("runtime").join(runtime_name))
}

/// Returns the first existing `libraryfolders.vdf`, if any.
pub fn library_vdf_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    [
        home.join(".steam/steam/steamapps/libraryfolders.vdf"),
        home.join(".local/share/Steam/steamapps/libraryfolders.vdf"),
    ]
    .into_iter()
    .find(|path| path.is_file())
}

/// Returns true if a `steam` client process exists.
pub fn is_steam_running() -> bool {
    Command::new("pgrep")
        .args(["-x", "steam"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Reads `libraryfolders.vdf` and returns its numbered library entries.
pub fn parse_library_folders(path: &Path) -> Result<Vec<(String, LibraryFolder)>> {
    let content = fs::read_to_string(path).context(VdfReadSnafu { path })?;
    parse_library_folders_content(&content)
}

/// Library entries of `libraryfolders.vdf` content, ordered by index.
///
/// Non-numeric top-level keys (such as `contentstatsid`) are ignored.
fn parse_library_folders_content(content: &str) -> Result<Vec<(String, LibraryFolder)>> {
    let root: LibraryFoldersRoot =
        keyvalues_serde::from_str(content).map_err(|e| Error::VdfParse {
            message: e.to_string(),
        })?;

    let mut indexed: Vec<(u32, String, LibraryFolder)> = root
        .folders
        .into_iter()
        .filter_map(|(key, folder)| key.parse::<u32>().ok().map(|index| (index, key, folder)))
        .collect();
    indexed.sort_by_key(|(index, ..)| *index);

    Ok(indexed
        .into_iter()
        .map(|(_, key, folder)| (key, folder))
        .collect())
}
