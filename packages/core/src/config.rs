//! User settings.
//!
//! Settings are read from `$XDG_CONFIG_HOME/steam-symlinker/config.json`.
//! Every field is optional; a missing file means all defaults.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use snafu::ResultExt;

use crate::error::{ConfigParseSnafu, ConfigReadSnafu, Result};
use crate::runtime::DEFAULT_RUNTIME_NAME;
use crate::steam;

/// Directory name under the user's config directory.
pub const CONFIG_DIR_NAME: &str = "steam-symlinker";

/// Settings file name.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Default staleness tolerance for export, in milliseconds.
pub const DEFAULT_STALENESS_TOLERANCE_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Message language ("en" or "it"); detected from the locale when unset.
    pub language: Option<String>,
    /// Local library root; `~/.steam/steam/steamapps` when unset.
    pub local_steamapps: Option<PathBuf>,
    /// External library root to use without asking.
    pub external_library: Option<PathBuf>,
    /// Slack when deciding whether an external manifest is newer.
    pub staleness_tolerance_ms: u64,
    /// Directory name of the compatibility runtime under `common/`.
    pub runtime_name: String,
    /// Use `rsync` for the runtime mirror when it is installed.
    pub prefer_rsync: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: None,
            local_steamapps: None,
            external_library: None,
            staleness_tolerance_ms: DEFAULT_STALENESS_TOLERANCE_MS,
            runtime_name: DEFAULT_RUNTIME_NAME.to_string(),
            prefer_rsync: true,
        }
    }
}

impl Settings {
    /// Default settings file location, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads settings from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).context(ConfigReadSnafu { path }),
        };

        serde_json::from_str(&content).context(ConfigParseSnafu { path })
    }

    /// Loads settings from the default location.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn staleness_tolerance(&self) -> Duration {
        Duration::from_millis(self.staleness_tolerance_ms)
    }

    /// The local library root, configured or default.
    pub fn local_root(&self) -> Result<PathBuf> {
        match &self.local_steamapps {
            Some(path) => Ok(path.clone()),
            None => steam::local_steamapps_dir(),
        }
    }
}
