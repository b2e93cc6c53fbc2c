//! steam-symlinker-core: Core library for linking an exFAT Steam library.
//!
//! Keeps game installs on an external exFAT drive while Steam's local
//! library sees them through symbolic links.
//!
//! # Modules
//!
//! - [`manifest`]: App manifest discovery and lenient parsing
//! - [`link`]: Symlink reconciliation with real-object protection
//! - [`library`]: Batch linking of an external library into the local one
//! - [`export`]: Copying updated manifests back to the external drive
//! - [`mirror`]: Directory mirroring via `rsync` or an in-process copy
//! - [`runtime`]: Steam Linux Runtime mirroring and linking
//! - [`mount`]: Mount table parsing and external library discovery
//! - [`fstab`]: Fstab entry generation for the external drive
//! - [`steam`]: Local Steam paths and `libraryfolders.vdf` parsing
//! - [`systemd`]: Systemd daemon reload
//! - [`config`]: User settings
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use steam_symlinker_core::library;
//!
//! let external = Path::new("/run/media/deck/GAMES/SteamLibrary/steamapps");
//! let local = Path::new("/home/deck/.steam/steam/steamapps");
//!
//! let report = library::update_links(external, local, false).unwrap();
//! println!("updated {} link(s)", report.updated());
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod fstab;
pub mod library;
pub mod link;
pub mod manifest;
pub mod mirror;
pub mod mount;
pub mod runtime;
pub mod steam;
pub mod systemd;

// Re-export commonly used types
pub use config::Settings;
pub use error::{Error, Result};
pub use export::{ExportCandidate, ExportReport, ExportStatus};
pub use library::{EntryStatus, UpdateReport};
pub use link::{LinkOutcome, LinkState, LinkTarget};
pub use manifest::GameManifest;
