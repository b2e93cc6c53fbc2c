//! Localized user-facing text.
//!
//! Fluent resources for every language are embedded in the binary. The
//! language is picked once at startup and every string shown to the user is
//! looked up by [`Msg`] key with named arguments.

use std::collections::HashMap;
use std::fmt::Display;

use i18n_embed::fluent::{FluentLanguageLoader, fluent_language_loader};
use i18n_embed::{DesktopLanguageRequester, I18nEmbedError, LanguageLoader};
use rust_embed::RustEmbed;
use unic_langid::{LanguageIdentifier, langid};

#[derive(RustEmbed)]
#[folder = "i18n/"]
struct Localizations;

/// Supported interface languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    En,
    It,
}

impl Language {
    /// Parses an explicit language code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "en" => Some(Self::En),
            "it" => Some(Self::It),
            _ => None,
        }
    }

    pub fn identifier(self) -> LanguageIdentifier {
        match self {
            Self::En => langid!("en"),
            Self::It => langid!("it"),
        }
    }

    /// Picks the language: an explicit valid code wins, then the desktop
    /// locale (`LC_ALL`, `LC_MESSAGES`, `LANG`).
    pub fn detect(explicit: Option<&str>) -> Self {
        if let Some(language) = explicit.and_then(Self::from_code) {
            return language;
        }
        Self::from_requested(&DesktopLanguageRequester::requested_languages())
    }

    /// Italian when the most preferred language is Italian, English otherwise.
    pub fn from_requested(requested: &[LanguageIdentifier]) -> Self {
        match requested.first() {
            Some(id) if id.language.as_str() == "it" => Self::It,
            _ => Self::En,
        }
    }
}

/// Message keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    Welcome,
    DetectedLibraries,
    NoLibraries,
    ChoosePath,
    ManualOption,
    EnterPath,
    InvalidChoice,
    PathNotFound,
    MenuTitle,
    MenuOptions,
    PromptChoice,
    ForceWarning,
    ConfirmForce,
    Cancelled,
    SteamRunning,
    NoGames,
    NoLocalManifests,
    LinkDone,
    UpdatedSymlinks,
    StatusAlready,
    StatusReplaced,
    StatusRemoved,
    StatusSkip,
    StatusLinked,
    StatusFailed,
    MissingSource,
    RuntimeMissing,
    RuntimeCopy,
    RuntimeDone,
    NewerWarning,
    SkipNewer,
    Exported,
    FstabNeedsRoot,
    FstabMountUnknown,
    FstabUuidFailed,
    FstabEntryPreview,
    FstabConfirm,
    FstabWritten,
    FstabBackup,
    FstabAlreadyPresent,
    FstabUnwritable,
    FstabReloadFailed,
    Failed,
    Bye,
}

impl Msg {
    /// Fluent message id.
    pub fn id(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::DetectedLibraries => "detected-libraries",
            Self::NoLibraries => "no-libraries",
            Self::ChoosePath => "choose-path",
            Self::ManualOption => "manual-option",
            Self::EnterPath => "enter-path",
            Self::InvalidChoice => "invalid-choice",
            Self::PathNotFound => "path-not-found",
            Self::MenuTitle => "menu-title",
            Self::MenuOptions => "menu-options",
            Self::PromptChoice => "prompt-choice",
            Self::ForceWarning => "force-warning",
            Self::ConfirmForce => "confirm-force",
            Self::Cancelled => "cancelled",
            Self::SteamRunning => "steam-running",
            Self::NoGames => "no-games",
            Self::NoLocalManifests => "no-local-manifests",
            Self::LinkDone => "link-done",
            Self::UpdatedSymlinks => "updated-symlinks",
            Self::StatusAlready => "status-already",
            Self::StatusReplaced => "status-replaced",
            Self::StatusRemoved => "status-removed",
            Self::StatusSkip => "status-skip",
            Self::StatusLinked => "status-linked",
            Self::StatusFailed => "status-failed",
            Self::MissingSource => "missing-source",
            Self::RuntimeMissing => "runtime-missing",
            Self::RuntimeCopy => "runtime-copy",
            Self::RuntimeDone => "runtime-done",
            Self::NewerWarning => "newer-warning",
            Self::SkipNewer => "skip-newer",
            Self::Exported => "exported",
            Self::FstabNeedsRoot => "fstab-needs-root",
            Self::FstabMountUnknown => "fstab-mount-unknown",
            Self::FstabUuidFailed => "fstab-uuid-failed",
            Self::FstabEntryPreview => "fstab-entry-preview",
            Self::FstabConfirm => "fstab-confirm",
            Self::FstabWritten => "fstab-written",
            Self::FstabBackup => "fstab-backup",
            Self::FstabAlreadyPresent => "fstab-already-present",
            Self::FstabUnwritable => "fstab-unwritable",
            Self::FstabReloadFailed => "fstab-reload-failed",
            Self::Failed => "failed",
            Self::Bye => "bye",
        }
    }
}

/// Message lookup for one language.
pub struct Messages {
    language: Language,
    loader: FluentLanguageLoader,
}

impl Messages {
    /// Loads the embedded resources for `language`, with English as fallback.
    ///
    /// Fails only if the English resources cannot be loaded.
    pub fn new(language: Language) -> Result<Self, I18nEmbedError> {
        let loader = fluent_language_loader!();
        loader.load_fallback_language(&Localizations)?;
        if let Err(e) = i18n_embed::select(&loader, &Localizations, &[language.identifier()]) {
            tracing::warn!(?language, error = %e, "failed to load language, using English");
        }
        loader.set_use_isolating(false);

        Ok(Self { language, loader })
    }

    pub fn get(&self, key: Msg) -> String {
        self.loader.get(key.id())
    }

    /// Looks up `key` with named arguments, `{ $name }` in the resources.
    pub fn format(&self, key: Msg, args: &[(&str, &dyn Display)]) -> String {
        let args: HashMap<&str, String> = args
            .iter()
            .map(|(name, value)| (*name, value.to_string()))
            .collect();
        self.loader.get_args(key.id(), args)
    }

    /// Returns true if `answer` accepts a y/N question in the interface
    /// language.
    pub fn is_yes(&self, answer: &str) -> bool {
        let answer = answer.trim().to_lowercase();
        match self.language {
            Language::En => matches!(answer.as_str(), "y" | "yes"),
            Language::It => matches!(answer.as_str(), "s" | "si" | "sì"),
        }
    }

    /// Like [`Messages::is_yes`], also taking English answers in any language.
    pub fn is_yes_lenient(&self, answer: &str) -> bool {
        self.is_yes(answer) || matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }

    /// Returns true if `answer` is the typed confirmation for forced linking.
    pub fn is_force_confirmation(&self, answer: &str) -> bool {
        let answer = answer.trim().to_lowercase();
        match self.language {
            Language::En => answer == "yes",
            Language::It => matches!(answer.as_str(), "yes" | "si" | "sì"),
        }
    }
}
