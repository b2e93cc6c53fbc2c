//! Interactive front end.
//!
//! Every operation reads answers from `input` and writes localized text to
//! `output`, so the same code drives the menu, the one-shot subcommands and
//! the tests.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use steam_symlinker_core::error::Error;
use steam_symlinker_core::fstab::{self, AppendOutcome, FSTAB_PATH};
use steam_symlinker_core::library::{self, UpdateEntry};
use steam_symlinker_core::mirror;
use steam_symlinker_core::runtime::{self, RuntimeLayout};
use steam_symlinker_core::{
    EntryStatus, ExportStatus, LinkOutcome, Settings, export, steam, systemd,
};
use tracing::{debug, warn};

use crate::messages::{Messages, Msg};

/// How a y/N question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    /// Prompt the user.
    Ask,
    /// Answer without prompting.
    Assume(bool),
}

/// Expands a leading `~` to the home directory.
pub fn expand_tilde(input: &str, home: Option<&Path>) -> PathBuf {
    match (input, home) {
        ("~", Some(home)) => home.to_path_buf(),
        (_, Some(home)) if input.starts_with("~/") => home.join(&input[2..]),
        _ => PathBuf::from(input),
    }
}

pub struct Shell<R, W> {
    input: R,
    output: W,
    messages: Messages,
    settings: Settings,
    local_root: PathBuf,
}

impl<R: BufRead, W: Write> Shell<R, W> {
    pub fn new(
        input: R,
        output: W,
        messages: Messages,
        settings: Settings,
        local_root: PathBuf,
    ) -> Self {
        Self {
            input,
            output,
            messages,
            settings,
            local_root,
        }
    }

    fn say(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{text}")
    }

    pub fn say_msg(&mut self, key: Msg) -> io::Result<()> {
        let text = self.messages.get(key);
        self.say(&text)
    }

    fn say_fmt(&mut self, key: Msg, args: &[(&str, &dyn std::fmt::Display)]) -> io::Result<()> {
        let text = self.messages.format(key, args);
        self.say(&text)
    }

    /// Prints `prompt` and reads one trimmed line. Returns None at end of input.
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt} ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Asks a y/N question. `lenient` also takes English answers.
    fn confirm(&mut self, prompt: &str, lenient: bool) -> io::Result<bool> {
        let answer = self.ask(prompt)?.unwrap_or_default();
        Ok(if lenient {
            self.messages.is_yes_lenient(&answer)
        } else {
            self.messages.is_yes(&answer)
        })
    }

    /// Prints the discovered libraries.
    pub fn list(&mut self, candidates: &[PathBuf]) -> io::Result<()> {
        if candidates.is_empty() {
            return self.say_msg(Msg::NoLibraries);
        }
        self.say_msg(Msg::DetectedLibraries)?;
        for (idx, path) in candidates.iter().enumerate() {
            writeln!(self.output, "  {}) {}", idx + 1, path.display())?;
        }
        Ok(())
    }

    /// Lets the user pick one of `candidates` or type a path.
    ///
    /// Returns None when the user enters an empty path or input ends.
    pub fn choose_library(&mut self, candidates: &[PathBuf]) -> io::Result<Option<PathBuf>> {
        self.say_msg(Msg::Welcome)?;
        self.list(candidates)?;

        loop {
            self.say_msg(Msg::ChoosePath)?;
            let manual = if candidates.is_empty() {
                true
            } else {
                self.say_msg(Msg::ManualOption)?;
                let prompt = self.messages.get(Msg::PromptChoice);
                let Some(choice) = self.ask(&prompt)? else {
                    return Ok(None);
                };
                if let Ok(idx) = choice.parse::<usize>() {
                    if (1..=candidates.len()).contains(&idx) {
                        return Ok(Some(candidates[idx - 1].clone()));
                    }
                    self.say_msg(Msg::InvalidChoice)?;
                    continue;
                }
                if !matches!(choice.to_lowercase().as_str(), "m" | "manual" | "manuale") {
                    self.say_msg(Msg::InvalidChoice)?;
                    continue;
                }
                true
            };

            if manual {
                let prompt = self.messages.get(Msg::EnterPath);
                let custom = self.ask(&prompt)?.unwrap_or_default();
                if custom.is_empty() {
                    return Ok(None);
                }
                let path = expand_tilde(&custom, dirs::home_dir().as_deref());
                if path.is_dir() {
                    return std::path::absolute(&path).map(Some);
                }
                self.say_msg(Msg::PathNotFound)?;
            }
        }
    }

    /// Runs the main menu until the user quits or input ends.
    pub fn run_menu(&mut self, external: &Path) -> io::Result<()> {
        loop {
            writeln!(self.output)?;
            self.say_msg(Msg::MenuTitle)?;
            let runtime_name = self.settings.runtime_name.clone();
            self.say_fmt(Msg::MenuOptions, &[("runtime", &runtime_name)])?;

            let prompt = self.messages.get(Msg::PromptChoice);
            let Some(choice) = self.ask(&prompt)? else {
                return self.say_msg(Msg::Bye);
            };

            match choice.to_lowercase().as_str() {
                "1" => {
                    self.update(external, false)?;
                }
                "2" => {
                    self.forced_update(external)?;
                }
                "3" => {
                    self.runtime(external)?;
                }
                "4" => {
                    self.export(external, Confirm::Ask)?;
                }
                "5" => {
                    self.fstab(external, Confirm::Ask)?;
                }
                "q" | "quit" | "exit" => return self.say_msg(Msg::Bye),
                _ => self.say_msg(Msg::InvalidChoice)?,
            }
        }
    }

    /// Forced update behind a warning and a typed confirmation.
    pub fn forced_update(&mut self, external: &Path) -> io::Result<bool> {
        self.say_msg(Msg::ForceWarning)?;
        let prompt = self.messages.get(Msg::ConfirmForce);
        let answer = self.ask(&prompt)?.unwrap_or_default();
        if !self.messages.is_force_confirmation(&answer) {
            self.say_msg(Msg::Cancelled)?;
            return Ok(false);
        }
        self.update(external, true)
    }

    /// Links every game of `external` into the local library.
    pub fn update(&mut self, external: &Path, force: bool) -> io::Result<bool> {
        let report = match library::update_links(external, &self.local_root, force) {
            Ok(report) => report,
            Err(Error::NoGamesFound { .. }) => {
                self.say_msg(Msg::NoGames)?;
                return Ok(false);
            }
            Err(e) => {
                self.say_fmt(Msg::Failed, &[("error", &e)])?;
                return Ok(false);
            }
        };

        for entry in &report.entries {
            self.render_update_entry(entry)?;
        }
        self.say_fmt(Msg::UpdatedSymlinks, &[("count", &report.updated())])?;
        self.say_msg(Msg::LinkDone)?;

        if report.updated() > 0 && steam::is_steam_running() {
            self.say_msg(Msg::SteamRunning)?;
        }
        Ok(report.failed() == 0)
    }

    fn render_update_entry(&mut self, entry: &UpdateEntry) -> io::Result<()> {
        let name = entry
            .target
            .destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.game.clone());
        let src = entry.target.source.display();
        let path = entry.target.destination.display();

        match &entry.status {
            EntryStatus::Reconciled(LinkOutcome::Linked) => {
                self.say_fmt(Msg::StatusLinked, &[("name", &name), ("src", &src)])
            }
            EntryStatus::Reconciled(LinkOutcome::AlreadyLinked) => {
                self.say_fmt(Msg::StatusAlready, &[("name", &name)])
            }
            EntryStatus::Reconciled(LinkOutcome::Replaced) => {
                self.say_fmt(Msg::StatusReplaced, &[("name", &name)])?;
                self.say_fmt(Msg::StatusLinked, &[("name", &name), ("src", &src)])
            }
            EntryStatus::Reconciled(LinkOutcome::RemovedAndLinked) => {
                self.say_fmt(Msg::StatusRemoved, &[("path", &path)])?;
                self.say_fmt(Msg::StatusLinked, &[("name", &name), ("src", &src)])
            }
            EntryStatus::Reconciled(LinkOutcome::Skipped) => {
                self.say_fmt(Msg::StatusSkip, &[("path", &path)])
            }
            EntryStatus::MissingSource => self.say_fmt(Msg::MissingSource, &[("name", &name)]),
            EntryStatus::Failed(e) => {
                self.say_fmt(Msg::StatusFailed, &[("path", &path), ("error", e)])
            }
        }
    }

    /// Mirrors the compatibility runtime locally and links it.
    pub fn runtime(&mut self, external: &Path) -> io::Result<bool> {
        let runtime_name = self.settings.runtime_name.clone();
        let layout = match RuntimeLayout::new(external, &self.local_root, &runtime_name) {
            Ok(layout) => layout,
            Err(e) => {
                self.say_fmt(Msg::Failed, &[("error", &e)])?;
                return Ok(false);
            }
        };
        if !layout.source.is_dir() {
            let source = layout.source.display();
            self.say_fmt(
                Msg::RuntimeMissing,
                &[("runtime", &runtime_name), ("path", &source)],
            )?;
            return Ok(false);
        }

        let mirror = mirror::select_mirror(self.settings.prefer_rsync);
        self.say_fmt(Msg::RuntimeCopy, &[("tool", &mirror.name())])?;

        match runtime::sync_runtime(&layout, mirror.as_ref()) {
            Ok(outcome) => {
                debug!(?outcome, "runtime link reconciled");
                self.say_fmt(Msg::RuntimeDone, &[("runtime", &runtime_name)])?;
                Ok(true)
            }
            Err(Error::RuntimeMissing { path }) => {
                let path = path.display();
                self.say_fmt(
                    Msg::RuntimeMissing,
                    &[("runtime", &runtime_name), ("path", &path)],
                )?;
                Ok(false)
            }
            Err(e) => {
                self.say_fmt(Msg::Failed, &[("error", &e)])?;
                Ok(false)
            }
        }
    }

    /// Copies local manifests back to `external`.
    pub fn export(&mut self, external: &Path, confirm: Confirm) -> io::Result<bool> {
        let local_root = self.local_root.clone();
        let tolerance = self.settings.staleness_tolerance();

        let result = export::export_manifests(&local_root, external, tolerance, |count| {
            match confirm {
                Confirm::Assume(answer) => answer,
                Confirm::Ask => {
                    let prompt = self.messages.format(Msg::NewerWarning, &[("count", &count)]);
                    self.confirm(&prompt, false).unwrap_or_else(|e| {
                        warn!(error = %e, "could not read confirmation");
                        false
                    })
                }
            }
        });

        let report = match result {
            Ok(report) => report,
            Err(Error::NothingToExport { .. }) => {
                self.say_msg(Msg::NoLocalManifests)?;
                return Ok(false);
            }
            Err(e) => {
                self.say_fmt(Msg::Failed, &[("error", &e)])?;
                return Ok(false);
            }
        };

        let mut ok = true;
        for entry in &report.entries {
            let name = entry
                .candidate
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match &entry.status {
                ExportStatus::SkippedNewer => self.say_fmt(Msg::SkipNewer, &[("name", &name)])?,
                ExportStatus::Failed(e) => {
                    ok = false;
                    let path = entry.candidate.destination.display();
                    self.say_fmt(Msg::StatusFailed, &[("path", &path), ("error", e)])?;
                }
                ExportStatus::Copied | ExportStatus::Identical => {}
            }
        }
        self.say_fmt(Msg::Exported, &[("count", &report.copied())])?;
        Ok(ok)
    }

    /// Appends an fstab entry for the drive holding `external`.
    pub fn fstab(&mut self, external: &Path, confirm: Confirm) -> io::Result<bool> {
        let fstab_path = Path::new(FSTAB_PATH);

        let entry = match fstab::require_root().and_then(|()| fstab::entry_for_library(external))
        {
            Ok(entry) => entry,
            Err(e) => {
                self.render_fstab_error(&e)?;
                return Ok(false);
            }
        };

        match fstab::contains_equivalent(fstab_path, &entry) {
            Ok(true) => {
                self.say_msg(Msg::FstabAlreadyPresent)?;
                return Ok(true);
            }
            Ok(false) => {}
            Err(e) => {
                self.render_fstab_error(&e)?;
                return Ok(false);
            }
        }

        let line = entry.to_fstab_line();
        writeln!(self.output)?;
        self.say_fmt(Msg::FstabEntryPreview, &[("entry", &line)])?;
        writeln!(self.output)?;
        let accepted = match confirm {
            Confirm::Assume(answer) => answer,
            Confirm::Ask => {
                let prompt = self.messages.get(Msg::FstabConfirm);
                self.confirm(&prompt, true)?
            }
        };
        if !accepted {
            self.say_msg(Msg::Cancelled)?;
            return Ok(false);
        }

        match fstab::append_entry(fstab_path, &entry) {
            Ok(AppendOutcome::AlreadyPresent) => {
                self.say_msg(Msg::FstabAlreadyPresent)?;
                return Ok(true);
            }
            Ok(AppendOutcome::Appended { backup }) => {
                self.say_msg(Msg::FstabWritten)?;
                if let Some(backup) = backup {
                    let backup = backup.display();
                    self.say_fmt(Msg::FstabBackup, &[("path", &backup)])?;
                }
            }
            Err(e) => {
                self.render_fstab_error(&e)?;
                return Ok(false);
            }
        }

        if let Err(e) = systemd::daemon_reload() {
            warn!(error = %e, "daemon-reload failed");
            self.say_fmt(Msg::FstabReloadFailed, &[("error", &e)])?;
        }
        Ok(true)
    }

    fn render_fstab_error(&mut self, error: &Error) -> io::Result<()> {
        match error {
            Error::NotRoot => self.say_msg(Msg::FstabNeedsRoot),
            Error::MountNotFound { path } => {
                let path = path.display();
                self.say_fmt(Msg::FstabMountUnknown, &[("path", &path)])
            }
            Error::UuidNotFound { device } => {
                self.say_fmt(Msg::FstabUuidFailed, &[("device", device)])
            }
            e => self.say_fmt(Msg::FstabUnwritable, &[("error", e)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Language;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn shell_in(
        language: Language,
        input: &str,
        local: &Path,
    ) -> Shell<Cursor<Vec<u8>>, Vec<u8>> {
        Shell::new(
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            Messages::new(language).unwrap(),
            Settings::default(),
            local.to_path_buf(),
        )
    }

    fn shell(input: &str, local: &Path) -> Shell<Cursor<Vec<u8>>, Vec<u8>> {
        shell_in(Language::En, input, local)
    }

    fn output(shell: &Shell<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8_lossy(&shell.output).into_owned()
    }

    fn external_with_game(dir: &Path) -> PathBuf {
        let external = dir.join("ext");
        fs::create_dir_all(external.join("common/FooGame")).unwrap();
        fs::write(
            external.join("appmanifest_1.acf"),
            "\"AppState\"\n{\n\t\"name\"\t\t\"Foo\"\n\t\"installdir\"\t\t\"FooGame\"\n}\n",
        )
        .unwrap();
        external
    }

    #[test]
    fn test_expand_tilde() {
        let home = Path::new("/home/deck");
        assert_eq!(expand_tilde("~", Some(home)), PathBuf::from("/home/deck"));
        assert_eq!(
            expand_tilde("~/Games", Some(home)),
            PathBuf::from("/home/deck/Games")
        );
        assert_eq!(expand_tilde("~user", Some(home)), PathBuf::from("~user"));
        assert_eq!(expand_tilde("~/Games", None), PathBuf::from("~/Games"));
    }

    #[test]
    fn test_choose_library_by_number() {
        let dir = TempDir::new().unwrap();
        let candidates = vec![dir.path().join("a"), dir.path().join("b")];
        let mut shell = shell("7\nx\n2\n", dir.path());

        let chosen = shell.choose_library(&candidates).unwrap();

        assert_eq!(chosen, Some(dir.path().join("b")));
        assert_eq!(output(&shell).matches("Invalid choice").count(), 2);
    }

    #[test]
    fn test_choose_library_manual_path() {
        let dir = TempDir::new().unwrap();
        let library = dir.path().join("lib");
        fs::create_dir(&library).unwrap();
        let input = format!("{}/missing\n{}\n", dir.path().display(), library.display());
        let mut shell = shell(&input, dir.path());

        let chosen = shell.choose_library(&[]).unwrap();

        assert_eq!(chosen, Some(library));
        assert!(output(&shell).contains("does not exist"));
    }

    #[test]
    fn test_choose_library_empty_path_exits() {
        let dir = TempDir::new().unwrap();
        let mut shell = shell("m\n\n", dir.path());
        assert_eq!(shell.choose_library(&[dir.path().join("a")]).unwrap(), None);
    }

    #[test]
    fn test_forced_update_requires_typed_yes() {
        let dir = TempDir::new().unwrap();
        let external = external_with_game(dir.path());
        let local = dir.path().join("local");
        fs::create_dir_all(local.join("common/FooGame")).unwrap();

        let mut declined = shell("y\n", &local);
        assert!(!declined.forced_update(&external).unwrap());
        assert!(output(&declined).contains("Operation cancelled."));
        assert!(local.join("common/FooGame").is_dir());
        assert!(!local.join("common/FooGame").is_symlink());

        let mut accepted = shell("YES\n", &local);
        assert!(accepted.forced_update(&external).unwrap());
        assert!(local.join("common/FooGame").is_symlink());
        assert!(output(&accepted).contains("Removed existing path"));
    }

    #[test]
    fn test_update_reports_outcomes() {
        let dir = TempDir::new().unwrap();
        let external = external_with_game(dir.path());
        let local = dir.path().join("local");

        let mut first = shell("", &local);
        assert!(first.update(&external, false).unwrap());
        let text = output(&first);
        assert!(text.contains("🔗 Linked appmanifest_1.acf"));
        assert!(text.contains("Updated 2 symlink(s)."));

        let mut second = shell("", &local);
        assert!(second.update(&external, false).unwrap());
        let text = output(&second);
        assert!(text.contains("Already linked: FooGame"));
        assert!(text.contains("Updated 0 symlink(s)."));
    }

    #[test]
    fn test_update_without_games() {
        let dir = TempDir::new().unwrap();
        let external = dir.path().join("ext");
        fs::create_dir_all(&external).unwrap();

        let mut shell = shell("", &dir.path().join("local"));
        assert!(!shell.update(&external, false).unwrap());
        assert!(output(&shell).contains("No appmanifest files found on the external drive."));
    }

    #[test]
    fn test_export_nothing_to_export() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("local");
        fs::create_dir_all(&local).unwrap();

        let mut shell = shell("", &local);
        assert!(!shell.export(dir.path(), Confirm::Ask).unwrap());
        assert!(output(&shell).contains("No appmanifest files found in the local Steam folder."));
    }

    /// Local and external manifests where the external copy is newer.
    fn newer_external_manifest(dir: &Path) -> (PathBuf, PathBuf) {
        let local = dir.join("local");
        let external = dir.join("ext");
        fs::create_dir_all(&local).unwrap();
        fs::create_dir_all(&external).unwrap();
        fs::write(local.join("appmanifest_1.acf"), "local").unwrap();
        fs::write(external.join("appmanifest_1.acf"), "external").unwrap();

        let old = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(local.join("appmanifest_1.acf"))
            .unwrap()
            .set_modified(old)
            .unwrap();
        (local, external)
    }

    #[test]
    fn test_choose_library_relative_path_is_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let dir = TempDir::new_in(&cwd).unwrap();
        let relative = dir.path().strip_prefix(&cwd).unwrap().to_path_buf();
        assert!(relative.is_relative());
        let mut shell = shell(&format!("{}\n", relative.display()), dir.path());

        let chosen = shell.choose_library(&[]).unwrap().unwrap();

        assert!(chosen.is_absolute());
        assert_eq!(chosen, cwd.join(&relative));
    }

    #[test]
    fn test_export_declined_keeps_newer() {
        let dir = TempDir::new().unwrap();
        let (local, external) = newer_external_manifest(dir.path());

        let mut shell = shell("n\n", &local);
        assert!(shell.export(&external, Confirm::Ask).unwrap());

        let text = output(&shell);
        assert!(text.contains("Detected 1 newer manifest(s)"));
        assert!(text.contains("Skipping appmanifest_1.acf"));
        assert!(text.contains("Exported 0 manifest file(s)"));
        assert_eq!(
            fs::read_to_string(external.join("appmanifest_1.acf")).unwrap(),
            "external"
        );
    }

    #[test]
    fn test_italian_export_rejects_english_yes() {
        let dir = TempDir::new().unwrap();
        let (local, external) = newer_external_manifest(dir.path());

        let mut declined = shell_in(Language::It, "y\n", &local);
        assert!(declined.export(&external, Confirm::Ask).unwrap());
        let text = output(&declined);
        assert!(text.contains("[s/N]: "));
        assert!(text.contains("Salto appmanifest_1.acf"));
        assert_eq!(
            fs::read_to_string(external.join("appmanifest_1.acf")).unwrap(),
            "external"
        );

        let mut accepted = shell_in(Language::It, "sì\n", &local);
        assert!(accepted.export(&external, Confirm::Ask).unwrap());
        assert!(output(&accepted).contains("Esportati 1 manifest"));
        assert_eq!(
            fs::read_to_string(external.join("appmanifest_1.acf")).unwrap(),
            "local"
        );
    }

    #[test]
    fn test_runtime_missing() {
        let dir = TempDir::new().unwrap();
        let external = dir.path().join("ext");
        fs::create_dir_all(&external).unwrap();

        let mut shell = shell("", &dir.path().join("local"));
        assert!(!shell.runtime(&external).unwrap());
        assert!(output(&shell).contains("SteamLinuxRuntime_sniper was not found"));
    }

    #[test]
    fn test_menu_quits_and_rejects_unknown() {
        let dir = TempDir::new().unwrap();
        let mut shell = shell("9\nq\n", dir.path());

        shell.run_menu(dir.path()).unwrap();

        let text = output(&shell);
        assert!(text.contains("Invalid choice"));
        assert!(text.contains("Fix SteamLinuxRuntime_sniper"));
        assert!(text.ends_with("👋 Bye!\n"));
    }
}
