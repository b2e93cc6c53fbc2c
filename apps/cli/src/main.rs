//! Steam exFAT Symlinker - links an exFAT Steam library into the local one.
//!
//! Without a subcommand the tool asks for the external library and opens an
//! interactive menu. Subcommands run one operation and exit.

mod logging;
mod messages;
mod shell;

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use snafu::{ResultExt, Snafu};
use steam_symlinker_core::{Settings, mount};

use crate::messages::{Language, Messages, Msg};
use crate::shell::{Confirm, Shell};

#[derive(Debug, Snafu)]
enum CliError {
    #[snafu(display("failed to load settings: {source}"))]
    LoadSettings { source: steam_symlinker_core::Error },

    #[snafu(display("cannot locate the local Steam library: {source}"))]
    LocalRoot { source: steam_symlinker_core::Error },

    #[snafu(display("cannot create {}: {source}", path.display()))]
    CreateLocalRoot { path: PathBuf, source: io::Error },

    #[snafu(display("library discovery failed: {source}"))]
    Discover { source: steam_symlinker_core::Error },

    #[snafu(display("failed to load translations: {source}"))]
    Localization { source: i18n_embed::I18nEmbedError },

    #[snafu(display("cannot resolve {}: {source}", path.display()))]
    ResolveLibrary { path: PathBuf, source: io::Error },

    #[snafu(display("terminal I/O failed: {source}"))]
    Terminal { source: io::Error },
}

/// Steam exFAT Symlinker.
#[derive(Parser)]
#[command(name = "steam-symlinker")]
#[command(about = "Link games from an exFAT Steam library into the local library", long_about = None)]
struct Cli {
    /// Interface language.
    #[arg(long, value_parser = ["en", "it"])]
    lang: Option<String>,

    /// External steamapps directory; skips discovery.
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Local steamapps directory.
    #[arg(long, global = true)]
    local: Option<PathBuf>,

    /// Settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Slack in milliseconds before an external manifest counts as newer.
    #[arg(long)]
    tolerance_ms: Option<u64>,

    /// Show debug logs on stderr.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Link every game of the external library.
    Update {
        /// Remove real files or folders in the way.
        #[arg(long)]
        force: bool,
    },
    /// Copy local manifests back to the external library.
    Export {
        /// Overwrite manifests that are newer on the external drive.
        #[arg(long)]
        yes: bool,
    },
    /// Mirror and link the Steam Linux Runtime.
    Runtime,
    /// Append an /etc/fstab entry for the external drive.
    Fstab {
        /// Write without asking.
        #[arg(long)]
        yes: bool,
    },
    /// List discovered exFAT libraries.
    List,
}

fn main() {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings, CliError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path),
        None => Settings::load_default(),
    }
    .context(LoadSettingsSnafu)?;

    if let Some(local) = &cli.local {
        settings.local_steamapps = Some(local.clone());
    }
    if let Some(library) = &cli.library {
        settings.external_library = Some(library.clone());
    }
    if let Some(tolerance) = cli.tolerance_ms {
        settings.staleness_tolerance_ms = tolerance;
    }
    Ok(settings)
}

fn run(cli: Cli) -> Result<bool, CliError> {
    let settings = load_settings(&cli)?;
    let language = Language::detect(cli.lang.as_deref().or(settings.language.as_deref()));
    let messages = Messages::new(language).context(LocalizationSnafu)?;
    tracing::debug!(?language, "language selected");

    let local_root = settings.local_root().context(LocalRootSnafu)?;
    let external = settings.external_library.clone();

    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    let mut shell = Shell::new(stdin, stdout, messages, settings, local_root.clone());

    if let Some(Commands::List) = cli.command {
        let candidates = mount::discover_external_libraries().context(DiscoverSnafu)?;
        shell.list(&candidates).context(TerminalSnafu)?;
        return Ok(true);
    }

    let external = match external {
        Some(path) => path,
        None => {
            let candidates = mount::discover_external_libraries().context(DiscoverSnafu)?;
            match shell.choose_library(&candidates).context(TerminalSnafu)? {
                Some(path) => path,
                None => {
                    shell.say_msg(Msg::Bye).context(TerminalSnafu)?;
                    return Ok(true);
                }
            }
        }
    };
    if !external.is_dir() {
        shell.say_msg(Msg::PathNotFound).context(TerminalSnafu)?;
        return Ok(false);
    }
    // Link targets are written verbatim, so they must not depend on the cwd.
    let external =
        std::path::absolute(&external).context(ResolveLibrarySnafu { path: &external })?;

    std::fs::create_dir_all(&local_root).context(CreateLocalRootSnafu { path: &local_root })?;

    let outcome = match cli.command {
        None => shell.run_menu(&external).map(|()| true),
        Some(Commands::Update { force }) => shell.update(&external, force),
        Some(Commands::Export { yes }) => shell.export(&external, Confirm::Assume(yes)),
        Some(Commands::Runtime) => shell.runtime(&external),
        Some(Commands::Fstab { yes }) => {
            let confirm = if yes { Confirm::Assume(true) } else { Confirm::Ask };
            shell.fstab(&external, confirm)
        }
        Some(Commands::List) => Ok(true),
    };
    outcome.context(TerminalSnafu)
}
