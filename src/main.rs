mod app;
mod models;
mod system;
mod ui;
mod utils;

use anyhow::{bail, Context};
use app::{list_entries, run_batch, ExtractRequest, OverwriteQuery, SystemOpen};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use indicatif::ProgressBar;
use models::{OverwriteMethod, SaveLocation, Settings};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use system::{CachedPassword, FileInfo, PasswordQuery, StaticPassword};
use tracing_subscriber::EnvFilter;
use ui::{ExtractProgressBar, TerminalMode, TerminalPrompt};
use utils::formatter::{format_entry_date, format_file_size, pluralize};

#[derive(Parser)]
#[command(name = "ice", version)]
#[command(about = "Extract archives through a staging directory", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (defaults to $ICE_SETTINGS_FILE or <config_dir>/ice/settings.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one or more archives (Esc or Ctrl+C cancels the current archive)
    Extract {
        /// Extract into this directory instead of the configured save location
        #[arg(short, long, conflicts_with = "ask")]
        dest: Option<PathBuf>,

        /// Ask for the destination directory for every archive
        #[arg(long)]
        ask: bool,

        /// Password for encrypted archives
        #[arg(short, long)]
        password: Option<String>,

        /// What to do when a file already exists
        #[arg(long, value_enum, default_value = "ask")]
        overwrite: OverwriteArg,

        /// Archives to extract, processed in order
        #[arg(required = true)]
        archives: Vec<PathBuf>,
    },

    /// List the entries of an archive
    List {
        /// Password for header-encrypted archives
        #[arg(short, long)]
        password: Option<String>,

        archive: PathBuf,
    },

    /// Write the current settings to the settings file
    Init {
        /// Replace an existing settings file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OverwriteArg {
    Ask,
    Skip,
    Overwrite,
    Rename,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match &cli.settings {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("failed to load settings")?;

    match cli.command {
        Commands::Extract {
            dest,
            ask,
            password,
            overwrite,
            archives,
        } => {
            let mut extract = settings.extract;
            if let Some(dest) = dest {
                extract.save_location = SaveLocation::Others;
                extract.save_directory = dest;
            } else if ask {
                extract.save_location = SaveLocation::Query;
            }

            let progress = ExtractProgressBar::new();
            let prompt = Arc::new(TerminalPrompt::new(progress.handle()));
            let password: Arc<dyn PasswordQuery> = match password {
                Some(value) => Arc::new(StaticPassword(Some(value))),
                None => Arc::new(CachedPassword::new(prompt.clone())),
            };
            let overwrite: Arc<dyn OverwriteQuery> = match overwrite {
                OverwriteArg::Ask => prompt.clone(),
                OverwriteArg::Skip => fixed(OverwriteMethod::Skip),
                OverwriteArg::Overwrite => fixed(OverwriteMethod::Overwrite),
                OverwriteArg::Rename => fixed(OverwriteMethod::Rename),
            };

            let request = ExtractRequest {
                sources: archives,
                settings: extract,
                password,
                overwrite,
                destination: prompt.clone(),
                open_action: Arc::new(SystemOpen),
            };

            // 원시 모드에서만 Ctrl+C 가 프로세스를 끝내지 않고 키 입력으로 들어온다
            let watch_keys = io::stdin().is_terminal();
            let raw_mode = if watch_keys {
                Some(TerminalMode::raw().context("failed to switch terminal to raw mode")?)
            } else {
                None
            };
            let summary = run_batch(
                request,
                |p| progress.update(p),
                || watch_keys && prompt.cancel_requested(),
            );
            drop(raw_mode);
            let summary = summary?;
            progress.finish();

            for (source, error) in summary.errors() {
                eprintln!("{}: {}", source.display(), error);
            }
            println!("{}", summary.describe());
            if summary.failed() > 0 {
                bail!("{} failed", pluralize(summary.failed(), "archive", "archives"));
            }
        }
        Commands::List { password, archive } => {
            let password: Arc<dyn PasswordQuery> = match password {
                Some(value) => Arc::new(StaticPassword(Some(value))),
                None => Arc::new(TerminalPrompt::new(ProgressBar::hidden())),
            };
            let entries = list_entries(&archive, password)
                .with_context(|| format!("failed to list {}", archive.display()))?;
            for (index, entry) in entries.iter().enumerate() {
                let size = if entry.is_dir {
                    "<DIR>".to_string()
                } else {
                    format_file_size(entry.size)
                };
                println!(
                    "{:>5}  {:>10}  {}  {}{}",
                    index,
                    size,
                    format_entry_date(entry.modified),
                    entry.path,
                    if entry.encrypted { " *" } else { "" }
                );
            }
            println!("{}", pluralize(entries.len(), "entry", "entries"));
        }
        Commands::Init { force } => {
            let path = cli
                .settings
                .clone()
                .or_else(Settings::settings_path)
                .context("no configuration directory available")?;
            if path.exists() && !force {
                bail!("{} already exists (use --force to replace it)", path.display());
            }
            settings
                .save_to(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
    }

    Ok(())
}

fn fixed(method: OverwriteMethod) -> Arc<dyn OverwriteQuery> {
    Arc::new(move |_: &FileInfo, _: &FileInfo| method)
}

/// `RUST_LOG` 이 있으면 그대로, 없으면 `-v` 횟수로 수준을 정한다.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
