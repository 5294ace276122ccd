//! Attachment Renamer - renames finished chat downloads into structured names.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use attachment_renamer::capture;
use attachment_renamer::clock::{Clock, TokioClock};
use attachment_renamer::config::{ConfigLoader, RenamerConfig};
use attachment_renamer::display;
use attachment_renamer::renamer::Renamer;
use attachment_renamer::watcher::FolderWatcher;

#[derive(Parser)]
#[command(
    name = "attachment-renamer",
    about = "Rename finished chat attachments into structured names",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search path.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a download folder and rename new files until interrupted.
    Watch {
        /// Folder to watch.
        #[arg(long)]
        watch_dir: Option<PathBuf>,
        /// Folder receiving renamed files.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Rename a single file from its filename.
    Rename {
        /// The file to rename.
        file: PathBuf,
        /// Folder receiving the renamed file.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the effective configuration.
    Config,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Option<RenamerConfig> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    match loader.load() {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            None
        }
    }
}

async fn watch(config: RenamerConfig) -> ExitCode {
    let capture = match capture::from_config(&config) {
        Ok(capture) => capture,
        Err(e) => {
            tracing::error!(error = %e, "Failed to set up metadata capture");
            return ExitCode::FAILURE;
        }
    };
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let mut watcher = match FolderWatcher::new(&config, capture, clock) {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create watcher");
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = watcher.run() => match result {
            Err(e) => {
                tracing::error!(error = %e, "Watcher failed to start");
                ExitCode::FAILURE
            }
            Ok(never) => match never {},
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            ExitCode::SUCCESS
        }
    }
}

async fn rename_once(config: &RenamerConfig, file: PathBuf) -> ExitCode {
    let renamer = match Renamer::from_config(config) {
        Ok(renamer) => renamer,
        Err(e) => {
            display::print_error(&file, &e);
            return ExitCode::FAILURE;
        }
    };
    let now = TokioClock.local_now();
    match renamer.rename(&file, None, now).await {
        Ok(outcome) => {
            display::print_outcome(&file, &outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            display::print_error(&file, &e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = match cli.command {
        Commands::Watch { .. } => cli.verbose.max(1),
        _ => cli.verbose,
    };
    init_tracing(verbosity);

    let Some(mut config) = load_config(cli.config) else {
        return ExitCode::FAILURE;
    };

    match cli.command {
        Commands::Watch {
            watch_dir,
            output_dir,
        } => {
            if let Some(dir) = watch_dir {
                config.watch_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            tracing::info!(
                watch_dir = %config.watch_dir.display(),
                output_dir = %config.output_dir.display(),
                capture = config.capture.is_some(),
                "Starting attachment renamer"
            );
            watch(config).await
        }
        Commands::Rename { file, output_dir } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            rename_once(&config, file).await
        }
        Commands::Config => match toml::to_string_pretty(&config) {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to render configuration");
                ExitCode::FAILURE
            }
        },
    }
}
