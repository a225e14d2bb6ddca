//! Opticam DBX CLI
//!
//! Downloads surveillance camera alarm videos from Dropbox and optionally
//! transcodes them to mp4.

mod commands;

use anyhow::{Context, Result};
use bridge_traits::logging::LogLevel;
use clap::{CommandFactory, Parser, Subcommand};
use core_runtime::config::{load_env_file, parse_umask, DEFAULT_UMASK, ENV_LOG_FILTER};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use tracing::error;

#[derive(Parser)]
#[command(name = "opticam-dbx")]
#[command(version, about = "Download surveillance camera videos from Dropbox", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to env file
    #[arg(short, long, global = true)]
    env_file: Option<PathBuf>,

    /// Set umask
    #[arg(long, global = true, default_value = DEFAULT_UMASK)]
    umask: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (compact, pretty, json)
    #[arg(long, global = true, default_value = "compact")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Download videos from Dropbox
    Download(commands::download::DownloadArgs),

    /// Transcode AVIs to mp4
    Transcode(commands::transcode::TranscodeArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = prepare(&cli) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Umask first, then logging, before anything touches the filesystem
fn prepare(cli: &Cli) -> Result<()> {
    let mask = parse_umask(&cli.umask)?;
    apply_umask(mask);

    let format = LogFormat::from_str(&cli.log_format)?;
    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let mut logging = LoggingConfig::default()
        .with_format(format)
        .with_level(level);
    if let Some(filter) = std::env::var(ENV_LOG_FILTER).ok().filter(|f| !f.trim().is_empty()) {
        logging = logging.with_filter(filter);
    }
    init_logging(logging)?;

    Ok(())
}

#[cfg(unix)]
fn apply_umask(mask: u32) {
    use nix::sys::stat::{umask, Mode};

    umask(Mode::from_bits_truncate(mask as nix::libc::mode_t));
}

#[cfg(not(unix))]
fn apply_umask(_mask: u32) {
    tracing::debug!("umask is not supported on this platform");
}

async fn run(cli: Cli) -> Result<ExitCode> {
    // Defaults below read the environment, so the file is loaded first
    if let Some(path) = &cli.env_file {
        load_env_file(path).with_context(|| format!("Cannot read env file {}", path.display()))?;
    }

    let Some(command) = cli.command else {
        println!("No command given");
        println!();
        Cli::command().print_help()?;
        return Ok(ExitCode::from(1));
    };

    match command {
        Commands::Version => commands::version::run(),
        Commands::Download(args) => commands::download::run(args).await?,
        Commands::Transcode(args) => commands::transcode::run(args).await?,
    }

    Ok(ExitCode::SUCCESS)
}
