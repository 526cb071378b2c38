//! Kiln - model server image builder
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use kiln::cli::{Cli, Commands};
use kiln::config::{ConfigManager, Settings};
use kiln::error::KilnResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> KilnResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let settings = config_manager.load().await?;

    init_logging(cli.verbose, &settings);

    let dir = cli.dir.as_deref();
    match cli.command {
        Commands::Build(args) => {
            kiln::cli::commands::build(args, &settings, dir, cli.verbose).await
        }
        Commands::Generate(args) => kiln::cli::commands::generate(args, dir).await,
        Commands::Init(mut args) => {
            if args.path.is_none() {
                args.path = cli.dir.clone();
            }
            kiln::cli::commands::init(args).await
        }
        Commands::Config(args) => {
            kiln::cli::commands::config(args, &config_manager, &settings).await
        }
        Commands::Status => kiln::cli::commands::status(&settings).await,
        Commands::Completions { shell } => kiln::cli::commands::completions(shell),
    }
}

/// 0 = warn (progress output only), 1 = info, 2+ = debug
fn init_logging(verbose: u8, settings: &Settings) {
    let filter = match verbose {
        0 => EnvFilter::new("kiln=warn"),
        1 => EnvFilter::new("kiln=info"),
        _ => EnvFilter::new("kiln=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if settings.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
