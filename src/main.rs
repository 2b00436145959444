use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use hotdeploy::cli::commands::{init, inspect, run};
use hotdeploy::cli::{Cli, Commands};
use hotdeploy::config::{DEFAULT_CONFIG_FILE, Settings};
use hotdeploy::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if let Commands::Init { force } = &cli.command {
        init::run_init(&config_path, *force)?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut settings = Settings::load_from(&config_path)
        .map_err(|e| anyhow::anyhow!("Configuration error: {e}"))?;
    logging::init_with_config(&settings.logging);
    if !config_path.exists() {
        hotdeploy::log_event!(
            "config",
            "no configuration file, using defaults",
            "{}",
            config_path.display()
        );
    }

    match cli.command {
        Commands::Run {
            debounce_ms,
            no_watch,
        } => {
            if let Some(ms) = debounce_ms {
                settings.debounce_ms = ms;
            }
            run::run_agent(&settings, no_watch).await
        }
        Commands::Inspect { artifact } => {
            inspect::run_inspect(&artifact)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            init::run_config(&settings)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { .. } => Ok(ExitCode::SUCCESS),
    }
}
