//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Hot-deployment agent
#[derive(Parser, Debug)]
#[command(
    name = "hotdeploy",
    version = env!("CARGO_PKG_VERSION"),
    about = "Hot-deployment agent for module archives",
    long_about = "Install artifacts found under runtime and application directories, \
                  then watch the application directories and redeploy on change.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom hotdeploy.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the agent against the in-memory runtime
    #[command(
        about = "Deploy configured directories and watch for changes",
        after_help = "Examples:\n  hotdeploy run\n  hotdeploy run --debounce-ms 300\n  hotdeploy run --no-watch\n\nExit status:\n  0  interrupted with Ctrl-C\n  2  runtime stopped after a singleton version conflict"
    )]
    Run {
        /// Override the debounce delay in milliseconds
        #[arg(long, value_name = "MS")]
        debounce_ms: Option<u64>,

        /// Deploy once and exit without watching
        #[arg(long)]
        no_watch: bool,
    },

    /// Print what an artifact says about itself
    #[command(about = "Show the descriptor parsed from an artifact")]
    Inspect {
        /// Artifact file to read
        #[arg(value_name = "ARTIFACT")]
        artifact: PathBuf,
    },

    /// Show current configuration settings
    #[command(about = "Display effective settings")]
    Config,

    /// Write a default configuration file
    #[command(about = "Create hotdeploy.toml with default settings")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
