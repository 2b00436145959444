//! Init and Config commands.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Settings;

/// Run init command - create configuration file.
pub fn run_init(path: &Path, force: bool) -> Result<()> {
    let existed = path.exists();
    if existed && !force {
        anyhow::bail!(
            "Configuration file already exists at: {}\nUse --force to overwrite",
            path.display()
        );
    }

    let path = Settings::init_config_file(path, force)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("writing {}", path.display()))?;

    if existed {
        println!("Overwrote configuration at: {}", path.display());
    } else {
        println!("Created configuration file at: {}", path.display());
    }
    println!("Edit this file to customize your settings.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) -> Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    let toml_str = toml::to_string_pretty(config).context("rendering configuration")?;
    println!("{toml_str}");
    Ok(())
}
