//! Configuration for the deployment agent.
//!
//! Settings are layered, later sources winning:
//! - Default values
//! - TOML configuration file (`hotdeploy.toml` or `--config <path>`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `HOTDEPLOY_` and use double
//! underscores to separate nested levels:
//! - `HOTDEPLOY_DEBOUNCE_MS=500` sets `debounce_ms`
//! - `HOTDEPLOY_LOGGING__DEFAULT=debug` sets `logging.default`
//! - `HOTDEPLOY_WATCH_APPLICATION_DIRS=false` disables live watching
//!
//! Settings are read once at process start and never change afterwards.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "hotdeploy.toml";

const ENV_PREFIX: &str = "HOTDEPLOY_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Roots installed and started first. Never watched.
    #[serde(default = "default_runtime_dirs")]
    pub runtime_dirs: Vec<PathBuf>,

    /// Roots installed after the runtime roots, watched when enabled.
    #[serde(default = "default_application_dirs")]
    pub application_dirs: Vec<PathBuf>,

    /// Watch application roots for changes after startup
    #[serde(default = "default_true")]
    pub watch_application_dirs: bool,

    /// Symbolic-name prefixes of modules that may exist at one version only
    #[serde(default)]
    pub singleton_namespaces: Vec<String>,

    /// Only update already-installed modules whose version is a snapshot
    #[serde(default = "default_true")]
    pub update_only_snapshots: bool,

    /// Quiet period before a batch of changes is delivered
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// File extensions identifying artifacts
    #[serde(default = "default_artifact_extensions")]
    pub artifact_extensions: Vec<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Log filter configuration.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for every target
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `hotdeploy::watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_runtime_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("runtime")]
}
fn default_application_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("application")]
}
fn default_true() -> bool {
    true
}
fn default_debounce_ms() -> u64 {
    1500
}
fn default_artifact_extensions() -> Vec<String> {
    vec!["jar".to_string()]
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            runtime_dirs: default_runtime_dirs(),
            application_dirs: default_application_dirs(),
            watch_application_dirs: true,
            singleton_namespaces: Vec::new(),
            update_only_snapshots: true,
            debounce_ms: default_debounce_ms(),
            artifact_extensions: default_artifact_extensions(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from `hotdeploy.toml` in the working directory
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file.
    ///
    /// A missing file is not an error; defaults and environment apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore (__) separates nested levels
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(Box::new)
            .map(Settings::normalized)
    }

    /// Drop empty singleton prefixes and artifact extensions.
    fn normalized(mut self) -> Self {
        self.singleton_namespaces.retain(|prefix| !prefix.is_empty());
        self.artifact_extensions = self
            .artifact_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file at `path`
    pub fn init_config_file(
        path: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = path.as_ref().to_path_buf();

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.runtime_dirs, vec![PathBuf::from("runtime")]);
        assert_eq!(settings.application_dirs, vec![PathBuf::from("application")]);
        assert!(settings.watch_application_dirs);
        assert!(settings.singleton_namespaces.is_empty());
        assert!(settings.update_only_snapshots);
        assert_eq!(settings.debounce(), Duration::from_millis(1500));
        assert_eq!(settings.artifact_extensions, vec!["jar"]);
        assert_eq!(settings.logging.default, "info");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("hotdeploy.toml");

        let toml_content = r#"
runtime_dirs = ["/opt/runtime", "/opt/extra"]
application_dirs = ["/srv/apps"]
watch_application_dirs = false
singleton_namespaces = ["com.acme.", "", "org.core."]
update_only_snapshots = false
debounce_ms = 250
artifact_extensions = [".jar", "war"]

[logging]
default = "debug"

[logging.modules]
"hotdeploy::watcher" = "trace"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.runtime_dirs.len(), 2);
        assert_eq!(settings.application_dirs, vec![PathBuf::from("/srv/apps")]);
        assert!(!settings.watch_application_dirs);
        // Empty prefixes are dropped
        assert_eq!(settings.singleton_namespaces, vec!["com.acme.", "org.core."]);
        assert!(!settings.update_only_snapshots);
        assert_eq!(settings.debounce_ms, 250);
        assert_eq!(settings.artifact_extensions, vec!["jar", "war"]);
        assert_eq!(settings.logging.default, "debug");
        assert_eq!(settings.logging.modules["hotdeploy::watcher"], "trace");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();

        let settings = Settings::load_from(temp_dir.path().join("absent.toml")).unwrap();

        assert_eq!(settings.runtime_dirs, Settings::default().runtime_dirs);
        assert_eq!(settings.artifact_extensions, vec!["jar"]);
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("hotdeploy.toml");

        fs::write(&config_path, "singleton_namespaces = [\"com.acme.\"]\n").unwrap();

        let settings = Settings::load_from(&config_path).unwrap();

        // Modified values
        assert_eq!(settings.singleton_namespaces, vec!["com.acme."]);

        // Default values should still be present
        assert_eq!(settings.debounce_ms, 1500);
        assert!(settings.watch_application_dirs);
        assert_eq!(settings.application_dirs, vec![PathBuf::from("application")]);
    }

    #[test]
    fn test_save_and_init() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("conf").join("hotdeploy.toml");

        let mut settings = Settings::default();
        settings.debounce_ms = 42;
        settings.singleton_namespaces = vec!["com.acme.".to_string()];
        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded, settings);

        assert!(Settings::init_config_file(&config_path, false).is_err());
        Settings::init_config_file(&config_path, true).unwrap();
        assert_eq!(Settings::load_from(&config_path).unwrap().debounce_ms, 1500);
    }
}
