use hotdeploy::Settings;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_env_overrides_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("hotdeploy.toml");

    let toml_content = r#"
debounce_ms = 200
watch_application_dirs = true

[logging]
default = "warn"
"#;
    fs::write(&config_path, toml_content).unwrap();

    unsafe {
        // Double underscore separates nested levels
        env::set_var("HOTDEPLOY_DEBOUNCE_MS", "700");
        env::set_var("HOTDEPLOY_WATCH_APPLICATION_DIRS", "false");
        env::set_var("HOTDEPLOY_LOGGING__DEFAULT", "debug");
    }

    let settings = Settings::load_from(&config_path);

    unsafe {
        env::remove_var("HOTDEPLOY_DEBOUNCE_MS");
        env::remove_var("HOTDEPLOY_WATCH_APPLICATION_DIRS");
        env::remove_var("HOTDEPLOY_LOGGING__DEFAULT");
    }

    let settings = settings.unwrap();
    // Environment variables override the file
    assert_eq!(settings.debounce_ms, 700);
    assert!(!settings.watch_application_dirs);
    assert_eq!(settings.logging.default, "debug");
    // Untouched values keep their defaults
    assert!(settings.update_only_snapshots);
    assert_eq!(settings.artifact_extensions, vec!["jar"]);
}
