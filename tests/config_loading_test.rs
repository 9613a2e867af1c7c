/// Config loading from files in the formats the CLI accepts
use std::fs;
use tempfile::TempDir;

use syncheal::config::{Config, LogFormat};
use syncheal::HealError;

#[test]
fn test_toml_config() {
	let temp_dir = TempDir::new().expect("Failed to create temp dir");
	let path = temp_dir.path().join("config.toml");
	fs::write(
		&path,
		r#"
profile = "laptop"
filenameCheck = false
massDeleteThreshold = 80
syncWarnSecs = 3600
logFormat = "compact"
"#,
	)
	.unwrap();

	let config = Config::load(&path).unwrap();
	assert_eq!(config.profile, "laptop");
	assert!(!config.filename_check);
	assert_eq!(config.mass_delete_threshold, 80);
	assert_eq!(config.sync_warn_secs, 3600);
	assert_eq!(config.log_format, LogFormat::Compact);
	// untouched fields keep their defaults
	assert!(config.mass_delete_protection);
	assert!(config.show_hidden_files);
}

#[test]
fn test_json5_config_with_comments() {
	let temp_dir = TempDir::new().unwrap();
	let path = temp_dir.path().join("config.json5");
	fs::write(
		&path,
		r#"{
		// hide dotfiles in the filter view
		showHiddenFiles: false,
		hashContents: true,
	}"#,
	)
	.unwrap();

	let config = Config::load(&path).unwrap();
	assert!(!config.show_hidden_files);
	assert!(config.hash_contents);
	assert_eq!(config.mass_delete_threshold, 95);
}

#[test]
fn test_load_from_dir_prefers_toml() {
	let temp_dir = TempDir::new().unwrap();
	fs::write(temp_dir.path().join("config.toml"), "profile = \"from-toml\"\n").unwrap();
	fs::write(temp_dir.path().join("config.json"), r#"{"profile": "from-json"}"#).unwrap();

	let config = Config::load_from_dir(temp_dir.path()).unwrap();
	assert_eq!(config.profile, "from-toml");
	assert_eq!(config.state_dir, temp_dir.path());
	assert_eq!(config.profile_dir(), temp_dir.path().join("from-toml"));
}

#[test]
fn test_load_from_empty_dir_gives_defaults() {
	let temp_dir = TempDir::new().unwrap();
	let config = Config::load_from_dir(temp_dir.path()).unwrap();
	assert_eq!(config.profile, "default");
	assert_eq!(config.state_dir, temp_dir.path());
}

#[test]
fn test_invalid_configs_rejected() {
	let temp_dir = TempDir::new().unwrap();

	let path = temp_dir.path().join("bad.toml");
	fs::write(&path, "massDeleteThreshold = 150\n").unwrap();
	assert!(matches!(Config::load(&path), Err(HealError::Config { .. })));

	let path = temp_dir.path().join("broken.json");
	fs::write(&path, "{ profile: ").unwrap();
	assert!(matches!(Config::load(&path), Err(HealError::Config { .. })));

	let path = temp_dir.path().join("config.yaml");
	fs::write(&path, "profile: x\n").unwrap();
	assert!(matches!(Config::load(&path), Err(HealError::Config { .. })));
}

#[test]
fn test_missing_file_is_io_error() {
	let temp_dir = TempDir::new().unwrap();
	let result = Config::load(&temp_dir.path().join("nope.toml"));
	assert!(result.unwrap_err().is_not_found());
}

// vim: ts=4
