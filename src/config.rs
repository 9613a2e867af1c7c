//! Configuration for syncheal
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (Config::default())
//! 2. Config file (~/.syncheal/config.toml, config.json or config.json5)
//! 3. Environment variables (SYNCHEAL_* prefix)
//! 4. CLI flags (highest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::HealError;

/// Config file names probed in the state directory, in order
pub const CONFIG_FILE_NAMES: &[&str] = &["config.toml", "config.json5", "config.json"];

/// Unified configuration for integrity checks, resolution and filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	// ========================================================================
	// RUNTIME & STATE MANAGEMENT
	// ========================================================================
	/// Home directory for syncheal state (~/.syncheal)
	pub state_dir: PathBuf,

	/// Profile name for configuration and state isolation
	pub profile: String,

	// ========================================================================
	// DETECTION
	// ========================================================================
	/// Check filenames for cross-platform problems during scans
	pub filename_check: bool,

	/// Hold back a scan's deletions when too many files vanish at once
	pub mass_delete_protection: bool,

	/// Percentage of known files deleted in one scan that counts as mass deletion
	pub mass_delete_threshold: u8,

	/// Warn when a folder was not in sync for this many seconds (0 = never)
	pub sync_warn_secs: u64,

	/// Compute content hashes while scanning
	pub hash_contents: bool,

	// ========================================================================
	// FILTERING
	// ========================================================================
	/// Include hidden files in filtered directory views
	pub show_hidden_files: bool,

	// ========================================================================
	// OUTPUT & LOGGING
	// ========================================================================
	/// Log level (trace, debug, info, warn, error)
	pub log_level: String,

	/// Log format
	pub log_format: LogFormat,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			state_dir: std::env::var("HOME")
				.ok()
				.map(|h| PathBuf::from(h).join(".syncheal"))
				.unwrap_or_else(|| PathBuf::from(".syncheal")),
			profile: "default".to_string(),

			filename_check: true,
			mass_delete_protection: true,
			mass_delete_threshold: 95,
			sync_warn_secs: 864_000, // 10 days
			hash_contents: false,

			show_hidden_files: true,

			log_level: "info".to_string(),
			log_format: LogFormat::Pretty,
		}
	}
}

impl Config {
	/// Load a config file, choosing the parser from its extension
	pub fn load(path: &Path) -> Result<Self, HealError> {
		let contents = std::fs::read_to_string(path)?;
		let config: Config = match path.extension().and_then(|e| e.to_str()) {
			Some("toml") => toml::from_str(&contents).map_err(|e| HealError::Config {
				message: format!("{}: {}", path.display(), e),
			})?,
			// json5 is a superset of JSON
			Some("json") | Some("json5") => {
				json5::from_str(&contents).map_err(|e| HealError::Config {
					message: format!("{}: {}", path.display(), e),
				})?
			}
			_ => {
				return Err(HealError::Config {
					message: format!("Unsupported config file type: {}", path.display()),
				})
			}
		};
		config.validate()?;
		Ok(config)
	}

	/// Load the first config file found in `dir`, or defaults if there is none
	pub fn load_from_dir(dir: &Path) -> Result<Self, HealError> {
		for name in CONFIG_FILE_NAMES {
			let candidate = dir.join(name);
			if candidate.is_file() {
				let mut config = Config::load(&candidate)?;
				config.state_dir = dir.to_path_buf();
				return Ok(config);
			}
		}
		Ok(Config { state_dir: dir.to_path_buf(), ..Config::default() })
	}

	/// Apply `SYNCHEAL_*` environment overrides
	pub fn apply_env(&mut self) -> Result<(), HealError> {
		self.apply_vars(|key| std::env::var(key).ok())
	}

	fn apply_vars<F>(&mut self, get: F) -> Result<(), HealError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(v) = get("SYNCHEAL_PROFILE") {
			self.profile = v;
		}
		if let Some(v) = get("SYNCHEAL_LOG_LEVEL") {
			self.log_level = v;
		}
		if let Some(v) = get("SYNCHEAL_FILENAME_CHECK") {
			self.filename_check = parse_bool("SYNCHEAL_FILENAME_CHECK", &v)?;
		}
		if let Some(v) = get("SYNCHEAL_SHOW_HIDDEN_FILES") {
			self.show_hidden_files = parse_bool("SYNCHEAL_SHOW_HIDDEN_FILES", &v)?;
		}
		if let Some(v) = get("SYNCHEAL_MASS_DELETE_THRESHOLD") {
			self.mass_delete_threshold = v.parse().map_err(|_| HealError::Config {
				message: format!("SYNCHEAL_MASS_DELETE_THRESHOLD: not a percentage: {}", v),
			})?;
		}
		self.validate()
	}

	/// Check value ranges
	pub fn validate(&self) -> Result<(), HealError> {
		if self.mass_delete_threshold > 100 {
			return Err(HealError::Config {
				message: format!(
					"massDeleteThreshold must be 0-100, got {}",
					self.mass_delete_threshold
				),
			});
		}
		if self.profile.is_empty() {
			return Err(HealError::Config { message: "profile must not be empty".to_string() });
		}
		Ok(())
	}

	/// Directory holding per-folder state for the active profile
	pub fn profile_dir(&self) -> PathBuf {
		self.state_dir.join(&self.profile)
	}
}

fn parse_bool(key: &str, value: &str) -> Result<bool, HealError> {
	match value.to_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		_ => Err(HealError::Config { message: format!("{}: not a boolean: {}", key, value) }),
	}
}

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
	#[default]
	Pretty,
	Compact,
}

impl std::str::FromStr for LogFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"pretty" => Ok(Self::Pretty),
			"compact" => Ok(Self::Compact),
			_ => Err(format!("Unknown log format: {}. Valid options: pretty, compact", s)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	#[test]
	fn test_config_default() {
		let config = Config::default();
		assert_eq!(config.profile, "default");
		assert!(config.filename_check);
		assert_eq!(config.mass_delete_threshold, 95);
		assert_eq!(config.sync_warn_secs, 864_000);
		assert!(config.show_hidden_files);
	}

	#[test]
	fn test_config_serialization() {
		let config = Config::default();
		let json = serde_json::to_string(&config).expect("Failed to serialize");
		assert!(json.contains("massDeleteThreshold"));
		let deserialized: Config = serde_json::from_str(&json).expect("Failed to deserialize");
		assert_eq!(config.profile, deserialized.profile);
		assert_eq!(config.sync_warn_secs, deserialized.sync_warn_secs);
	}

	#[test]
	fn test_env_overrides() {
		let vars: HashMap<&str, &str> = [
			("SYNCHEAL_PROFILE", "work"),
			("SYNCHEAL_FILENAME_CHECK", "off"),
			("SYNCHEAL_MASS_DELETE_THRESHOLD", "50"),
		]
		.into_iter()
		.collect();

		let mut config = Config::default();
		config.apply_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
		assert_eq!(config.profile, "work");
		assert!(!config.filename_check);
		assert_eq!(config.mass_delete_threshold, 50);
	}

	#[test]
	fn test_env_override_rejects_garbage() {
		let mut config = Config::default();
		let result = config.apply_vars(|k| {
			if k == "SYNCHEAL_SHOW_HIDDEN_FILES" {
				Some("maybe".to_string())
			} else {
				None
			}
		});
		assert!(result.is_err());
	}

	#[test]
	fn test_validate_threshold() {
		let config = Config { mass_delete_threshold: 101, ..Config::default() };
		assert!(config.validate().is_err());
	}
}

// vim: ts=4
