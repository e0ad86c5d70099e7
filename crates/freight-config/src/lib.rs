//! Configuration module for the freight lifecycle service.
//!
//! This module provides structures and utilities for managing service configuration.
//! It supports loading configuration from TOML files and provides validation to ensure
//! all required configuration values are properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the freight service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Change routing and refresh debouncing.
	#[serde(default)]
	pub realtime: RealtimeConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this instance, used in logs.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Realtime fan-out settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RealtimeConfig {
	/// Trailing-edge debounce window per subscriber, in milliseconds.
	#[serde(default = "default_debounce_ms")]
	pub debounce_ms: u64,
	/// Capacity of the in-process change bus. Subscribers that fall further
	/// behind than this observe a gap and are resynced.
	#[serde(default = "default_channel_capacity")]
	pub channel_capacity: usize,
	/// Reconnect policy for the change feed.
	#[serde(default)]
	pub reconnect: ReconnectConfig,
}

impl Default for RealtimeConfig {
	fn default() -> Self {
		Self {
			debounce_ms: default_debounce_ms(),
			channel_capacity: default_channel_capacity(),
			reconnect: ReconnectConfig::default(),
		}
	}
}

impl RealtimeConfig {
	pub fn debounce_window(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}
}

/// Exponential backoff applied when the change feed drops.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconnectConfig {
	#[serde(default = "default_reconnect_initial_ms")]
	pub initial_ms: u64,
	#[serde(default = "default_reconnect_max_ms")]
	pub max_ms: u64,
	#[serde(default = "default_reconnect_multiplier")]
	pub multiplier: f64,
	/// Give up and report the feed as lost after this long without a
	/// successful connection.
	#[serde(default = "default_reconnect_max_elapsed_seconds")]
	pub max_elapsed_seconds: u64,
}

impl Default for ReconnectConfig {
	fn default() -> Self {
		Self {
			initial_ms: default_reconnect_initial_ms(),
			max_ms: default_reconnect_max_ms(),
			multiplier: default_reconnect_multiplier(),
			max_elapsed_seconds: default_reconnect_max_elapsed_seconds(),
		}
	}
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

/// Returns the default debounce window.
///
/// 120 ms sits inside the 100-150 ms band that coalesces a bulk box move
/// into one refresh without making single edits feel laggy.
fn default_debounce_ms() -> u64 {
	120
}

fn default_channel_capacity() -> usize {
	1024
}

fn default_reconnect_initial_ms() -> u64 {
	250
}

fn default_reconnect_max_ms() -> u64 {
	10_000
}

fn default_reconnect_multiplier() -> f64 {
	2.0
}

fn default_reconnect_max_elapsed_seconds() -> u64 {
	300
}

/// Returns the default API host.
fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

/// Returns the default API port.
fn default_api_port() -> u16 {
	3000
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file with async environment variable resolution.
	///
	/// This method supports modular configuration through include directives:
	/// - `include = ["file1.toml", "file2.toml"]` - Include specific files
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		// Storage
		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		// Realtime
		let realtime = &self.realtime;
		if realtime.debounce_ms == 0 || realtime.debounce_ms > 10_000 {
			return Err(ConfigError::Validation(format!(
				"realtime.debounce_ms must be between 1 and 10000, got {}",
				realtime.debounce_ms
			)));
		}
		if realtime.channel_capacity == 0 {
			return Err(ConfigError::Validation(
				"realtime.channel_capacity must be greater than 0".into(),
			));
		}
		let reconnect = &realtime.reconnect;
		if reconnect.initial_ms == 0 {
			return Err(ConfigError::Validation(
				"realtime.reconnect.initial_ms must be greater than 0".into(),
			));
		}
		if reconnect.max_ms < reconnect.initial_ms {
			return Err(ConfigError::Validation(format!(
				"realtime.reconnect.max_ms ({}) cannot be less than initial_ms ({})",
				reconnect.max_ms, reconnect.initial_ms
			)));
		}
		if !(reconnect.multiplier >= 1.0) {
			return Err(ConfigError::Validation(
				"realtime.reconnect.multiplier must be at least 1.0".into(),
			));
		}
		if reconnect.max_elapsed_seconds == 0 {
			return Err(ConfigError::Validation(
				"realtime.reconnect.max_elapsed_seconds must be greater than 0".into(),
			));
		}

		// API
		if let Some(api) = &self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation(
					"API port cannot be 0 when the API is enabled".into(),
				));
			}
		}

		Ok(())
	}
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
