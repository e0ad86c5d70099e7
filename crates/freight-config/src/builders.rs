//! Configuration builder for tests and local tooling.

use crate::{ApiConfig, Config, RealtimeConfig, ReconnectConfig, ServiceConfig, StorageConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to the in-memory backend and a short debounce window.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	storage_primary: String,
	debounce_ms: u64,
	channel_capacity: usize,
	reconnect: ReconnectConfig,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			service_id: "freight-test".to_string(),
			storage_primary: "memory".to_string(),
			debounce_ms: 50,
			channel_capacity: 64,
			reconnect: ReconnectConfig {
				initial_ms: 10,
				max_ms: 100,
				multiplier: 2.0,
				max_elapsed_seconds: 1,
			},
			api: None,
		}
	}

	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	pub fn debounce_ms(mut self, window: u64) -> Self {
		self.debounce_ms = window;
		self
	}

	pub fn channel_capacity(mut self, capacity: usize) -> Self {
		self.channel_capacity = capacity;
		self
	}

	pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
		self.reconnect = reconnect;
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	pub fn build(self) -> Config {
		let mut implementations = HashMap::new();
		implementations.insert(
			self.storage_primary.clone(),
			toml::Value::Table(toml::Table::new()),
		);
		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations,
			},
			realtime: RealtimeConfig {
				debounce_ms: self.debounce_ms,
				channel_capacity: self.channel_capacity,
				reconnect: self.reconnect,
			},
			api: self.api,
		}
	}
}
