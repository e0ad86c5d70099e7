//! Builder pattern for constructing the freight core.
//!
//! Storage backends are plugged in through factory functions keyed by
//! implementation name; everything else is derived from configuration.

use crate::cache::PathCache;
use crate::engine::{event_bus::EventBus, RealtimeEngine};
use crate::realtime::{BusFeed, RealtimeHub};
use crate::state::OrderStateMachine;
use crate::store::RecordStore;
use crate::timeline::TimelineBuilder;
use crate::tracking::TrackingResolver;
use crate::FreightCore;
use freight_config::Config;
use freight_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while assembling the core.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions available to the builder, keyed by implementation name.
pub struct CoreFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

pub struct CoreBuilder {
	config: Config,
}

impl CoreBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub fn build<SF>(self, factories: CoreFactories<SF>) -> Result<FreightCore, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(component = "storage", implementation = %name, "No factory registered");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					storage_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::MissingComponent(
				"No valid storage implementations available".into(),
			));
		}

		let primary = &self.config.storage.primary;
		let backend = storage_impls.remove(primary).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary
			))
		})?;

		let storage = Arc::new(StorageService::new(backend));
		let event_bus = EventBus::new(self.config.realtime.channel_capacity);
		let store = Arc::new(RecordStore::new(storage, event_bus.clone()));

		let hub = Arc::new(RealtimeHub::new(self.config.realtime.debounce_window()));
		let engine = Arc::new(RealtimeEngine::new(
			hub.clone(),
			Arc::new(BusFeed::new(event_bus)),
			self.config.realtime.reconnect.clone(),
		));

		tracing::info!(
			component = "realtime",
			debounce_ms = self.config.realtime.debounce_ms,
			channel_capacity = self.config.realtime.channel_capacity,
			"Loaded"
		);

		Ok(FreightCore {
			state_machine: Arc::new(OrderStateMachine::new(store.clone())),
			tracking: Arc::new(TrackingResolver::new(store.clone())),
			timeline: Arc::new(TimelineBuilder::new(store.clone())),
			views: PathCache::new(),
			config: self.config,
			store,
			hub,
			engine,
		})
	}
}
