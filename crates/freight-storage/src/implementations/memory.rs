//! In-memory storage backend.
//!
//! Keeps everything in a `HashMap` behind a single read-write lock. The lock is
//! what makes `update_bytes_if` atomic: the current value is read, checked and
//! replaced while the write guard is held.

use crate::{BytesPatch, CasOutcome, StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use freight_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage implementation.
///
/// No persistence across restarts.
pub struct MemoryStorage {
	store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::with_capacity(0)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::with_capacity(capacity))),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn get_many_bytes(&self, keys: &[String]) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let store = self.store.read().await;
		Ok(keys
			.iter()
			.filter_map(|key| store.get(key).map(|bytes| (key.clone(), bytes.clone())))
			.collect())
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, StorageError> {
		let mut store = self.store.write().await;
		Ok(store.insert(key.to_string(), value))
	}

	async fn insert_bytes(&self, key: &str, value: Vec<u8>) -> Result<bool, StorageError> {
		let mut store = self.store.write().await;
		if store.contains_key(key) {
			return Ok(false);
		}
		store.insert(key.to_string(), value);
		Ok(true)
	}

	async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		let mut store = self.store.write().await;
		Ok(store.remove(key))
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(store.contains_key(key))
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let store = self.store.read().await;
		let mut keys: Vec<String> = store
			.keys()
			.filter(|key| key.starts_with(prefix))
			.cloned()
			.collect();
		keys.sort();
		Ok(keys)
	}

	async fn update_bytes_if(
		&self,
		key: &str,
		patch: BytesPatch<'_>,
	) -> Result<CasOutcome<Vec<u8>>, StorageError> {
		let mut store = self.store.write().await;
		let current = store.get_mut(key).ok_or(StorageError::NotFound)?;
		match patch(current)? {
			Some(next) => {
				let before = std::mem::replace(current, next.clone());
				Ok(CasOutcome::Applied {
					before,
					after: next,
				})
			},
			None => Ok(CasOutcome::Rejected {
				current: current.clone(),
			}),
		}
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"initial_capacity",
				FieldType::Integer {
					min: Some(0),
					max: Some(10_000_000),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
///
/// Configuration parameters:
/// - `initial_capacity` (optional): number of entries to preallocate
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let capacity = config
		.get("initial_capacity")
		.and_then(|v| v.as_integer())
		.unwrap_or(0) as usize;
	tracing::debug!(capacity, "Created memory storage");
	Ok(Box::new(MemoryStorage::with_capacity(capacity)))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
