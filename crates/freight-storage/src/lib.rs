//! Storage module for the freight lifecycle core.
//!
//! Provides the backend abstraction the core persists records through, plus a
//! typed service layer with JSON serialization. The one write primitive that
//! matters for concurrency is [`StorageInterface::update_bytes_if`]: the check
//! and the write happen inside a single backend call, so two operators racing
//! on the same record can never both win.

use async_trait::async_trait;
use freight_types::{ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Result of a conditional update.
///
/// `Rejected` is not a failure: it reports that the stored value no longer
/// satisfied the caller's precondition, typically because another actor wrote
/// first.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome<T> {
	Applied { before: T, after: T },
	Rejected { current: T },
}

impl<T> CasOutcome<T> {
	pub fn applied(&self) -> bool {
		matches!(self, CasOutcome::Applied { .. })
	}

	fn try_map<U, E>(self, mut f: impl FnMut(T) -> Result<U, E>) -> Result<CasOutcome<U>, E> {
		Ok(match self {
			CasOutcome::Applied { before, after } => CasOutcome::Applied {
				before: f(before)?,
				after: f(after)?,
			},
			CasOutcome::Rejected { current } => CasOutcome::Rejected { current: f(current)? },
		})
	}
}

/// Patch applied by [`StorageInterface::update_bytes_if`].
///
/// Receives the current bytes and returns the replacement, or `None` to leave
/// the value untouched.
pub type BytesPatch<'a> =
	&'a (dyn Fn(&[u8]) -> Result<Option<Vec<u8>>, StorageError> + Send + Sync);

/// Low-level interface every storage backend implements.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Retrieves several keys in one round trip.
	///
	/// Missing keys are skipped. Backends that can batch should override this.
	async fn get_many_bytes(&self, keys: &[String]) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let mut found = Vec::with_capacity(keys.len());
		for key in keys {
			match self.get_bytes(key).await {
				Ok(bytes) => found.push((key.clone(), bytes)),
				Err(StorageError::NotFound) => {},
				Err(e) => return Err(e),
			}
		}
		Ok(found)
	}

	/// Stores raw bytes, returning the value it replaced.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, StorageError>;

	/// Stores raw bytes only if the key is absent.
	///
	/// Returns `false` and leaves the stored value untouched when the key
	/// already exists. The check and the write are one backend call.
	async fn insert_bytes(&self, key: &str, value: Vec<u8>) -> Result<bool, StorageError>;

	/// Deletes the value for the key, returning it if it existed.
	async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists keys starting with `prefix`, in ascending order.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Atomically applies `patch` to the current value.
	///
	/// Fails with `NotFound` if the key is absent.
	async fn update_bytes_if(
		&self,
		key: &str,
		patch: BytesPatch<'_>,
	) -> Result<CasOutcome<Vec<u8>>, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::memory;

	vec![(memory::Registry::NAME, memory::Registry::factory())]
}

/// High-level storage service that provides typed operations.
///
/// Values are serialized to JSON and addressed by `namespace:id`.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

fn key_for(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

fn encode<T: Serialize>(data: &T) -> Result<Vec<u8>, StorageError> {
	serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
	serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a value, creating or overwriting it. Returns the replaced value.
	pub async fn store<T: Serialize + DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<Option<T>, StorageError> {
		let previous = self
			.backend
			.set_bytes(&key_for(namespace, id), encode(data)?)
			.await?;
		previous.map(|bytes| decode(&bytes)).transpose()
	}

	/// Stores a value only if nothing is stored under the id yet.
	///
	/// Returns `false` when the id is taken.
	pub async fn insert<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<bool, StorageError> {
		self.backend
			.insert_bytes(&key_for(namespace, id), encode(data)?)
			.await
	}

	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&key_for(namespace, id)).await?;
		decode(&bytes)
	}

	/// Retrieves every present id of `ids` in a single backend call.
	///
	/// Values come back in backend order; ids that are absent are omitted.
	pub async fn retrieve_many<T: DeserializeOwned>(
		&self,
		namespace: &str,
		ids: &[String],
	) -> Result<Vec<T>, StorageError> {
		if ids.is_empty() {
			return Ok(Vec::new());
		}
		let keys: Vec<String> = ids.iter().map(|id| key_for(namespace, id)).collect();
		self.backend
			.get_many_bytes(&keys)
			.await?
			.iter()
			.map(|(_, bytes)| decode(bytes))
			.collect()
	}

	/// Retrieves every value in a namespace.
	pub async fn retrieve_all<T: DeserializeOwned>(
		&self,
		namespace: &str,
	) -> Result<Vec<T>, StorageError> {
		self.retrieve_matching(namespace, "").await
	}

	/// Retrieves every value in a namespace whose id starts with `id_prefix`,
	/// in ascending key order.
	pub async fn retrieve_matching<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id_prefix: &str,
	) -> Result<Vec<T>, StorageError> {
		let keys = self.backend.list_keys(&key_for(namespace, id_prefix)).await?;
		if keys.is_empty() {
			return Ok(Vec::new());
		}
		self.backend
			.get_many_bytes(&keys)
			.await?
			.iter()
			.map(|(_, bytes)| decode(bytes))
			.collect()
	}

	/// Removes a value, returning it if it existed.
	pub async fn remove<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		self.backend
			.delete(&key_for(namespace, id))
			.await?
			.map(|bytes| decode(&bytes))
			.transpose()
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&key_for(namespace, id)).await
	}

	/// Atomically replaces a value when `patch` accepts the current one.
	///
	/// `patch` sees the current value and returns the replacement, or `None`
	/// when its precondition does not hold. Returns `NotFound` when there is no
	/// value to patch.
	pub async fn update_if<T, F>(
		&self,
		namespace: &str,
		id: &str,
		patch: F,
	) -> Result<CasOutcome<T>, StorageError>
	where
		T: Serialize + DeserializeOwned,
		F: Fn(&T) -> Option<T> + Send + Sync,
	{
		let bytes_patch = |current: &[u8]| -> Result<Option<Vec<u8>>, StorageError> {
			let value: T = decode(current)?;
			patch(&value).map(|next| encode(&next)).transpose()
		};
		let outcome = self
			.backend
			.update_bytes_if(&key_for(namespace, id), &bytes_patch)
			.await?;
		outcome.try_map(|bytes| decode(&bytes))
	}

	/// Returns the validation schema of the active backend.
	pub fn config_schema(&self) -> Box<dyn ConfigSchema> {
		self.backend.config_schema()
	}
}
