//! Process-wide cache keyed by path.
//!
//! Entries live until overwritten, removed or the cache is dropped. There is
//! no eviction; callers own the cache and pass it where it is needed.

use dashmap::DashMap;
use freight_types::Role;
use std::sync::Arc;

/// Cache path for the views of one subscriber identity.
pub fn view_path(role: Role, identity: &str) -> String {
	format!("/views/{}/{}", role, identity)
}

#[derive(Clone)]
pub struct PathCache<T> {
	entries: Arc<DashMap<String, T>>,
}

impl<T> Default for PathCache<T> {
	fn default() -> Self {
		Self {
			entries: Arc::new(DashMap::new()),
		}
	}
}

impl<T: Clone> PathCache<T> {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, path: &str) -> Option<T> {
		self.entries.get(path).map(|entry| entry.value().clone())
	}

	/// Stores `value` under `path`, returning what was there before.
	pub fn insert(&self, path: impl Into<String>, value: T) -> Option<T> {
		self.entries.insert(path.into(), value)
	}

	pub fn remove(&self, path: &str) -> Option<T> {
		self.entries.remove(path).map(|(_, value)| value)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
