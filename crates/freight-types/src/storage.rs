//! Storage namespaces.

use std::str::FromStr;

/// Storage namespaces for the persisted collections.
///
/// Replaces string literals at storage call sites with typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	Orders,
	Boxes,
	Containers,
	Notifications,
	/// State history log, one entry per record keyed `{order_id}:{sequence}`.
	OrderHistory,
}

impl StorageKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Boxes => "boxes",
			StorageKey::Containers => "containers",
			StorageKey::Notifications => "notifications",
			StorageKey::OrderHistory => "order_history",
		}
	}

	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::Boxes,
			Self::Containers,
			Self::Notifications,
			Self::OrderHistory,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
