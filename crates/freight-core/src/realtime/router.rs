//! Change event routing.

use super::scope::Subscriber;
use dashmap::DashMap;
use freight_types::ChangeEvent;

/// Registry of live subscribers and the relevance filter applied to each event.
#[derive(Default)]
pub struct ChangeRouter {
	subscribers: DashMap<String, Subscriber>,
}

impl ChangeRouter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a subscriber. Registering an id that is already present leaves the
	/// existing registration untouched and returns `false`.
	pub fn register(&self, subscriber: Subscriber) -> bool {
		match self.subscribers.entry(subscriber.id.clone()) {
			dashmap::mapref::entry::Entry::Occupied(_) => false,
			dashmap::mapref::entry::Entry::Vacant(slot) => {
				slot.insert(subscriber);
				true
			},
		}
	}

	pub fn deregister(&self, id: &str) -> Option<Subscriber> {
		self.subscribers.remove(id).map(|(_, subscriber)| subscriber)
	}

	/// Ids of the subscribers that must refresh for `event`.
	pub fn route(&self, event: &ChangeEvent) -> Vec<String> {
		self.subscribers
			.iter()
			.filter(|entry| entry.value().is_relevant(event))
			.map(|entry| entry.key().clone())
			.collect()
	}

	pub fn get(&self, id: &str) -> Option<Subscriber> {
		self.subscribers.get(id).map(|entry| entry.value().clone())
	}

	pub fn ids(&self) -> Vec<String> {
		self.subscribers.iter().map(|entry| entry.key().clone()).collect()
	}

	pub fn len(&self) -> usize {
		self.subscribers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.subscribers.is_empty()
	}
}
