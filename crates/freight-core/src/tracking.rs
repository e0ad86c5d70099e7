//! Physical placement and carrier tracking for orders.
//!
//! Resolving tracking walks order -> box -> container. Any missing hop yields
//! no tracking rather than an error: unboxed orders and boxes not yet loaded
//! are the common case.

use crate::store::{RecordStore, StoreError};
use chrono::{DateTime, Utc};
use freight_types::{Container, Order, OrderId, ShippingBox, TrackingInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum TrackingError {
	#[error("Order {0} not found")]
	NotFound(OrderId),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StoreError> for TrackingError {
	fn from(e: StoreError) -> Self {
		TrackingError::Storage(e.to_string())
	}
}

/// Where an order physically is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
	pub order: Order,
	pub shipping_box: Option<ShippingBox>,
	pub container: Option<Container>,
}

impl Placement {
	pub fn tracking(&self) -> Option<TrackingInfo> {
		self.container.as_ref().map(TrackingInfo::from)
	}
}

/// An order with whatever tracking currently applies to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTracking {
	pub order: Order,
	pub tracking: Option<TrackingInfo>,
}

/// Collapses records sharing an id, keeping the most recently updated one.
///
/// Ids are unique in well-formed data; duplicates are logged and resolved
/// rather than failing the whole batch.
pub fn pick_latest<T>(
	records: Vec<T>,
	id: impl Fn(&T) -> i64,
	updated_at: impl Fn(&T) -> DateTime<Utc>,
) -> HashMap<i64, T> {
	let mut latest: HashMap<i64, T> = HashMap::with_capacity(records.len());
	for record in records {
		let key = id(&record);
		match latest.get(&key) {
			Some(existing) => {
				tracing::warn!(id = key, "Duplicate record id in batched read");
				if updated_at(&record) > updated_at(existing) {
					latest.insert(key, record);
				}
			},
			None => {
				latest.insert(key, record);
			},
		}
	}
	latest
}

/// Resolves tracking metadata and placement for orders.
pub struct TrackingResolver {
	store: Arc<RecordStore>,
}

impl TrackingResolver {
	pub fn new(store: Arc<RecordStore>) -> Self {
		Self { store }
	}

	/// Walks the three hops for one order.
	#[instrument(skip_all, fields(order_id = order_id))]
	pub async fn locate(&self, order_id: OrderId) -> Result<Placement, TrackingError> {
		let order = self
			.store
			.get_order(order_id)
			.await?
			.ok_or(TrackingError::NotFound(order_id))?;

		let shipping_box = match order.box_id {
			Some(box_id) => {
				let found = self.store.get_box(box_id).await?;
				if found.is_none() {
					tracing::debug!(box_id, "Order references a missing box");
				}
				found
			},
			None => None,
		};

		let container = match shipping_box.as_ref().and_then(|b| b.container_id) {
			Some(container_id) => {
				let found = self.store.get_container(container_id).await?;
				if found.is_none() {
					tracing::debug!(container_id, "Box references a missing container");
				}
				found
			},
			None => None,
		};

		Ok(Placement {
			order,
			shipping_box,
			container,
		})
	}

	/// Returns the tracking that applies to an order, or `None` when it is not
	/// yet in a container.
	pub async fn resolve_tracking(
		&self,
		order_id: OrderId,
	) -> Result<Option<TrackingInfo>, TrackingError> {
		Ok(self.locate(order_id).await?.tracking())
	}

	/// Resolves tracking for many orders with one batched read per hop.
	///
	/// Orders without tracking are absent from the result.
	#[instrument(skip_all, fields(orders = orders.len()))]
	pub async fn resolve_batch(
		&self,
		orders: &[Order],
	) -> Result<HashMap<OrderId, TrackingInfo>, TrackingError> {
		let box_ids: Vec<i64> = orders.iter().filter_map(|o| o.box_id).collect();
		if box_ids.is_empty() {
			return Ok(HashMap::new());
		}
		let boxes = pick_latest(
			self.store.get_boxes(box_ids).await?,
			|b| b.id,
			|b| b.updated_at,
		);

		let container_ids: Vec<i64> = boxes.values().filter_map(|b| b.container_id).collect();
		let containers = if container_ids.is_empty() {
			HashMap::new()
		} else {
			pick_latest(
				self.store.get_containers(container_ids).await?,
				|c| c.id,
				|c| c.updated_at,
			)
		};

		let mut resolved = HashMap::new();
		for order in orders {
			let Some(box_id) = order.box_id else {
				continue;
			};
			let Some(shipping_box) = boxes.get(&box_id) else {
				tracing::debug!(order_id = order.id, box_id, "Order references a missing box");
				continue;
			};
			let Some(container_id) = shipping_box.container_id else {
				continue;
			};
			match containers.get(&container_id) {
				Some(container) => {
					resolved.insert(order.id, TrackingInfo::from(container));
				},
				None => {
					tracing::debug!(box_id, container_id, "Box references a missing container");
				},
			}
		}
		Ok(resolved)
	}

	/// Lists a client's orders with their tracking.
	pub async fn resolve_for_client(
		&self,
		client_id: &str,
	) -> Result<Vec<OrderTracking>, TrackingError> {
		let orders = self.store.orders_for_client(client_id).await?;
		let mut tracking = self.resolve_batch(&orders).await?;
		Ok(orders
			.into_iter()
			.map(|order| OrderTracking {
				tracking: tracking.remove(&order.id),
				order,
			})
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::event_bus::EventBus;
	use crate::store::tests::memory_store;
	use async_trait::async_trait;
	use chrono::Duration;
	use freight_storage::implementations::memory::MemoryStorage;
	use freight_storage::{BytesPatch, CasOutcome, StorageError, StorageInterface, StorageService};
	use freight_types::ConfigSchema;
	use std::sync::atomic::{AtomicUsize, Ordering};

	/// Memory backend that counts single and batched reads.
	struct CountingStorage {
		inner: MemoryStorage,
		single_reads: Arc<AtomicUsize>,
		batched_reads: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl StorageInterface for CountingStorage {
		async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
			self.single_reads.fetch_add(1, Ordering::SeqCst);
			self.inner.get_bytes(key).await
		}

		async fn get_many_bytes(
			&self,
			keys: &[String],
		) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
			self.batched_reads.fetch_add(1, Ordering::SeqCst);
			self.inner.get_many_bytes(keys).await
		}

		async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, StorageError> {
			self.inner.set_bytes(key, value).await
		}

		async fn insert_bytes(&self, key: &str, value: Vec<u8>) -> Result<bool, StorageError> {
			self.inner.insert_bytes(key, value).await
		}

		async fn delete(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
			self.inner.delete(key).await
		}

		async fn exists(&self, key: &str) -> Result<bool, StorageError> {
			self.inner.exists(key).await
		}

		async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
			self.inner.list_keys(prefix).await
		}

		async fn update_bytes_if(
			&self,
			key: &str,
			patch: BytesPatch<'_>,
		) -> Result<CasOutcome<Vec<u8>>, StorageError> {
			self.inner.update_bytes_if(key, patch).await
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			self.inner.config_schema()
		}
	}

	async fn seeded() -> (Arc<RecordStore>, TrackingResolver) {
		let store = memory_store();
		store.put_order(Order::new(1, "c-1", "lamp")).await.unwrap();
		store
			.put_order(Order::new(2, "c-1", "desk").with_state(5).in_box(10))
			.await
			.unwrap();
		store
			.put_order(Order::new(3, "c-1", "chair").with_state(9).in_box(11))
			.await
			.unwrap();
		store
			.put_order(Order::new(4, "c-2", "rug").with_state(9).in_box(11))
			.await
			.unwrap();
		store.put_box(ShippingBox::new(10)).await.unwrap();
		store
			.put_box(ShippingBox::new(11).with_state(4).in_container(20))
			.await
			.unwrap();
		store
			.put_container(Container::new(20).with_tracking("TRK1", "Maersk", None, None))
			.await
			.unwrap();
		let resolver = TrackingResolver::new(store.clone());
		(store, resolver)
	}

	#[tokio::test]
	async fn test_each_hop_degrades_to_empty() {
		let (_, resolver) = seeded().await;

		// Not boxed yet
		assert_eq!(resolver.resolve_tracking(1).await.unwrap(), None);
		// Boxed, box not in a container
		assert_eq!(resolver.resolve_tracking(2).await.unwrap(), None);

		let tracking = resolver.resolve_tracking(3).await.unwrap().unwrap();
		assert_eq!(tracking.tracking_number.as_deref(), Some("TRK1"));
		assert_eq!(tracking.container_id, 20);
	}

	#[tokio::test]
	async fn test_missing_order_is_not_found() {
		let (_, resolver) = seeded().await;
		assert!(matches!(
			resolver.resolve_tracking(404).await,
			Err(TrackingError::NotFound(404))
		));
	}

	#[tokio::test]
	async fn test_dangling_box_reference_is_empty() {
		let (store, resolver) = seeded().await;
		store
			.put_order(Order::new(5, "c-3", "vase").with_state(6).in_box(99))
			.await
			.unwrap();

		let placement = resolver.locate(5).await.unwrap();
		assert!(placement.shipping_box.is_none());
		assert_eq!(placement.tracking(), None);
	}

	#[tokio::test]
	async fn test_client_batch_matches_single_resolution() {
		let (_, resolver) = seeded().await;
		let listed = resolver.resolve_for_client("c-1").await.unwrap();

		assert_eq!(listed.len(), 3);
		for entry in &listed {
			let single = resolver.resolve_tracking(entry.order.id).await.unwrap();
			assert_eq!(entry.tracking, single, "order {}", entry.order.id);
		}
	}

	#[tokio::test]
	async fn test_batch_reads_once_per_hop() {
		let single_reads = Arc::new(AtomicUsize::new(0));
		let batched_reads = Arc::new(AtomicUsize::new(0));
		let backend = CountingStorage {
			inner: MemoryStorage::new(),
			single_reads: single_reads.clone(),
			batched_reads: batched_reads.clone(),
		};
		let storage = Arc::new(StorageService::new(Box::new(backend)));
		let store = Arc::new(RecordStore::new(storage, EventBus::new(64)));

		// Twelve orders over three boxes, two of them in one container
		let mut orders = Vec::new();
		for id in 1..=12 {
			let order = Order::new(id, "c-1", "item").with_state(9).in_box(100 + id % 3);
			store.put_order(order.clone()).await.unwrap();
			orders.push(order);
		}
		for (box_id, container_id) in [(100, 20), (101, 20), (102, 21)] {
			store
				.put_box(ShippingBox::new(box_id).with_state(4).in_container(container_id))
				.await
				.unwrap();
		}
		store.put_container(Container::new(20)).await.unwrap();
		store.put_container(Container::new(21)).await.unwrap();

		single_reads.store(0, Ordering::SeqCst);
		batched_reads.store(0, Ordering::SeqCst);
		let resolved = TrackingResolver::new(store).resolve_batch(&orders).await.unwrap();

		assert_eq!(resolved.len(), 12);
		assert_eq!(batched_reads.load(Ordering::SeqCst), 2);
		assert_eq!(single_reads.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn test_pick_latest_prefers_most_recent() {
		let now = Utc::now();
		let older = ShippingBox {
			updated_at: now - Duration::hours(1),
			..ShippingBox::new(10).in_container(1)
		};
		let newer = ShippingBox {
			updated_at: now,
			..ShippingBox::new(10).in_container(2)
		};

		let picked = pick_latest(vec![newer, older], |b| b.id, |b| b.updated_at);
		assert_eq!(picked.len(), 1);
		assert_eq!(picked[&10].container_id, Some(2));
	}
}
