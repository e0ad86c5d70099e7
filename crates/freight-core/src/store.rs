//! Record store for orders, boxes, containers and notifications.
//!
//! Wraps the typed storage service and publishes a [`ChangeEvent`] for every
//! write, so the process is its own change-notification source. Conditional
//! updates go through [`StorageService::update_if`] and therefore check and
//! write in one backend call.
//!
//! Callers create records with the `create_*` methods, which never overwrite,
//! and change them only through conditional updates. The `put_*` methods
//! overwrite unconditionally and exist for mirroring rows another writer has
//! already committed (see [`RecordStore::apply_change`]).

use crate::engine::event_bus::EventBus;
use chrono::Utc;
use freight_storage::{CasOutcome, StorageError, StorageService};
use freight_types::{
	BoxId, ChangeEvent, Container, ContainerId, Notification, Operation, Order, OrderId,
	Record, ShippingBox, StateHistoryRecord, StorageKey, Table, MIN_BOX_STATE_FOR_CONTAINER,
	MIN_STATE_FOR_BOX,
};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while reading or writing records.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("{table} record {id} not found")]
	NotFound { table: Table, id: String },
	#[error("{table} record {id} already exists")]
	AlreadyExists { table: Table, id: String },
	/// The record is not acceptable as a new row.
	#[error("Invalid record: {0}")]
	Invalid(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

fn storage_error(table: Table, id: &str) -> impl FnOnce(StorageError) -> StoreError + '_ {
	move |e| match e {
		StorageError::NotFound => StoreError::NotFound {
			table,
			id: id.to_string(),
		},
		other => StoreError::Storage(other.to_string()),
	}
}

/// Maps a table to the storage namespace holding its rows.
fn namespace(table: Table) -> Result<&'static str, StoreError> {
	let key = match table {
		Table::Orders => StorageKey::Orders,
		Table::Boxes => StorageKey::Boxes,
		Table::Containers => StorageKey::Containers,
		Table::Notifications => StorageKey::Notifications,
		Table::Users | Table::Alerts => {
			return Err(StoreError::Storage(format!(
				"table {} is not kept by this store",
				table
			)))
		},
	};
	Ok(key.as_str())
}

/// Typed access to persisted records with change publication.
pub struct RecordStore {
	storage: Arc<StorageService>,
	event_bus: EventBus,
}

impl RecordStore {
	pub fn new(storage: Arc<StorageService>, event_bus: EventBus) -> Self {
		Self { storage, event_bus }
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	fn publish(&self, event: ChangeEvent) {
		if self.event_bus.publish(event).is_err() {
			tracing::trace!("No change listeners attached");
		}
	}

	async fn put<T>(
		&self,
		table: Table,
		id: String,
		value: T,
		wrap: fn(T) -> Record,
	) -> Result<(), StoreError>
	where
		T: Serialize + DeserializeOwned,
	{
		let previous: Option<T> = self
			.storage
			.store(namespace(table)?, &id, &value)
			.await
			.map_err(storage_error(table, &id))?;
		let event = match previous {
			Some(before) => ChangeEvent::update(table, wrap(before), wrap(value)),
			None => ChangeEvent::insert(table, wrap(value)),
		};
		self.publish(event);
		Ok(())
	}

	async fn create<T: Serialize>(
		&self,
		table: Table,
		id: String,
		value: T,
		wrap: fn(T) -> Record,
	) -> Result<(), StoreError> {
		let created = self
			.storage
			.insert(namespace(table)?, &id, &value)
			.await
			.map_err(storage_error(table, &id))?;
		if !created {
			return Err(StoreError::AlreadyExists { table, id });
		}
		self.publish(ChangeEvent::insert(table, wrap(value)));
		Ok(())
	}

	async fn get<T: DeserializeOwned>(&self, table: Table, id: &str) -> Result<Option<T>, StoreError> {
		match self.storage.retrieve(namespace(table)?, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(StoreError::Storage(e.to_string())),
		}
	}

	async fn remove<T>(
		&self,
		table: Table,
		id: &str,
		wrap: fn(T) -> Record,
	) -> Result<Option<T>, StoreError>
	where
		T: DeserializeOwned + Clone,
	{
		let removed: Option<T> = self
			.storage
			.remove(namespace(table)?, id)
			.await
			.map_err(storage_error(table, id))?;
		if let Some(before) = &removed {
			self.publish(ChangeEvent::delete(table, wrap(before.clone())));
		}
		Ok(removed)
	}

	async fn update_if<T, F>(
		&self,
		table: Table,
		id: &str,
		patch: F,
		wrap: fn(T) -> Record,
	) -> Result<CasOutcome<T>, StoreError>
	where
		T: Serialize + DeserializeOwned + Clone,
		F: Fn(&T) -> Option<T> + Send + Sync,
	{
		let outcome = self
			.storage
			.update_if(namespace(table)?, id, patch)
			.await
			.map_err(storage_error(table, id))?;
		if let CasOutcome::Applied { before, after } = &outcome {
			self.publish(ChangeEvent::update(
				table,
				wrap(before.clone()),
				wrap(after.clone()),
			));
		}
		Ok(outcome)
	}

	async fn get_many<T: DeserializeOwned>(
		&self,
		table: Table,
		ids: impl IntoIterator<Item = i64>,
	) -> Result<Vec<T>, StoreError> {
		let mut ids: Vec<String> = ids.into_iter().map(|id| id.to_string()).collect();
		ids.sort();
		ids.dedup();
		self.storage
			.retrieve_many(namespace(table)?, &ids)
			.await
			.map_err(|e| StoreError::Storage(e.to_string()))
	}

	async fn all<T: DeserializeOwned>(&self, table: Table) -> Result<Vec<T>, StoreError> {
		self.storage
			.retrieve_all(namespace(table)?)
			.await
			.map_err(|e| StoreError::Storage(e.to_string()))
	}

	/// Mirrors a change another writer has already committed.
	///
	/// Inserts and updates overwrite the stored row with the new one, deletes
	/// remove it. The store then publishes the event it observed, so the
	/// before row is what was stored here. Rows of tables this store does not
	/// keep are published as they came.
	pub async fn apply_change(&self, event: ChangeEvent) -> Result<(), StoreError> {
		let ChangeEvent {
			table,
			operation,
			before,
			after,
		} = event;
		match operation {
			Operation::Insert | Operation::Update => match after {
				Some(Record::Order(order)) => self.put_order(order).await,
				Some(Record::Box(shipping_box)) => self.put_box(shipping_box).await,
				Some(Record::Container(container)) => self.put_container(container).await,
				Some(Record::Notification(notification)) => {
					self.put_notification(notification).await
				},
				after => {
					self.publish(ChangeEvent {
						table,
						operation,
						before,
						after,
					});
					Ok(())
				},
			},
			Operation::Delete => {
				let removed = match before {
					Some(Record::Order(order)) => self.remove_order(order.id).await?.is_some(),
					Some(Record::Box(shipping_box)) => {
						self.remove_box(shipping_box.id).await?.is_some()
					},
					Some(Record::Container(container)) => {
						self.remove_container(container.id).await?.is_some()
					},
					Some(Record::Notification(notification)) => {
						self.remove_notification(notification.id).await?.is_some()
					},
					before => {
						self.publish(ChangeEvent {
							table,
							operation,
							before,
							after,
						});
						return Ok(());
					},
				};
				if !removed {
					tracing::debug!(table = %table, "Deleted row was not stored here");
				}
				Ok(())
			},
		}
	}

	// Orders

	/// Stores a new order. Fails if the id is taken.
	///
	/// An order may only reference a box once it has reached the packing
	/// threshold.
	pub async fn create_order(&self, order: Order) -> Result<(), StoreError> {
		if order.box_id.is_some() && !order.can_be_boxed() {
			return Err(StoreError::Invalid(format!(
				"order {} in state {} cannot be in a box before state {}",
				order.id, order.state, MIN_STATE_FOR_BOX
			)));
		}
		self.create(Table::Orders, order.id.to_string(), order, Record::Order)
			.await
	}

	pub async fn put_order(&self, order: Order) -> Result<(), StoreError> {
		self.put(Table::Orders, order.id.to_string(), order, Record::Order)
			.await
	}

	pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
		self.get(Table::Orders, &id.to_string()).await
	}

	pub async fn remove_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
		self.remove(Table::Orders, &id.to_string(), Record::Order)
			.await
	}

	pub async fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
		self.all(Table::Orders).await
	}

	pub async fn orders_for_client(&self, client_id: &str) -> Result<Vec<Order>, StoreError> {
		let mut orders = self.all_orders().await?;
		orders.retain(|order| order.client_id == client_id);
		orders.sort_by_key(|order| order.id);
		Ok(orders)
	}

	/// Atomically replaces an order when `patch` accepts the stored one.
	///
	/// The patched order gets a fresh `updated_at`.
	pub async fn update_order_if<F>(
		&self,
		id: OrderId,
		patch: F,
	) -> Result<CasOutcome<Order>, StoreError>
	where
		F: Fn(&Order) -> Option<Order> + Send + Sync,
	{
		self.update_if(
			Table::Orders,
			&id.to_string(),
			|order: &Order| {
				patch(order).map(|mut next| {
					next.updated_at = Utc::now();
					next
				})
			},
			Record::Order,
		)
		.await
	}

	// Boxes

	/// Stores a new box. Fails if the id is taken or it sits in a container
	/// before being sealed.
	pub async fn create_box(&self, shipping_box: ShippingBox) -> Result<(), StoreError> {
		if shipping_box.container_id.is_some() && shipping_box.state < MIN_BOX_STATE_FOR_CONTAINER {
			return Err(StoreError::Invalid(format!(
				"box {} in state {} cannot be in a container before state {}",
				shipping_box.id, shipping_box.state, MIN_BOX_STATE_FOR_CONTAINER
			)));
		}
		self.create(
			Table::Boxes,
			shipping_box.id.to_string(),
			shipping_box,
			Record::Box,
		)
		.await
	}

	pub async fn put_box(&self, shipping_box: ShippingBox) -> Result<(), StoreError> {
		self.put(
			Table::Boxes,
			shipping_box.id.to_string(),
			shipping_box,
			Record::Box,
		)
		.await
	}

	pub async fn get_box(&self, id: BoxId) -> Result<Option<ShippingBox>, StoreError> {
		self.get(Table::Boxes, &id.to_string()).await
	}

	/// Reads every present box of `ids` in one backend call.
	pub async fn get_boxes(
		&self,
		ids: impl IntoIterator<Item = BoxId>,
	) -> Result<Vec<ShippingBox>, StoreError> {
		self.get_many(Table::Boxes, ids).await
	}

	pub async fn remove_box(&self, id: BoxId) -> Result<Option<ShippingBox>, StoreError> {
		self.remove(Table::Boxes, &id.to_string(), Record::Box).await
	}

	pub async fn all_boxes(&self) -> Result<Vec<ShippingBox>, StoreError> {
		self.all(Table::Boxes).await
	}

	pub async fn update_box_if<F>(
		&self,
		id: BoxId,
		patch: F,
	) -> Result<CasOutcome<ShippingBox>, StoreError>
	where
		F: Fn(&ShippingBox) -> Option<ShippingBox> + Send + Sync,
	{
		self.update_if(
			Table::Boxes,
			&id.to_string(),
			|shipping_box: &ShippingBox| {
				patch(shipping_box).map(|mut next| {
					next.updated_at = Utc::now();
					next
				})
			},
			Record::Box,
		)
		.await
	}

	// Containers

	/// Stores a new container. Fails if the id is taken.
	pub async fn create_container(&self, container: Container) -> Result<(), StoreError> {
		self.create(
			Table::Containers,
			container.id.to_string(),
			container,
			Record::Container,
		)
		.await
	}

	pub async fn put_container(&self, container: Container) -> Result<(), StoreError> {
		self.put(
			Table::Containers,
			container.id.to_string(),
			container,
			Record::Container,
		)
		.await
	}

	pub async fn get_container(&self, id: ContainerId) -> Result<Option<Container>, StoreError> {
		self.get(Table::Containers, &id.to_string()).await
	}

	/// Reads every present container of `ids` in one backend call.
	pub async fn get_containers(
		&self,
		ids: impl IntoIterator<Item = ContainerId>,
	) -> Result<Vec<Container>, StoreError> {
		self.get_many(Table::Containers, ids).await
	}

	pub async fn remove_container(&self, id: ContainerId) -> Result<Option<Container>, StoreError> {
		self.remove(Table::Containers, &id.to_string(), Record::Container)
			.await
	}

	pub async fn all_containers(&self) -> Result<Vec<Container>, StoreError> {
		self.all(Table::Containers).await
	}

	pub async fn update_container_if<F>(
		&self,
		id: ContainerId,
		patch: F,
	) -> Result<CasOutcome<Container>, StoreError>
	where
		F: Fn(&Container) -> Option<Container> + Send + Sync,
	{
		self.update_if(
			Table::Containers,
			&id.to_string(),
			|container: &Container| {
				patch(container).map(|mut next| {
					next.updated_at = Utc::now();
					next
				})
			},
			Record::Container,
		)
		.await
	}

	// Notifications

	pub async fn put_notification(&self, notification: Notification) -> Result<(), StoreError> {
		self.put(
			Table::Notifications,
			notification.id.to_string(),
			notification,
			Record::Notification,
		)
		.await
	}

	pub async fn remove_notification(&self, id: i64) -> Result<Option<Notification>, StoreError> {
		self.remove(Table::Notifications, &id.to_string(), Record::Notification)
			.await
	}

	pub async fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>, StoreError> {
		let mut notifications: Vec<Notification> = self.all(Table::Notifications).await?;
		notifications.retain(|n| n.user_id == user_id);
		notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(notifications)
	}

	// State history

	/// Appends one record to an order's transition log.
	pub async fn append_history(&self, record: &StateHistoryRecord) -> Result<(), StoreError> {
		let id = format!(
			"{}:{:020}:{:03}",
			record.order_id,
			record.timestamp.timestamp_micros().max(0),
			record.state.value().clamp(0, 999)
		);
		self.storage
			.store(StorageKey::OrderHistory.as_str(), &id, record)
			.await
			.map(|_| ())
			.map_err(|e| StoreError::Storage(e.to_string()))
	}

	/// Returns an order's transition log, oldest first. Empty if none exists.
	pub async fn history(&self, order_id: OrderId) -> Result<Vec<StateHistoryRecord>, StoreError> {
		let mut records: Vec<StateHistoryRecord> = self
			.storage
			.retrieve_matching(StorageKey::OrderHistory.as_str(), &format!("{}:", order_id))
			.await
			.map_err(|e| StoreError::Storage(e.to_string()))?;
		records.sort_by_key(|record| record.timestamp);
		Ok(records)
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use freight_storage::implementations::memory::MemoryStorage;
	use freight_types::{Operation, OrderState};

	pub(crate) fn memory_store() -> Arc<RecordStore> {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		Arc::new(RecordStore::new(storage, EventBus::new(64)))
	}

	#[tokio::test]
	async fn test_put_publishes_insert_then_update() {
		let store = memory_store();
		let mut changes = store.event_bus().subscribe();

		store.put_order(Order::new(1, "c-1", "lamp")).await.unwrap();
		store
			.put_order(Order::new(1, "c-1", "lamp").with_state(2))
			.await
			.unwrap();

		let first = changes.recv().await.unwrap();
		assert_eq!(first.operation, Operation::Insert);
		let second = changes.recv().await.unwrap();
		assert_eq!(second.operation, Operation::Update);
		assert_eq!(
			second.before.as_ref().and_then(Record::as_order).map(|o| o.state),
			Some(OrderState(1))
		);
	}

	#[tokio::test]
	async fn test_create_never_overwrites() {
		let store = memory_store();
		store
			.create_order(Order::new(1, "c-1", "lamp").with_state(13))
			.await
			.unwrap();
		let mut changes = store.event_bus().subscribe();

		let result = store.create_order(Order::new(1, "c-1", "lamp")).await;
		assert!(matches!(result, Err(StoreError::AlreadyExists { table: Table::Orders, .. })));
		assert_eq!(store.get_order(1).await.unwrap().unwrap().state, OrderState(13));
		assert!(changes.try_recv().is_err());
	}

	#[tokio::test]
	async fn test_create_rejects_early_links() {
		let store = memory_store();

		let unpaid = store.create_order(Order::new(1, "c-1", "lamp").with_state(3).in_box(10)).await;
		assert!(matches!(unpaid, Err(StoreError::Invalid(_))));
		assert!(store.get_order(1).await.unwrap().is_none());
		store
			.create_order(Order::new(1, "c-1", "lamp").with_state(4).in_box(10))
			.await
			.unwrap();

		let open_box = store.create_box(ShippingBox::new(10).in_container(20)).await;
		assert!(matches!(open_box, Err(StoreError::Invalid(_))));
		store
			.create_box(ShippingBox::new(10).with_state(2).in_container(20))
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn test_apply_change_mirrors_rows() {
		let store = memory_store();
		let mut changes = store.event_bus().subscribe();

		let order = Order::new(5, "c-9", "lamp");
		store
			.apply_change(ChangeEvent::insert(Table::Orders, Record::Order(order.clone())))
			.await
			.unwrap();
		assert_eq!(store.get_order(5).await.unwrap(), Some(order.clone()));
		assert_eq!(changes.recv().await.unwrap().operation, Operation::Insert);

		store
			.apply_change(ChangeEvent::delete(Table::Orders, Record::Order(order)))
			.await
			.unwrap();
		assert!(store.get_order(5).await.unwrap().is_none());
		assert_eq!(changes.recv().await.unwrap().operation, Operation::Delete);

		let alert = ChangeEvent::insert(Table::Alerts, Record::Other(serde_json::json!({"id": 1})));
		store.apply_change(alert.clone()).await.unwrap();
		assert_eq!(changes.recv().await.unwrap(), alert);
	}

	#[tokio::test]
	async fn test_missing_records_read_as_none() {
		let store = memory_store();
		assert!(store.get_order(42).await.unwrap().is_none());
		assert!(store.remove_box(42).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_conditional_update_on_missing_order() {
		let store = memory_store();
		let result = store.update_order_if(9, |o| Some(o.clone())).await;
		assert!(matches!(
			result,
			Err(StoreError::NotFound {
				table: Table::Orders,
				..
			})
		));
	}

	#[tokio::test]
	async fn test_rejected_update_publishes_nothing() {
		let store = memory_store();
		store.put_order(Order::new(3, "c", "lamp")).await.unwrap();
		let mut changes = store.event_bus().subscribe();

		let outcome = store.update_order_if(3, |_| None).await.unwrap();
		assert!(!outcome.applied());
		assert!(changes.try_recv().is_err());
	}

	#[tokio::test]
	async fn test_client_listing_and_batched_boxes() {
		let store = memory_store();
		store.put_order(Order::new(2, "c-1", "a")).await.unwrap();
		store.put_order(Order::new(1, "c-1", "b")).await.unwrap();
		store.put_order(Order::new(3, "c-2", "c")).await.unwrap();
		store.put_box(ShippingBox::new(10)).await.unwrap();
		store.put_box(ShippingBox::new(11)).await.unwrap();

		let orders = store.orders_for_client("c-1").await.unwrap();
		assert_eq!(orders.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1, 2]);

		let boxes = store.get_boxes([10, 10, 11, 12]).await.unwrap();
		assert_eq!(boxes.len(), 2);
	}

	#[tokio::test]
	async fn test_history_is_scoped_per_order_and_sorted() {
		let store = memory_store();
		let t0 = Utc::now();
		for (order_id, state, offset) in [(7, 3, 20), (7, 2, 10), (70, 2, 5)] {
			store
				.append_history(&StateHistoryRecord {
					order_id,
					state: OrderState(state),
					previous_state: Some(OrderState(state - 1)),
					timestamp: t0 + chrono::Duration::seconds(offset),
					changed_by: None,
					notes: None,
				})
				.await
				.unwrap();
		}

		let history = store.history(7).await.unwrap();
		assert_eq!(
			history.iter().map(|r| r.state.value()).collect::<Vec<_>>(),
			vec![2, 3]
		);
		assert!(store.history(8).await.unwrap().is_empty());
	}
}
