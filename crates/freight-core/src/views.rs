//! Read-side snapshots of role-scoped views.
//!
//! A snapshot is what a subscriber re-reads when its debounced refresh fires.

use crate::realtime::{Subscriber, ViewScope};
use crate::store::{RecordStore, StoreError};
use chrono::{DateTime, Utc};
use freight_types::{BucketCounts, Container, Notification, Order, ShippingBox, UiStatus};
use serde::{Deserialize, Serialize};

/// An order as listed in a view, with its display status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
	#[serde(flatten)]
	pub order: Order,
	pub ui_status: UiStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSnapshot {
	pub scope: ViewScope,
	pub orders: Vec<OrderRow>,
	/// Bucket tally over `orders`.
	pub counts: BucketCounts,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub boxes: Vec<ShippingBox>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub containers: Vec<Container>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub notifications: Vec<Notification>,
	pub taken_at: DateTime<Utc>,
}

impl ViewSnapshot {
	fn empty(scope: ViewScope) -> Self {
		Self {
			scope,
			orders: Vec::new(),
			counts: BucketCounts::default(),
			boxes: Vec::new(),
			containers: Vec::new(),
			notifications: Vec::new(),
			taken_at: Utc::now(),
		}
	}

	/// Reads the current contents of one view.
	pub async fn load(store: &RecordStore, scope: &ViewScope) -> Result<Self, StoreError> {
		let mut snapshot = Self::empty(scope.clone());
		match scope {
			ViewScope::Boxes => {
				snapshot.boxes = store.all_boxes().await?;
				snapshot.boxes.sort_by_key(|b| b.id);
			},
			ViewScope::Containers => {
				snapshot.containers = store.all_containers().await?;
				snapshot.containers.sort_by_key(|c| c.id);
			},
			ViewScope::Notifications { recipient } => {
				snapshot.notifications = store.notifications_for(recipient).await?;
			},
			_ => {
				let mut orders = store.all_orders().await?;
				orders.retain(|order| scope.matches_order(order));
				orders.sort_by_key(|order| order.id);
				snapshot.counts = BucketCounts::tally(orders.iter().map(|o| o.state.value()));
				snapshot.orders = orders
					.into_iter()
					.map(|order| OrderRow {
						ui_status: order.state.ui_status(),
						order,
					})
					.collect();
			},
		}
		Ok(snapshot)
	}

	/// Reads the boxes or containers reached from `orders`, with one batched
	/// read per hop.
	async fn load_reachable(
		store: &RecordStore,
		scope: &ViewScope,
		orders: &[OrderRow],
	) -> Result<Self, StoreError> {
		let mut snapshot = Self::empty(scope.clone());
		let box_ids: Vec<i64> = orders.iter().filter_map(|row| row.order.box_id).collect();
		if box_ids.is_empty() {
			return Ok(snapshot);
		}
		let mut boxes = store.get_boxes(box_ids).await?;
		boxes.sort_by_key(|b| b.id);
		match scope {
			ViewScope::Boxes => snapshot.boxes = boxes,
			ViewScope::Containers => {
				let container_ids: Vec<i64> = boxes.iter().filter_map(|b| b.container_id).collect();
				if !container_ids.is_empty() {
					snapshot.containers = store.get_containers(container_ids).await?;
					snapshot.containers.sort_by_key(|c| c.id);
				}
			},
			_ => {},
		}
		Ok(snapshot)
	}

	/// Reads every view a subscriber keeps open, in scope order.
	///
	/// A client sees only the boxes and containers its own orders are in.
	/// Operator views list every box and container, since they fill boxes
	/// before any of their orders point at them.
	pub async fn load_for(
		store: &RecordStore,
		subscriber: &Subscriber,
	) -> Result<Vec<Self>, StoreError> {
		let owned = match subscriber
			.scopes
			.iter()
			.find(|scope| matches!(scope, ViewScope::ClientOrders { .. }))
		{
			Some(scope) => Some(Self::load(store, scope).await?),
			None => None,
		};

		let mut snapshots = Vec::with_capacity(subscriber.scopes.len());
		for scope in &subscriber.scopes {
			let snapshot = match (&owned, scope) {
				(Some(owned), scope) if *scope == owned.scope => owned.clone(),
				(Some(owned), ViewScope::Boxes | ViewScope::Containers) => {
					Self::load_reachable(store, scope, &owned.orders).await?
				},
				_ => Self::load(store, scope).await?,
			};
			snapshots.push(snapshot);
		}
		Ok(snapshots)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::tests::memory_store;
	use freight_types::Role;

	async fn seed(store: &RecordStore) {
		let orders = [
			Order::new(1, "c-1", "lamp"),
			Order::new(2, "c-1", "desk")
				.with_state(5)
				.assigned_to_china("op-1"),
			Order::new(3, "c-2", "chair")
				.with_state(11)
				.assigned_to_china("op-1")
				.assigned_to_venezuela("op-2"),
			Order::new(4, "c-1", "rug").with_state(13),
		];
		for order in orders {
			store.put_order(order).await.unwrap();
		}
		store.put_box(ShippingBox::new(7)).await.unwrap();
	}

	#[tokio::test]
	async fn test_client_view_counts_buckets() {
		let store = memory_store();
		seed(&store).await;

		let scope = ViewScope::ClientOrders {
			client: "c-1".into(),
		};
		let snapshot = ViewSnapshot::load(&store, &scope).await.unwrap();

		let ids: Vec<_> = snapshot.orders.iter().map(|row| row.order.id).collect();
		assert_eq!(ids, vec![1, 2, 4]);
		assert_eq!(snapshot.counts.pending, 1);
		assert_eq!(snapshot.counts.transit, 1);
		assert_eq!(snapshot.counts.delivered, 1);
		assert_eq!(snapshot.orders[2].ui_status, UiStatus::Delivered);
	}

	#[tokio::test]
	async fn test_china_view_stops_after_transit() {
		let store = memory_store();
		seed(&store).await;

		let scope = ViewScope::ChinaOrders {
			operator: "op-1".into(),
		};
		let snapshot = ViewSnapshot::load(&store, &scope).await.unwrap();

		assert_eq!(snapshot.orders.len(), 1);
		assert_eq!(snapshot.orders[0].order.id, 2);
	}

	fn containers_of(snapshots: &[ViewSnapshot]) -> Vec<i64> {
		snapshots
			.iter()
			.find(|s| s.scope == ViewScope::Containers)
			.map(|s| s.containers.iter().map(|c| c.id).collect())
			.unwrap_or_default()
	}

	#[tokio::test]
	async fn test_client_sees_only_own_containers() {
		let store = memory_store();
		store
			.put_order(Order::new(1, "c-1", "lamp").with_state(9).in_box(10))
			.await
			.unwrap();
		store
			.put_order(Order::new(2, "c-2", "desk").with_state(9).in_box(11))
			.await
			.unwrap();
		store
			.put_box(ShippingBox::new(10).with_state(4).in_container(20))
			.await
			.unwrap();
		store
			.put_box(ShippingBox::new(11).with_state(4).in_container(21))
			.await
			.unwrap();
		store.put_container(Container::new(20)).await.unwrap();
		store.put_container(Container::new(21)).await.unwrap();

		let owner = Subscriber::for_role("a", Role::Client, "c-1");
		let snapshots = ViewSnapshot::load_for(&store, &owner).await.unwrap();
		assert_eq!(containers_of(&snapshots), vec![20]);

		let stranger = Subscriber::for_role("b", Role::Client, "c-3");
		let snapshots = ViewSnapshot::load_for(&store, &stranger).await.unwrap();
		assert!(containers_of(&snapshots).is_empty());

		let operator = Subscriber::for_role("c", Role::China, "op-1");
		let snapshots = ViewSnapshot::load_for(&store, &operator).await.unwrap();
		assert_eq!(containers_of(&snapshots), vec![20, 21]);
	}

	#[tokio::test]
	async fn test_load_for_covers_every_scope() {
		let store = memory_store();
		seed(&store).await;

		let subscriber = Subscriber::for_role("s", Role::China, "op-1");
		let snapshots = ViewSnapshot::load_for(&store, &subscriber).await.unwrap();

		assert_eq!(snapshots.len(), subscriber.scopes.len());
		let boxes = snapshots
			.iter()
			.find(|s| s.scope == ViewScope::Boxes)
			.unwrap();
		assert_eq!(boxes.boxes.len(), 1);
		assert!(boxes.orders.is_empty());
	}
}
