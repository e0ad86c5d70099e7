//! Role-scoped views and their relevance predicates.
//!
//! Each variant names one live view a role keeps open and decides, from the
//! rows of a change event alone, whether that view must refresh. No predicate
//! performs I/O.

use freight_types::{ChangeEvent, Order, Record, Role, Table};
use serde::{Deserialize, Serialize};

/// Highest order state still shown to China-side operators.
pub const CHINA_MAX_STATE: i32 = 9;
/// Lowest order state shown to Venezuela-side operators.
pub const VENEZUELA_MIN_STATE: i32 = 4;
/// Lowest order state in the payments queue (reported payments onwards).
pub const PAYMENTS_MIN_STATE: i32 = 3;

const ORDER_TABLES: &[Table] = &[Table::Orders];
const ADMIN_TABLES: &[Table] = &[
	Table::Orders,
	Table::Boxes,
	Table::Containers,
	Table::Users,
	Table::Alerts,
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewScope {
	/// Orders placed by one client.
	ClientOrders { client: String },
	/// Orders assigned to one China-side operator, up to international transit.
	ChinaOrders { operator: String },
	/// Orders assigned to one Venezuela-side operator, from payment validation on.
	VenezuelaOrders { operator: String },
	/// The payment validation queue and its history.
	PaymentsOrders,
	/// Everything an administrator watches, unfiltered.
	Admin,
	Boxes,
	Containers,
	Notifications { recipient: String },
}

impl ViewScope {
	/// Tables whose events this view listens to.
	pub fn tables(&self) -> &'static [Table] {
		match self {
			ViewScope::ClientOrders { .. }
			| ViewScope::ChinaOrders { .. }
			| ViewScope::VenezuelaOrders { .. }
			| ViewScope::PaymentsOrders => ORDER_TABLES,
			ViewScope::Admin => ADMIN_TABLES,
			ViewScope::Boxes => &[Table::Boxes],
			ViewScope::Containers => &[Table::Containers],
			ViewScope::Notifications { .. } => &[Table::Notifications],
		}
	}

	/// Unscoped views refresh on any event of their tables. Callers narrow
	/// them at refresh time.
	fn is_unscoped(&self) -> bool {
		matches!(
			self,
			ViewScope::Admin | ViewScope::Boxes | ViewScope::Containers
		)
	}

	/// Whether an order belongs in this view.
	pub fn matches_order(&self, order: &Order) -> bool {
		let state = order.state.value();
		match self {
			ViewScope::ClientOrders { client } => &order.client_id == client,
			ViewScope::ChinaOrders { operator } => {
				order.assigned_china.as_ref() == Some(operator) && state <= CHINA_MAX_STATE
			},
			ViewScope::VenezuelaOrders { operator } => {
				order.assigned_venezuela.as_ref() == Some(operator) && state >= VENEZUELA_MIN_STATE
			},
			ViewScope::PaymentsOrders => state >= PAYMENTS_MIN_STATE,
			ViewScope::Admin => true,
			_ => false,
		}
	}

	fn matches_record(&self, record: &Record) -> bool {
		match (self, record) {
			(_, Record::Order(order)) => self.matches_order(order),
			(ViewScope::Notifications { recipient }, Record::Notification(n)) => {
				&n.user_id == recipient
			},
			_ => false,
		}
	}

	/// Judges one change event.
	///
	/// An insert counts if the new row matches, a delete if the old row did,
	/// and an update if either did, so a row leaving the view still refreshes
	/// it.
	pub fn is_relevant(&self, event: &ChangeEvent) -> bool {
		if !self.tables().contains(&event.table) {
			return false;
		}
		if self.is_unscoped() {
			return true;
		}
		event
			.relevant_rows()
			.into_iter()
			.any(|record| self.matches_record(record))
	}
}

/// A live role-scoped consumer of refresh signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
	pub id: String,
	pub role: Role,
	pub identity: String,
	pub scopes: Vec<ViewScope>,
}

impl Subscriber {
	/// Builds a subscriber with the default views of `role`.
	pub fn for_role(id: impl Into<String>, role: Role, identity: impl Into<String>) -> Self {
		let identity = identity.into();
		let notifications = ViewScope::Notifications {
			recipient: identity.clone(),
		};
		let scopes = match role {
			Role::Client => vec![
				ViewScope::ClientOrders {
					client: identity.clone(),
				},
				ViewScope::Containers,
				notifications,
			],
			Role::China => vec![
				ViewScope::ChinaOrders {
					operator: identity.clone(),
				},
				ViewScope::Boxes,
				ViewScope::Containers,
				notifications,
			],
			Role::Venezuela => vec![
				ViewScope::VenezuelaOrders {
					operator: identity.clone(),
				},
				ViewScope::Boxes,
				ViewScope::Containers,
				notifications,
			],
			Role::Payments => vec![ViewScope::PaymentsOrders, notifications],
			Role::Admin => vec![ViewScope::Admin, notifications],
		};
		Self {
			id: id.into(),
			role,
			identity,
			scopes,
		}
	}

	pub fn with_scopes(mut self, scopes: Vec<ViewScope>) -> Self {
		self.scopes = scopes;
		self
	}

	pub fn is_relevant(&self, event: &ChangeEvent) -> bool {
		self.scopes.iter().any(|scope| scope.is_relevant(event))
	}

	/// The first order-bearing view, used for snapshots.
	pub fn order_scope(&self) -> Option<&ViewScope> {
		self.scopes.iter().find(|scope| {
			matches!(
				scope,
				ViewScope::ClientOrders { .. }
					| ViewScope::ChinaOrders { .. }
					| ViewScope::VenezuelaOrders { .. }
					| ViewScope::PaymentsOrders
					| ViewScope::Admin
			)
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use freight_types::{Notification, ShippingBox};

	fn order_event(before: Option<Order>, after: Option<Order>) -> ChangeEvent {
		match (before, after) {
			(None, Some(after)) => ChangeEvent::insert(Table::Orders, Record::Order(after)),
			(Some(before), None) => ChangeEvent::delete(Table::Orders, Record::Order(before)),
			(Some(before), Some(after)) => {
				ChangeEvent::update(Table::Orders, Record::Order(before), Record::Order(after))
			},
			(None, None) => unreachable!(),
		}
	}

	#[test]
	fn test_reassignment_is_relevant_to_both_operators() {
		let before = Order::new(1, "c", "lamp")
			.with_state(9)
			.assigned_to_venezuela("op-a");
		let after = before.clone().assigned_to_venezuela("op-b");
		let event = order_event(Some(before), Some(after));

		let a = Subscriber::for_role("a", Role::Venezuela, "op-a");
		let b = Subscriber::for_role("b", Role::Venezuela, "op-b");
		let c = Subscriber::for_role("c", Role::Venezuela, "op-c");
		assert!(a.is_relevant(&event));
		assert!(b.is_relevant(&event));
		assert!(!c.is_relevant(&event));
	}

	#[test]
	fn test_insert_and_delete_judge_one_side() {
		let order = Order::new(1, "c", "lamp")
			.with_state(5)
			.assigned_to_china("op");
		let scope = ViewScope::ChinaOrders {
			operator: "op".into(),
		};

		assert!(scope.is_relevant(&order_event(None, Some(order.clone()))));
		assert!(scope.is_relevant(&order_event(Some(order.clone()), None)));

		let other = order.clone().assigned_to_china("someone-else");
		assert!(!scope.is_relevant(&order_event(None, Some(other.clone()))));
		assert!(!scope.is_relevant(&order_event(Some(other), None)));
	}

	#[test]
	fn test_state_leaving_bucket_still_refreshes() {
		let scope = ViewScope::ChinaOrders {
			operator: "op".into(),
		};
		let before = Order::new(1, "c", "lamp")
			.with_state(9)
			.assigned_to_china("op");
		let after = before.clone().with_state(10);

		assert!(scope.is_relevant(&order_event(Some(before), Some(after.clone()))));
		// Entirely outside the bucket on both sides
		assert!(!scope.is_relevant(&order_event(
			Some(after.clone()),
			Some(after.with_state(11))
		)));
	}

	#[test]
	fn test_payments_threshold() {
		let scope = ViewScope::PaymentsOrders;
		assert!(!scope.is_relevant(&order_event(None, Some(Order::new(1, "c", "x").with_state(2)))));
		assert!(scope.is_relevant(&order_event(None, Some(Order::new(1, "c", "x").with_state(3)))));
	}

	#[test]
	fn test_admin_and_box_views_are_unscoped() {
		let event = ChangeEvent::insert(Table::Boxes, Record::Box(ShippingBox::new(1)));
		assert!(ViewScope::Admin.is_relevant(&event));
		assert!(ViewScope::Boxes.is_relevant(&event));
		assert!(!ViewScope::Containers.is_relevant(&event));

		let users = ChangeEvent::insert(Table::Users, Record::Other(serde_json::json!({"id": 1})));
		assert!(ViewScope::Admin.is_relevant(&users));
		assert!(!ViewScope::Boxes.is_relevant(&users));
	}

	#[test]
	fn test_notifications_follow_recipient() {
		let notification = Notification {
			id: 1,
			user_id: "c-1".into(),
			title: "Payment validated".into(),
			body: None,
			read: false,
			created_at: Utc::now(),
		};
		let event = ChangeEvent::insert(Table::Notifications, Record::Notification(notification));

		assert!(Subscriber::for_role("s1", Role::Client, "c-1").is_relevant(&event));
		assert!(!Subscriber::for_role("s2", Role::Client, "c-2").is_relevant(&event));
		assert!(!ViewScope::Admin.is_relevant(&event));
	}

	#[test]
	fn test_client_view() {
		let sub = Subscriber::for_role("s", Role::Client, "c-1");
		assert!(sub.is_relevant(&order_event(None, Some(Order::new(1, "c-1", "x")))));
		assert!(!sub.is_relevant(&order_event(None, Some(Order::new(2, "c-2", "x")))));
		assert_eq!(
			sub.order_scope(),
			Some(&ViewScope::ClientOrders {
				client: "c-1".into()
			})
		);
	}
}
