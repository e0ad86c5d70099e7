//! Order records and their state history.
//!
//! Field names follow the canonical spelling. Raw rows coming off the change
//! stream use several legacy column names for the assignment fields; those are
//! accepted through serde aliases so the synonyms are resolved once, while
//! decoding, and never again downstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{OrderState, MIN_STATE_FOR_BOX};

pub type OrderId = i64;
pub type BoxId = i64;
pub type ContainerId = i64;

/// A customer purchase request tracked through the numbered lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	pub id: OrderId,
	pub state: OrderState,
	#[serde(alias = "clientId", alias = "client")]
	pub client_id: String,
	/// China-side operator currently responsible, if any.
	#[serde(
		default,
		alias = "assignedChina",
		alias = "asignedEChina",
		alias = "assigned_china_operator"
	)]
	pub assigned_china: Option<String>,
	/// Venezuela-side operator currently responsible, if any.
	#[serde(
		default,
		alias = "assignedVenezuela",
		alias = "asignedEVzla",
		alias = "asignedEVenezuela",
		alias = "assigned_vzla"
	)]
	pub assigned_venezuela: Option<String>,
	/// Set only once the order is physically packed.
	#[serde(default, alias = "boxId", alias = "box")]
	pub box_id: Option<BoxId>,
	#[serde(default, alias = "productName")]
	pub product_name: String,
	#[serde(default)]
	pub quantity: u32,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(alias = "createdAt")]
	pub created_at: DateTime<Utc>,
	#[serde(alias = "updatedAt")]
	pub updated_at: DateTime<Utc>,
}

impl Order {
	/// Creates a freshly requested order.
	pub fn new(id: OrderId, client_id: impl Into<String>, product_name: impl Into<String>) -> Self {
		let now = Utc::now();
		Self {
			id,
			state: OrderState(crate::state::FIRST_STATE),
			client_id: client_id.into(),
			assigned_china: None,
			assigned_venezuela: None,
			box_id: None,
			product_name: product_name.into(),
			quantity: 1,
			description: None,
			created_at: now,
			updated_at: now,
		}
	}

	pub fn with_state(mut self, state: i32) -> Self {
		self.state = OrderState(state);
		self
	}

	pub fn assigned_to_china(mut self, operator: impl Into<String>) -> Self {
		self.assigned_china = Some(operator.into());
		self
	}

	pub fn assigned_to_venezuela(mut self, operator: impl Into<String>) -> Self {
		self.assigned_venezuela = Some(operator.into());
		self
	}

	pub fn in_box(mut self, box_id: BoxId) -> Self {
		self.box_id = Some(box_id);
		self
	}

	/// Whether the order has progressed far enough to be packed.
	pub fn can_be_boxed(&self) -> bool {
		self.state.value() >= MIN_STATE_FOR_BOX
	}
}

/// One row of the append-only transition log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateHistoryRecord {
	pub order_id: OrderId,
	/// Resulting state of the transition.
	pub state: OrderState,
	#[serde(default)]
	pub previous_state: Option<OrderState>,
	pub timestamp: DateTime<Utc>,
	#[serde(default)]
	pub changed_by: Option<String>,
	#[serde(default)]
	pub notes: Option<String>,
}
