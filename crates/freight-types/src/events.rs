//! Row-level change notifications.
//!
//! The persisted store emits one notification per changed row. Raw
//! notifications carry the table name and JSON rows; `ChangeEvent::decode`
//! turns them into typed records so the routing layer never touches column
//! names directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::order::Order;
use crate::shipment::{Container, ShippingBox};

/// Tables whose changes are observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
	Orders,
	Boxes,
	Containers,
	Notifications,
	Users,
	Alerts,
}

impl Table {
	pub fn as_str(&self) -> &'static str {
		match self {
			Table::Orders => "orders",
			Table::Boxes => "boxes",
			Table::Containers => "containers",
			Table::Notifications => "notifications",
			Table::Users => "users",
			Table::Alerts => "alerts",
		}
	}
}

impl fmt::Display for Table {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Table {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"boxes" => Ok(Self::Boxes),
			"containers" => Ok(Self::Containers),
			"notifications" => Ok(Self::Notifications),
			"users" | "userlevel" => Ok(Self::Users),
			"alerts" => Ok(Self::Alerts),
			_ => Err(()),
		}
	}
}

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
	Insert,
	Update,
	Delete,
}

/// A user-facing notification row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
	pub id: i64,
	#[serde(alias = "userId")]
	pub user_id: String,
	pub title: String,
	#[serde(default)]
	pub body: Option<String>,
	#[serde(default)]
	pub read: bool,
	#[serde(alias = "createdAt")]
	pub created_at: DateTime<Utc>,
}

/// A typed row snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "row", rename_all = "snake_case")]
pub enum Record {
	Order(Order),
	Box(ShippingBox),
	Container(Container),
	Notification(Notification),
	/// Tables this core observes but does not interpret (users, alerts).
	Other(serde_json::Value),
}

impl Record {
	pub fn as_order(&self) -> Option<&Order> {
		match self {
			Record::Order(order) => Some(order),
			_ => None,
		}
	}

	pub fn as_notification(&self) -> Option<&Notification> {
		match self {
			Record::Notification(notification) => Some(notification),
			_ => None,
		}
	}
}

/// A decoded change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
	pub table: Table,
	pub operation: Operation,
	pub before: Option<Record>,
	pub after: Option<Record>,
}

impl ChangeEvent {
	pub fn insert(table: Table, after: Record) -> Self {
		Self {
			table,
			operation: Operation::Insert,
			before: None,
			after: Some(after),
		}
	}

	pub fn update(table: Table, before: Record, after: Record) -> Self {
		Self {
			table,
			operation: Operation::Update,
			before: Some(before),
			after: Some(after),
		}
	}

	pub fn delete(table: Table, before: Record) -> Self {
		Self {
			table,
			operation: Operation::Delete,
			before: Some(before),
			after: None,
		}
	}

	/// Rows that decide relevance for this operation.
	///
	/// Inserts are judged on the new row, deletes on the old row, updates on
	/// both so a row moving out of a view still reaches that view.
	pub fn relevant_rows(&self) -> Vec<&Record> {
		match self.operation {
			Operation::Insert => self.after.iter().collect(),
			Operation::Delete => self.before.iter().collect(),
			Operation::Update => self.before.iter().chain(self.after.iter()).collect(),
		}
	}

	/// Decodes a raw notification.
	///
	/// Returns `Ok(None)` for tables that are not observed.
	pub fn decode(raw: RawChange) -> Result<Option<Self>, DecodeError> {
		let table = match raw.table.parse::<Table>() {
			Ok(table) => table,
			Err(()) => return Ok(None),
		};
		let before = raw.before.map(|row| decode_row(table, row)).transpose()?;
		let after = raw.after.map(|row| decode_row(table, row)).transpose()?;
		Ok(Some(Self {
			table,
			operation: raw.operation,
			before,
			after,
		}))
	}
}

/// Change notification as delivered by the store, before decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChange {
	pub table: String,
	#[serde(alias = "eventType", alias = "type")]
	pub operation: Operation,
	#[serde(default, alias = "old")]
	pub before: Option<serde_json::Value>,
	#[serde(default, alias = "new")]
	pub after: Option<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("Malformed {table} row: {message}")]
	MalformedRow { table: Table, message: String },
}

fn decode_row(table: Table, row: serde_json::Value) -> Result<Record, DecodeError> {
	let malformed = |e: serde_json::Error| DecodeError::MalformedRow {
		table,
		message: e.to_string(),
	};
	Ok(match table {
		Table::Orders => Record::Order(serde_json::from_value(row).map_err(malformed)?),
		Table::Boxes => Record::Box(serde_json::from_value(row).map_err(malformed)?),
		Table::Containers => Record::Container(serde_json::from_value(row).map_err(malformed)?),
		Table::Notifications => {
			Record::Notification(serde_json::from_value(row).map_err(malformed)?)
		},
		Table::Users | Table::Alerts => Record::Other(row),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_decode_collapses_assignment_synonyms() {
		let raw = RawChange {
			table: "orders".into(),
			operation: Operation::Update,
			before: Some(json!({
				"id": 7,
				"state": 5,
				"clientId": "c-1",
				"asignedEVzla": "op-a",
				"created_at": "2024-01-01T00:00:00Z",
				"updated_at": "2024-01-01T00:00:00Z"
			})),
			after: Some(json!({
				"id": 7,
				"state": 5,
				"client_id": "c-1",
				"assignedVenezuela": "op-b",
				"createdAt": "2024-01-01T00:00:00Z",
				"updatedAt": "2024-01-02T00:00:00Z"
			})),
		};

		let event = ChangeEvent::decode(raw).unwrap().unwrap();
		let before = event.before.as_ref().and_then(Record::as_order).unwrap();
		let after = event.after.as_ref().and_then(Record::as_order).unwrap();
		assert_eq!(before.assigned_venezuela.as_deref(), Some("op-a"));
		assert_eq!(after.assigned_venezuela.as_deref(), Some("op-b"));
		assert_eq!(after.client_id, "c-1");
	}

	#[test]
	fn test_decode_skips_unobserved_tables() {
		let raw = RawChange {
			table: "chat_messages".into(),
			operation: Operation::Insert,
			before: None,
			after: Some(json!({ "id": 1 })),
		};
		assert!(ChangeEvent::decode(raw).unwrap().is_none());
	}

	#[test]
	fn test_decode_reports_malformed_rows() {
		let raw = RawChange {
			table: "boxes".into(),
			operation: Operation::Insert,
			before: None,
			after: Some(json!({ "id": "not-a-number" })),
		};
		let err = ChangeEvent::decode(raw).unwrap_err();
		assert!(err.to_string().contains("boxes"));
	}

	#[test]
	fn test_relevant_rows_follow_operation() {
		let order = Record::Order(Order::new(1, "c", "lamp"));
		let insert = ChangeEvent::insert(Table::Orders, order.clone());
		assert_eq!(insert.relevant_rows().len(), 1);
		let delete = ChangeEvent::delete(Table::Orders, order.clone());
		assert_eq!(delete.relevant_rows().len(), 1);
		let update = ChangeEvent::update(Table::Orders, order.clone(), order);
		assert_eq!(update.relevant_rows().len(), 2);
	}
}
