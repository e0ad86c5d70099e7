//! Order state taxonomy.
//!
//! Orders move through a linear numeric state space (1..=13). This module names
//! those states, groups them into coarse buckets used for read-side aggregation,
//! and maps them to the status tags shown to operators. Every function here is
//! total: states the taxonomy does not know about (the schema may evolve ahead of
//! this code) degrade to `Unknown` or a neutral tag instead of failing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest recognized order state.
pub const FIRST_STATE: i32 = 1;
/// Terminal order state.
pub const DELIVERED_STATE: i32 = 13;
/// Orders may only be packed into a box once they reach this state.
pub const MIN_STATE_FOR_BOX: i32 = 4;
/// Boxes may only be loaded into a container once sealed.
pub const MIN_BOX_STATE_FOR_CONTAINER: i32 = BoxState::Sealed as i32;

/// Raw order state as persisted.
///
/// Kept as a newtype over the stored integer so unrecognized values survive a
/// round trip through storage untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderState(pub i32);

impl OrderState {
	pub fn value(self) -> i32 {
		self.0
	}

	/// Returns the named state when the value is part of the taxonomy.
	pub fn named(self) -> Option<KnownState> {
		KnownState::from_value(self.0)
	}

	pub fn bucket(self) -> StateBucket {
		bucket_of(self.0)
	}

	pub fn ui_status(self) -> UiStatus {
		ui_status_of(self.0)
	}
}

impl From<i32> for OrderState {
	fn from(value: i32) -> Self {
		Self(value)
	}
}

impl From<KnownState> for OrderState {
	fn from(state: KnownState) -> Self {
		Self(state as i32)
	}
}

impl fmt::Display for OrderState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.named() {
			Some(named) => write!(f, "{} ({})", self.0, named),
			None => write!(f, "{} (unknown)", self.0),
		}
	}
}

/// The thirteen recognized order states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownState {
	/// Client submitted the request.
	Requested = 1,
	/// China-side operator priced the order.
	Quoted = 2,
	/// Client reported a payment awaiting validation.
	PaymentReported = 3,
	/// Payment validator accepted the payment.
	PaymentValidated = 4,
	Purchased = 5,
	AtChinaWarehouse = 6,
	/// Packed into a box.
	Packed = 7,
	ShippedFromChina = 8,
	InternationalTransit = 9,
	InCustoms = 10,
	AtVenezuelaWarehouse = 11,
	OutForDelivery = 12,
	Delivered = 13,
}

impl KnownState {
	pub const ALL: [KnownState; 13] = [
		KnownState::Requested,
		KnownState::Quoted,
		KnownState::PaymentReported,
		KnownState::PaymentValidated,
		KnownState::Purchased,
		KnownState::AtChinaWarehouse,
		KnownState::Packed,
		KnownState::ShippedFromChina,
		KnownState::InternationalTransit,
		KnownState::InCustoms,
		KnownState::AtVenezuelaWarehouse,
		KnownState::OutForDelivery,
		KnownState::Delivered,
	];

	pub fn from_value(value: i32) -> Option<Self> {
		if (FIRST_STATE..=DELIVERED_STATE).contains(&value) {
			Some(Self::ALL[(value - FIRST_STATE) as usize])
		} else {
			None
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			KnownState::Requested => "requested",
			KnownState::Quoted => "quoted",
			KnownState::PaymentReported => "payment_reported",
			KnownState::PaymentValidated => "payment_validated",
			KnownState::Purchased => "purchased",
			KnownState::AtChinaWarehouse => "at_china_warehouse",
			KnownState::Packed => "packed",
			KnownState::ShippedFromChina => "shipped_from_china",
			KnownState::InternationalTransit => "international_transit",
			KnownState::InCustoms => "in_customs",
			KnownState::AtVenezuelaWarehouse => "at_venezuela_warehouse",
			KnownState::OutForDelivery => "out_for_delivery",
			KnownState::Delivered => "delivered",
		}
	}
}

impl fmt::Display for KnownState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Coarse classification of an order state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBucket {
	Pending,
	Transit,
	Delivered,
	Unknown,
}

/// Status tag rendered by operator dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UiStatus {
	AwaitingPayment,
	PendingChina,
	PendingVenezuela,
	InTransit,
	Delivered,
}

impl UiStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			UiStatus::AwaitingPayment => "awaiting-payment",
			UiStatus::PendingChina => "pending-china",
			UiStatus::PendingVenezuela => "pending-venezuela",
			UiStatus::InTransit => "in-transit",
			UiStatus::Delivered => "delivered",
		}
	}
}

impl fmt::Display for UiStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Classifies a raw order state into its bucket.
pub fn bucket_of(state: i32) -> StateBucket {
	match state {
		1..=3 => StateBucket::Pending,
		4..=12 => StateBucket::Transit,
		DELIVERED_STATE => StateBucket::Delivered,
		_ => StateBucket::Unknown,
	}
}

/// Maps a raw order state to the dashboard status tag.
///
/// States outside the taxonomy render as in-transit.
pub fn ui_status_of(state: i32) -> UiStatus {
	match state {
		1 => UiStatus::PendingChina,
		2 | 3 => UiStatus::AwaitingPayment,
		4..=6 => UiStatus::PendingChina,
		7..=10 => UiStatus::InTransit,
		11 | 12 => UiStatus::PendingVenezuela,
		DELIVERED_STATE => UiStatus::Delivered,
		_ => UiStatus::InTransit,
	}
}

/// Box lifecycle, independent of order states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxState {
	Packing = 1,
	Sealed = 2,
	Loaded = 3,
	Shipped = 4,
	Received = 5,
}

/// Container lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
	Loading = 1,
	Closed = 2,
	Departed = 3,
	Arrived = 4,
}

/// Per-bucket order counts for dashboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
	pub pending: usize,
	pub transit: usize,
	pub delivered: usize,
	pub unknown: usize,
}

impl BucketCounts {
	pub fn tally<I>(states: I) -> Self
	where
		I: IntoIterator<Item = i32>,
	{
		let mut counts = Self::default();
		for state in states {
			counts.add(bucket_of(state));
		}
		counts
	}

	pub fn add(&mut self, bucket: StateBucket) {
		match bucket {
			StateBucket::Pending => self.pending += 1,
			StateBucket::Transit => self.transit += 1,
			StateBucket::Delivered => self.delivered += 1,
			StateBucket::Unknown => self.unknown += 1,
		}
	}

	pub fn total(&self) -> usize {
		self.pending + self.transit + self.delivered + self.unknown
	}
}
