//! Timeline projection types.
//!
//! A timeline is rebuilt on every read; it is never persisted. Both the
//! history-backed and the synthesized builds emit the same six steps in the
//! same order so renderers do not care which one ran.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::order::OrderId;

/// Fixed timeline step vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKey {
	Created,
	Processing,
	Shipped,
	InTransit,
	Customs,
	Delivered,
}

impl StepKey {
	pub const ALL: [StepKey; 6] = [
		StepKey::Created,
		StepKey::Processing,
		StepKey::Shipped,
		StepKey::InTransit,
		StepKey::Customs,
		StepKey::Delivered,
	];

	/// Minimum order state at which this step counts as completed.
	pub fn threshold(&self) -> i32 {
		match self {
			StepKey::Created => 1,
			StepKey::Processing => 4,
			StepKey::Shipped => 8,
			StepKey::InTransit => 9,
			StepKey::Customs => 10,
			StepKey::Delivered => 13,
		}
	}

	pub fn label(&self) -> &'static str {
		match self {
			StepKey::Created => "Order created",
			StepKey::Processing => "Processing",
			StepKey::Shipped => "Shipped",
			StepKey::InTransit => "In transit",
			StepKey::Customs => "In customs",
			StepKey::Delivered => "Delivered",
		}
	}

	pub fn location(&self) -> &'static str {
		match self {
			StepKey::Created => "Client",
			StepKey::Processing | StepKey::Shipped => "China",
			StepKey::InTransit => "International",
			StepKey::Customs => "Venezuela customs",
			StepKey::Delivered => "Venezuela",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineStep {
	pub key: StepKey,
	pub label: String,
	pub completed: bool,
	pub timestamp: Option<DateTime<Utc>>,
	pub location: String,
}

impl TimelineStep {
	pub fn new(key: StepKey, completed: bool, timestamp: Option<DateTime<Utc>>) -> Self {
		Self {
			key,
			label: key.label().to_string(),
			completed,
			timestamp,
			location: key.location().to_string(),
		}
	}
}

/// Which build produced a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineSource {
	History,
	Synthesized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
	pub order_id: OrderId,
	pub source: TimelineSource,
	pub steps: Vec<TimelineStep>,
}

impl Timeline {
	pub fn completed_steps(&self) -> usize {
		self.steps.iter().filter(|step| step.completed).count()
	}
}
