//! Order progress timelines.
//!
//! The preferred source is the order's transition log. When the log is empty
//! or cannot be read, a six-step skeleton is synthesized from the current
//! state instead. Either way the caller gets the same steps in the same order.

use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use freight_types::{
	KnownState, Order, OrderId, StateHistoryRecord, StepKey, Timeline, TimelineSource,
	TimelineStep,
};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum TimelineError {
	#[error("Order {0} not found")]
	NotFound(OrderId),
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Builds a timeline from an order's transition log.
///
/// Records are taken oldest first and de-duplicated by resulting state, the
/// earliest record for each state winning. Unrecognized states are skipped.
/// A step is complete once any record reaches its threshold and is stamped
/// with the earliest such record.
pub fn from_history(order: &Order, mut records: Vec<StateHistoryRecord>) -> Timeline {
	records.sort_by_key(|record| record.timestamp);

	let mut seen = HashSet::new();
	let reached: Vec<(i32, DateTime<Utc>)> = records
		.into_iter()
		.filter(|record| KnownState::from_value(record.state.value()).is_some())
		.filter(|record| seen.insert(record.state.value()))
		.map(|record| (record.state.value(), record.timestamp))
		.collect();

	let steps = StepKey::ALL
		.iter()
		.map(|&key| {
			let first = reached
				.iter()
				.find(|(state, _)| *state >= key.threshold())
				.map(|(_, at)| *at);
			let timestamp = match key {
				StepKey::Created => first.map(|_| order.created_at),
				_ => first,
			};
			TimelineStep::new(key, first.is_some(), timestamp)
		})
		.collect();

	Timeline {
		order_id: order.id,
		source: TimelineSource::History,
		steps,
	}
}

/// Builds a timeline from the order's current state alone.
///
/// Only the creation step carries a timestamp.
pub fn synthesize(order: &Order) -> Timeline {
	let state = order.state.value();
	let steps = StepKey::ALL
		.iter()
		.map(|&key| {
			let completed = state >= key.threshold();
			let timestamp = (key == StepKey::Created && completed).then_some(order.created_at);
			TimelineStep::new(key, completed, timestamp)
		})
		.collect();

	Timeline {
		order_id: order.id,
		source: TimelineSource::Synthesized,
		steps,
	}
}

/// Reads orders and their logs to produce timelines.
pub struct TimelineBuilder {
	store: Arc<RecordStore>,
}

impl TimelineBuilder {
	pub fn new(store: Arc<RecordStore>) -> Self {
		Self { store }
	}

	/// Builds the timeline for an order.
	///
	/// Only a missing order or a failure to read the order itself is an error.
	/// History faults fall back to the synthesized timeline.
	#[instrument(skip_all, fields(order_id = order_id))]
	pub async fn build_timeline(&self, order_id: OrderId) -> Result<Timeline, TimelineError> {
		let order = self
			.store
			.get_order(order_id)
			.await
			.map_err(|e| TimelineError::Storage(e.to_string()))?
			.ok_or(TimelineError::NotFound(order_id))?;

		match self.store.history(order_id).await {
			Ok(records) if records.is_empty() => {
				tracing::debug!("No state history, synthesizing timeline");
				Ok(synthesize(&order))
			},
			Ok(records) => Ok(from_history(&order, records)),
			Err(e) => {
				tracing::warn!(error = %e, "State history unavailable, synthesizing timeline");
				Ok(synthesize(&order))
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::tests::memory_store;
	use chrono::Duration;
	use freight_types::OrderState;

	fn record(order_id: OrderId, state: i32, at: DateTime<Utc>) -> StateHistoryRecord {
		StateHistoryRecord {
			order_id,
			state: OrderState(state),
			previous_state: None,
			timestamp: at,
			changed_by: None,
			notes: None,
		}
	}

	#[test]
	fn test_synthesized_delivered_order_completes_every_step() {
		let order = Order::new(1, "c", "lamp").with_state(13);
		let timeline = synthesize(&order);

		assert_eq!(timeline.steps.len(), 6);
		assert_eq!(timeline.completed_steps(), 6);
		assert_eq!(timeline.steps[0].timestamp, Some(order.created_at));
		assert!(timeline.steps[1..].iter().all(|s| s.timestamp.is_none()));
	}

	#[test]
	fn test_synthesized_new_order_completes_first_step_only() {
		let order = Order::new(1, "c", "lamp");
		let timeline = synthesize(&order);

		assert_eq!(timeline.completed_steps(), 1);
		assert!(timeline.steps[0].completed);
		assert_eq!(timeline.source, TimelineSource::Synthesized);
	}

	#[test]
	fn test_synthesized_customs_threshold() {
		let at_customs = synthesize(&Order::new(1, "c", "lamp").with_state(10));
		let before_customs = synthesize(&Order::new(1, "c", "lamp").with_state(9));
		let customs = |t: &Timeline| t.steps.iter().find(|s| s.key == StepKey::Customs).map(|s| s.completed);

		assert_eq!(customs(&at_customs), Some(true));
		assert_eq!(customs(&before_customs), Some(false));
	}

	#[test]
	fn test_history_uses_earliest_record_per_step() {
		let order = Order::new(1, "c", "lamp").with_state(9);
		let t0 = order.created_at;
		let records = vec![
			record(1, 9, t0 + Duration::days(9)),
			record(1, 4, t0 + Duration::days(2)),
			record(1, 2, t0 + Duration::days(1)),
			// Duplicate state, later: ignored
			record(1, 4, t0 + Duration::days(3)),
			// Unrecognized state: ignored
			record(1, 42, t0 + Duration::days(4)),
		];

		let timeline = from_history(&order, records);
		let stamp = |key: StepKey| {
			timeline
				.steps
				.iter()
				.find(|s| s.key == key)
				.and_then(|s| s.timestamp)
		};

		assert_eq!(timeline.source, TimelineSource::History);
		assert_eq!(stamp(StepKey::Created), Some(t0));
		assert_eq!(stamp(StepKey::Processing), Some(t0 + Duration::days(2)));
		// First record at or past the shipped threshold is the state-9 one
		assert_eq!(stamp(StepKey::Shipped), Some(t0 + Duration::days(9)));
		assert_eq!(stamp(StepKey::InTransit), Some(t0 + Duration::days(9)));
		assert_eq!(stamp(StepKey::Customs), None);
		assert_eq!(timeline.completed_steps(), 4);
	}

	#[test]
	fn test_both_paths_share_step_order() {
		let order = Order::new(1, "c", "lamp").with_state(5);
		let history = from_history(&order, vec![record(1, 5, order.created_at)]);
		let synthesized = synthesize(&order);

		let keys = |t: &Timeline| t.steps.iter().map(|s| s.key).collect::<Vec<_>>();
		assert_eq!(keys(&history), keys(&synthesized));
		assert_eq!(keys(&history), StepKey::ALL.to_vec());
	}

	#[tokio::test]
	async fn test_build_timeline_paths() {
		let store = memory_store();
		let builder = TimelineBuilder::new(store.clone());

		assert!(matches!(
			builder.build_timeline(1).await,
			Err(TimelineError::NotFound(1))
		));

		let order = Order::new(1, "c", "lamp").with_state(13);
		store.put_order(order.clone()).await.unwrap();
		let timeline = builder.build_timeline(1).await.unwrap();
		assert_eq!(timeline.source, TimelineSource::Synthesized);
		assert_eq!(timeline.completed_steps(), 6);

		store
			.append_history(&record(1, 2, order.created_at + Duration::hours(1)))
			.await
			.unwrap();
		let timeline = builder.build_timeline(1).await.unwrap();
		assert_eq!(timeline.source, TimelineSource::History);
		assert_eq!(timeline.completed_steps(), 1);
	}
}
