//! State machine applying validated transitions and links.
//!
//! Every write is a single conditional update: the stored state must still be
//! the one the caller validated against. A lost race is reported, never
//! retried here.

use super::transition::{can_link, can_transition};
use crate::store::{RecordStore, StoreError};
use freight_storage::CasOutcome;
use freight_types::{
	BoxId, ContainerId, DenyReason, EntityKind, Link, OrderId, OrderState, Role,
	StateHistoryRecord,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while applying a transition or link.
#[derive(Debug, Error)]
pub enum TransitionError {
	#[error("{kind} {id} not found")]
	NotFound { kind: EntityKind, id: i64 },
	#[error("Transition denied: {0}")]
	Denied(DenyReason),
	/// The stored state moved between read and write; refresh and retry.
	#[error("Stale write: expected state {expected}, found {current}")]
	StaleWrite { expected: i32, current: i32 },
	#[error("Storage error: {0}")]
	Storage(String),
}

impl TransitionError {
	fn from_store(kind: EntityKind, id: i64) -> impl FnOnce(StoreError) -> Self {
		move |e| match e {
			StoreError::NotFound { .. } => TransitionError::NotFound { kind, id },
			other => TransitionError::Storage(other.to_string()),
		}
	}
}

/// A requested state change, carrying the state the caller last saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
	pub kind: EntityKind,
	pub id: i64,
	pub expected: i32,
	pub to: i32,
	pub role: Role,
	/// Identity recorded in the order history.
	#[serde(default)]
	pub actor: Option<String>,
	#[serde(default)]
	pub notes: Option<String>,
}

/// A transition that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applied {
	pub kind: EntityKind,
	pub id: i64,
	pub from: i32,
	pub to: i32,
}

/// Manages state transitions and containment links.
pub struct OrderStateMachine {
	store: Arc<RecordStore>,
}

/// Classifies a rejected conditional write.
///
/// When the stored state has already reached or passed the target, the
/// request was overtaken and is reported as `StaleState`. Otherwise the write
/// may still succeed against the fresh state.
fn rejection(expected: i32, current: i32, to: i32) -> TransitionError {
	if current >= to {
		TransitionError::Denied(DenyReason::StaleState)
	} else {
		TransitionError::StaleWrite { expected, current }
	}
}

impl OrderStateMachine {
	pub fn new(store: Arc<RecordStore>) -> Self {
		Self { store }
	}

	/// Validates and applies a transition as one compare-and-set.
	#[instrument(skip_all, fields(kind = %request.kind, id = request.id, to = request.to, role = %request.role))]
	pub async fn transition(&self, request: TransitionRequest) -> Result<Applied, TransitionError> {
		let TransitionRequest {
			kind,
			id,
			expected,
			to,
			role,
			actor,
			notes,
		} = request;

		can_transition(kind, expected, to, role)
			.into_result()
			.map_err(TransitionError::Denied)?;

		let current = match kind {
			EntityKind::Order => {
				let outcome = self
					.store
					.update_order_if(id, |order| {
						(order.state.value() == expected).then(|| {
							let mut next = order.clone();
							next.state = OrderState(to);
							next
						})
					})
					.await
					.map_err(TransitionError::from_store(kind, id))?;
				match outcome {
					CasOutcome::Applied { after, .. } => {
						let record = StateHistoryRecord {
							order_id: id,
							state: after.state,
							previous_state: Some(OrderState(expected)),
							timestamp: after.updated_at,
							changed_by: actor,
							notes,
						};
						// The state change already landed; a missing history row
						// only degrades the timeline.
						if let Err(e) = self.store.append_history(&record).await {
							tracing::warn!(order_id = id, error = %e, "Failed to append state history");
						}
						None
					},
					CasOutcome::Rejected { current } => Some(current.state.value()),
				}
			},
			EntityKind::Box => {
				let outcome = self
					.store
					.update_box_if(id, |shipping_box| {
						(shipping_box.state == expected).then(|| {
							let mut next = shipping_box.clone();
							next.state = to;
							next
						})
					})
					.await
					.map_err(TransitionError::from_store(kind, id))?;
				match outcome {
					CasOutcome::Applied { .. } => None,
					CasOutcome::Rejected { current } => Some(current.state),
				}
			},
			EntityKind::Container => {
				let outcome = self
					.store
					.update_container_if(id, |container| {
						(container.state == expected).then(|| {
							let mut next = container.clone();
							next.state = to;
							next
						})
					})
					.await
					.map_err(TransitionError::from_store(kind, id))?;
				match outcome {
					CasOutcome::Applied { .. } => None,
					CasOutcome::Rejected { current } => Some(current.state),
				}
			},
		};

		if let Some(current) = current {
			tracing::info!(expected, current, "Conditional write rejected");
			return Err(rejection(expected, current, to));
		}

		tracing::info!(from = expected, "Transition applied");
		Ok(Applied {
			kind,
			id,
			from: expected,
			to,
		})
	}

	/// Packs an order into a box.
	///
	/// `expected` is the order state the caller validated against; the link is
	/// written only if the order is still in that state.
	#[instrument(skip_all, fields(order_id = order_id, box_id = box_id, role = %role))]
	pub async fn link_order_to_box(
		&self,
		order_id: OrderId,
		box_id: BoxId,
		expected: i32,
		role: Role,
	) -> Result<(), TransitionError> {
		can_link(Link::OrderToBox, expected, role)
			.into_result()
			.map_err(TransitionError::Denied)?;
		let exists = self
			.store
			.get_box(box_id)
			.await
			.map_err(|e| TransitionError::Storage(e.to_string()))?
			.is_some();
		if !exists {
			return Err(TransitionError::NotFound {
				kind: EntityKind::Box,
				id: box_id,
			});
		}

		let outcome = self
			.store
			.update_order_if(order_id, |order| {
				(order.state.value() == expected).then(|| {
					let mut next = order.clone();
					next.box_id = Some(box_id);
					next
				})
			})
			.await
			.map_err(TransitionError::from_store(EntityKind::Order, order_id))?;

		match outcome {
			CasOutcome::Applied { .. } => {
				tracing::info!("Order packed");
				Ok(())
			},
			CasOutcome::Rejected { current } => Err(TransitionError::StaleWrite {
				expected,
				current: current.state.value(),
			}),
		}
	}

	/// Loads a box onto a container, guarded the same way as
	/// [`Self::link_order_to_box`].
	#[instrument(skip_all, fields(box_id = box_id, container_id = container_id, role = %role))]
	pub async fn link_box_to_container(
		&self,
		box_id: BoxId,
		container_id: ContainerId,
		expected: i32,
		role: Role,
	) -> Result<(), TransitionError> {
		can_link(Link::BoxToContainer, expected, role)
			.into_result()
			.map_err(TransitionError::Denied)?;
		let exists = self
			.store
			.get_container(container_id)
			.await
			.map_err(|e| TransitionError::Storage(e.to_string()))?
			.is_some();
		if !exists {
			return Err(TransitionError::NotFound {
				kind: EntityKind::Container,
				id: container_id,
			});
		}

		let outcome = self
			.store
			.update_box_if(box_id, |shipping_box| {
				(shipping_box.state == expected).then(|| {
					let mut next = shipping_box.clone();
					next.container_id = Some(container_id);
					next
				})
			})
			.await
			.map_err(TransitionError::from_store(EntityKind::Box, box_id))?;

		match outcome {
			CasOutcome::Applied { .. } => {
				tracing::info!("Box loaded");
				Ok(())
			},
			CasOutcome::Rejected { current } => Err(TransitionError::StaleWrite {
				expected,
				current: current.state,
			}),
		}
	}
}
