//! Transition vocabulary shared by the validator and its callers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::events::Table;

/// Entity whose state space a transition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
	Order,
	Box,
	Container,
}

impl EntityKind {
	pub fn table(&self) -> Table {
		match self {
			EntityKind::Order => Table::Orders,
			EntityKind::Box => Table::Boxes,
			EntityKind::Container => Table::Containers,
		}
	}
}

impl fmt::Display for EntityKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EntityKind::Order => write!(f, "order"),
			EntityKind::Box => write!(f, "box"),
			EntityKind::Container => write!(f, "container"),
		}
	}
}

/// Physical containment links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
	/// Packing an order into a box.
	OrderToBox,
	/// Loading a box onto a container.
	BoxToContainer,
}

/// Why a transition was refused.
///
/// The variants map to distinct user actions: `StaleState` means refresh and
/// retry, the others mean the action is not allowed as requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
	/// Target state does not strictly increase the current state.
	NonMonotonic,
	/// The entity already moved past the state this action starts from.
	StaleState,
	/// The entity has not reached the state this action requires.
	InsufficientState,
	/// The role never originates this transition.
	RoleNotPermitted,
}

impl DenyReason {
	/// Whether the caller should reload current state and try again.
	pub fn is_retryable(&self) -> bool {
		matches!(self, DenyReason::StaleState)
	}
}

impl fmt::Display for DenyReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DenyReason::NonMonotonic => write!(f, "state may only move forward"),
			DenyReason::StaleState => {
				write!(f, "state changed since it was loaded; refresh and retry")
			},
			DenyReason::InsufficientState => {
				write!(f, "required preceding state has not been reached")
			},
			DenyReason::RoleNotPermitted => write!(f, "role may not perform this transition"),
		}
	}
}

/// Outcome of checking a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum TransitionDecision {
	Allowed,
	Denied(DenyReason),
}

impl TransitionDecision {
	pub fn is_allowed(&self) -> bool {
		matches!(self, TransitionDecision::Allowed)
	}

	pub fn into_result(self) -> Result<(), DenyReason> {
		match self {
			TransitionDecision::Allowed => Ok(()),
			TransitionDecision::Denied(reason) => Err(reason),
		}
	}
}
