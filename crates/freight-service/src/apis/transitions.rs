//! State transitions and physical links.

use super::ApiError;
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use freight_core::state::{can_transition, Applied, TransitionRequest};
use freight_types::{BoxId, ContainerId, EntityKind, OrderId, Role, TransitionDecision};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
	pub kind: EntityKind,
	pub from: i32,
	pub to: i32,
	pub role: Role,
}

/// POST /api/transitions/check
///
/// Evaluates a transition without applying it.
pub async fn check_transition(Json(request): Json<CheckRequest>) -> Json<TransitionDecision> {
	Json(can_transition(
		request.kind,
		request.from,
		request.to,
		request.role,
	))
}

/// POST /api/transitions
pub async fn apply_transition(
	State(state): State<AppState>,
	Json(request): Json<TransitionRequest>,
) -> Result<Json<Applied>, ApiError> {
	Ok(Json(state.core.state_machine().transition(request).await?))
}

#[derive(Debug, Deserialize)]
pub struct OrderBoxLink {
	pub order_id: OrderId,
	pub box_id: BoxId,
	/// Order state the caller validated against.
	pub expected: i32,
	pub role: Role,
}

/// POST /api/links/order-box
pub async fn link_order_to_box(
	State(state): State<AppState>,
	Json(link): Json<OrderBoxLink>,
) -> Result<StatusCode, ApiError> {
	state
		.core
		.state_machine()
		.link_order_to_box(link.order_id, link.box_id, link.expected, link.role)
		.await?;
	Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct BoxContainerLink {
	pub box_id: BoxId,
	pub container_id: ContainerId,
	/// Box state the caller validated against.
	pub expected: i32,
	pub role: Role,
}

/// POST /api/links/box-container
pub async fn link_box_to_container(
	State(state): State<AppState>,
	Json(link): Json<BoxContainerLink>,
) -> Result<StatusCode, ApiError> {
	state
		.core
		.state_machine()
		.link_box_to_container(link.box_id, link.container_id, link.expected, link.role)
		.await?;
	Ok(StatusCode::NO_CONTENT)
}
