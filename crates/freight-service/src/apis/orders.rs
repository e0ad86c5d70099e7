//! Record reads and writes: orders, boxes, containers, notifications.

use super::ApiError;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::Json,
};
use freight_core::tracking::{OrderTracking, Placement};
use freight_types::{
	ChangeEvent, Container, Notification, Order, OrderId, RawChange, ShippingBox,
	StateHistoryRecord, Timeline, TrackingInfo,
};

/// GET /api/orders/{id}/tracking
///
/// `null` when the order is not yet in a container.
pub async fn get_tracking(
	Path(id): Path<OrderId>,
	State(state): State<AppState>,
) -> Result<Json<Option<TrackingInfo>>, ApiError> {
	Ok(Json(state.core.tracking().resolve_tracking(id).await?))
}

/// GET /api/orders/{id}/placement
pub async fn get_placement(
	Path(id): Path<OrderId>,
	State(state): State<AppState>,
) -> Result<Json<Placement>, ApiError> {
	Ok(Json(state.core.tracking().locate(id).await?))
}

/// GET /api/orders/{id}/timeline
pub async fn get_timeline(
	Path(id): Path<OrderId>,
	State(state): State<AppState>,
) -> Result<Json<Timeline>, ApiError> {
	Ok(Json(state.core.timeline().build_timeline(id).await?))
}

/// GET /api/orders/{id}/history
pub async fn get_history(
	Path(id): Path<OrderId>,
	State(state): State<AppState>,
) -> Result<Json<Vec<StateHistoryRecord>>, ApiError> {
	let store = state.core.store();
	if store.get_order(id).await?.is_none() {
		return Err(ApiError::NotFound(format!("Order {} not found", id)));
	}
	Ok(Json(store.history(id).await?))
}

/// GET /api/clients/{client_id}/orders
pub async fn get_client_orders(
	Path(client_id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Vec<OrderTracking>>, ApiError> {
	Ok(Json(
		state.core.tracking().resolve_for_client(&client_id).await?,
	))
}

/// PUT /api/orders
///
/// Creates an order. An existing id is a conflict; later changes go through
/// `/api/transitions` and the link endpoints.
pub async fn put_order(
	State(state): State<AppState>,
	Json(order): Json<Order>,
) -> Result<StatusCode, ApiError> {
	state.core.store().create_order(order).await?;
	Ok(StatusCode::CREATED)
}

/// PUT /api/boxes
pub async fn put_box(
	State(state): State<AppState>,
	Json(shipping_box): Json<ShippingBox>,
) -> Result<StatusCode, ApiError> {
	state.core.store().create_box(shipping_box).await?;
	Ok(StatusCode::CREATED)
}

/// PUT /api/containers
pub async fn put_container(
	State(state): State<AppState>,
	Json(container): Json<Container>,
) -> Result<StatusCode, ApiError> {
	state.core.store().create_container(container).await?;
	Ok(StatusCode::CREATED)
}

/// PUT /api/notifications
pub async fn put_notification(
	State(state): State<AppState>,
	Json(notification): Json<Notification>,
) -> Result<StatusCode, ApiError> {
	state.core.store().put_notification(notification).await?;
	Ok(StatusCode::NO_CONTENT)
}

/// POST /api/changes
///
/// Ingests a row change committed by an external writer. The row is mirrored
/// into the record store, which publishes it to live subscribers. Changes to
/// unobserved tables are accepted and dropped.
pub async fn ingest_change(
	State(state): State<AppState>,
	Json(raw): Json<RawChange>,
) -> Result<StatusCode, ApiError> {
	let table = raw.table.clone();
	match ChangeEvent::decode(raw).map_err(|e| ApiError::BadRequest(e.to_string()))? {
		Some(event) => {
			state.core.store().apply_change(event).await?;
		},
		None => {
			tracing::debug!(table = %table, "Skipping change on unobserved table");
		},
	}
	Ok(StatusCode::ACCEPTED)
}
