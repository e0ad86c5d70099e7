//! HTTP server for the freight API.

use crate::apis::{orders, transitions, views};
use axum::{
	extract::State,
	response::Json,
	routing::{get, post, put},
	Router,
};
use freight_config::ApiConfig;
use freight_core::FreightCore;
use serde_json::json;
use std::future::Future;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub core: FreightCore,
}

/// Builds the router with every route nested under `/api`.
pub fn router(core: FreightCore) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/health", get(handle_health))
				.route("/orders", put(orders::put_order))
				.route("/orders/{id}/tracking", get(orders::get_tracking))
				.route("/orders/{id}/placement", get(orders::get_placement))
				.route("/orders/{id}/timeline", get(orders::get_timeline))
				.route("/orders/{id}/history", get(orders::get_history))
				.route("/clients/{client_id}/orders", get(orders::get_client_orders))
				.route("/boxes", put(orders::put_box))
				.route("/containers", put(orders::put_container))
				.route("/notifications", put(orders::put_notification))
				.route("/changes", post(orders::ingest_change))
				.route("/transitions", post(transitions::apply_transition))
				.route("/transitions/check", post(transitions::check_transition))
				.route("/links/order-box", post(transitions::link_order_to_box))
				.route("/links/box-container", post(transitions::link_box_to_container))
				.route("/views/{role}/{identity}", get(views::get_views))
				.route("/events", get(views::stream_events)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(AppState { core })
}

/// Serves the API until `shutdown` completes.
pub async fn start_server<F>(
	api_config: ApiConfig,
	core: FreightCore,
	shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
	F: Future<Output = ()> + Send + 'static,
{
	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!(address = %bind_address, "Freight API server starting");

	axum::serve(listener, router(core))
		.with_graceful_shutdown(shutdown)
		.await?;

	Ok(())
}

/// GET /api/health
async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
	Json(json!({
		"status": "ok",
		"service": state.core.config().service.id,
		"subscribers": state.core.hub().subscriber_count(),
		"cached_views": state.core.views().len(),
	}))
}
