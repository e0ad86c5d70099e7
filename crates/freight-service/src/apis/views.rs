//! Role-scoped view snapshots and their live refresh stream.

use super::ApiError;
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	response::{
		sse::{Event, KeepAlive, Sse},
		Json,
	},
};
use freight_core::realtime::{refresh_fn, RealtimeHub, Subscriber};
use freight_core::{view_path, ViewSnapshot};
use freight_types::Role;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

/// Snapshots buffered per stream before refreshes wait on the client.
const STREAM_BUFFER: usize = 8;

fn parse_role(role: &str) -> Result<Role, ApiError> {
	role.parse()
		.map_err(|e: freight_types::UnknownRole| ApiError::BadRequest(e.to_string()))
}

/// GET /api/views/{role}/{identity}
///
/// Reads every default view of the role fresh and records it in the view
/// cache.
pub async fn get_views(
	Path((role, identity)): Path<(String, String)>,
	State(state): State<AppState>,
) -> Result<Json<Vec<ViewSnapshot>>, ApiError> {
	let role = parse_role(&role)?;
	let subscriber = Subscriber::for_role("snapshot", role, identity.as_str());
	let snapshots = ViewSnapshot::load_for(state.core.store(), &subscriber).await?;
	state
		.core
		.views()
		.insert(view_path(role, &identity), snapshots.clone());
	Ok(Json(snapshots))
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
	pub role: String,
	pub identity: String,
}

/// Deregisters a stream's subscriber when the client goes away.
struct Unsubscribe {
	hub: Arc<RealtimeHub>,
	id: String,
}

impl Drop for Unsubscribe {
	fn drop(&mut self) {
		self.hub.unsubscribe(&self.id);
	}
}

/// GET /api/events?role=..&identity=..
///
/// Server-sent `refresh` events, each carrying the subscriber's full set of
/// view snapshots. The last cached snapshot, if any, is sent first; a fresh
/// one follows after the debounce window and then one per burst of relevant
/// changes.
pub async fn stream_events(
	State(state): State<AppState>,
	Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
	let role = parse_role(&query.role)?;
	let id = Uuid::new_v4().to_string();
	let subscriber = Subscriber::for_role(id.clone(), role, query.identity.as_str());
	let path = view_path(role, &query.identity);
	let (tx, rx) = mpsc::channel::<Vec<ViewSnapshot>>(STREAM_BUFFER);

	if let Some(cached) = state.core.views().get(&path) {
		tx.try_send(cached).ok();
	}

	let refresh = refresh_fn({
		let store = state.core.store().clone();
		let views = state.core.views().clone();
		let subscriber = subscriber.clone();
		move || {
			let (store, views, subscriber, tx, path) = (
				store.clone(),
				views.clone(),
				subscriber.clone(),
				tx.clone(),
				path.clone(),
			);
			async move {
				match ViewSnapshot::load_for(&store, &subscriber).await {
					Ok(snapshots) => {
						views.insert(path, snapshots.clone());
						if tx.send(snapshots).await.is_err() {
							tracing::debug!(subscriber = %subscriber.id, "Stream closed before refresh");
						}
					},
					Err(e) => {
						tracing::warn!(subscriber = %subscriber.id, error = %e, "Failed to refresh views");
					},
				}
			}
		}
	});

	let hub = state.core.hub().clone();
	hub.subscribe(subscriber, refresh);
	hub.refresh(&id);
	let guard = Unsubscribe { hub, id };

	let stream = ReceiverStream::new(rx).map(move |snapshots| {
		let _ = &guard;
		let event = Event::default()
			.event("refresh")
			.json_data(&snapshots)
			.unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
		Ok(event)
	});

	Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
