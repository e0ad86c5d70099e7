//! Realtime engine driving the change feed into the hub.
//!
//! The engine owns the feed connection. It dispatches every event to the hub,
//! resyncs every subscriber whenever events may have been lost (a reported
//! gap or a reconnect), and retries dropped connections with exponential
//! backoff until the configured deadline passes.

pub mod event_bus;
pub mod lifecycle;

use crate::realtime::{ChangeFeed, ChangeStream, FeedError, RealtimeHub};
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use freight_config::ReconnectConfig;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Errors that end the engine loop.
#[derive(Debug, Error)]
pub enum EngineError {
	/// The feed stayed unreachable past the reconnect deadline. Subscribers
	/// can no longer be kept current.
	#[error("Change feed lost: {0}")]
	TransportGap(String),
}

/// Why a connected stream stopped being read.
enum StreamEnd {
	Shutdown,
	Dropped(FeedError),
}

pub struct RealtimeEngine {
	hub: Arc<RealtimeHub>,
	feed: Arc<dyn ChangeFeed>,
	reconnect: ReconnectConfig,
}

impl RealtimeEngine {
	pub fn new(hub: Arc<RealtimeHub>, feed: Arc<dyn ChangeFeed>, reconnect: ReconnectConfig) -> Self {
		Self {
			hub,
			feed,
			reconnect,
		}
	}

	pub fn hub(&self) -> &Arc<RealtimeHub> {
		&self.hub
	}

	/// Runs until `shutdown` completes or the feed is lost for good.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<(), EngineError>
	where
		F: Future<Output = ()>,
	{
		tokio::pin!(shutdown);
		let mut reconnecting = false;

		loop {
			let stream = tokio::select! {
				stream = self.connect() => stream?,
				_ = &mut shutdown => return Ok(()),
			};
			if reconnecting {
				// Whatever happened while disconnected is unknown.
				self.hub.resync_all();
			}
			tracing::info!(component = "realtime", reconnecting, "Change feed connected");

			match self.pump(stream, &mut shutdown).await {
				StreamEnd::Shutdown => return Ok(()),
				StreamEnd::Dropped(e) => {
					tracing::warn!(component = "realtime", error = %e, "Change feed dropped");
					reconnecting = true;
				},
			}
		}
	}

	async fn pump<S>(&self, mut stream: ChangeStream, shutdown: &mut S) -> StreamEnd
	where
		S: Future<Output = ()> + Unpin,
	{
		loop {
			tokio::select! {
				item = stream.next() => match item {
					Some(Ok(event)) => {
						self.hub.dispatch(&event);
					},
					Some(Err(FeedError::Gap(skipped))) => {
						tracing::warn!(component = "realtime", skipped, "Change feed gap");
						self.hub.resync_all();
					},
					Some(Err(e)) => return StreamEnd::Dropped(e),
					None => return StreamEnd::Dropped(FeedError::Disconnected),
				},
				_ = &mut *shutdown => return StreamEnd::Shutdown,
			}
		}
	}

	async fn connect(&self) -> Result<ChangeStream, EngineError> {
		let deadline = Duration::from_secs(self.reconnect.max_elapsed_seconds);
		let started = Instant::now();
		let mut backoff = self.backoff();

		loop {
			match self.feed.connect().await {
				Ok(stream) => return Ok(stream),
				Err(e) => {
					if started.elapsed() >= deadline {
						tracing::error!(component = "realtime", error = %e, "Giving up on change feed");
						return Err(EngineError::TransportGap(e.to_string()));
					}
					let delay = backoff
						.next_backoff()
						.unwrap_or(Duration::from_millis(self.reconnect.max_ms));
					tracing::warn!(
						component = "realtime",
						error = %e,
						retry_in_ms = delay.as_millis() as u64,
						"Change feed connect failed"
					);
					tokio::time::sleep(delay).await;
				},
			}
		}
	}

	/// Interval schedule only; the deadline is tracked on the tokio clock.
	fn backoff(&self) -> ExponentialBackoff {
		ExponentialBackoffBuilder::new()
			.with_initial_interval(Duration::from_millis(self.reconnect.initial_ms))
			.with_max_interval(Duration::from_millis(self.reconnect.max_ms))
			.with_multiplier(self.reconnect.multiplier)
			.with_max_elapsed_time(None)
			.build()
	}
}
