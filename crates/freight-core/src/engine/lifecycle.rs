//! Lifecycle management for the realtime engine.

use super::{EngineError, RealtimeEngine};

impl RealtimeEngine {
	/// Performs any initialization required before running.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		tracing::info!(
			subscribers = self.hub.subscriber_count(),
			"Initializing realtime engine"
		);
		Ok(())
	}

	/// Drops every subscriber so no refresh fires after shutdown.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down realtime engine");
		self.hub.clear();
		Ok(())
	}
}
