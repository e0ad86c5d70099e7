//! In-process change notification bus.
//!
//! Every write made through the record store is published here. Receivers that
//! fall more than the channel capacity behind lose events and see
//! `RecvError::Lagged`, which the realtime feed turns into a resync.

use freight_types::ChangeEvent;
use tokio::sync::broadcast;

/// Broadcast channel of [`ChangeEvent`]s shared by writers and listeners.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per receiver.
	///
	/// A zero capacity is raised to one.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to every current receiver.
	///
	/// Fails only when nobody is listening, which writers ignore.
	pub fn publish(
		&self,
		event: ChangeEvent,
	) -> Result<usize, broadcast::error::SendError<ChangeEvent>> {
		self.sender.send(event)
	}

	pub fn receiver_count(&self) -> usize {
		self.sender.receiver_count()
	}
}
