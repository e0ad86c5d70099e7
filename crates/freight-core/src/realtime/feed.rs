//! Sources of change events.

use crate::engine::event_bus::EventBus;
use async_trait::async_trait;
use freight_types::ChangeEvent;
use futures::stream::{BoxStream, StreamExt};
use thiserror::Error;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
	/// Events were lost; consumers can no longer trust incremental state.
	#[error("Change feed skipped {0} events")]
	Gap(u64),
	#[error("Change feed disconnected")]
	Disconnected,
	#[error("Failed to connect to change feed: {0}")]
	Connect(String),
}

pub type ChangeStream = BoxStream<'static, Result<ChangeEvent, FeedError>>;

/// A transport delivering change events in commit order.
///
/// A stream that ends is treated as a disconnect. Implementations report lost
/// events as [`FeedError::Gap`] and keep the stream open if they can.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
	async fn connect(&self) -> Result<ChangeStream, FeedError>;
}

/// In-process feed backed by the record store's event bus.
pub struct BusFeed {
	bus: EventBus,
}

impl BusFeed {
	pub fn new(bus: EventBus) -> Self {
		Self { bus }
	}
}

#[async_trait]
impl ChangeFeed for BusFeed {
	async fn connect(&self) -> Result<ChangeStream, FeedError> {
		let stream = BroadcastStream::new(self.bus.subscribe()).map(|item| {
			item.map_err(|BroadcastStreamRecvError::Lagged(skipped)| FeedError::Gap(skipped))
		});
		Ok(stream.boxed())
	}
}
