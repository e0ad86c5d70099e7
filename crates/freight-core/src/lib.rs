//! Core of the freight order lifecycle.
//!
//! This crate validates and applies state transitions, resolves where an
//! order physically is, projects progress timelines, and keeps role-scoped
//! live views fresh by routing change events to debounced subscribers.

use freight_config::Config;
use std::sync::Arc;

pub mod builder;
pub mod cache;
pub mod engine;
pub mod realtime;
pub mod state;
pub mod store;
pub mod timeline;
pub mod tracking;
pub mod views;

pub use builder::{BuilderError, CoreBuilder, CoreFactories};
pub use cache::{view_path, PathCache};
pub use engine::{event_bus::EventBus, EngineError, RealtimeEngine};
pub use realtime::{RealtimeHub, Subscriber, ViewScope};
pub use state::{OrderStateMachine, TransitionError, TransitionRequest};
pub use store::{RecordStore, StoreError};
pub use timeline::{TimelineBuilder, TimelineError};
pub use tracking::{TrackingError, TrackingResolver};
pub use views::ViewSnapshot;

/// Every component of a running core, wired to one record store.
///
/// Cheap to clone; all components are shared.
#[derive(Clone)]
pub struct FreightCore {
	pub(crate) config: Config,
	pub(crate) store: Arc<RecordStore>,
	pub(crate) state_machine: Arc<OrderStateMachine>,
	pub(crate) tracking: Arc<TrackingResolver>,
	pub(crate) timeline: Arc<TimelineBuilder>,
	pub(crate) hub: Arc<RealtimeHub>,
	pub(crate) engine: Arc<RealtimeEngine>,
	/// Latest view snapshots per subscriber path.
	pub(crate) views: PathCache<Vec<ViewSnapshot>>,
}

impl FreightCore {
	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn store(&self) -> &Arc<RecordStore> {
		&self.store
	}

	pub fn state_machine(&self) -> &Arc<OrderStateMachine> {
		&self.state_machine
	}

	pub fn tracking(&self) -> &Arc<TrackingResolver> {
		&self.tracking
	}

	pub fn timeline(&self) -> &Arc<TimelineBuilder> {
		&self.timeline
	}

	pub fn hub(&self) -> &Arc<RealtimeHub> {
		&self.hub
	}

	pub fn engine(&self) -> &Arc<RealtimeEngine> {
		&self.engine
	}

	pub fn views(&self) -> &PathCache<Vec<ViewSnapshot>> {
		&self.views
	}
}
