//! Realtime change propagation.
//!
//! Change events arrive from a [`ChangeFeed`], are filtered per subscriber by
//! the [`ChangeRouter`] and coalesced by the [`Debouncer`] into one refresh per
//! burst. The [`RealtimeHub`] ties the two together.

pub mod debounce;
pub mod feed;
pub mod hub;
pub mod router;
pub mod scope;

pub use debounce::{refresh_fn, Debouncer, RefreshFn};
pub use feed::{BusFeed, ChangeFeed, ChangeStream, FeedError};
pub use hub::RealtimeHub;
pub use router::ChangeRouter;
pub use scope::{Subscriber, ViewScope};
