//! State management for orders, boxes and containers.
//!
//! `transition` holds the pure legality rules; `order` applies them to stored
//! records through conditional writes.

pub mod order;
pub mod transition;

pub use order::{Applied, OrderStateMachine, TransitionError, TransitionRequest};
pub use transition::{can_link, can_transition};
