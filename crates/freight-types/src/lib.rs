//! Shared data types for the freight lifecycle core.
//!
//! Pure data only: the order state taxonomy, operator roles, persisted record
//! shapes, change notifications, transition vocabulary and timeline steps.
//! Nothing in this crate performs I/O.

/// Change notifications and typed row snapshots.
pub mod events;
/// Orders and their state history.
pub mod order;
/// Backend registry trait.
pub mod registry;
/// Operator roles and name normalization.
pub mod role;
/// Boxes, containers and tracking metadata.
pub mod shipment;
/// Order state taxonomy.
pub mod state;
/// Storage namespaces.
pub mod storage;
/// Timeline projection types.
pub mod timeline;
/// Transition vocabulary.
pub mod transition;
/// Backend configuration schemas.
pub mod validation;

pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use role::{Role, UnknownRole};
pub use shipment::*;
pub use state::*;
pub use storage::StorageKey;
pub use timeline::*;
pub use transition::*;
pub use validation::*;
