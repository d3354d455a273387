//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The sync layer
//! depends only on these traits, not on a concrete document store.

mod remote;

pub use remote::{RemoteCollectionClient, SnapshotEvent, Subscription};
