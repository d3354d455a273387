//! Collection sync store
//!
//! [`SyncMachine`] holds the transition rules; [`CollectionSyncStore`] runs
//! them on a tokio task against a [`crate::ports::RemoteCollectionClient`].

mod machine;
mod store;

pub use machine::{
    CollectionSnapshot, Effect, FetchPurpose, FetchTicket, RefreshStatus, SyncMachine, SyncPhase,
};
pub use store::CollectionSyncStore;
