//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - In-process document store for the RemoteCollectionClient port
//! - JSON file persistence for the in-process store
//! - Demo data generator for onboarding and testing

pub mod demo;
pub mod json_file;
pub mod memory;
