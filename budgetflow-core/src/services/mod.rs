//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. The sync store is
//! the building block; the fan-out, composer and session layer it into one
//! user's dashboard.

pub mod composer;
mod demo;
pub mod fanout;
pub mod logging;
pub mod session;
pub mod status;
pub mod sync;

pub use composer::{compose_view, AccountView, AccountViewComposer};
pub use demo::DemoService;
pub use fanout::AccountCollections;
pub use logging::init_logging;
pub use session::LedgerSession;
pub use status::{get_status, AccountSummary, DateRange, StatusSummary};
pub use sync::{CollectionSnapshot, CollectionSyncStore, SyncMachine, SyncPhase};
