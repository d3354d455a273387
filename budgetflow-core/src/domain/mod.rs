//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation and aggregation logic - no I/O or async.

mod account;
pub mod document;
mod record;
pub mod result;
pub mod scope;
pub mod summary;

pub use account::BankAccount;
pub use document::{Document, Entity};
pub use record::{Expense, FinancialRecord, Income};
pub use scope::{CollectionKind, CollectionPath, ResolvedScope, Scope};
pub use summary::{CategoryTotal, FinancialSummary, MonthlyTotals};
