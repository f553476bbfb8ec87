//! Core ledger logic for Tally.
//!
//! This crate contains the double-entry domain with ZERO web or database
//! dependencies. Domain types, validation rules and report derivations are
//! pure; persistence goes through the [`store::LedgerStore`] port.
//!
//! # Modules
//!
//! - `accounts` - Chart of accounts
//! - `ledger` - Double-entry transactions, numbering and balances
//! - `journal` - Journal entries and the posting lifecycle
//! - `fiscal` - Financial periods and closing
//! - `budget` - Budget tracking and variance analysis
//! - `reports` - Trial balance, income statement and balance sheet
//! - `cache` - Report cache port
//! - `store` - Storage port and in-memory backend
//! - `engine` - The `GeneralLedger` facade

pub mod accounts;
pub mod budget;
pub mod cache;
pub mod engine;
pub mod error;
pub mod fiscal;
pub mod journal;
pub mod ledger;
pub mod reports;
pub mod store;

pub use engine::GeneralLedger;
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use store::{LedgerStore, MemoryLedgerStore};
