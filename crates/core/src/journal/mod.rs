//! Journal entries: groups of transactions posted as a unit.
//!
//! ```text
//! draft ──post──▶ posted
//!   │
//!   └──cancel──▶ cancelled
//! ```

mod service;
mod types;

pub use service::{EntryTotals, JournalService};
pub use types::{JournalEntry, JournalEntryWithTransactions, JournalStatus, NewJournalEntry};
