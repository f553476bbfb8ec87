//! Ledger transaction store logic.
//!
//! - Transaction types and query filters
//! - Number generation
//! - Business rule validation
//! - Polarity-aware balance calculation

pub mod balance;
pub mod numbering;
pub mod types;
pub mod validation;

pub use balance::{AccountBalance, aggregate_movements, balance_of};
pub use numbering::{NumberGenerator, NumberKind};
pub use types::{
    DateWindow, DocumentKind, DocumentReference, LedgerTransaction, Movement, NewTransaction,
    TransactionFilter, TransactionPatch, TransactionStatus, TransactionType,
};
pub use validation::{AMOUNT_SCALE, MAX_AMOUNT, TransactionValidator, ensure_storable_amount};
