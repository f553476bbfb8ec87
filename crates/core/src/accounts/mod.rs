//! Chart of accounts.
//!
//! Accounts are the leaves every other ledger record points at. Their
//! `account_type` fixes the polarity used by every balance computation.

mod service;
mod types;

pub use service::AccountService;
pub use types::{
    Account, AccountCategory, AccountFilter, AccountPatch, AccountReferences, AccountType,
    NewAccount, NormalBalance,
};
