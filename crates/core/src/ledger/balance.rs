//! Account balance calculations.
//!
//! ```text
//! balance = opening_balance + debit_sum  - credit_sum    (Asset, Expense)
//! balance = opening_balance + credit_sum - debit_sum     (Liability, Equity, Revenue)
//! ```
//!
//! Sums cover every transaction of the tenant in the window, whatever its status.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, CurrencyCode};

use super::types::{DateWindow, LedgerTransaction, Movement};
use crate::accounts::{Account, AccountType};

/// Account balance at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// The account ID.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Date the balance was taken at; `None` means all history.
    pub as_of: Option<NaiveDate>,
    /// Opening balance.
    pub opening_balance: Decimal,
    /// Total debit amount.
    pub debit_total: Decimal,
    /// Total credit amount.
    pub credit_total: Decimal,
    /// Net balance in the account's normal direction.
    pub balance: Decimal,
    /// Currency code.
    pub currency: CurrencyCode,
}

impl AccountBalance {
    /// Computes the balance of an account from its movement.
    #[must_use]
    pub fn compute(account: &Account, movement: Movement, as_of: Option<NaiveDate>) -> Self {
        Self {
            account_id: account.id,
            code: account.code.clone(),
            name: account.name.clone(),
            account_type: account.account_type,
            as_of,
            opening_balance: account.opening_balance,
            debit_total: movement.debit,
            credit_total: movement.credit,
            balance: balance_of(account, movement),
            currency: account.currency,
        }
    }
}

/// Opening balance plus the polarity-adjusted movement.
#[must_use]
pub fn balance_of(account: &Account, movement: Movement) -> Decimal {
    account.opening_balance
        + account
            .normal_balance()
            .signed_change(movement.debit, movement.credit)
}

/// Sums debit and credit sides per account over the window.
pub fn aggregate_movements<'a>(
    transactions: impl IntoIterator<Item = &'a LedgerTransaction>,
    window: DateWindow,
) -> HashMap<AccountId, Movement> {
    let mut movements: HashMap<AccountId, Movement> = HashMap::new();
    for txn in transactions {
        if !window.contains(txn.transaction_date) {
            continue;
        }
        movements
            .entry(txn.debit_account_id)
            .or_default()
            .add_debit(txn.amount);
        movements
            .entry(txn.credit_account_id)
            .or_default()
            .add_credit(txn.amount);
    }
    movements
}
