//! Report data types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::AccountId;

use crate::accounts::AccountType;
use crate::fiscal::PeriodSnapshot;
use crate::ledger::AccountBalance;

/// One trial balance row. At most one of the two columns is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceLine {
    /// Account ID.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Balance shown on the debit side.
    pub debit_balance: Decimal,
    /// Balance shown on the credit side.
    pub credit_balance: Decimal,
}

/// Trial balance report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceReport {
    /// As of date.
    pub as_of: NaiveDate,
    /// One row per account, ordered by code.
    pub lines: Vec<TrialBalanceLine>,
    /// Total debit column.
    pub total_debit: Decimal,
    /// Total credit column.
    pub total_credit: Decimal,
    /// Whether debits equal credits.
    pub is_balanced: bool,
}

/// Income statement row: the account's flow over the period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeStatementLine {
    /// Account ID.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Revenue earned or expense incurred in the period.
    pub amount: Decimal,
}

/// Income statement section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeStatementSection {
    /// Section total.
    pub total: Decimal,
    /// Accounts in this section.
    pub accounts: Vec<IncomeStatementLine>,
}

/// Income statement report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeStatementReport {
    /// Period start date, inclusive.
    pub period_start: NaiveDate,
    /// Period end date, inclusive.
    pub period_end: NaiveDate,
    /// Revenue section.
    pub revenue: IncomeStatementSection,
    /// Expense section.
    pub expenses: IncomeStatementSection,
    /// Revenue minus expenses.
    pub net_income: Decimal,
}

impl IncomeStatementReport {
    /// Totals captured when a period closes.
    #[must_use]
    pub fn snapshot(&self) -> PeriodSnapshot {
        PeriodSnapshot {
            total_revenue: self.revenue.total,
            total_expenses: self.expenses.total,
            net_income: self.net_income,
        }
    }
}

/// Balance sheet section (assets, liabilities, equity).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheetSection {
    /// Section total.
    pub total: Decimal,
    /// Accounts in this section, ordered by code.
    pub accounts: Vec<AccountBalance>,
}

/// Balance sheet report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheetReport {
    /// As of date.
    pub as_of: NaiveDate,
    /// Assets section.
    pub assets: BalanceSheetSection,
    /// Liabilities section.
    pub liabilities: BalanceSheetSection,
    /// Equity section. Its total includes `unclosed_earnings`.
    pub equity: BalanceSheetSection,
    /// Revenue minus expenses not yet closed into equity.
    pub unclosed_earnings: Decimal,
    /// Total assets.
    pub total_assets: Decimal,
    /// Total liabilities.
    pub total_liabilities: Decimal,
    /// Total equity, unclosed earnings included.
    pub total_equity: Decimal,
    /// Liabilities plus equity.
    pub total_liabilities_and_equity: Decimal,
    /// Whether assets equal liabilities plus equity.
    pub is_balanced: bool,
}
