//! Budget data types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, BudgetId, BudgetItemId, FiscalPeriodId, TenantId};

use crate::accounts::AccountType;

/// Lifecycle state of a budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    /// Being prepared.
    #[default]
    Draft,
    /// In force.
    Active,
    /// Finished. Items can no longer change.
    Closed,
}

impl BudgetStatus {
    /// Stable storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

/// A budget record. Amounts are maintained by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// Budget ID.
    pub id: BudgetId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Budget name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Financial period the budget plans for.
    pub period_id: Option<FiscalPeriodId>,
    /// First day covered, inclusive.
    pub start_date: NaiveDate,
    /// Last day covered, inclusive.
    pub end_date: NaiveDate,
    /// Total planned amount.
    pub total_amount: Decimal,
    /// Amount allocated to items.
    pub allocated_amount: Decimal,
    /// Amount spent so far.
    pub spent_amount: Decimal,
    /// Amount left.
    pub remaining_amount: Decimal,
    /// Lifecycle state.
    pub status: BudgetStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a budget.
#[derive(Debug, Clone)]
pub struct NewBudget {
    /// Budget name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Linked financial period.
    pub period_id: Option<FiscalPeriodId>,
    /// First day covered.
    pub start_date: NaiveDate,
    /// Last day covered.
    pub end_date: NaiveDate,
    /// Total planned amount.
    pub total_amount: Decimal,
    /// Amount allocated.
    pub allocated_amount: Decimal,
    /// Amount spent.
    pub spent_amount: Decimal,
    /// Amount left; `total - spent` when `None`.
    pub remaining_amount: Option<Decimal>,
    /// Initial state.
    pub status: BudgetStatus,
}

impl NewBudget {
    /// Creates a draft budget input with nothing allocated or spent.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        total_amount: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            period_id: None,
            start_date,
            end_date,
            total_amount,
            allocated_amount: Decimal::ZERO,
            spent_amount: Decimal::ZERO,
            remaining_amount: None,
            status: BudgetStatus::Draft,
        }
    }
}

/// Partial update for a budget. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct BudgetPatch {
    /// New name.
    pub name: Option<String>,
    /// New description (`Some(None)` clears it).
    pub description: Option<Option<String>>,
    /// New period link (`Some(None)` clears it).
    pub period_id: Option<Option<FiscalPeriodId>>,
    /// New start date.
    pub start_date: Option<NaiveDate>,
    /// New end date.
    pub end_date: Option<NaiveDate>,
    /// New total.
    pub total_amount: Option<Decimal>,
    /// New allocated amount.
    pub allocated_amount: Option<Decimal>,
    /// New spent amount.
    pub spent_amount: Option<Decimal>,
    /// New remaining amount. Recomputed from total and spent when omitted and either changes.
    pub remaining_amount: Option<Decimal>,
    /// New state.
    pub status: Option<BudgetStatus>,
}

/// A budget line tied to one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetItem {
    /// Item ID.
    pub id: BudgetItemId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Parent budget.
    pub budget_id: BudgetId,
    /// Tracked account.
    pub account_id: AccountId,
    /// Planned amount.
    pub budgeted_amount: Decimal,
    /// Amount allocated.
    pub allocated_amount: Decimal,
    /// Amount spent.
    pub spent_amount: Decimal,
    /// Amount left.
    pub remaining_amount: Decimal,
    /// Free text notes.
    pub notes: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a budget item.
#[derive(Debug, Clone)]
pub struct NewBudgetItem {
    /// Tracked account.
    pub account_id: AccountId,
    /// Planned amount.
    pub budgeted_amount: Decimal,
    /// Amount allocated.
    pub allocated_amount: Decimal,
    /// Amount spent.
    pub spent_amount: Decimal,
    /// Amount left; `budgeted - spent` when `None`.
    pub remaining_amount: Option<Decimal>,
    /// Notes.
    pub notes: Option<String>,
}

impl NewBudgetItem {
    /// Creates an item input with nothing allocated or spent.
    #[must_use]
    pub const fn new(account_id: AccountId, budgeted_amount: Decimal) -> Self {
        Self {
            account_id,
            budgeted_amount,
            allocated_amount: Decimal::ZERO,
            spent_amount: Decimal::ZERO,
            remaining_amount: None,
            notes: None,
        }
    }
}

/// Partial update for a budget item.
#[derive(Debug, Clone, Default)]
pub struct BudgetItemPatch {
    /// New planned amount.
    pub budgeted_amount: Option<Decimal>,
    /// New allocated amount.
    pub allocated_amount: Option<Decimal>,
    /// New spent amount.
    pub spent_amount: Option<Decimal>,
    /// New remaining amount. Recomputed when omitted and budgeted or spent changes.
    pub remaining_amount: Option<Decimal>,
    /// New notes (`Some(None)` clears them).
    pub notes: Option<Option<String>>,
}

/// Variance status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceStatus {
    /// Better than planned.
    Favorable,
    /// Worse than planned.
    Unfavorable,
    /// Exactly as planned.
    OnBudget,
}

/// Variance calculation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceResult {
    /// Budgeted amount.
    pub budgeted: Decimal,
    /// Actual ledger movement.
    pub actual: Decimal,
    /// Signed so that positive is favorable.
    pub variance: Decimal,
    /// Variance as a percentage of budget.
    pub variance_percent: Decimal,
    /// Actual as a percentage of budget.
    pub utilization_percent: Decimal,
    /// Variance status.
    pub status: VarianceStatus,
}

/// One budget item compared with the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetVsActualLine {
    /// Budget item.
    pub item_id: BudgetItemId,
    /// Tracked account.
    pub account_id: AccountId,
    /// Account code.
    pub account_code: String,
    /// Account name.
    pub account_name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Spent amount as recorded by the caller.
    pub recorded_spent: Decimal,
    /// Ledger comparison.
    pub variance: VarianceResult,
}

/// Budget-vs-actual report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetVsActualReport {
    /// Budget ID.
    pub budget_id: BudgetId,
    /// Budget name.
    pub budget_name: String,
    /// Range compared.
    pub start_date: NaiveDate,
    /// Range compared.
    pub end_date: NaiveDate,
    /// One line per item, ordered by account code.
    pub lines: Vec<BudgetVsActualLine>,
    /// Sum of budgeted amounts.
    pub total_budgeted: Decimal,
    /// Sum of actual movements.
    pub total_actual: Decimal,
    /// Sum of line variances.
    pub total_variance: Decimal,
    /// Overall utilization percentage.
    pub overall_utilization: Decimal,
}
