//! Budget vs actual variance calculations.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tally_shared::types::AccountId;

use super::types::{
    Budget, BudgetItem, BudgetVsActualLine, BudgetVsActualReport, VarianceResult, VarianceStatus,
};
use crate::accounts::{Account, AccountType};
use crate::ledger::Movement;

impl VarianceResult {
    /// Calculates variance for an account type.
    ///
    /// Revenue: `actual - budgeted` (earning more is favorable).
    /// Everything else: `budgeted - actual` (spending less is favorable).
    #[must_use]
    pub fn calculate(budgeted: Decimal, actual: Decimal, account_type: AccountType) -> Self {
        let variance = match account_type {
            AccountType::Revenue => actual - budgeted,
            _ => budgeted - actual,
        };

        let status = match variance.cmp(&Decimal::ZERO) {
            std::cmp::Ordering::Greater => VarianceStatus::Favorable,
            std::cmp::Ordering::Less => VarianceStatus::Unfavorable,
            std::cmp::Ordering::Equal => VarianceStatus::OnBudget,
        };

        let variance_percent = percent_of(variance, budgeted);
        let utilization_percent = percent_of(actual, budgeted);

        Self {
            budgeted,
            actual,
            variance,
            variance_percent,
            utilization_percent,
            status,
        }
    }
}

fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        (part / whole * Decimal::ONE_HUNDRED).round_dp(2)
    }
}

/// Compares each item with the ledger movement of its account.
///
/// `movements` must cover the budget's own date range. Actual is the
/// polarity-adjusted movement, without the opening balance.
#[must_use]
pub fn budget_vs_actual(
    budget: &Budget,
    items: &[BudgetItem],
    accounts: &HashMap<AccountId, Account>,
    movements: &HashMap<AccountId, Movement>,
) -> BudgetVsActualReport {
    let mut lines: Vec<BudgetVsActualLine> = items
        .iter()
        .filter_map(|item| {
            let account = accounts.get(&item.account_id)?;
            let movement = movements.get(&item.account_id).copied().unwrap_or_default();
            let actual = account
                .normal_balance()
                .signed_change(movement.debit, movement.credit);
            Some(BudgetVsActualLine {
                item_id: item.id,
                account_id: account.id,
                account_code: account.code.clone(),
                account_name: account.name.clone(),
                account_type: account.account_type,
                recorded_spent: item.spent_amount,
                variance: VarianceResult::calculate(
                    item.budgeted_amount,
                    actual,
                    account.account_type,
                ),
            })
        })
        .collect();
    lines.sort_by(|a, b| a.account_code.cmp(&b.account_code));

    let total_budgeted: Decimal = lines.iter().map(|l| l.variance.budgeted).sum();
    let total_actual: Decimal = lines.iter().map(|l| l.variance.actual).sum();
    let total_variance: Decimal = lines.iter().map(|l| l.variance.variance).sum();

    BudgetVsActualReport {
        budget_id: budget.id,
        budget_name: budget.name.clone(),
        start_date: budget.start_date,
        end_date: budget.end_date,
        overall_utilization: percent_of(total_actual, total_budgeted),
        lines,
        total_budgeted,
        total_actual,
        total_variance,
    }
}
