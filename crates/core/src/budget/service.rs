//! Budget validation and caller-maintained amounts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tally_shared::types::{BudgetId, BudgetItemId, TenantId};

use super::types::{
    Budget, BudgetItem, BudgetItemPatch, BudgetPatch, BudgetStatus, NewBudget, NewBudgetItem,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::ensure_storable_amount;

/// Service for budget rules.
pub struct BudgetService;

impl BudgetService {
    /// Validates a budget creation request.
    pub fn validate_new(input: &NewBudget) -> LedgerResult<()> {
        if input.name.trim().is_empty() {
            return Err(LedgerError::MissingField("name"));
        }
        Self::validate_range(input)?;
        Self::validate_amount("total_amount", input.total_amount)?;
        Self::validate_amount("allocated_amount", input.allocated_amount)?;
        Self::validate_amount("spent_amount", input.spent_amount)?;
        Self::validate_remaining(input.remaining_amount)
    }

    /// Builds a budget record.
    #[must_use]
    pub fn build(tenant_id: TenantId, input: NewBudget, now: DateTime<Utc>) -> Budget {
        Budget {
            id: BudgetId::new(),
            tenant_id,
            name: input.name.trim().to_string(),
            description: input.description,
            period_id: input.period_id,
            start_date: input.start_date,
            end_date: input.end_date,
            total_amount: input.total_amount,
            allocated_amount: input.allocated_amount,
            spent_amount: input.spent_amount,
            remaining_amount: input
                .remaining_amount
                .unwrap_or(input.total_amount - input.spent_amount),
            status: input.status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the budget with the patch applied and validated.
    pub fn apply_patch(
        budget: &Budget,
        patch: BudgetPatch,
        now: DateTime<Utc>,
    ) -> LedgerResult<Budget> {
        let mut updated = budget.clone();
        let amounts_moved = patch.total_amount.is_some() || patch.spent_amount.is_some();

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(LedgerError::MissingField("name"));
            }
            updated.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            updated.description = description;
        }
        if let Some(period_id) = patch.period_id {
            updated.period_id = period_id;
        }
        if let Some(start) = patch.start_date {
            updated.start_date = start;
        }
        if let Some(end) = patch.end_date {
            updated.end_date = end;
        }
        if let Some(total) = patch.total_amount {
            Self::validate_amount("total_amount", total)?;
            updated.total_amount = total;
        }
        if let Some(allocated) = patch.allocated_amount {
            Self::validate_amount("allocated_amount", allocated)?;
            updated.allocated_amount = allocated;
        }
        if let Some(spent) = patch.spent_amount {
            Self::validate_amount("spent_amount", spent)?;
            updated.spent_amount = spent;
        }
        match patch.remaining_amount {
            Some(remaining) => {
                Self::validate_remaining(Some(remaining))?;
                updated.remaining_amount = remaining;
            }
            None if amounts_moved => {
                updated.remaining_amount = updated.total_amount - updated.spent_amount;
            }
            None => {}
        }
        if let Some(status) = patch.status {
            updated.status = status;
        }
        if updated.start_date > updated.end_date {
            return Err(LedgerError::InvalidDateRange {
                start: updated.start_date,
                end: updated.end_date,
            });
        }
        updated.updated_at = now;

        Ok(updated)
    }

    /// Fails with `BudgetClosed` for closed budgets.
    pub fn ensure_open(budget: &Budget) -> LedgerResult<()> {
        if budget.status == BudgetStatus::Closed {
            return Err(LedgerError::BudgetClosed(budget.id));
        }
        Ok(())
    }

    /// Validates an item creation request.
    pub fn validate_new_item(input: &NewBudgetItem) -> LedgerResult<()> {
        Self::validate_amount("budgeted_amount", input.budgeted_amount)?;
        Self::validate_amount("allocated_amount", input.allocated_amount)?;
        Self::validate_amount("spent_amount", input.spent_amount)?;
        Self::validate_remaining(input.remaining_amount)
    }

    /// Builds a budget item record.
    #[must_use]
    pub fn build_item(budget: &Budget, input: NewBudgetItem, now: DateTime<Utc>) -> BudgetItem {
        BudgetItem {
            id: BudgetItemId::new(),
            tenant_id: budget.tenant_id,
            budget_id: budget.id,
            account_id: input.account_id,
            budgeted_amount: input.budgeted_amount,
            allocated_amount: input.allocated_amount,
            spent_amount: input.spent_amount,
            remaining_amount: input
                .remaining_amount
                .unwrap_or(input.budgeted_amount - input.spent_amount),
            notes: input.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the item with the patch applied and validated.
    pub fn apply_item_patch(
        item: &BudgetItem,
        patch: BudgetItemPatch,
        now: DateTime<Utc>,
    ) -> LedgerResult<BudgetItem> {
        let mut updated = item.clone();
        let amounts_moved = patch.budgeted_amount.is_some() || patch.spent_amount.is_some();

        if let Some(budgeted) = patch.budgeted_amount {
            Self::validate_amount("budgeted_amount", budgeted)?;
            updated.budgeted_amount = budgeted;
        }
        if let Some(allocated) = patch.allocated_amount {
            Self::validate_amount("allocated_amount", allocated)?;
            updated.allocated_amount = allocated;
        }
        if let Some(spent) = patch.spent_amount {
            Self::validate_amount("spent_amount", spent)?;
            updated.spent_amount = spent;
        }
        match patch.remaining_amount {
            Some(remaining) => {
                Self::validate_remaining(Some(remaining))?;
                updated.remaining_amount = remaining;
            }
            None if amounts_moved => {
                updated.remaining_amount = updated.budgeted_amount - updated.spent_amount;
            }
            None => {}
        }
        if let Some(notes) = patch.notes {
            updated.notes = notes;
        }
        updated.updated_at = now;

        Ok(updated)
    }

    fn validate_range(input: &NewBudget) -> LedgerResult<()> {
        if input.start_date > input.end_date {
            return Err(LedgerError::InvalidDateRange {
                start: input.start_date,
                end: input.end_date,
            });
        }
        Ok(())
    }

    fn validate_amount(field: &'static str, amount: Decimal) -> LedgerResult<()> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount { field, amount });
        }
        ensure_storable_amount(field, amount)
    }

    // Remaining may go negative once spending overshoots.
    fn validate_remaining(remaining: Option<Decimal>) -> LedgerResult<()> {
        remaining.map_or(Ok(()), |amount| ensure_storable_amount("remaining_amount", amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tally_shared::types::AccountId;

    fn q1() -> NewBudget {
        NewBudget::new(
            "Q1 Operations",
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            dec!(10000),
        )
    }

    #[test]
    fn test_remaining_defaults_to_total_minus_spent() {
        let mut input = q1();
        input.spent_amount = dec!(2500);
        let budget = BudgetService::build(TenantId::new(), input, Utc::now());
        assert_eq!(budget.remaining_amount, dec!(7500));
    }

    #[test]
    fn test_validate_new_rejects_bad_input() {
        let mut negative = q1();
        negative.total_amount = dec!(-1);
        assert!(matches!(
            BudgetService::validate_new(&negative),
            Err(LedgerError::NegativeAmount { field: "total_amount", .. })
        ));

        let mut inverted = q1();
        inverted.end_date = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        assert!(matches!(
            BudgetService::validate_new(&inverted),
            Err(LedgerError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn test_amounts_must_be_storable() {
        let mut precise = q1();
        precise.total_amount = dec!(100.12345);
        assert!(matches!(
            BudgetService::validate_new(&precise),
            Err(LedgerError::AmountTooPrecise { field: "total_amount", scale: 5, .. })
        ));

        let mut overdrawn = q1();
        overdrawn.remaining_amount = Some(dec!(-250.25));
        assert!(BudgetService::validate_new(&overdrawn).is_ok());

        let item = NewBudgetItem::new(AccountId::new(), Decimal::MAX);
        assert!(matches!(
            BudgetService::validate_new_item(&item),
            Err(LedgerError::AmountOutOfRange { field: "budgeted_amount", .. })
        ));

        let budget = BudgetService::build(TenantId::new(), q1(), Utc::now());
        let err = BudgetService::apply_patch(
            &budget,
            BudgetPatch {
                remaining_amount: Some(dec!(0.00001)),
                ..BudgetPatch::default()
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::AmountTooPrecise { field: "remaining_amount", .. }));
    }

    #[test]
    fn test_patch_recomputes_remaining_only_when_amounts_move() {
        let budget = BudgetService::build(TenantId::new(), q1(), Utc::now());

        let spent = BudgetService::apply_patch(
            &budget,
            BudgetPatch {
                spent_amount: Some(dec!(4000)),
                ..BudgetPatch::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(spent.remaining_amount, dec!(6000));

        let explicit = BudgetService::apply_patch(
            &spent,
            BudgetPatch {
                remaining_amount: Some(dec!(1)),
                ..BudgetPatch::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(explicit.remaining_amount, dec!(1));

        let renamed = BudgetService::apply_patch(
            &explicit,
            BudgetPatch {
                name: Some("Q1 Ops".into()),
                ..BudgetPatch::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(renamed.remaining_amount, dec!(1));
    }

    #[test]
    fn test_closed_budget_is_not_open() {
        let mut budget = BudgetService::build(TenantId::new(), q1(), Utc::now());
        assert!(BudgetService::ensure_open(&budget).is_ok());
        budget.status = BudgetStatus::Closed;
        assert!(matches!(
            BudgetService::ensure_open(&budget),
            Err(LedgerError::BudgetClosed(_))
        ));
    }

    #[test]
    fn test_item_amounts() {
        let budget = BudgetService::build(TenantId::new(), q1(), Utc::now());
        let mut input = NewBudgetItem::new(AccountId::new(), dec!(3000));
        input.spent_amount = dec!(1200);
        let item = BudgetService::build_item(&budget, input, Utc::now());
        assert_eq!(item.remaining_amount, dec!(1800));
        assert_eq!(item.budget_id, budget.id);

        let patched = BudgetService::apply_item_patch(
            &item,
            BudgetItemPatch {
                budgeted_amount: Some(dec!(2000)),
                ..BudgetItemPatch::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(patched.remaining_amount, dec!(800));

        let err = BudgetService::apply_item_patch(
            &item,
            BudgetItemPatch {
                spent_amount: Some(dec!(-5)),
                ..BudgetItemPatch::default()
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::NegativeAmount { .. }));
    }
}
