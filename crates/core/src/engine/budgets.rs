//! Budget operations.

use std::collections::HashMap;

use tally_shared::types::{AccountId, BudgetId, BudgetItemId, TenantId};
use tracing::info;

use super::GeneralLedger;
use crate::accounts::{Account, AccountFilter};
use crate::budget::{
    Budget, BudgetItem, BudgetItemPatch, BudgetPatch, BudgetService, BudgetVsActualReport,
    NewBudget, NewBudgetItem, budget_vs_actual,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::DateWindow;
use crate::store::LedgerStore;

impl<S: LedgerStore> GeneralLedger<S> {
    /// Creates a budget.
    pub async fn create_budget(
        &self,
        tenant_id: TenantId,
        input: NewBudget,
    ) -> LedgerResult<Budget> {
        BudgetService::validate_new(&input)?;
        if let Some(period_id) = input.period_id {
            self.get_period(tenant_id, period_id).await?;
        }

        let budget = BudgetService::build(tenant_id, input, Self::now());
        self.store.insert_budget(&budget).await?;
        self.invalidate(tenant_id);

        info!(
            tenant_id = %tenant_id,
            budget_id = %budget.id,
            total = %budget.total_amount,
            "Budget created"
        );
        Ok(budget)
    }

    /// Fetches a budget.
    pub async fn get_budget(&self, tenant_id: TenantId, id: BudgetId) -> LedgerResult<Budget> {
        self.read("get_budget", || self.store.get_budget(tenant_id, id))
            .await?
            .ok_or(LedgerError::BudgetNotFound(id))
    }

    /// Lists budgets, newest first.
    pub async fn list_budgets(&self, tenant_id: TenantId) -> LedgerResult<Vec<Budget>> {
        self.read("list_budgets", || self.store.list_budgets(tenant_id))
            .await
    }

    /// Applies a partial update to a budget.
    pub async fn update_budget(
        &self,
        tenant_id: TenantId,
        id: BudgetId,
        patch: BudgetPatch,
    ) -> LedgerResult<Budget> {
        let current = self.get_budget(tenant_id, id).await?;
        if let Some(Some(period_id)) = patch.period_id {
            self.get_period(tenant_id, period_id).await?;
        }

        let updated = BudgetService::apply_patch(&current, patch, Self::now())?;
        self.store.update_budget(&updated).await?;
        self.invalidate(tenant_id);

        info!(tenant_id = %tenant_id, budget_id = %id, "Budget updated");
        Ok(updated)
    }

    /// Deletes a budget and all of its items.
    pub async fn delete_budget(&self, tenant_id: TenantId, id: BudgetId) -> LedgerResult<()> {
        self.store.delete_budget(tenant_id, id).await?;
        self.invalidate(tenant_id);

        info!(tenant_id = %tenant_id, budget_id = %id, "Budget deleted");
        Ok(())
    }

    /// Adds an account line to an open budget.
    pub async fn create_budget_item(
        &self,
        tenant_id: TenantId,
        budget_id: BudgetId,
        input: NewBudgetItem,
    ) -> LedgerResult<BudgetItem> {
        let budget = self.get_budget(tenant_id, budget_id).await?;
        BudgetService::ensure_open(&budget)?;
        BudgetService::validate_new_item(&input)?;
        self.get_account(tenant_id, input.account_id).await?;

        let item = BudgetService::build_item(&budget, input, Self::now());
        self.store.insert_budget_item(&item).await?;
        self.invalidate(tenant_id);

        info!(
            tenant_id = %tenant_id,
            budget_id = %budget_id,
            item_id = %item.id,
            account_id = %item.account_id,
            "Budget item created"
        );
        Ok(item)
    }

    /// Fetches a budget item.
    pub async fn get_budget_item(
        &self,
        tenant_id: TenantId,
        id: BudgetItemId,
    ) -> LedgerResult<BudgetItem> {
        self.read("get_budget_item", || self.store.get_budget_item(tenant_id, id))
            .await?
            .ok_or(LedgerError::BudgetItemNotFound(id))
    }

    /// Lists the items of a budget.
    pub async fn list_budget_items(
        &self,
        tenant_id: TenantId,
        budget_id: BudgetId,
    ) -> LedgerResult<Vec<BudgetItem>> {
        self.get_budget(tenant_id, budget_id).await?;
        self.read("list_budget_items", || {
            self.store.list_budget_items(tenant_id, budget_id)
        })
        .await
    }

    /// Applies a partial update to an item of an open budget.
    pub async fn update_budget_item(
        &self,
        tenant_id: TenantId,
        id: BudgetItemId,
        patch: BudgetItemPatch,
    ) -> LedgerResult<BudgetItem> {
        let current = self.get_budget_item(tenant_id, id).await?;
        let budget = self.get_budget(tenant_id, current.budget_id).await?;
        BudgetService::ensure_open(&budget)?;

        let updated = BudgetService::apply_item_patch(&current, patch, Self::now())?;
        self.store.update_budget_item(&updated).await?;
        self.invalidate(tenant_id);

        info!(tenant_id = %tenant_id, item_id = %id, "Budget item updated");
        Ok(updated)
    }

    /// Deletes an item of an open budget.
    pub async fn delete_budget_item(
        &self,
        tenant_id: TenantId,
        id: BudgetItemId,
    ) -> LedgerResult<()> {
        let current = self.get_budget_item(tenant_id, id).await?;
        let budget = self.get_budget(tenant_id, current.budget_id).await?;
        BudgetService::ensure_open(&budget)?;

        self.store.delete_budget_item(tenant_id, id).await?;
        self.invalidate(tenant_id);

        info!(tenant_id = %tenant_id, item_id = %id, "Budget item deleted");
        Ok(())
    }

    /// Compares each item with its account's ledger movement over the
    /// budget's date range.
    pub async fn budget_vs_actual(
        &self,
        tenant_id: TenantId,
        budget_id: BudgetId,
    ) -> LedgerResult<BudgetVsActualReport> {
        let budget = self.get_budget(tenant_id, budget_id).await?;
        let items = self.list_budget_items(tenant_id, budget_id).await?;
        let accounts: HashMap<AccountId, Account> = self
            .list_accounts(tenant_id, &AccountFilter::default())
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();
        let window = DateWindow::between(budget.start_date, budget.end_date);
        let movements = self
            .read("account_movements", || {
                self.store.account_movements(tenant_id, window)
            })
            .await?;

        Ok(budget_vs_actual(&budget, &items, &accounts, &movements))
    }
}
