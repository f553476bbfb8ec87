//! Chart of accounts operations.

use std::collections::HashMap;

use tally_shared::types::{AccountId, TenantId};
use tracing::info;

use super::GeneralLedger;
use crate::accounts::{
    Account, AccountCategory, AccountFilter, AccountPatch, AccountService, NewAccount,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{AccountBalance, DateWindow};
use crate::store::LedgerStore;

impl<S: LedgerStore> GeneralLedger<S> {
    /// Creates an account.
    pub async fn create_account(
        &self,
        tenant_id: TenantId,
        input: NewAccount,
    ) -> LedgerResult<Account> {
        AccountService::validate_new(&input)?;
        if let Some(parent_id) = input.parent_id
            && self.store.get_account(tenant_id, parent_id).await?.is_none()
        {
            return Err(LedgerError::ParentNotFound(parent_id));
        }
        let code = input.code.trim();
        if self
            .store
            .get_account_by_code(tenant_id, code)
            .await?
            .is_some()
        {
            return Err(LedgerError::DuplicateAccountCode(code.to_string()));
        }

        let account = AccountService::build(tenant_id, input, self.default_currency, Self::now());
        self.store.insert_account(&account).await?;
        self.invalidate(tenant_id);

        info!(
            tenant_id = %tenant_id,
            account_id = %account.id,
            code = %account.code,
            account_type = %account.account_type,
            "Account created"
        );
        Ok(account)
    }

    /// Fetches an account.
    pub async fn get_account(&self, tenant_id: TenantId, id: AccountId) -> LedgerResult<Account> {
        self.read("get_account", || self.store.get_account(tenant_id, id))
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    /// Fetches an account by its code.
    pub async fn get_account_by_code(
        &self,
        tenant_id: TenantId,
        code: &str,
    ) -> LedgerResult<Account> {
        self.read("get_account_by_code", || {
            self.store.get_account_by_code(tenant_id, code)
        })
        .await?
        .ok_or_else(|| LedgerError::AccountCodeNotFound(code.to_string()))
    }

    /// Lists accounts matching the filter, ordered by code.
    pub async fn list_accounts(
        &self,
        tenant_id: TenantId,
        filter: &AccountFilter,
    ) -> LedgerResult<Vec<Account>> {
        self.read("list_accounts", || self.store.list_accounts(tenant_id, filter))
            .await
    }

    /// Active accounts of a category, ordered by code.
    pub async fn find_accounts_by_category(
        &self,
        tenant_id: TenantId,
        category: AccountCategory,
    ) -> LedgerResult<Vec<Account>> {
        let filter = AccountFilter {
            category: Some(category),
            is_active: Some(true),
            ..AccountFilter::default()
        };
        self.list_accounts(tenant_id, &filter).await
    }

    /// Applies a partial update to an account.
    pub async fn update_account(
        &self,
        tenant_id: TenantId,
        id: AccountId,
        patch: AccountPatch,
    ) -> LedgerResult<Account> {
        let current = self.get_account(tenant_id, id).await?;

        if let Some(Some(parent_id)) = patch.parent_id {
            let accounts = self
                .store
                .list_accounts(tenant_id, &AccountFilter::default())
                .await?;
            let parents: HashMap<AccountId, Option<AccountId>> =
                accounts.iter().map(|a| (a.id, a.parent_id)).collect();
            if !parents.contains_key(&parent_id) {
                return Err(LedgerError::ParentNotFound(parent_id));
            }
            AccountService::ensure_acyclic(id, Some(parent_id), |account| {
                parents.get(&account).copied().flatten()
            })?;
        }

        let references = self.store.account_references(tenant_id, id).await?;
        let updated = AccountService::apply_patch(&current, patch, references, Self::now())?;

        if updated.code != current.code
            && let Some(holder) = self
                .store
                .get_account_by_code(tenant_id, &updated.code)
                .await?
            && holder.id != id
        {
            return Err(LedgerError::DuplicateAccountCode(updated.code));
        }

        self.store.update_account(&updated).await?;
        self.invalidate(tenant_id);

        info!(tenant_id = %tenant_id, account_id = %id, "Account updated");
        Ok(updated)
    }

    /// Deletes an unreferenced, non-system account.
    pub async fn delete_account(&self, tenant_id: TenantId, id: AccountId) -> LedgerResult<()> {
        self.store.delete_account(tenant_id, id).await?;
        self.invalidate(tenant_id);

        info!(tenant_id = %tenant_id, account_id = %id, "Account deleted");
        Ok(())
    }

    /// Recomputes every account's cached `current_balance` from the ledger.
    ///
    /// Returns the balances that were written.
    pub async fn refresh_balance_hints(
        &self,
        tenant_id: TenantId,
    ) -> LedgerResult<Vec<AccountBalance>> {
        let accounts = self
            .store
            .list_accounts(tenant_id, &AccountFilter::default())
            .await?;
        let movements = self
            .store
            .account_movements(tenant_id, DateWindow::default())
            .await?;

        let balances: Vec<AccountBalance> = accounts
            .iter()
            .map(|account| {
                let movement = movements.get(&account.id).copied().unwrap_or_default();
                AccountBalance::compute(account, movement, None)
            })
            .collect();
        let hints: Vec<(AccountId, _)> = balances
            .iter()
            .map(|b| (b.account_id, b.balance))
            .collect();
        self.store.set_balance_hints(tenant_id, &hints).await?;

        info!(
            tenant_id = %tenant_id,
            accounts = balances.len(),
            "Balance hints refreshed"
        );
        Ok(balances)
    }
}
