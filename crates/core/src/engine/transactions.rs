//! Ledger transaction operations.

use tally_shared::types::{AccountId, TenantId, TransactionId};
use tracing::info;

use super::GeneralLedger;
use crate::accounts::Account;
use crate::error::{LedgerError, LedgerResult};
use crate::fiscal::PeriodService;
use crate::journal::JournalStatus;
use crate::ledger::{
    LedgerTransaction, NewTransaction, NumberKind, TransactionFilter, TransactionPatch,
    TransactionValidator,
};
use crate::store::LedgerStore;

impl<S: LedgerStore> GeneralLedger<S> {
    /// Records a double-entry transaction under a freshly generated number.
    pub async fn create_transaction(
        &self,
        tenant_id: TenantId,
        input: NewTransaction,
    ) -> LedgerResult<LedgerTransaction> {
        TransactionValidator::validate_shape(
            input.amount,
            input.debit_account_id,
            input.credit_account_id,
            &input.description,
        )?;
        let (debit, credit) = self
            .sides(tenant_id, input.debit_account_id, input.credit_account_id)
            .await?;
        let currency = TransactionValidator::validate_accounts(&debit, &credit, input.currency)?;

        let periods = self.store.list_periods(tenant_id).await?;
        PeriodService::ensure_date_open(&periods, input.transaction_date)?;

        let now = Self::now();
        let txn = self
            .insert_numbered(
                tenant_id,
                NumberKind::Transaction,
                input.transaction_date,
                |number| {
                    TransactionValidator::build(tenant_id, input.clone(), number, currency, now)
                },
                |txn: LedgerTransaction| async move {
                    self.store.insert_transaction(&txn).await?;
                    Ok(txn)
                },
            )
            .await?;
        self.invalidate(tenant_id);

        info!(
            tenant_id = %tenant_id,
            transaction_id = %txn.id,
            number = %txn.number,
            amount = %txn.amount,
            "Transaction created"
        );
        Ok(txn)
    }

    /// Fetches a transaction.
    pub async fn get_transaction(
        &self,
        tenant_id: TenantId,
        id: TransactionId,
    ) -> LedgerResult<LedgerTransaction> {
        self.read("get_transaction", || self.store.get_transaction(tenant_id, id))
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    /// Fetches a transaction by its number.
    pub async fn get_transaction_by_number(
        &self,
        tenant_id: TenantId,
        number: &str,
    ) -> LedgerResult<LedgerTransaction> {
        self.read("get_transaction_by_number", || {
            self.store.get_transaction_by_number(tenant_id, number)
        })
        .await?
        .ok_or_else(|| LedgerError::TransactionNumberNotFound(number.to_string()))
    }

    /// Lists transactions, newest first.
    pub async fn list_transactions(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        self.read("list_transactions", || {
            self.store.list_transactions(tenant_id, filter)
        })
        .await
    }

    /// Applies a partial update, re-running every creation rule.
    pub async fn update_transaction(
        &self,
        tenant_id: TenantId,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> LedgerResult<LedgerTransaction> {
        let current = self.get_transaction(tenant_id, id).await?;
        self.ensure_not_posted(tenant_id, &current).await?;

        let (mut updated, requested_currency) =
            TransactionValidator::apply_patch(&current, patch, Self::now());
        TransactionValidator::validate_shape(
            updated.amount,
            updated.debit_account_id,
            updated.credit_account_id,
            &updated.description,
        )?;
        let (debit, credit) = self
            .sides(tenant_id, updated.debit_account_id, updated.credit_account_id)
            .await?;
        updated.currency =
            TransactionValidator::validate_accounts(&debit, &credit, requested_currency)?;

        let periods = self.store.list_periods(tenant_id).await?;
        PeriodService::ensure_date_open(&periods, current.transaction_date)?;
        PeriodService::ensure_date_open(&periods, updated.transaction_date)?;

        self.store.update_transaction(&updated).await?;
        self.invalidate(tenant_id);

        info!(tenant_id = %tenant_id, transaction_id = %id, "Transaction updated");
        self.get_transaction(tenant_id, id).await
    }

    /// Deletes a transaction that is neither posted nor in a closed period.
    pub async fn delete_transaction(
        &self,
        tenant_id: TenantId,
        id: TransactionId,
    ) -> LedgerResult<()> {
        self.store.delete_transaction(tenant_id, id).await?;
        self.invalidate(tenant_id);

        info!(tenant_id = %tenant_id, transaction_id = %id, "Transaction deleted");
        Ok(())
    }

    async fn sides(
        &self,
        tenant_id: TenantId,
        debit_id: AccountId,
        credit_id: AccountId,
    ) -> LedgerResult<(Account, Account)> {
        let debit = self.get_account(tenant_id, debit_id).await?;
        let credit = self.get_account(tenant_id, credit_id).await?;
        Ok((debit, credit))
    }

    async fn ensure_not_posted(
        &self,
        tenant_id: TenantId,
        txn: &LedgerTransaction,
    ) -> LedgerResult<()> {
        let Some(entry_id) = txn.journal_entry_id else {
            return Ok(());
        };
        match self.store.get_journal_entry(tenant_id, entry_id).await? {
            Some(entry) if entry.status == JournalStatus::Posted => {
                Err(LedgerError::EntryPosted(entry_id))
            }
            _ => Ok(()),
        }
    }
}
