//! Journal entry operations.

use tally_shared::types::{JournalEntryId, TenantId, TransactionId, UserId};
use tracing::{debug, info};

use super::GeneralLedger;
use crate::error::{LedgerError, LedgerResult};
use crate::journal::{
    JournalEntry, JournalEntryWithTransactions, JournalService, JournalStatus, NewJournalEntry,
};
use crate::ledger::{NumberKind, TransactionFilter};
use crate::store::LedgerStore;

impl<S: LedgerStore> GeneralLedger<S> {
    /// Opens a draft journal entry.
    pub async fn create_journal_entry(
        &self,
        tenant_id: TenantId,
        input: NewJournalEntry,
    ) -> LedgerResult<JournalEntry> {
        JournalService::validate_new(&input)?;

        let now = Self::now();
        let entry = self
            .insert_numbered(
                tenant_id,
                NumberKind::JournalEntry,
                input.entry_date,
                |number| JournalService::build(tenant_id, input.clone(), number, now),
                |entry: JournalEntry| async move {
                    self.store.insert_journal_entry(&entry).await?;
                    Ok(entry)
                },
            )
            .await?;
        self.invalidate(tenant_id);

        info!(
            tenant_id = %tenant_id,
            entry_id = %entry.id,
            number = %entry.number,
            "Journal entry created"
        );
        Ok(entry)
    }

    /// Fetches an entry together with its transactions.
    pub async fn get_journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
    ) -> LedgerResult<JournalEntryWithTransactions> {
        let entry = self
            .read("get_journal_entry", || {
                self.store.get_journal_entry(tenant_id, id)
            })
            .await?
            .ok_or(LedgerError::JournalEntryNotFound(id))?;
        let filter = TransactionFilter {
            journal_entry_id: Some(id),
            ..TransactionFilter::default()
        };
        let transactions = self.list_transactions(tenant_id, &filter).await?;
        Ok(JournalEntryWithTransactions {
            entry,
            transactions,
        })
    }

    /// Lists entries, newest first, optionally by status.
    pub async fn list_journal_entries(
        &self,
        tenant_id: TenantId,
        status: Option<JournalStatus>,
    ) -> LedgerResult<Vec<JournalEntry>> {
        self.read("list_journal_entries", || {
            self.store.list_journal_entries(tenant_id, status)
        })
        .await
    }

    /// Adds a transaction to a draft entry. Re-attaching is a no-op.
    pub async fn attach_transaction(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        transaction_id: TransactionId,
    ) -> LedgerResult<()> {
        let changed = self
            .store
            .attach_transaction(tenant_id, entry_id, transaction_id)
            .await?;
        if changed {
            self.invalidate(tenant_id);
            info!(
                tenant_id = %tenant_id,
                entry_id = %entry_id,
                transaction_id = %transaction_id,
                "Transaction attached to journal entry"
            );
        } else {
            debug!(
                entry_id = %entry_id,
                transaction_id = %transaction_id,
                "Transaction already attached"
            );
        }
        Ok(())
    }

    /// Removes a transaction from a draft entry.
    pub async fn detach_transaction(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        transaction_id: TransactionId,
    ) -> LedgerResult<()> {
        self.store
            .detach_transaction(tenant_id, entry_id, transaction_id)
            .await?;
        self.invalidate(tenant_id);

        info!(
            tenant_id = %tenant_id,
            entry_id = %entry_id,
            transaction_id = %transaction_id,
            "Transaction detached from journal entry"
        );
        Ok(())
    }

    /// Posts a balanced draft entry. A second post fails with a conflict.
    pub async fn post_journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
        actor: UserId,
    ) -> LedgerResult<JournalEntry> {
        let posted = self
            .store
            .post_journal_entry(tenant_id, id, actor, Self::now())
            .await?;
        self.invalidate(tenant_id);

        info!(
            tenant_id = %tenant_id,
            entry_id = %id,
            posted_by = %actor,
            "Journal entry posted"
        );
        Ok(posted)
    }

    /// Cancels a draft entry and releases its transactions.
    pub async fn cancel_journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
        actor: UserId,
    ) -> LedgerResult<JournalEntry> {
        let cancelled = self
            .store
            .cancel_journal_entry(tenant_id, id, actor, Self::now())
            .await?;
        self.invalidate(tenant_id);

        info!(
            tenant_id = %tenant_id,
            entry_id = %id,
            cancelled_by = %actor,
            "Journal entry cancelled"
        );
        Ok(cancelled)
    }
}
