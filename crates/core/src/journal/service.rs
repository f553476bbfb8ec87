//! Journal entry state machine and posting rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{CurrencyCode, JournalEntryId, TenantId, UserId};

use super::types::{JournalEntry, JournalStatus, NewJournalEntry};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::LedgerTransaction;

/// Totals of a journal entry at post time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Sum of debit sides.
    pub debit_total: Decimal,
    /// Sum of credit sides.
    pub credit_total: Decimal,
    /// The single currency of the entry.
    pub currency: CurrencyCode,
    /// Number of transactions.
    pub transaction_count: usize,
}

/// Service for journal entry transitions.
pub struct JournalService;

impl JournalService {
    /// Validates a creation request.
    pub fn validate_new(input: &NewJournalEntry) -> LedgerResult<()> {
        if input.description.trim().is_empty() {
            return Err(LedgerError::MissingField("description"));
        }
        Ok(())
    }

    /// Builds a draft entry.
    #[must_use]
    pub fn build(
        tenant_id: TenantId,
        input: NewJournalEntry,
        number: String,
        now: DateTime<Utc>,
    ) -> JournalEntry {
        JournalEntry {
            id: JournalEntryId::new(),
            tenant_id,
            number,
            entry_date: input.entry_date,
            description: input.description.trim().to_string(),
            status: JournalStatus::Draft,
            posted: false,
            posted_at: None,
            posted_by: None,
            cancelled_at: None,
            cancelled_by: None,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fails with `EntryNotDraft` unless the entry is a draft.
    pub fn ensure_draft(entry: &JournalEntry) -> LedgerResult<()> {
        if entry.status == JournalStatus::Draft {
            Ok(())
        } else {
            Err(LedgerError::EntryNotDraft {
                id: entry.id,
                status: entry.status,
            })
        }
    }

    /// Checks that a transaction can join the entry.
    ///
    /// Returns `false` when it is already attached to this very entry.
    pub fn ensure_attachable(entry: &JournalEntry, txn: &LedgerTransaction) -> LedgerResult<bool> {
        Self::ensure_draft(entry)?;
        match txn.journal_entry_id {
            None => Ok(true),
            Some(owner) if owner == entry.id => Ok(false),
            Some(owner) => Err(LedgerError::AlreadyAttached {
                transaction: txn.id,
                entry: owner,
            }),
        }
    }

    /// Checks that a transaction can leave the entry.
    pub fn ensure_detachable(entry: &JournalEntry, txn: &LedgerTransaction) -> LedgerResult<()> {
        Self::ensure_draft(entry)?;
        if txn.journal_entry_id == Some(entry.id) {
            Ok(())
        } else {
            Err(LedgerError::NotAttached {
                transaction: txn.id,
                entry: entry.id,
            })
        }
    }

    /// Checks that the entry's transactions form a postable whole.
    ///
    /// Every transaction debits and credits the same amount, so the debit and
    /// credit totals of an entry are equal by construction.
    ///
    /// # Errors
    ///
    /// - `EmptyJournalEntry` with no transactions
    /// - `MixedCurrencies` when transactions differ in currency
    pub fn validate_postable(
        entry_id: JournalEntryId,
        transactions: &[LedgerTransaction],
    ) -> LedgerResult<EntryTotals> {
        let Some(first) = transactions.first() else {
            return Err(LedgerError::EmptyJournalEntry(entry_id));
        };
        let currency = first.currency;
        if transactions.iter().any(|t| t.currency != currency) {
            return Err(LedgerError::MixedCurrencies(entry_id));
        }

        let total: Decimal = transactions.iter().map(|t| t.amount).sum();

        Ok(EntryTotals {
            debit_total: total,
            credit_total: total,
            currency,
            transaction_count: transactions.len(),
        })
    }

    /// Returns the entry transitioned to posted.
    pub fn post(
        entry: &JournalEntry,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> LedgerResult<JournalEntry> {
        Self::ensure_draft(entry)?;
        Ok(JournalEntry {
            status: JournalStatus::Posted,
            posted: true,
            posted_at: Some(now),
            posted_by: Some(actor),
            updated_at: now,
            ..entry.clone()
        })
    }

    /// Returns the entry transitioned to cancelled.
    pub fn cancel(
        entry: &JournalEntry,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> LedgerResult<JournalEntry> {
        Self::ensure_draft(entry)?;
        Ok(JournalEntry {
            status: JournalStatus::Cancelled,
            cancelled_at: Some(now),
            cancelled_by: Some(actor),
            updated_at: now,
            ..entry.clone()
        })
    }
}
