//! Journal entry types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::{JournalEntryId, TenantId, UserId};

use crate::ledger::LedgerTransaction;

/// Lifecycle state of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalStatus {
    /// Open for attaching transactions.
    Draft,
    /// Terminal. Attached transactions are frozen.
    Posted,
    /// Terminal. Reached only from draft.
    Cancelled,
}

impl JournalStatus {
    /// Stable storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Posted => "posted",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true for posted and cancelled.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Draft)
    }
}

impl std::fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A journal entry header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier.
    pub id: JournalEntryId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Generated number, unique per tenant.
    pub number: String,
    /// Business date.
    pub entry_date: NaiveDate,
    /// Description.
    pub description: String,
    /// Lifecycle state.
    pub status: JournalStatus,
    /// Mirrors `status == Posted`.
    pub posted: bool,
    /// When the entry was posted.
    pub posted_at: Option<DateTime<Utc>>,
    /// Who posted the entry.
    pub posted_by: Option<UserId>,
    /// When the entry was cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Who cancelled the entry.
    pub cancelled_by: Option<UserId>,
    /// Creator.
    pub created_by: Option<UserId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a journal entry.
#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    /// Business date.
    pub entry_date: NaiveDate,
    /// Description.
    pub description: String,
    /// Creator.
    pub created_by: Option<UserId>,
}

impl NewJournalEntry {
    /// Creates a journal entry input.
    #[must_use]
    pub fn new(entry_date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            entry_date,
            description: description.into(),
            created_by: None,
        }
    }
}

/// A journal entry together with its transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntryWithTransactions {
    /// Header.
    pub entry: JournalEntry,
    /// Attached transactions, oldest first.
    pub transactions: Vec<LedgerTransaction>,
}
