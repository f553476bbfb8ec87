//! Ledger transaction types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{
    AccountId, CurrencyCode, JournalEntryId, TenantId, TransactionId, UserId,
};

/// Business nature of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money earned.
    Income,
    /// Money spent.
    Expense,
    /// Movement between the tenant's own accounts.
    Transfer,
    /// Manual correction.
    Adjustment,
    /// Money returned.
    Refund,
}

/// Processing status. Does not affect balance aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Awaiting settlement.
    Pending,
    /// Settled.
    #[default]
    Completed,
    /// Cancelled by the caller.
    Cancelled,
    /// Failed to settle.
    Failed,
}

/// Kind of external document a transaction originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Sales invoice.
    Invoice,
    /// Purchase order.
    PurchaseOrder,
    /// Supplier bill.
    Bill,
    /// Payment receipt.
    Payment,
    /// Approved investment.
    Investment,
    /// Anything else.
    Other,
}

impl DocumentKind {
    /// Stable storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::PurchaseOrder => "purchase_order",
            Self::Bill => "bill",
            Self::Payment => "payment",
            Self::Investment => "investment",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoice" => Ok(Self::Invoice),
            "purchase_order" => Ok(Self::PurchaseOrder),
            "bill" => Ok(Self::Bill),
            "payment" => Ok(Self::Payment),
            "investment" => Ok(Self::Investment),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown document kind: {s}")),
        }
    }
}

/// Pointer to the external document behind a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    /// Document kind.
    pub kind: DocumentKind,
    /// Identifier in the owning module.
    pub id: String,
}

impl DocumentReference {
    /// Creates a document reference.
    #[must_use]
    pub fn new(kind: DocumentKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

/// A double-entry record: one debit side, one credit side, one amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Unique identifier.
    pub id: TransactionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Generated number, unique per tenant.
    pub number: String,
    /// Business date.
    pub transaction_date: NaiveDate,
    /// Business nature.
    pub transaction_type: TransactionType,
    /// Processing status.
    pub status: TransactionStatus,
    /// Account debited.
    pub debit_account_id: AccountId,
    /// Account credited.
    pub credit_account_id: AccountId,
    /// Amount, always positive.
    pub amount: Decimal,
    /// Currency of the amount.
    pub currency: CurrencyCode,
    /// Free text description.
    pub description: String,
    /// Originating document.
    pub reference: Option<DocumentReference>,
    /// Owning journal entry.
    pub journal_entry_id: Option<JournalEntryId>,
    /// Creator.
    pub created_by: Option<UserId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Returns true if the account is either side of this transaction.
    #[must_use]
    pub fn touches(&self, account_id: AccountId) -> bool {
        self.debit_account_id == account_id || self.credit_account_id == account_id
    }
}

/// Input for creating a transaction.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Business date.
    pub transaction_date: NaiveDate,
    /// Business nature.
    pub transaction_type: TransactionType,
    /// Processing status.
    pub status: TransactionStatus,
    /// Account debited.
    pub debit_account_id: AccountId,
    /// Account credited.
    pub credit_account_id: AccountId,
    /// Amount, must be positive.
    pub amount: Decimal,
    /// Currency; the debit account's currency when `None`.
    pub currency: Option<CurrencyCode>,
    /// Description, required.
    pub description: String,
    /// Originating document.
    pub reference: Option<DocumentReference>,
    /// Creator.
    pub created_by: Option<UserId>,
}

impl NewTransaction {
    /// Creates a completed transaction input.
    #[must_use]
    pub fn new(
        transaction_type: TransactionType,
        transaction_date: NaiveDate,
        debit_account_id: AccountId,
        credit_account_id: AccountId,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            transaction_date,
            transaction_type,
            status: TransactionStatus::default(),
            debit_account_id,
            credit_account_id,
            amount,
            currency: None,
            description: description.into(),
            reference: None,
            created_by: None,
        }
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the currency.
    #[must_use]
    pub const fn with_currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = Some(currency);
        self
    }

    /// Sets the originating document.
    #[must_use]
    pub fn with_reference(mut self, reference: DocumentReference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Sets the creator.
    #[must_use]
    pub const fn created_by(mut self, user: UserId) -> Self {
        self.created_by = Some(user);
        self
    }
}

/// Partial update for a transaction. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    /// New business date.
    pub transaction_date: Option<NaiveDate>,
    /// New business nature.
    pub transaction_type: Option<TransactionType>,
    /// New status.
    pub status: Option<TransactionStatus>,
    /// New debit account.
    pub debit_account_id: Option<AccountId>,
    /// New credit account.
    pub credit_account_id: Option<AccountId>,
    /// New amount.
    pub amount: Option<Decimal>,
    /// New currency.
    pub currency: Option<CurrencyCode>,
    /// New description.
    pub description: Option<String>,
    /// New reference (`Some(None)` clears it).
    pub reference: Option<Option<DocumentReference>>,
}

/// Query criteria for listing transactions. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Account on either side.
    pub account_id: Option<AccountId>,
    /// Earliest transaction date, inclusive.
    pub from: Option<NaiveDate>,
    /// Latest transaction date, inclusive.
    pub to: Option<NaiveDate>,
    /// Business nature.
    pub transaction_type: Option<TransactionType>,
    /// Status.
    pub status: Option<TransactionStatus>,
    /// Owning journal entry.
    pub journal_entry_id: Option<JournalEntryId>,
}

impl TransactionFilter {
    /// Transactions touching an account.
    #[must_use]
    pub fn for_account(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
            ..Self::default()
        }
    }

    /// Transactions dated within `[from, to]`.
    #[must_use]
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    /// Returns true if the transaction passes every set criterion.
    #[must_use]
    pub fn matches(&self, txn: &LedgerTransaction) -> bool {
        self.account_id.is_none_or(|a| txn.touches(a))
            && self.from.is_none_or(|d| txn.transaction_date >= d)
            && self.to.is_none_or(|d| txn.transaction_date <= d)
            && self.transaction_type.is_none_or(|t| txn.transaction_type == t)
            && self.status.is_none_or(|s| txn.status == s)
            && self
                .journal_entry_id
                .is_none_or(|e| txn.journal_entry_id == Some(e))
    }
}

/// Debit and credit totals of one account over a date range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Sum of amounts where the account is the debit side.
    pub debit: Decimal,
    /// Sum of amounts where the account is the credit side.
    pub credit: Decimal,
}

impl Movement {
    /// Adds a debit.
    pub fn add_debit(&mut self, amount: Decimal) {
        self.debit += amount;
    }

    /// Adds a credit.
    pub fn add_credit(&mut self, amount: Decimal) {
        self.credit += amount;
    }
}

/// Inclusive date window for aggregation. Unset bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DateWindow {
    /// Earliest date, inclusive.
    pub from: Option<NaiveDate>,
    /// Latest date, inclusive.
    pub to: Option<NaiveDate>,
}

impl DateWindow {
    /// Everything dated on or before `as_of`; everything when `None`.
    #[must_use]
    pub const fn up_to(as_of: Option<NaiveDate>) -> Self {
        Self {
            from: None,
            to: as_of,
        }
    }

    /// Everything dated within `[start, end]`.
    #[must_use]
    pub const fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            from: Some(start),
            to: Some(end),
        }
    }

    /// Returns true if the date lies inside the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|f| date >= f) && self.to.is_none_or(|t| date <= t)
    }
}
