//! Ledger error types.
//!
//! Every failure the ledger can report is one `LedgerError` variant, and every
//! variant belongs to exactly one [`ErrorKind`]. Callers branch on the kind;
//! the variant carries the detail needed to correct the input.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_shared::AppError;
use tally_shared::types::{
    AccountId, BudgetId, BudgetItemId, CurrencyCode, FiscalPeriodId, JournalEntryId,
    TransactionId,
};
use thiserror::Error;

use crate::journal::JournalStatus;

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Coarse error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Entity absent or owned by another tenant.
    NotFound,
    /// Input rejected before any write.
    Validation,
    /// Uniqueness violation or lost state-transition race.
    Conflict,
    /// Write against a posted entry, a closed period or a locked field.
    ImmutableRecord,
    /// Delete blocked by existing references.
    Dependency,
    /// Unexpected backend failure.
    Storage,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Not Found Errors ==========
    /// Account not found in the tenant.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// No account with this code in the tenant.
    #[error("Account with code '{0}' not found")]
    AccountCodeNotFound(String),

    /// Transaction not found in the tenant.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// No transaction with this number in the tenant.
    #[error("Transaction '{0}' not found")]
    TransactionNumberNotFound(String),

    /// Journal entry not found in the tenant.
    #[error("Journal entry not found: {0}")]
    JournalEntryNotFound(JournalEntryId),

    /// Financial period not found in the tenant.
    #[error("Financial period not found: {0}")]
    PeriodNotFound(FiscalPeriodId),

    /// Budget not found in the tenant.
    #[error("Budget not found: {0}")]
    BudgetNotFound(BudgetId),

    /// Budget item not found in the tenant.
    #[error("Budget item not found: {0}")]
    BudgetItemNotFound(BudgetItemId),

    // ========== Validation Errors ==========
    /// A required text field is empty.
    #[error("Field '{0}' is required")]
    MissingField(&'static str),

    /// A text field exceeds its maximum length.
    #[error("Field '{field}' exceeds {max} characters")]
    FieldTooLong {
        /// Field name.
        field: &'static str,
        /// Maximum length.
        max: usize,
    },

    /// Transaction amount must be greater than zero.
    #[error("Amount must be greater than zero, got {0}")]
    NonPositiveAmount(Decimal),

    /// A budget amount must not be negative.
    #[error("Field '{field}' cannot be negative, got {amount}")]
    NegativeAmount {
        /// Field name.
        field: &'static str,
        /// Offending amount.
        amount: Decimal,
    },

    /// Debit and credit side are the same account.
    #[error("Debit and credit account must differ (both {0})")]
    SameAccount(AccountId),

    /// Account is inactive and cannot take new transactions.
    #[error("Account {0} is inactive")]
    AccountInactive(AccountId),

    /// Transaction currency differs from the account currency.
    #[error("Account {account} is kept in {expected}, transaction is in {actual}")]
    CurrencyMismatch {
        /// Account whose currency differs.
        account: AccountId,
        /// Account currency.
        expected: CurrencyCode,
        /// Transaction currency.
        actual: CurrencyCode,
    },

    /// Currency code is malformed.
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    /// Date range is empty or inverted.
    #[error("Invalid date range: {start} to {end}")]
    InvalidDateRange {
        /// Range start.
        start: NaiveDate,
        /// Range end.
        end: NaiveDate,
    },

    /// Parent assignment would create a cycle in the account tree.
    #[error("Account {0} cannot be its own ancestor")]
    ParentCycle(AccountId),

    /// Parent account does not exist in the tenant.
    #[error("Parent account not found: {0}")]
    ParentNotFound(AccountId),

    /// Journal entry has no transactions to post.
    #[error("Journal entry {0} has no transactions")]
    EmptyJournalEntry(JournalEntryId),

    /// Journal entry mixes currencies.
    #[error("Journal entry {0} mixes currencies")]
    MixedCurrencies(JournalEntryId),

    /// Amount carries more decimal places than the ledger stores.
    #[error("Field '{field}' allows at most {max} decimal places, got {scale}")]
    AmountTooPrecise {
        /// Field name.
        field: &'static str,
        /// Decimal places supplied.
        scale: u32,
        /// Decimal places allowed.
        max: u32,
    },

    /// Amount magnitude exceeds what the ledger stores.
    #[error("Field '{field}' is out of range, got {amount}")]
    AmountOutOfRange {
        /// Field name.
        field: &'static str,
        /// Offending amount.
        amount: Decimal,
    },

    // ========== Conflict Errors ==========
    /// Account code already used in the tenant.
    #[error("Account code '{0}' already exists")]
    DuplicateAccountCode(String),

    /// Generated number already used in the tenant.
    #[error("Number '{0}' already exists")]
    DuplicateNumber(String),

    /// No unused number found within the configured attempts.
    #[error("Could not allocate a unique number after {0} attempts")]
    NumberExhausted(u32),

    /// Journal entry is not in draft state.
    #[error("Journal entry {id} is {status}, expected draft")]
    EntryNotDraft {
        /// Entry ID.
        id: JournalEntryId,
        /// Current status.
        status: JournalStatus,
    },

    /// Transaction already belongs to a journal entry.
    #[error("Transaction {transaction} already belongs to journal entry {entry}")]
    AlreadyAttached {
        /// Transaction ID.
        transaction: TransactionId,
        /// Owning entry.
        entry: JournalEntryId,
    },

    /// Transaction does not belong to the given journal entry.
    #[error("Transaction {transaction} is not attached to journal entry {entry}")]
    NotAttached {
        /// Transaction ID.
        transaction: TransactionId,
        /// Entry the caller named.
        entry: JournalEntryId,
    },

    /// Period overlaps an existing period of the tenant.
    #[error("Period overlaps existing period '{0}'")]
    PeriodOverlap(String),

    /// Budget already has an item for this account.
    #[error("Budget already has an item for account {0}")]
    DuplicateBudgetItem(AccountId),

    // ========== Immutable Record Errors ==========
    /// Transaction belongs to a posted journal entry.
    #[error("Transaction belongs to posted journal entry {0}")]
    EntryPosted(JournalEntryId),

    /// Date falls inside a closed period.
    #[error("Date {date} falls in closed period '{period}'")]
    PeriodClosed {
        /// Offending date.
        date: NaiveDate,
        /// Period name.
        period: String,
    },

    /// Field cannot change once transactions reference the account.
    #[error("Cannot change {field} of account {account}: it has transactions")]
    AccountFieldLocked {
        /// Account ID.
        account: AccountId,
        /// Locked field.
        field: &'static str,
    },

    /// System accounts are protected.
    #[error("Account {0} is a system account")]
    SystemAccount(AccountId),

    /// Closed budgets reject changes.
    #[error("Budget {0} is closed")]
    BudgetClosed(BudgetId),

    // ========== Dependency Errors ==========
    /// Account is still referenced.
    #[error(
        "Account {account} is in use: {transactions} transactions, {budget_items} budget items, {children} child accounts"
    )]
    AccountInUse {
        /// Account ID.
        account: AccountId,
        /// Referencing transactions.
        transactions: u64,
        /// Referencing budget items.
        budget_items: u64,
        /// Child accounts.
        children: u64,
    },

    // ========== Storage Errors ==========
    /// Backend failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AccountNotFound(_)
            | Self::AccountCodeNotFound(_)
            | Self::TransactionNotFound(_)
            | Self::TransactionNumberNotFound(_)
            | Self::JournalEntryNotFound(_)
            | Self::PeriodNotFound(_)
            | Self::BudgetNotFound(_)
            | Self::BudgetItemNotFound(_) => ErrorKind::NotFound,

            Self::MissingField(_)
            | Self::FieldTooLong { .. }
            | Self::NonPositiveAmount(_)
            | Self::NegativeAmount { .. }
            | Self::SameAccount(_)
            | Self::AccountInactive(_)
            | Self::CurrencyMismatch { .. }
            | Self::InvalidCurrency(_)
            | Self::InvalidDateRange { .. }
            | Self::ParentCycle(_)
            | Self::ParentNotFound(_)
            | Self::EmptyJournalEntry(_)
            | Self::MixedCurrencies(_)
            | Self::AmountTooPrecise { .. }
            | Self::AmountOutOfRange { .. } => ErrorKind::Validation,

            Self::DuplicateAccountCode(_)
            | Self::DuplicateNumber(_)
            | Self::NumberExhausted(_)
            | Self::EntryNotDraft { .. }
            | Self::AlreadyAttached { .. }
            | Self::NotAttached { .. }
            | Self::PeriodOverlap(_)
            | Self::DuplicateBudgetItem(_) => ErrorKind::Conflict,

            Self::EntryPosted(_)
            | Self::PeriodClosed { .. }
            | Self::AccountFieldLocked { .. }
            | Self::SystemAccount(_)
            | Self::BudgetClosed(_) => ErrorKind::ImmutableRecord,

            Self::AccountInUse { .. } => ErrorKind::Dependency,

            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AccountNotFound(_) | Self::AccountCodeNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::TransactionNotFound(_) | Self::TransactionNumberNotFound(_) => {
                "TRANSACTION_NOT_FOUND"
            }
            Self::JournalEntryNotFound(_) => "JOURNAL_ENTRY_NOT_FOUND",
            Self::PeriodNotFound(_) => "PERIOD_NOT_FOUND",
            Self::BudgetNotFound(_) => "BUDGET_NOT_FOUND",
            Self::BudgetItemNotFound(_) => "BUDGET_ITEM_NOT_FOUND",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::FieldTooLong { .. } => "FIELD_TOO_LONG",
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::SameAccount(_) => "SAME_ACCOUNT",
            Self::AccountInactive(_) => "ACCOUNT_INACTIVE",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::InvalidCurrency(_) => "INVALID_CURRENCY",
            Self::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            Self::ParentCycle(_) => "PARENT_CYCLE",
            Self::ParentNotFound(_) => "PARENT_NOT_FOUND",
            Self::EmptyJournalEntry(_) => "EMPTY_JOURNAL_ENTRY",
            Self::MixedCurrencies(_) => "MIXED_CURRENCIES",
            Self::AmountTooPrecise { .. } => "AMOUNT_TOO_PRECISE",
            Self::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            Self::DuplicateAccountCode(_) => "DUPLICATE_ACCOUNT_CODE",
            Self::DuplicateNumber(_) => "DUPLICATE_NUMBER",
            Self::NumberExhausted(_) => "NUMBER_EXHAUSTED",
            Self::EntryNotDraft { .. } => "ENTRY_NOT_DRAFT",
            Self::AlreadyAttached { .. } => "ALREADY_ATTACHED",
            Self::NotAttached { .. } => "NOT_ATTACHED",
            Self::PeriodOverlap(_) => "PERIOD_OVERLAP",
            Self::DuplicateBudgetItem(_) => "DUPLICATE_BUDGET_ITEM",
            Self::EntryPosted(_) => "ENTRY_POSTED",
            Self::PeriodClosed { .. } => "PERIOD_CLOSED",
            Self::AccountFieldLocked { .. } => "ACCOUNT_FIELD_LOCKED",
            Self::SystemAccount(_) => "SYSTEM_ACCOUNT",
            Self::BudgetClosed(_) => "BUDGET_CLOSED",
            Self::AccountInUse { .. } => "ACCOUNT_IN_USE",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Returns true if a read that failed with this error may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::Conflict => Self::Conflict(message),
            ErrorKind::ImmutableRecord => Self::ImmutableRecord(message),
            ErrorKind::Dependency => Self::Dependency(message),
            ErrorKind::Storage => Self::Database(message),
        }
    }
}
