//! Storage port for the ledger.
//!
//! Implementations own atomicity: every method runs in one storage
//! transaction, and the guards that must hold at commit time (closed periods,
//! posted entries, draft status, reference counts, locked account fields,
//! open budgets, period overlap) are checked inside it rather than by the
//! caller.
//!
//! Reads return `Ok(None)` for absent rows or rows of another tenant; the
//! caller maps that to the matching `NotFound` error.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tally_shared::types::{
    AccountId, BudgetId, BudgetItemId, FiscalPeriodId, JournalEntryId, TenantId, TransactionId,
    UserId,
};

use crate::accounts::{Account, AccountFilter, AccountReferences};
use crate::budget::{Budget, BudgetItem};
use crate::error::LedgerResult;
use crate::fiscal::FinancialPeriod;
use crate::journal::{JournalEntry, JournalStatus};
use crate::ledger::{DateWindow, LedgerTransaction, Movement, TransactionFilter};

mod memory;

pub use memory::MemoryLedgerStore;

/// Persistence operations required by [`crate::engine::GeneralLedger`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ========== Accounts ==========

    /// Inserts an account. Fails with `DuplicateAccountCode` on a taken code.
    async fn insert_account(&self, account: &Account) -> LedgerResult<()>;

    /// Fetches an account.
    async fn get_account(&self, tenant_id: TenantId, id: AccountId)
    -> LedgerResult<Option<Account>>;

    /// Fetches an account by code.
    async fn get_account_by_code(
        &self,
        tenant_id: TenantId,
        code: &str,
    ) -> LedgerResult<Option<Account>>;

    /// Lists accounts matching the filter, ordered by code.
    async fn list_accounts(
        &self,
        tenant_id: TenantId,
        filter: &AccountFilter,
    ) -> LedgerResult<Vec<Account>>;

    /// Replaces an account. Fails with `DuplicateAccountCode` on a taken code.
    ///
    /// The stored row is compared with `account` after counting references in
    /// the same transaction; a type or currency change on a referenced
    /// account fails with `AccountFieldLocked`.
    async fn update_account(&self, account: &Account) -> LedgerResult<()>;

    /// Deletes an account once nothing references it.
    ///
    /// The reference count and the delete happen in one transaction; a
    /// referenced account fails with `AccountInUse`, a system account with
    /// `SystemAccount`.
    async fn delete_account(&self, tenant_id: TenantId, id: AccountId) -> LedgerResult<()>;

    /// Counts the records that point at an account.
    async fn account_references(
        &self,
        tenant_id: TenantId,
        id: AccountId,
    ) -> LedgerResult<AccountReferences>;

    /// Overwrites the cached `current_balance` of each listed account.
    async fn set_balance_hints(
        &self,
        tenant_id: TenantId,
        balances: &[(AccountId, Decimal)],
    ) -> LedgerResult<()>;

    // ========== Transactions ==========

    /// Inserts a transaction.
    ///
    /// Both accounts are re-checked as stored at commit time (`AccountNotFound`,
    /// `AccountInactive`, `CurrencyMismatch`). Fails with `PeriodClosed` when
    /// its date lies in a closed period and with `DuplicateNumber` when its
    /// number is taken.
    async fn insert_transaction(&self, txn: &LedgerTransaction) -> LedgerResult<()>;

    /// Fetches a transaction.
    async fn get_transaction(
        &self,
        tenant_id: TenantId,
        id: TransactionId,
    ) -> LedgerResult<Option<LedgerTransaction>>;

    /// Fetches a transaction by number.
    async fn get_transaction_by_number(
        &self,
        tenant_id: TenantId,
        number: &str,
    ) -> LedgerResult<Option<LedgerTransaction>>;

    /// Lists transactions, newest transaction date first, then newest created.
    async fn list_transactions(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
    ) -> LedgerResult<Vec<LedgerTransaction>>;

    /// Replaces a transaction's editable fields.
    ///
    /// The stored journal entry link is kept. Fails with `EntryPosted` when
    /// the owning entry is posted and with `PeriodClosed` when the stored or
    /// the new date lies in a closed period. Accounts are re-checked as on
    /// insert.
    async fn update_transaction(&self, txn: &LedgerTransaction) -> LedgerResult<()>;

    /// Deletes a transaction under the same guards as an update.
    async fn delete_transaction(&self, tenant_id: TenantId, id: TransactionId)
    -> LedgerResult<()>;

    // ========== Journal Entries ==========

    /// Inserts a draft entry. Fails with `DuplicateNumber` on a taken number.
    async fn insert_journal_entry(&self, entry: &JournalEntry) -> LedgerResult<()>;

    /// Fetches an entry.
    async fn get_journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
    ) -> LedgerResult<Option<JournalEntry>>;

    /// Lists entries, newest entry date first.
    async fn list_journal_entries(
        &self,
        tenant_id: TenantId,
        status: Option<JournalStatus>,
    ) -> LedgerResult<Vec<JournalEntry>>;

    /// Links a transaction to a draft entry.
    ///
    /// Returns `false` when the transaction already belonged to this entry.
    async fn attach_transaction(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        transaction_id: TransactionId,
    ) -> LedgerResult<bool>;

    /// Unlinks a transaction from a draft entry.
    async fn detach_transaction(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        transaction_id: TransactionId,
    ) -> LedgerResult<()>;

    /// Moves a draft entry to posted after checking it balances.
    ///
    /// Exactly one of several concurrent callers succeeds; the others fail
    /// with `EntryNotDraft`.
    async fn post_journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> LedgerResult<JournalEntry>;

    /// Moves a draft entry to cancelled and releases its transactions.
    async fn cancel_journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> LedgerResult<JournalEntry>;

    // ========== Financial Periods ==========

    /// Inserts a period. Fails with `PeriodOverlap` against existing periods.
    async fn insert_period(&self, period: &FinancialPeriod) -> LedgerResult<()>;

    /// Fetches a period.
    async fn get_period(
        &self,
        tenant_id: TenantId,
        id: FiscalPeriodId,
    ) -> LedgerResult<Option<FinancialPeriod>>;

    /// Lists periods ordered by start date.
    async fn list_periods(&self, tenant_id: TenantId) -> LedgerResult<Vec<FinancialPeriod>>;

    /// Closes a period, capturing its income statement totals.
    ///
    /// Returns the stored record and whether this call closed it. A period
    /// that is already closed comes back unchanged with `false`.
    async fn close_period(
        &self,
        tenant_id: TenantId,
        id: FiscalPeriodId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> LedgerResult<(FinancialPeriod, bool)>;

    // ========== Budgets ==========

    /// Inserts a budget.
    async fn insert_budget(&self, budget: &Budget) -> LedgerResult<()>;

    /// Fetches a budget.
    async fn get_budget(&self, tenant_id: TenantId, id: BudgetId) -> LedgerResult<Option<Budget>>;

    /// Lists budgets, newest start date first.
    async fn list_budgets(&self, tenant_id: TenantId) -> LedgerResult<Vec<Budget>>;

    /// Replaces a budget.
    async fn update_budget(&self, budget: &Budget) -> LedgerResult<()>;

    /// Deletes a budget together with its items.
    async fn delete_budget(&self, tenant_id: TenantId, id: BudgetId) -> LedgerResult<()>;

    /// Inserts an item. Fails with `DuplicateBudgetItem` for a repeated account
    /// and with `BudgetClosed` when the budget is closed at commit time.
    async fn insert_budget_item(&self, item: &BudgetItem) -> LedgerResult<()>;

    /// Fetches an item.
    async fn get_budget_item(
        &self,
        tenant_id: TenantId,
        id: BudgetItemId,
    ) -> LedgerResult<Option<BudgetItem>>;

    /// Lists the items of a budget.
    async fn list_budget_items(
        &self,
        tenant_id: TenantId,
        budget_id: BudgetId,
    ) -> LedgerResult<Vec<BudgetItem>>;

    /// Replaces an item of an open budget.
    async fn update_budget_item(&self, item: &BudgetItem) -> LedgerResult<()>;

    /// Deletes an item of an open budget.
    async fn delete_budget_item(&self, tenant_id: TenantId, id: BudgetItemId) -> LedgerResult<()>;

    // ========== Reporting ==========

    /// Debit and credit totals per account for transactions in the window.
    async fn account_movements(
        &self,
        tenant_id: TenantId,
        window: DateWindow,
    ) -> LedgerResult<HashMap<AccountId, Movement>>;

    // ========== Numbering ==========

    /// Next value of a per-tenant counter, starting at 1.
    async fn next_sequence(&self, tenant_id: TenantId, name: &str) -> LedgerResult<u64>;
}
