//! In-memory ledger store.
//!
//! Every write holds one lock over all tables, so each method is atomic and
//! concurrent writers serialize. Used by tests and local tooling.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tally_shared::types::{
    AccountId, BudgetId, BudgetItemId, FiscalPeriodId, JournalEntryId, TenantId, TransactionId,
    UserId,
};
use tokio::sync::RwLock;

use super::LedgerStore;
use crate::accounts::{Account, AccountFilter, AccountReferences, AccountService};
use crate::budget::{Budget, BudgetItem, BudgetService};
use crate::error::{LedgerError, LedgerResult};
use crate::fiscal::{FinancialPeriod, PeriodService};
use crate::journal::{JournalEntry, JournalService, JournalStatus};
use crate::ledger::{
    DateWindow, LedgerTransaction, Movement, TransactionFilter, TransactionValidator,
    aggregate_movements,
};
use crate::reports::ReportService;

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    transactions: HashMap<TransactionId, LedgerTransaction>,
    entries: HashMap<JournalEntryId, JournalEntry>,
    periods: HashMap<FiscalPeriodId, FinancialPeriod>,
    budgets: HashMap<BudgetId, Budget>,
    budget_items: HashMap<BudgetItemId, BudgetItem>,
    sequences: HashMap<(TenantId, String), u64>,
}

impl Tables {
    fn account(&self, tenant_id: TenantId, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id).filter(|a| a.tenant_id == tenant_id)
    }

    fn transaction(&self, tenant_id: TenantId, id: TransactionId) -> Option<&LedgerTransaction> {
        self.transactions.get(&id).filter(|t| t.tenant_id == tenant_id)
    }

    fn entry(&self, tenant_id: TenantId, id: JournalEntryId) -> Option<&JournalEntry> {
        self.entries.get(&id).filter(|e| e.tenant_id == tenant_id)
    }

    fn period(&self, tenant_id: TenantId, id: FiscalPeriodId) -> Option<&FinancialPeriod> {
        self.periods.get(&id).filter(|p| p.tenant_id == tenant_id)
    }

    fn budget(&self, tenant_id: TenantId, id: BudgetId) -> Option<&Budget> {
        self.budgets.get(&id).filter(|b| b.tenant_id == tenant_id)
    }

    fn budget_item(&self, tenant_id: TenantId, id: BudgetItemId) -> Option<&BudgetItem> {
        self.budget_items.get(&id).filter(|i| i.tenant_id == tenant_id)
    }

    /// Re-checks both sides against the accounts as stored now.
    fn ensure_sides_match(&self, txn: &LedgerTransaction) -> LedgerResult<()> {
        let debit = self
            .account(txn.tenant_id, txn.debit_account_id)
            .ok_or(LedgerError::AccountNotFound(txn.debit_account_id))?;
        let credit = self
            .account(txn.tenant_id, txn.credit_account_id)
            .ok_or(LedgerError::AccountNotFound(txn.credit_account_id))?;
        TransactionValidator::validate_accounts(debit, credit, Some(txn.currency)).map(|_| ())
    }

    fn ensure_item_mutable(&self, tenant_id: TenantId, id: BudgetItemId) -> LedgerResult<()> {
        let item = self
            .budget_item(tenant_id, id)
            .ok_or(LedgerError::BudgetItemNotFound(id))?;
        let budget = self
            .budget(tenant_id, item.budget_id)
            .ok_or(LedgerError::BudgetNotFound(item.budget_id))?;
        BudgetService::ensure_open(budget)
    }

    fn code_taken(&self, account: &Account) -> bool {
        self.accounts.values().any(|a| {
            a.tenant_id == account.tenant_id && a.code == account.code && a.id != account.id
        })
    }

    fn number_taken(&self, tenant_id: TenantId, number: &str) -> bool {
        self.transactions
            .values()
            .any(|t| t.tenant_id == tenant_id && t.number == number)
            || self
                .entries
                .values()
                .any(|e| e.tenant_id == tenant_id && e.number == number)
    }

    fn references(&self, tenant_id: TenantId, id: AccountId) -> AccountReferences {
        let count = |n: usize| u64::try_from(n).unwrap_or(u64::MAX);
        AccountReferences {
            transactions: count(
                self.transactions
                    .values()
                    .filter(|t| t.tenant_id == tenant_id && t.touches(id))
                    .count(),
            ),
            budget_items: count(
                self.budget_items
                    .values()
                    .filter(|i| i.tenant_id == tenant_id && i.account_id == id)
                    .count(),
            ),
            children: count(
                self.accounts
                    .values()
                    .filter(|a| a.tenant_id == tenant_id && a.parent_id == Some(id))
                    .count(),
            ),
        }
    }

    fn tenant_periods(&self, tenant_id: TenantId) -> Vec<FinancialPeriod> {
        self.periods
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    fn ensure_dates_open(&self, tenant_id: TenantId, dates: &[NaiveDate]) -> LedgerResult<()> {
        let periods = self.tenant_periods(tenant_id);
        for date in dates {
            PeriodService::ensure_date_open(&periods, *date)?;
        }
        Ok(())
    }

    /// Guards shared by transaction update and delete.
    fn ensure_transaction_mutable(
        &self,
        current: &LedgerTransaction,
        new_date: NaiveDate,
    ) -> LedgerResult<()> {
        if let Some(entry_id) = current.journal_entry_id
            && let Some(entry) = self.entries.get(&entry_id)
            && entry.status == JournalStatus::Posted
        {
            return Err(LedgerError::EntryPosted(entry_id));
        }
        self.ensure_dates_open(current.tenant_id, &[current.transaction_date, new_date])
    }

    fn entry_transactions(&self, entry_id: JournalEntryId) -> Vec<LedgerTransaction> {
        let mut txns: Vec<LedgerTransaction> = self
            .transactions
            .values()
            .filter(|t| t.journal_entry_id == Some(entry_id))
            .cloned()
            .collect();
        txns.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        txns
    }

    fn movements(&self, tenant_id: TenantId, window: DateWindow) -> HashMap<AccountId, Movement> {
        aggregate_movements(
            self.transactions.values().filter(|t| t.tenant_id == tenant_id),
            window,
        )
    }
}

/// Ledger store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    tables: RwLock<Tables>,
}

impl MemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_account(&self, account: &Account) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        if tables.code_taken(account) {
            return Err(LedgerError::DuplicateAccountCode(account.code.clone()));
        }
        if let Some(parent_id) = account.parent_id
            && tables.account(account.tenant_id, parent_id).is_none()
        {
            return Err(LedgerError::ParentNotFound(parent_id));
        }
        tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account(
        &self,
        tenant_id: TenantId,
        id: AccountId,
    ) -> LedgerResult<Option<Account>> {
        Ok(self.tables.read().await.account(tenant_id, id).cloned())
    }

    async fn get_account_by_code(
        &self,
        tenant_id: TenantId,
        code: &str,
    ) -> LedgerResult<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .find(|a| a.tenant_id == tenant_id && a.code == code)
            .cloned())
    }

    async fn list_accounts(
        &self,
        tenant_id: TenantId,
        filter: &AccountFilter,
    ) -> LedgerResult<Vec<Account>> {
        let tables = self.tables.read().await;
        let mut accounts: Vec<Account> = tables
            .accounts
            .values()
            .filter(|a| a.tenant_id == tenant_id && filter.matches(a))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn update_account(&self, account: &Account) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .account(account.tenant_id, account.id)
            .ok_or(LedgerError::AccountNotFound(account.id))?;
        AccountService::ensure_fields_unlocked(
            stored,
            account,
            tables.references(account.tenant_id, account.id),
        )?;
        if tables.code_taken(account) {
            return Err(LedgerError::DuplicateAccountCode(account.code.clone()));
        }
        tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn delete_account(&self, tenant_id: TenantId, id: AccountId) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        let account = tables
            .account(tenant_id, id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        AccountService::ensure_deletable(account, tables.references(tenant_id, id))?;
        tables.accounts.remove(&id);
        Ok(())
    }

    async fn account_references(
        &self,
        tenant_id: TenantId,
        id: AccountId,
    ) -> LedgerResult<AccountReferences> {
        Ok(self.tables.read().await.references(tenant_id, id))
    }

    async fn set_balance_hints(
        &self,
        tenant_id: TenantId,
        balances: &[(AccountId, Decimal)],
    ) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        for (id, balance) in balances {
            if let Some(account) = tables
                .accounts
                .get_mut(id)
                .filter(|a| a.tenant_id == tenant_id)
            {
                account.current_balance = *balance;
            }
        }
        Ok(())
    }

    async fn insert_transaction(&self, txn: &LedgerTransaction) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        tables.ensure_sides_match(txn)?;
        tables.ensure_dates_open(txn.tenant_id, &[txn.transaction_date])?;
        if tables.number_taken(txn.tenant_id, &txn.number) {
            return Err(LedgerError::DuplicateNumber(txn.number.clone()));
        }
        tables.transactions.insert(txn.id, txn.clone());
        Ok(())
    }

    async fn get_transaction(
        &self,
        tenant_id: TenantId,
        id: TransactionId,
    ) -> LedgerResult<Option<LedgerTransaction>> {
        Ok(self.tables.read().await.transaction(tenant_id, id).cloned())
    }

    async fn get_transaction_by_number(
        &self,
        tenant_id: TenantId,
        number: &str,
    ) -> LedgerResult<Option<LedgerTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .values()
            .find(|t| t.tenant_id == tenant_id && t.number == number)
            .cloned())
    }

    async fn list_transactions(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        let tables = self.tables.read().await;
        let mut txns: Vec<LedgerTransaction> = tables
            .transactions
            .values()
            .filter(|t| t.tenant_id == tenant_id && filter.matches(t))
            .cloned()
            .collect();
        txns.sort_by(|a, b| {
            b.transaction_date
                .cmp(&a.transaction_date)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(txns)
    }

    async fn update_transaction(&self, txn: &LedgerTransaction) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        let current = tables
            .transaction(txn.tenant_id, txn.id)
            .ok_or(LedgerError::TransactionNotFound(txn.id))?;
        tables.ensure_transaction_mutable(current, txn.transaction_date)?;
        tables.ensure_sides_match(txn)?;

        let stored = LedgerTransaction {
            journal_entry_id: current.journal_entry_id,
            number: current.number.clone(),
            created_at: current.created_at,
            ..txn.clone()
        };
        tables.transactions.insert(txn.id, stored);
        Ok(())
    }

    async fn delete_transaction(
        &self,
        tenant_id: TenantId,
        id: TransactionId,
    ) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        let current = tables
            .transaction(tenant_id, id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        tables.ensure_transaction_mutable(current, current.transaction_date)?;
        tables.transactions.remove(&id);
        Ok(())
    }

    async fn insert_journal_entry(&self, entry: &JournalEntry) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        if tables.number_taken(entry.tenant_id, &entry.number) {
            return Err(LedgerError::DuplicateNumber(entry.number.clone()));
        }
        tables.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get_journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
    ) -> LedgerResult<Option<JournalEntry>> {
        Ok(self.tables.read().await.entry(tenant_id, id).cloned())
    }

    async fn list_journal_entries(
        &self,
        tenant_id: TenantId,
        status: Option<JournalStatus>,
    ) -> LedgerResult<Vec<JournalEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<JournalEntry> = tables
            .entries
            .values()
            .filter(|e| e.tenant_id == tenant_id && status.is_none_or(|s| e.status == s))
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            b.entry_date
                .cmp(&a.entry_date)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(entries)
    }

    async fn attach_transaction(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        transaction_id: TransactionId,
    ) -> LedgerResult<bool> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .entry(tenant_id, entry_id)
            .ok_or(LedgerError::JournalEntryNotFound(entry_id))?;
        let txn = tables
            .transaction(tenant_id, transaction_id)
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
        if !JournalService::ensure_attachable(entry, txn)? {
            return Ok(false);
        }
        if let Some(txn) = tables.transactions.get_mut(&transaction_id) {
            txn.journal_entry_id = Some(entry_id);
        }
        Ok(true)
    }

    async fn detach_transaction(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        transaction_id: TransactionId,
    ) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .entry(tenant_id, entry_id)
            .ok_or(LedgerError::JournalEntryNotFound(entry_id))?;
        let txn = tables
            .transaction(tenant_id, transaction_id)
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
        JournalService::ensure_detachable(entry, txn)?;
        if let Some(txn) = tables.transactions.get_mut(&transaction_id) {
            txn.journal_entry_id = None;
        }
        Ok(())
    }

    async fn post_journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> LedgerResult<JournalEntry> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .entry(tenant_id, id)
            .ok_or(LedgerError::JournalEntryNotFound(id))?;
        JournalService::ensure_draft(entry)?;
        JournalService::validate_postable(id, &tables.entry_transactions(id))?;
        let posted = JournalService::post(entry, actor, now)?;
        tables.entries.insert(id, posted.clone());
        Ok(posted)
    }

    async fn cancel_journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> LedgerResult<JournalEntry> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .entry(tenant_id, id)
            .ok_or(LedgerError::JournalEntryNotFound(id))?;
        let cancelled = JournalService::cancel(entry, actor, now)?;
        for txn in tables.transactions.values_mut() {
            if txn.journal_entry_id == Some(id) {
                txn.journal_entry_id = None;
            }
        }
        tables.entries.insert(id, cancelled.clone());
        Ok(cancelled)
    }

    async fn insert_period(&self, period: &FinancialPeriod) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(clash) = tables.periods.values().find(|p| {
            p.tenant_id == period.tenant_id && p.overlaps(period.start_date, period.end_date)
        }) {
            return Err(LedgerError::PeriodOverlap(clash.name.clone()));
        }
        tables.periods.insert(period.id, period.clone());
        Ok(())
    }

    async fn get_period(
        &self,
        tenant_id: TenantId,
        id: FiscalPeriodId,
    ) -> LedgerResult<Option<FinancialPeriod>> {
        Ok(self.tables.read().await.period(tenant_id, id).cloned())
    }

    async fn list_periods(&self, tenant_id: TenantId) -> LedgerResult<Vec<FinancialPeriod>> {
        let mut periods = self.tables.read().await.tenant_periods(tenant_id);
        periods.sort_by_key(|p| p.start_date);
        Ok(periods)
    }

    async fn close_period(
        &self,
        tenant_id: TenantId,
        id: FiscalPeriodId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> LedgerResult<(FinancialPeriod, bool)> {
        let mut tables = self.tables.write().await;
        let period = tables
            .period(tenant_id, id)
            .ok_or(LedgerError::PeriodNotFound(id))?;
        if period.is_closed {
            return Ok((period.clone(), false));
        }

        let accounts: Vec<Account> = tables
            .accounts
            .values()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect();
        let movements = tables.movements(
            tenant_id,
            DateWindow::between(period.start_date, period.end_date),
        );
        let statement = ReportService::generate_income_statement(
            &accounts,
            &movements,
            period.start_date,
            period.end_date,
        )?;
        let closed = PeriodService::close(period, statement.snapshot(), actor, now);
        tables.periods.insert(id, closed.clone());
        Ok((closed, true))
    }

    async fn insert_budget(&self, budget: &Budget) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(period_id) = budget.period_id
            && tables.period(budget.tenant_id, period_id).is_none()
        {
            return Err(LedgerError::PeriodNotFound(period_id));
        }
        tables.budgets.insert(budget.id, budget.clone());
        Ok(())
    }

    async fn get_budget(&self, tenant_id: TenantId, id: BudgetId) -> LedgerResult<Option<Budget>> {
        Ok(self.tables.read().await.budget(tenant_id, id).cloned())
    }

    async fn list_budgets(&self, tenant_id: TenantId) -> LedgerResult<Vec<Budget>> {
        let tables = self.tables.read().await;
        let mut budgets: Vec<Budget> = tables
            .budgets
            .values()
            .filter(|b| b.tenant_id == tenant_id)
            .cloned()
            .collect();
        budgets.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(budgets)
    }

    async fn update_budget(&self, budget: &Budget) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        if tables.budget(budget.tenant_id, budget.id).is_none() {
            return Err(LedgerError::BudgetNotFound(budget.id));
        }
        if let Some(period_id) = budget.period_id
            && tables.period(budget.tenant_id, period_id).is_none()
        {
            return Err(LedgerError::PeriodNotFound(period_id));
        }
        tables.budgets.insert(budget.id, budget.clone());
        Ok(())
    }

    async fn delete_budget(&self, tenant_id: TenantId, id: BudgetId) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        if tables.budget(tenant_id, id).is_none() {
            return Err(LedgerError::BudgetNotFound(id));
        }
        tables.budget_items.retain(|_, item| item.budget_id != id);
        tables.budgets.remove(&id);
        Ok(())
    }

    async fn insert_budget_item(&self, item: &BudgetItem) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        let budget = tables
            .budget(item.tenant_id, item.budget_id)
            .ok_or(LedgerError::BudgetNotFound(item.budget_id))?;
        BudgetService::ensure_open(budget)?;
        if tables.account(item.tenant_id, item.account_id).is_none() {
            return Err(LedgerError::AccountNotFound(item.account_id));
        }
        if tables
            .budget_items
            .values()
            .any(|i| i.budget_id == item.budget_id && i.account_id == item.account_id)
        {
            return Err(LedgerError::DuplicateBudgetItem(item.account_id));
        }
        tables.budget_items.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_budget_item(
        &self,
        tenant_id: TenantId,
        id: BudgetItemId,
    ) -> LedgerResult<Option<BudgetItem>> {
        Ok(self.tables.read().await.budget_item(tenant_id, id).cloned())
    }

    async fn list_budget_items(
        &self,
        tenant_id: TenantId,
        budget_id: BudgetId,
    ) -> LedgerResult<Vec<BudgetItem>> {
        let tables = self.tables.read().await;
        let mut items: Vec<BudgetItem> = tables
            .budget_items
            .values()
            .filter(|i| i.tenant_id == tenant_id && i.budget_id == budget_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn update_budget_item(&self, item: &BudgetItem) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        tables.ensure_item_mutable(item.tenant_id, item.id)?;
        tables.budget_items.insert(item.id, item.clone());
        Ok(())
    }

    async fn delete_budget_item(&self, tenant_id: TenantId, id: BudgetItemId) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        tables.ensure_item_mutable(tenant_id, id)?;
        tables.budget_items.remove(&id);
        Ok(())
    }

    async fn account_movements(
        &self,
        tenant_id: TenantId,
        window: DateWindow,
    ) -> LedgerResult<HashMap<AccountId, Movement>> {
        Ok(self.tables.read().await.movements(tenant_id, window))
    }

    async fn next_sequence(&self, tenant_id: TenantId, name: &str) -> LedgerResult<u64> {
        let mut tables = self.tables.write().await;
        let counter = tables
            .sequences
            .entry((tenant_id, name.to_string()))
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
