//! PostgreSQL implementation of the ledger store.
//!
//! Every write runs in one database transaction. Guards are enforced with row
//! locks taken inside that transaction:
//!
//! - transaction writes hold `FOR SHARE` on the periods covering their dates,
//!   period close holds `FOR UPDATE` on the period row
//! - transaction writes hold `FOR SHARE` on both account rows, account
//!   updates hold `FOR UPDATE` on the account row while counting references
//! - budget item writes hold `FOR SHARE` on the budget row, budget updates
//!   take the row lock through the `UPDATE` itself
//! - journal entry state changes hold `FOR UPDATE` on the entry row
//! - period inserts serialize per tenant on a transaction-scoped advisory lock
//!
//! Transaction rows are always locked before their journal entry row.

mod convert;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    DbErr, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Select, SqlErr, Statement, TransactionTrait,
};
use tally_core::accounts::{Account, AccountFilter, AccountReferences, AccountService};
use tally_core::budget::{Budget, BudgetItem, BudgetService};
use tally_core::error::{LedgerError, LedgerResult};
use tally_core::fiscal::{FinancialPeriod, PeriodService};
use tally_core::journal::{JournalEntry, JournalService, JournalStatus};
use tally_core::ledger::{
    DateWindow, LedgerTransaction, Movement, TransactionFilter, TransactionValidator,
};
use tally_core::reports::ReportService;
use tally_core::store::LedgerStore;
use tally_shared::types::{
    AccountId, BudgetId, BudgetItemId, FiscalPeriodId, JournalEntryId, TenantId, TransactionId,
    UserId,
};
use uuid::Uuid;

pub use convert::CorruptRow;

use crate::entities::sea_orm_active_enums as db_enum;
use crate::entities::{
    accounts, budget_items, budgets, financial_periods, journal_entries, ledger_transactions,
};

const MOVEMENTS_SQL: &str = r"
SELECT account_id, SUM(debit) AS debit, SUM(credit) AS credit
FROM (
    SELECT debit_account_id AS account_id, amount AS debit, 0::NUMERIC AS credit, transaction_date
    FROM ledger_transactions
    WHERE tenant_id = $1
    UNION ALL
    SELECT credit_account_id AS account_id, 0::NUMERIC AS debit, amount AS credit, transaction_date
    FROM ledger_transactions
    WHERE tenant_id = $1
) AS sides
WHERE ($2::DATE IS NULL OR transaction_date >= $2::DATE)
  AND ($3::DATE IS NULL OR transaction_date <= $3::DATE)
GROUP BY account_id
";

const NEXT_SEQUENCE_SQL: &str = r"
INSERT INTO ledger_sequences (tenant_id, name, value)
VALUES ($1, $2, 1)
ON CONFLICT (tenant_id, name) DO UPDATE SET value = ledger_sequences.value + 1
RETURNING value
";

const TENANT_PERIOD_LOCK_SQL: &str =
    "SELECT pg_advisory_xact_lock(hashtextextended('financial_periods:' || $1::TEXT, 0))";

#[derive(Debug, FromQueryResult)]
struct MovementRow {
    account_id: Uuid,
    debit: Decimal,
    credit: Decimal,
}

fn storage(err: DbErr) -> LedgerError {
    LedgerError::Storage(err.to_string())
}

/// Maps a unique violation to `conflict`, anything else to `Storage`.
fn unique_or(err: DbErr, conflict: impl FnOnce() -> LedgerError) -> LedgerError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => conflict(),
        _ => storage(err),
    }
}

// ========== Scoped queries ==========

fn account_query(tenant_id: TenantId, id: AccountId) -> Select<accounts::Entity> {
    accounts::Entity::find_by_id(id.into_inner())
        .filter(accounts::Column::TenantId.eq(tenant_id.into_inner()))
}

fn transaction_query(
    tenant_id: TenantId,
    id: TransactionId,
) -> Select<ledger_transactions::Entity> {
    ledger_transactions::Entity::find_by_id(id.into_inner())
        .filter(ledger_transactions::Column::TenantId.eq(tenant_id.into_inner()))
}

fn entry_query(tenant_id: TenantId, id: JournalEntryId) -> Select<journal_entries::Entity> {
    journal_entries::Entity::find_by_id(id.into_inner())
        .filter(journal_entries::Column::TenantId.eq(tenant_id.into_inner()))
}

fn period_query(tenant_id: TenantId, id: FiscalPeriodId) -> Select<financial_periods::Entity> {
    financial_periods::Entity::find_by_id(id.into_inner())
        .filter(financial_periods::Column::TenantId.eq(tenant_id.into_inner()))
}

fn budget_query(tenant_id: TenantId, id: BudgetId) -> Select<budgets::Entity> {
    budgets::Entity::find_by_id(id.into_inner())
        .filter(budgets::Column::TenantId.eq(tenant_id.into_inner()))
}

fn budget_item_query(tenant_id: TenantId, id: BudgetItemId) -> Select<budget_items::Entity> {
    budget_items::Entity::find_by_id(id.into_inner())
        .filter(budget_items::Column::TenantId.eq(tenant_id.into_inner()))
}

fn touching(account_id: Uuid) -> Condition {
    Condition::any()
        .add(ledger_transactions::Column::DebitAccountId.eq(account_id))
        .add(ledger_transactions::Column::CreditAccountId.eq(account_id))
}

fn to_transactions(rows: Vec<ledger_transactions::Model>) -> LedgerResult<Vec<LedgerTransaction>> {
    rows.into_iter()
        .map(|row| LedgerTransaction::try_from(row).map_err(Into::into))
        .collect()
}

fn to_accounts(rows: Vec<accounts::Model>) -> LedgerResult<Vec<Account>> {
    rows.into_iter()
        .map(|row| Account::try_from(row).map_err(Into::into))
        .collect()
}

// ========== Shared guards ==========

async fn number_taken<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    number: &str,
) -> LedgerResult<bool> {
    let transactions = ledger_transactions::Entity::find()
        .filter(ledger_transactions::Column::TenantId.eq(tenant_id.into_inner()))
        .filter(ledger_transactions::Column::Number.eq(number))
        .count(conn)
        .await
        .map_err(storage)?;
    let entries = journal_entries::Entity::find()
        .filter(journal_entries::Column::TenantId.eq(tenant_id.into_inner()))
        .filter(journal_entries::Column::Number.eq(number))
        .count(conn)
        .await
        .map_err(storage)?;
    Ok(transactions + entries > 0)
}

/// Fails with `PeriodClosed` if a closed period covers any date. Holds a share
/// lock on every covering period until the transaction ends.
async fn ensure_dates_open(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    dates: &[NaiveDate],
) -> LedgerResult<()> {
    let mut covering = Condition::any();
    for date in dates {
        covering = covering.add(
            Condition::all()
                .add(financial_periods::Column::StartDate.lte(*date))
                .add(financial_periods::Column::EndDate.gte(*date)),
        );
    }

    let periods: Vec<FinancialPeriod> = financial_periods::Entity::find()
        .filter(financial_periods::Column::TenantId.eq(tenant_id.into_inner()))
        .filter(covering)
        .lock_shared()
        .all(txn)
        .await
        .map_err(storage)?
        .into_iter()
        .map(Into::into)
        .collect();

    for date in dates {
        PeriodService::ensure_date_open(&periods, *date)?;
    }
    Ok(())
}

/// Share-locks both accounts of a transaction and re-checks them against it.
/// Account updates on either side wait until commit.
async fn lock_sides(
    txn: &DatabaseTransaction,
    ledger_txn: &LedgerTransaction,
) -> LedgerResult<()> {
    let debit = locked_account(txn, ledger_txn.tenant_id, ledger_txn.debit_account_id).await?;
    let credit = locked_account(txn, ledger_txn.tenant_id, ledger_txn.credit_account_id).await?;
    TransactionValidator::validate_accounts(&debit, &credit, Some(ledger_txn.currency)).map(|_| ())
}

async fn locked_account(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    id: AccountId,
) -> LedgerResult<Account> {
    let row = account_query(tenant_id, id)
        .lock_shared()
        .one(txn)
        .await
        .map_err(storage)?
        .ok_or(LedgerError::AccountNotFound(id))?;
    Account::try_from(row).map_err(Into::into)
}

/// Share-locks a budget and fails with `BudgetClosed` unless it is open.
async fn ensure_budget_open(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    id: BudgetId,
) -> LedgerResult<()> {
    let budget: Budget = budget_query(tenant_id, id)
        .lock_shared()
        .one(txn)
        .await
        .map_err(storage)?
        .ok_or(LedgerError::BudgetNotFound(id))?
        .into();
    BudgetService::ensure_open(&budget)
}

/// Budget an item belongs to. Read unlocked so the budget row is locked first.
async fn item_budget(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    id: BudgetItemId,
) -> LedgerResult<BudgetId> {
    budget_item_query(tenant_id, id)
        .one(txn)
        .await
        .map_err(storage)?
        .map(|row| BudgetId::from_uuid(row.budget_id))
        .ok_or(LedgerError::BudgetItemNotFound(id))
}

/// Fails with `EntryPosted` if the transaction belongs to a posted entry.
async fn ensure_entry_not_posted(
    txn: &DatabaseTransaction,
    current: &LedgerTransaction,
) -> LedgerResult<()> {
    let Some(entry_id) = current.journal_entry_id else {
        return Ok(());
    };
    let entry = entry_query(current.tenant_id, entry_id)
        .lock_shared()
        .one(txn)
        .await
        .map_err(storage)?;
    match entry {
        Some(entry) if entry.status == db_enum::JournalStatus::Posted => {
            Err(LedgerError::EntryPosted(entry_id))
        }
        _ => Ok(()),
    }
}

async fn references<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    id: AccountId,
) -> LedgerResult<AccountReferences> {
    let tenant = tenant_id.into_inner();
    let account = id.into_inner();

    let transactions = ledger_transactions::Entity::find()
        .filter(ledger_transactions::Column::TenantId.eq(tenant))
        .filter(touching(account))
        .count(conn)
        .await
        .map_err(storage)?;
    let budget_items = budget_items::Entity::find()
        .filter(budget_items::Column::TenantId.eq(tenant))
        .filter(budget_items::Column::AccountId.eq(account))
        .count(conn)
        .await
        .map_err(storage)?;
    let children = accounts::Entity::find()
        .filter(accounts::Column::TenantId.eq(tenant))
        .filter(accounts::Column::ParentId.eq(account))
        .count(conn)
        .await
        .map_err(storage)?;

    Ok(AccountReferences {
        transactions,
        budget_items,
        children,
    })
}

async fn movements<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    window: DateWindow,
) -> LedgerResult<HashMap<AccountId, Movement>> {
    let rows = MovementRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        MOVEMENTS_SQL,
        [
            tenant_id.into_inner().into(),
            window.from.into(),
            window.to.into(),
        ],
    ))
    .all(conn)
    .await
    .map_err(storage)?;

    Ok(rows
        .into_iter()
        .map(|row| {
            (
                AccountId::from_uuid(row.account_id),
                Movement {
                    debit: row.debit,
                    credit: row.credit,
                },
            )
        })
        .collect())
}

async fn entry_transactions(
    txn: &DatabaseTransaction,
    tenant_id: TenantId,
    entry_id: JournalEntryId,
) -> LedgerResult<Vec<LedgerTransaction>> {
    let rows = ledger_transactions::Entity::find()
        .filter(ledger_transactions::Column::TenantId.eq(tenant_id.into_inner()))
        .filter(ledger_transactions::Column::JournalEntryId.eq(entry_id.into_inner()))
        .order_by_asc(ledger_transactions::Column::CreatedAt)
        .order_by_asc(ledger_transactions::Column::Id)
        .all(txn)
        .await
        .map_err(storage)?;
    to_transactions(rows)
}

/// Ledger store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
}

impl PgLedgerStore {
    /// Creates a store over an open connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn begin(&self) -> LedgerResult<DatabaseTransaction> {
        self.db.begin().await.map_err(storage)
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    // ========== Accounts ==========

    async fn insert_account(&self, account: &Account) -> LedgerResult<()> {
        let txn = self.begin().await?;
        if let Some(parent_id) = account.parent_id
            && account_query(account.tenant_id, parent_id)
                .lock_shared()
                .one(&txn)
                .await
                .map_err(storage)?
                .is_none()
        {
            return Err(LedgerError::ParentNotFound(parent_id));
        }

        accounts::Entity::insert(accounts::ActiveModel::from(account))
            .exec_without_returning(&txn)
            .await
            .map_err(|e| unique_or(e, || LedgerError::DuplicateAccountCode(account.code.clone())))?;
        txn.commit().await.map_err(storage)
    }

    async fn get_account(
        &self,
        tenant_id: TenantId,
        id: AccountId,
    ) -> LedgerResult<Option<Account>> {
        account_query(tenant_id, id)
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(|row| Account::try_from(row).map_err(Into::into))
            .transpose()
    }

    async fn get_account_by_code(
        &self,
        tenant_id: TenantId,
        code: &str,
    ) -> LedgerResult<Option<Account>> {
        accounts::Entity::find()
            .filter(accounts::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(accounts::Column::Code.eq(code))
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(|row| Account::try_from(row).map_err(Into::into))
            .transpose()
    }

    async fn list_accounts(
        &self,
        tenant_id: TenantId,
        filter: &AccountFilter,
    ) -> LedgerResult<Vec<Account>> {
        let mut query =
            accounts::Entity::find().filter(accounts::Column::TenantId.eq(tenant_id.into_inner()));

        if let Some(account_type) = filter.account_type {
            query = query.filter(
                accounts::Column::AccountType
                    .eq(db_enum::AccountType::from(account_type)),
            );
        }
        if let Some(category) = filter.category {
            query = query.filter(
                accounts::Column::Category
                    .eq(db_enum::AccountCategory::from(category)),
            );
        }
        if let Some(is_active) = filter.is_active {
            query = query.filter(accounts::Column::IsActive.eq(is_active));
        }
        match filter.parent_id {
            Some(Some(parent_id)) => {
                query = query.filter(accounts::Column::ParentId.eq(parent_id.into_inner()));
            }
            Some(None) => query = query.filter(accounts::Column::ParentId.is_null()),
            None => {}
        }

        let rows = query
            .order_by_asc(accounts::Column::Code)
            .all(&self.db)
            .await
            .map_err(storage)?;
        to_accounts(rows)
    }

    async fn update_account(&self, account: &Account) -> LedgerResult<()> {
        let txn = self.begin().await?;
        let row = account_query(account.tenant_id, account.id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(storage)?
            .ok_or(LedgerError::AccountNotFound(account.id))?;
        let stored = Account::try_from(row)?;

        let refs = references(&txn, account.tenant_id, account.id).await?;
        AccountService::ensure_fields_unlocked(&stored, account, refs)?;

        accounts::Entity::update_many()
            .set(accounts::ActiveModel::from(account))
            .filter(accounts::Column::Id.eq(account.id.into_inner()))
            .exec(&txn)
            .await
            .map_err(|e| unique_or(e, || LedgerError::DuplicateAccountCode(account.code.clone())))?;
        txn.commit().await.map_err(storage)
    }

    async fn delete_account(&self, tenant_id: TenantId, id: AccountId) -> LedgerResult<()> {
        let txn = self.begin().await?;
        let row = account_query(tenant_id, id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(storage)?
            .ok_or(LedgerError::AccountNotFound(id))?;
        let account = Account::try_from(row)?;

        AccountService::ensure_deletable(&account, references(&txn, tenant_id, id).await?)?;

        accounts::Entity::delete_by_id(id.into_inner())
            .exec(&txn)
            .await
            .map_err(storage)?;
        txn.commit().await.map_err(storage)
    }

    async fn account_references(
        &self,
        tenant_id: TenantId,
        id: AccountId,
    ) -> LedgerResult<AccountReferences> {
        references(&self.db, tenant_id, id).await
    }

    async fn set_balance_hints(
        &self,
        tenant_id: TenantId,
        balances: &[(AccountId, Decimal)],
    ) -> LedgerResult<()> {
        let txn = self.begin().await?;
        for (id, balance) in balances {
            accounts::Entity::update_many()
                .col_expr(accounts::Column::CurrentBalance, Expr::value(*balance))
                .filter(accounts::Column::Id.eq(id.into_inner()))
                .filter(accounts::Column::TenantId.eq(tenant_id.into_inner()))
                .exec(&txn)
                .await
                .map_err(storage)?;
        }
        txn.commit().await.map_err(storage)
    }

    // ========== Transactions ==========

    async fn insert_transaction(&self, ledger_txn: &LedgerTransaction) -> LedgerResult<()> {
        let txn = self.begin().await?;
        lock_sides(&txn, ledger_txn).await?;
        ensure_dates_open(&txn, ledger_txn.tenant_id, &[ledger_txn.transaction_date]).await?;
        if number_taken(&txn, ledger_txn.tenant_id, &ledger_txn.number).await? {
            return Err(LedgerError::DuplicateNumber(ledger_txn.number.clone()));
        }

        ledger_transactions::Entity::insert(ledger_transactions::ActiveModel::from(ledger_txn))
            .exec_without_returning(&txn)
            .await
            .map_err(|e| unique_or(e, || LedgerError::DuplicateNumber(ledger_txn.number.clone())))?;
        txn.commit().await.map_err(storage)
    }

    async fn get_transaction(
        &self,
        tenant_id: TenantId,
        id: TransactionId,
    ) -> LedgerResult<Option<LedgerTransaction>> {
        transaction_query(tenant_id, id)
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(|row| LedgerTransaction::try_from(row).map_err(Into::into))
            .transpose()
    }

    async fn get_transaction_by_number(
        &self,
        tenant_id: TenantId,
        number: &str,
    ) -> LedgerResult<Option<LedgerTransaction>> {
        ledger_transactions::Entity::find()
            .filter(ledger_transactions::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(ledger_transactions::Column::Number.eq(number))
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(|row| LedgerTransaction::try_from(row).map_err(Into::into))
            .transpose()
    }

    async fn list_transactions(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        let mut query = ledger_transactions::Entity::find()
            .filter(ledger_transactions::Column::TenantId.eq(tenant_id.into_inner()));

        if let Some(account_id) = filter.account_id {
            query = query.filter(touching(account_id.into_inner()));
        }
        if let Some(from) = filter.from {
            query = query.filter(ledger_transactions::Column::TransactionDate.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(ledger_transactions::Column::TransactionDate.lte(to));
        }
        if let Some(transaction_type) = filter.transaction_type {
            query = query.filter(ledger_transactions::Column::TransactionType.eq(
                db_enum::TransactionType::from(transaction_type),
            ));
        }
        if let Some(status) = filter.status {
            query = query.filter(ledger_transactions::Column::Status.eq(
                db_enum::TransactionStatus::from(status),
            ));
        }
        if let Some(entry_id) = filter.journal_entry_id {
            query = query
                .filter(ledger_transactions::Column::JournalEntryId.eq(entry_id.into_inner()));
        }

        let rows = query
            .order_by_desc(ledger_transactions::Column::TransactionDate)
            .order_by_desc(ledger_transactions::Column::CreatedAt)
            .order_by_desc(ledger_transactions::Column::Id)
            .all(&self.db)
            .await
            .map_err(storage)?;
        to_transactions(rows)
    }

    async fn update_transaction(&self, ledger_txn: &LedgerTransaction) -> LedgerResult<()> {
        let txn = self.begin().await?;
        let row = transaction_query(ledger_txn.tenant_id, ledger_txn.id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(storage)?
            .ok_or(LedgerError::TransactionNotFound(ledger_txn.id))?;
        let current = LedgerTransaction::try_from(row)?;

        ensure_entry_not_posted(&txn, &current).await?;
        lock_sides(&txn, ledger_txn).await?;
        ensure_dates_open(
            &txn,
            current.tenant_id,
            &[current.transaction_date, ledger_txn.transaction_date],
        )
        .await?;

        let stored = LedgerTransaction {
            journal_entry_id: current.journal_entry_id,
            number: current.number.clone(),
            created_at: current.created_at,
            ..ledger_txn.clone()
        };
        ledger_transactions::Entity::update_many()
            .set(ledger_transactions::ActiveModel::from(&stored))
            .filter(ledger_transactions::Column::Id.eq(stored.id.into_inner()))
            .exec(&txn)
            .await
            .map_err(storage)?;
        txn.commit().await.map_err(storage)
    }

    async fn delete_transaction(
        &self,
        tenant_id: TenantId,
        id: TransactionId,
    ) -> LedgerResult<()> {
        let txn = self.begin().await?;
        let row = transaction_query(tenant_id, id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(storage)?
            .ok_or(LedgerError::TransactionNotFound(id))?;
        let current = LedgerTransaction::try_from(row)?;

        ensure_entry_not_posted(&txn, &current).await?;
        ensure_dates_open(&txn, tenant_id, &[current.transaction_date]).await?;

        ledger_transactions::Entity::delete_by_id(id.into_inner())
            .exec(&txn)
            .await
            .map_err(storage)?;
        txn.commit().await.map_err(storage)
    }

    // ========== Journal Entries ==========

    async fn insert_journal_entry(&self, entry: &JournalEntry) -> LedgerResult<()> {
        let txn = self.begin().await?;
        if number_taken(&txn, entry.tenant_id, &entry.number).await? {
            return Err(LedgerError::DuplicateNumber(entry.number.clone()));
        }

        journal_entries::Entity::insert(journal_entries::ActiveModel::from(entry))
            .exec_without_returning(&txn)
            .await
            .map_err(|e| unique_or(e, || LedgerError::DuplicateNumber(entry.number.clone())))?;
        txn.commit().await.map_err(storage)
    }

    async fn get_journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
    ) -> LedgerResult<Option<JournalEntry>> {
        Ok(entry_query(tenant_id, id)
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(Into::into))
    }

    async fn list_journal_entries(
        &self,
        tenant_id: TenantId,
        status: Option<JournalStatus>,
    ) -> LedgerResult<Vec<JournalEntry>> {
        let mut query = journal_entries::Entity::find()
            .filter(journal_entries::Column::TenantId.eq(tenant_id.into_inner()));
        if let Some(status) = status {
            query = query.filter(journal_entries::Column::Status.eq(
                db_enum::JournalStatus::from(status),
            ));
        }

        Ok(query
            .order_by_desc(journal_entries::Column::EntryDate)
            .order_by_desc(journal_entries::Column::CreatedAt)
            .order_by_desc(journal_entries::Column::Id)
            .all(&self.db)
            .await
            .map_err(storage)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn attach_transaction(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        transaction_id: TransactionId,
    ) -> LedgerResult<bool> {
        let txn = self.begin().await?;
        let txn_row = transaction_query(tenant_id, transaction_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(storage)?;
        let entry = entry_query(tenant_id, entry_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(storage)?
            .map(JournalEntry::from)
            .ok_or(LedgerError::JournalEntryNotFound(entry_id))?;
        let current = txn_row
            .ok_or(LedgerError::TransactionNotFound(transaction_id))
            .and_then(|row| LedgerTransaction::try_from(row).map_err(Into::into))?;

        if !JournalService::ensure_attachable(&entry, &current)? {
            return Ok(false);
        }

        ledger_transactions::Entity::update_many()
            .col_expr(
                ledger_transactions::Column::JournalEntryId,
                Expr::value(Some(entry_id.into_inner())),
            )
            .filter(ledger_transactions::Column::Id.eq(transaction_id.into_inner()))
            .exec(&txn)
            .await
            .map_err(storage)?;
        txn.commit().await.map_err(storage)?;
        Ok(true)
    }

    async fn detach_transaction(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        transaction_id: TransactionId,
    ) -> LedgerResult<()> {
        let txn = self.begin().await?;
        let txn_row = transaction_query(tenant_id, transaction_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(storage)?;
        let entry = entry_query(tenant_id, entry_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(storage)?
            .map(JournalEntry::from)
            .ok_or(LedgerError::JournalEntryNotFound(entry_id))?;
        let current = txn_row
            .ok_or(LedgerError::TransactionNotFound(transaction_id))
            .and_then(|row| LedgerTransaction::try_from(row).map_err(Into::into))?;

        JournalService::ensure_detachable(&entry, &current)?;

        ledger_transactions::Entity::update_many()
            .col_expr(
                ledger_transactions::Column::JournalEntryId,
                Expr::value(Option::<Uuid>::None),
            )
            .filter(ledger_transactions::Column::Id.eq(transaction_id.into_inner()))
            .exec(&txn)
            .await
            .map_err(storage)?;
        txn.commit().await.map_err(storage)
    }

    async fn post_journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> LedgerResult<JournalEntry> {
        let txn = self.begin().await?;
        let entry: JournalEntry = entry_query(tenant_id, id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(storage)?
            .ok_or(LedgerError::JournalEntryNotFound(id))?
            .into();

        JournalService::ensure_draft(&entry)?;
        JournalService::validate_postable(id, &entry_transactions(&txn, tenant_id, id).await?)?;
        let posted = JournalService::post(&entry, actor, now)?;

        journal_entries::Entity::update_many()
            .set(journal_entries::ActiveModel::from(&posted))
            .filter(journal_entries::Column::Id.eq(id.into_inner()))
            .exec(&txn)
            .await
            .map_err(storage)?;
        txn.commit().await.map_err(storage)?;
        Ok(posted)
    }

    async fn cancel_journal_entry(
        &self,
        tenant_id: TenantId,
        id: JournalEntryId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> LedgerResult<JournalEntry> {
        let txn = self.begin().await?;
        ledger_transactions::Entity::find()
            .filter(ledger_transactions::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(ledger_transactions::Column::JournalEntryId.eq(id.into_inner()))
            .lock_exclusive()
            .all(&txn)
            .await
            .map_err(storage)?;
        let entry: JournalEntry = entry_query(tenant_id, id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(storage)?
            .ok_or(LedgerError::JournalEntryNotFound(id))?
            .into();

        let cancelled = JournalService::cancel(&entry, actor, now)?;

        journal_entries::Entity::update_many()
            .set(journal_entries::ActiveModel::from(&cancelled))
            .filter(journal_entries::Column::Id.eq(id.into_inner()))
            .exec(&txn)
            .await
            .map_err(storage)?;
        ledger_transactions::Entity::update_many()
            .col_expr(
                ledger_transactions::Column::JournalEntryId,
                Expr::value(Option::<Uuid>::None),
            )
            .filter(ledger_transactions::Column::JournalEntryId.eq(id.into_inner()))
            .exec(&txn)
            .await
            .map_err(storage)?;
        txn.commit().await.map_err(storage)?;
        Ok(cancelled)
    }

    // ========== Financial Periods ==========

    async fn insert_period(&self, period: &FinancialPeriod) -> LedgerResult<()> {
        let txn = self.begin().await?;
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            TENANT_PERIOD_LOCK_SQL,
            [period.tenant_id.to_string().into()],
        ))
        .await
        .map_err(storage)?;

        let clash = financial_periods::Entity::find()
            .filter(financial_periods::Column::TenantId.eq(period.tenant_id.into_inner()))
            .filter(financial_periods::Column::StartDate.lte(period.end_date))
            .filter(financial_periods::Column::EndDate.gte(period.start_date))
            .order_by_asc(financial_periods::Column::StartDate)
            .one(&txn)
            .await
            .map_err(storage)?;
        if let Some(clash) = clash {
            return Err(LedgerError::PeriodOverlap(clash.name));
        }

        financial_periods::Entity::insert(financial_periods::ActiveModel::from(period))
            .exec_without_returning(&txn)
            .await
            .map_err(storage)?;
        txn.commit().await.map_err(storage)
    }

    async fn get_period(
        &self,
        tenant_id: TenantId,
        id: FiscalPeriodId,
    ) -> LedgerResult<Option<FinancialPeriod>> {
        Ok(period_query(tenant_id, id)
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(Into::into))
    }

    async fn list_periods(&self, tenant_id: TenantId) -> LedgerResult<Vec<FinancialPeriod>> {
        Ok(financial_periods::Entity::find()
            .filter(financial_periods::Column::TenantId.eq(tenant_id.into_inner()))
            .order_by_asc(financial_periods::Column::StartDate)
            .all(&self.db)
            .await
            .map_err(storage)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn close_period(
        &self,
        tenant_id: TenantId,
        id: FiscalPeriodId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> LedgerResult<(FinancialPeriod, bool)> {
        let txn = self.begin().await?;
        let period: FinancialPeriod = period_query(tenant_id, id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(storage)?
            .ok_or(LedgerError::PeriodNotFound(id))?
            .into();
        if period.is_closed {
            return Ok((period, false));
        }

        let accounts = to_accounts(
            accounts::Entity::find()
                .filter(accounts::Column::TenantId.eq(tenant_id.into_inner()))
                .all(&txn)
                .await
                .map_err(storage)?,
        )?;
        let movements = movements(
            &txn,
            tenant_id,
            DateWindow::between(period.start_date, period.end_date),
        )
        .await?;
        let statement = ReportService::generate_income_statement(
            &accounts,
            &movements,
            period.start_date,
            period.end_date,
        )?;
        let closed = PeriodService::close(&period, statement.snapshot(), actor, now);

        financial_periods::Entity::update_many()
            .set(financial_periods::ActiveModel::from(&closed))
            .filter(financial_periods::Column::Id.eq(id.into_inner()))
            .exec(&txn)
            .await
            .map_err(storage)?;
        txn.commit().await.map_err(storage)?;
        Ok((closed, true))
    }

    // ========== Budgets ==========

    async fn insert_budget(&self, budget: &Budget) -> LedgerResult<()> {
        let txn = self.begin().await?;
        if let Some(period_id) = budget.period_id
            && period_query(budget.tenant_id, period_id)
                .lock_shared()
                .one(&txn)
                .await
                .map_err(storage)?
                .is_none()
        {
            return Err(LedgerError::PeriodNotFound(period_id));
        }

        budgets::Entity::insert(budgets::ActiveModel::from(budget))
            .exec_without_returning(&txn)
            .await
            .map_err(storage)?;
        txn.commit().await.map_err(storage)
    }

    async fn get_budget(&self, tenant_id: TenantId, id: BudgetId) -> LedgerResult<Option<Budget>> {
        Ok(budget_query(tenant_id, id)
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(Into::into))
    }

    async fn list_budgets(&self, tenant_id: TenantId) -> LedgerResult<Vec<Budget>> {
        Ok(budgets::Entity::find()
            .filter(budgets::Column::TenantId.eq(tenant_id.into_inner()))
            .order_by_desc(budgets::Column::StartDate)
            .order_by_desc(budgets::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(storage)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn update_budget(&self, budget: &Budget) -> LedgerResult<()> {
        let txn = self.begin().await?;
        if let Some(period_id) = budget.period_id
            && period_query(budget.tenant_id, period_id)
                .lock_shared()
                .one(&txn)
                .await
                .map_err(storage)?
                .is_none()
        {
            return Err(LedgerError::PeriodNotFound(period_id));
        }

        let result = budgets::Entity::update_many()
            .set(budgets::ActiveModel::from(budget))
            .filter(budgets::Column::Id.eq(budget.id.into_inner()))
            .filter(budgets::Column::TenantId.eq(budget.tenant_id.into_inner()))
            .exec(&txn)
            .await
            .map_err(storage)?;
        if result.rows_affected == 0 {
            return Err(LedgerError::BudgetNotFound(budget.id));
        }
        txn.commit().await.map_err(storage)
    }

    async fn delete_budget(&self, tenant_id: TenantId, id: BudgetId) -> LedgerResult<()> {
        // Items go with the budget through ON DELETE CASCADE.
        let result = budgets::Entity::delete_many()
            .filter(budgets::Column::Id.eq(id.into_inner()))
            .filter(budgets::Column::TenantId.eq(tenant_id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(storage)?;
        if result.rows_affected == 0 {
            return Err(LedgerError::BudgetNotFound(id));
        }
        Ok(())
    }

    async fn insert_budget_item(&self, item: &BudgetItem) -> LedgerResult<()> {
        let txn = self.begin().await?;
        ensure_budget_open(&txn, item.tenant_id, item.budget_id).await?;
        if account_query(item.tenant_id, item.account_id)
            .lock_shared()
            .one(&txn)
            .await
            .map_err(storage)?
            .is_none()
        {
            return Err(LedgerError::AccountNotFound(item.account_id));
        }

        budget_items::Entity::insert(budget_items::ActiveModel::from(item))
            .exec_without_returning(&txn)
            .await
            .map_err(|e| unique_or(e, || LedgerError::DuplicateBudgetItem(item.account_id)))?;
        txn.commit().await.map_err(storage)
    }

    async fn get_budget_item(
        &self,
        tenant_id: TenantId,
        id: BudgetItemId,
    ) -> LedgerResult<Option<BudgetItem>> {
        Ok(budget_item_query(tenant_id, id)
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(Into::into))
    }

    async fn list_budget_items(
        &self,
        tenant_id: TenantId,
        budget_id: BudgetId,
    ) -> LedgerResult<Vec<BudgetItem>> {
        Ok(budget_items::Entity::find()
            .filter(budget_items::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(budget_items::Column::BudgetId.eq(budget_id.into_inner()))
            .order_by_asc(budget_items::Column::CreatedAt)
            .order_by_asc(budget_items::Column::Id)
            .all(&self.db)
            .await
            .map_err(storage)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn update_budget_item(&self, item: &BudgetItem) -> LedgerResult<()> {
        let txn = self.begin().await?;
        let budget_id = item_budget(&txn, item.tenant_id, item.id).await?;
        ensure_budget_open(&txn, item.tenant_id, budget_id).await?;

        let result = budget_items::Entity::update_many()
            .set(budget_items::ActiveModel::from(item))
            .filter(budget_items::Column::Id.eq(item.id.into_inner()))
            .filter(budget_items::Column::TenantId.eq(item.tenant_id.into_inner()))
            .exec(&txn)
            .await
            .map_err(|e| unique_or(e, || LedgerError::DuplicateBudgetItem(item.account_id)))?;
        if result.rows_affected == 0 {
            return Err(LedgerError::BudgetItemNotFound(item.id));
        }
        txn.commit().await.map_err(storage)
    }

    async fn delete_budget_item(&self, tenant_id: TenantId, id: BudgetItemId) -> LedgerResult<()> {
        let txn = self.begin().await?;
        let budget_id = item_budget(&txn, tenant_id, id).await?;
        ensure_budget_open(&txn, tenant_id, budget_id).await?;

        let result = budget_items::Entity::delete_many()
            .filter(budget_items::Column::Id.eq(id.into_inner()))
            .filter(budget_items::Column::TenantId.eq(tenant_id.into_inner()))
            .exec(&txn)
            .await
            .map_err(storage)?;
        if result.rows_affected == 0 {
            return Err(LedgerError::BudgetItemNotFound(id));
        }
        txn.commit().await.map_err(storage)
    }

    // ========== Reporting ==========

    async fn account_movements(
        &self,
        tenant_id: TenantId,
        window: DateWindow,
    ) -> LedgerResult<HashMap<AccountId, Movement>> {
        movements(&self.db, tenant_id, window).await
    }

    // ========== Numbering ==========

    async fn next_sequence(&self, tenant_id: TenantId, name: &str) -> LedgerResult<u64> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                NEXT_SEQUENCE_SQL,
                [tenant_id.into_inner().into(), name.into()],
            ))
            .await
            .map_err(storage)?
            .ok_or_else(|| LedgerError::Storage(format!("sequence '{name}' returned no row")))?;
        let value: i64 = row.try_get("", "value").map_err(storage)?;
        u64::try_from(value)
            .map_err(|_| LedgerError::Storage(format!("sequence '{name}' is negative: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let err = DbErr::Custom("boom".into());
        let mapped = unique_or(err, || LedgerError::DuplicateNumber("TXN-1".into()));
        assert!(matches!(mapped, LedgerError::Storage(_)));
        assert!(mapped.is_retryable());
    }

    #[test]
    fn test_touching_matches_either_side() {
        use sea_orm::QueryTrait;

        let id = Uuid::new_v4();
        let sql = ledger_transactions::Entity::find()
            .filter(touching(id))
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains("\"debit_account_id\""));
        assert!(sql.contains(" OR "));
        assert!(sql.contains("\"credit_account_id\""));
    }

    #[test]
    fn test_scoped_queries_filter_by_tenant() {
        use sea_orm::QueryTrait;

        let tenant = TenantId::new();
        let sql = entry_query(tenant, JournalEntryId::new())
            .lock_exclusive()
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(&tenant.to_string()));
        assert!(sql.ends_with("FOR UPDATE"));
    }
}
