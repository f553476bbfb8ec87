//! Scenario tests for the general ledger over the in-memory store.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tally_shared::config::{LedgerConfig, NumberingMode};
use tally_shared::types::{CurrencyCode, TenantId, UserId};

use super::GeneralLedger;
use crate::accounts::{Account, AccountCategory, AccountPatch, AccountType, NewAccount};
use crate::budget::{
    BudgetItemPatch, BudgetPatch, BudgetService, BudgetStatus, NewBudget, NewBudgetItem,
};
use crate::cache::MokaReportCache;
use crate::error::{ErrorKind, LedgerError};
use crate::fiscal::NewPeriod;
use crate::journal::{JournalStatus, NewJournalEntry};
use crate::ledger::{
    LedgerTransaction, MAX_AMOUNT, NewTransaction, NumberGenerator, NumberKind, TransactionFilter,
    TransactionPatch, TransactionType, TransactionValidator,
};
use crate::store::{LedgerStore, MemoryLedgerStore};

type Ledger = GeneralLedger<MemoryLedgerStore>;

fn ledger_with(config: &LedgerConfig) -> Ledger {
    GeneralLedger::new(
        Arc::new(MemoryLedgerStore::new()),
        config,
        Arc::new(MokaReportCache::new()),
    )
    .unwrap()
}

fn ledger() -> Ledger {
    ledger_with(&LedgerConfig::default())
}

fn d(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap()
}

async fn open(
    ledger: &Ledger,
    tenant: TenantId,
    code: &str,
    account_type: AccountType,
    category: AccountCategory,
) -> Account {
    ledger
        .create_account(tenant, NewAccount::new(code, code, account_type, category))
        .await
        .unwrap()
}

async fn book(
    ledger: &Ledger,
    tenant: TenantId,
    date: NaiveDate,
    debit: &Account,
    credit: &Account,
    amount: Decimal,
) -> LedgerTransaction {
    ledger
        .create_transaction(
            tenant,
            NewTransaction::new(
                TransactionType::Adjustment,
                date,
                debit.id,
                credit.id,
                amount,
                "booking",
            ),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_cash_sale_round_trip() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let cash = open(&ledger, tenant, "CASH", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        tenant,
        "SALES_REVENUE",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;

    let txn = book(&ledger, tenant, d(3, 1), &cash, &sales, dec!(100.00)).await;
    assert!(NumberGenerator::is_well_formed(NumberKind::Transaction, &txn.number));

    let cash_balance = ledger.get_account_balance(tenant, cash.id, None).await.unwrap();
    let sales_balance = ledger.get_account_balance(tenant, sales.id, None).await.unwrap();
    assert_eq!(cash_balance.balance, dec!(100.00));
    assert_eq!(sales_balance.balance, dec!(100.00));

    let trial = ledger.get_trial_balance(tenant, Some(d(3, 31))).await.unwrap();
    assert!(trial.is_balanced);
    assert_eq!(trial.lines[0].code, "CASH");
    assert_eq!(trial.lines[0].debit_balance, dec!(100.00));
    assert_eq!(trial.lines[1].code, "SALES_REVENUE");
    assert_eq!(trial.lines[1].credit_balance, dec!(100.00));
}

#[tokio::test]
async fn test_rent_paid_from_bank() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let bank = ledger
        .create_account(
            tenant,
            NewAccount::new("1100", "Bank", AccountType::Asset, AccountCategory::Bank)
                .with_opening_balance(dec!(500.00)),
        )
        .await
        .unwrap();
    let rent = open(&ledger, tenant, "6100", AccountType::Expense, AccountCategory::Rent).await;

    book(&ledger, tenant, d(2, 1), &rent, &bank, dec!(200.00)).await;

    let bank_balance = ledger.get_account_balance(tenant, bank.id, None).await.unwrap();
    let rent_balance = ledger.get_account_balance(tenant, rent.id, None).await.unwrap();
    assert_eq!(bank_balance.balance, dec!(300.00));
    assert_eq!(rent_balance.balance, dec!(200.00));

    let before = ledger
        .get_account_balance(tenant, bank.id, Some(d(1, 31)))
        .await
        .unwrap();
    assert_eq!(before.balance, dec!(500.00));
}

#[tokio::test]
async fn test_account_code_is_unique_per_tenant() {
    let ledger = ledger();
    let tenant = TenantId::new();
    open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;

    let err = ledger
        .create_account(
            tenant,
            NewAccount::new("1000", "Cash again", AccountType::Asset, AccountCategory::Cash),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Another tenant may reuse the code, and cannot see the first tenant's account.
    let other = TenantId::new();
    let theirs = open(&ledger, other, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let err = ledger.get_account(tenant, theirs.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_account_rules() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let cash = open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;
    let spare = open(&ledger, tenant, "1900", AccountType::Asset, AccountCategory::Other).await;
    let system = ledger
        .create_account(
            tenant,
            NewAccount::new(
                "3100",
                "Retained",
                AccountType::Equity,
                AccountCategory::RetainedEarnings,
            )
            .system(),
        )
        .await
        .unwrap();

    book(&ledger, tenant, d(1, 10), &cash, &sales, dec!(10)).await;

    let err = ledger.delete_account(tenant, cash.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dependency);

    let err = ledger.delete_account(tenant, system.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImmutableRecord);

    ledger.delete_account(tenant, spare.id).await.unwrap();
    assert!(matches!(
        ledger.get_account(tenant, spare.id).await,
        Err(LedgerError::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn test_update_account_locks_and_tree() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let assets = open(&ledger, tenant, "1", AccountType::Asset, AccountCategory::Other).await;
    let cash = ledger
        .create_account(
            tenant,
            NewAccount::new("1000", "Cash", AccountType::Asset, AccountCategory::Cash)
                .with_parent(assets.id),
        )
        .await
        .unwrap();
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;

    let err = ledger
        .update_account(
            tenant,
            assets.id,
            AccountPatch {
                parent_id: Some(Some(cash.id)),
                ..AccountPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ParentCycle(_)));

    let renamed = ledger
        .update_account(
            tenant,
            cash.id,
            AccountPatch {
                name: Some("Petty cash".into()),
                ..AccountPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Petty cash");

    let err = ledger
        .update_account(
            tenant,
            cash.id,
            AccountPatch {
                code: Some("4000".into()),
                ..AccountPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    book(&ledger, tenant, d(1, 5), &cash, &sales, dec!(5)).await;
    let err = ledger
        .update_account(
            tenant,
            cash.id,
            AccountPatch {
                account_type: Some(AccountType::Expense),
                ..AccountPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImmutableRecord);
}

#[tokio::test]
async fn test_store_rechecks_account_lock_on_write() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let cash = open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;

    // Patch validated while the account was still unreferenced.
    let mut retyped = cash.clone();
    retyped.account_type = AccountType::Expense;
    book(&ledger, tenant, d(1, 5), &cash, &sales, dec!(5)).await;

    let err = ledger.store.update_account(&retyped).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::AccountFieldLocked { field: "account_type", .. }
    ));
    let stored = ledger.get_account(tenant, cash.id).await.unwrap();
    assert_eq!(stored.account_type, AccountType::Asset);

    let mut renamed = stored.clone();
    renamed.name = "Till".into();
    ledger.store.update_account(&renamed).await.unwrap();
}

#[tokio::test]
async fn test_store_rechecks_sides_on_transaction_write() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let bank = open(&ledger, tenant, "1100", AccountType::Asset, AccountCategory::Bank).await;
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;

    // Built while the bank account was still kept in USD.
    let stale = TransactionValidator::build(
        tenant,
        NewTransaction::new(
            TransactionType::Income,
            d(2, 1),
            bank.id,
            sales.id,
            dec!(40),
            "sale",
        ),
        "TXN-20260201-STALE001".into(),
        CurrencyCode::USD,
        Utc::now(),
    );
    ledger
        .update_account(
            tenant,
            bank.id,
            AccountPatch {
                currency: Some(CurrencyCode::parse("EUR").unwrap()),
                ..AccountPatch::default()
            },
        )
        .await
        .unwrap();

    let err = ledger.store.insert_transaction(&stale).await.unwrap_err();
    assert!(matches!(err, LedgerError::CurrencyMismatch { account, .. } if account == bank.id));
    let listed = ledger
        .list_transactions(tenant, &TransactionFilter::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_store_rechecks_budget_open_on_item_writes() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let rent = open(&ledger, tenant, "6100", AccountType::Expense, AccountCategory::Rent).await;
    let utilities = open(
        &ledger,
        tenant,
        "6300",
        AccountType::Expense,
        AccountCategory::Utilities,
    )
    .await;
    let budget = ledger
        .create_budget(tenant, NewBudget::new("Q1", d(1, 1), d(3, 31), dec!(5000)))
        .await
        .unwrap();
    let item = ledger
        .create_budget_item(tenant, budget.id, NewBudgetItem::new(rent.id, dec!(1000)))
        .await
        .unwrap();

    // Items built against the open budget, written after it closed.
    let open_budget = ledger.get_budget(tenant, budget.id).await.unwrap();
    let late_item = BudgetService::build_item(
        &open_budget,
        NewBudgetItem::new(utilities.id, dec!(300)),
        Utc::now(),
    );
    let mut late_patch = item.clone();
    late_patch.budgeted_amount = dec!(1200);
    ledger
        .update_budget(
            tenant,
            budget.id,
            BudgetPatch {
                status: Some(BudgetStatus::Closed),
                ..BudgetPatch::default()
            },
        )
        .await
        .unwrap();

    let err = ledger.store.insert_budget_item(&late_item).await.unwrap_err();
    assert!(matches!(err, LedgerError::BudgetClosed(_)));
    let err = ledger.store.update_budget_item(&late_patch).await.unwrap_err();
    assert!(matches!(err, LedgerError::BudgetClosed(_)));
    let err = ledger.store.delete_budget_item(tenant, item.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::BudgetClosed(_)));

    let items = ledger.list_budget_items(tenant, budget.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].budgeted_amount, dec!(1000));
}

#[tokio::test]
async fn test_transaction_validation() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let cash = open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;

    let same = NewTransaction::new(
        TransactionType::Transfer,
        d(1, 1),
        cash.id,
        cash.id,
        dec!(1),
        "loop",
    );
    let err = ledger.create_transaction(tenant, same).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let zero = NewTransaction::new(
        TransactionType::Income,
        d(1, 1),
        cash.id,
        sales.id,
        Decimal::ZERO,
        "nothing",
    );
    let err = ledger.create_transaction(tenant, zero).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let foreign = open(
        &ledger,
        TenantId::new(),
        "9",
        AccountType::Asset,
        AccountCategory::Cash,
    )
    .await;
    let cross = NewTransaction::new(
        TransactionType::Income,
        d(1, 1),
        foreign.id,
        sales.id,
        dec!(1),
        "cross tenant",
    );
    let err = ledger.create_transaction(tenant, cross).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    ledger
        .update_account(
            tenant,
            sales.id,
            AccountPatch {
                is_active: Some(false),
                ..AccountPatch::default()
            },
        )
        .await
        .unwrap();
    let inactive = NewTransaction::new(
        TransactionType::Income,
        d(1, 1),
        cash.id,
        sales.id,
        dec!(1),
        "sale",
    );
    let err = ledger.create_transaction(tenant, inactive).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountInactive(id) if id == sales.id));
}

#[tokio::test]
async fn test_amounts_beyond_storage_are_rejected() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let cash = open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;

    let huge = NewTransaction::new(
        TransactionType::Income,
        d(1, 2),
        cash.id,
        sales.id,
        Decimal::MAX,
        "huge",
    );
    let err = ledger.create_transaction(tenant, huge).await.unwrap_err();
    assert!(matches!(err, LedgerError::AmountOutOfRange { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let tiny = NewTransaction::new(
        TransactionType::Income,
        d(1, 2),
        cash.id,
        sales.id,
        dec!(0.00001),
        "tiny",
    );
    let err = ledger.create_transaction(tenant, tiny).await.unwrap_err();
    assert!(matches!(err, LedgerError::AmountTooPrecise { .. }));
    assert!(!err.is_retryable());

    book(&ledger, tenant, d(1, 3), &cash, &sales, MAX_AMOUNT).await;
    let txn = book(&ledger, tenant, d(1, 4), &cash, &sales, MAX_AMOUNT).await;
    let err = ledger
        .update_transaction(
            tenant,
            txn.id,
            TransactionPatch {
                amount: Some(dec!(1.23456)),
                ..TransactionPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let trial = ledger.get_trial_balance(tenant, None).await.unwrap();
    assert!(trial.is_balanced);
    assert_eq!(trial.total_debit, MAX_AMOUNT * dec!(2));
}

#[tokio::test]
async fn test_transaction_queries() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let cash = open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;
    let rent = open(&ledger, tenant, "6100", AccountType::Expense, AccountCategory::Rent).await;

    let early = book(&ledger, tenant, d(1, 5), &cash, &sales, dec!(100)).await;
    let late = book(&ledger, tenant, d(2, 5), &rent, &cash, dec!(40)).await;

    let all = ledger
        .list_transactions(tenant, &TransactionFilter::default())
        .await
        .unwrap();
    assert_eq!(
        all.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![late.id, early.id]
    );

    let rent_only = ledger
        .list_transactions(tenant, &TransactionFilter::for_account(rent.id))
        .await
        .unwrap();
    assert_eq!(rent_only.len(), 1);

    let january = ledger
        .list_transactions(tenant, &TransactionFilter::between(d(1, 1), d(1, 31)))
        .await
        .unwrap();
    assert_eq!(january.len(), 1);
    assert_eq!(january[0].id, early.id);

    let by_number = ledger
        .get_transaction_by_number(tenant, &late.number)
        .await
        .unwrap();
    assert_eq!(by_number.id, late.id);

    let updated = ledger
        .update_transaction(
            tenant,
            early.id,
            TransactionPatch {
                amount: Some(dec!(120)),
                ..TransactionPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.amount, dec!(120));
    assert_eq!(updated.number, early.number);

    ledger.delete_transaction(tenant, late.id).await.unwrap();
    let err = ledger.get_transaction(tenant, late.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_journal_entry_lifecycle() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let actor = UserId::new();
    let cash = open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;
    let first = book(&ledger, tenant, d(1, 10), &cash, &sales, dec!(60)).await;
    let second = book(&ledger, tenant, d(1, 11), &cash, &sales, dec!(40)).await;

    let entry = ledger
        .create_journal_entry(tenant, NewJournalEntry::new(d(1, 11), "Daily sales"))
        .await
        .unwrap();
    assert_eq!(entry.status, JournalStatus::Draft);
    assert!(NumberGenerator::is_well_formed(NumberKind::JournalEntry, &entry.number));

    let err = ledger
        .post_journal_entry(tenant, entry.id, actor)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::EmptyJournalEntry(_)));

    ledger.attach_transaction(tenant, entry.id, first.id).await.unwrap();
    ledger.attach_transaction(tenant, entry.id, second.id).await.unwrap();
    // Re-attaching to the same entry is a no-op.
    ledger.attach_transaction(tenant, entry.id, second.id).await.unwrap();

    let other = ledger
        .create_journal_entry(tenant, NewJournalEntry::new(d(1, 11), "Other"))
        .await
        .unwrap();
    let err = ledger
        .attach_transaction(tenant, other.id, first.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let with_txns = ledger.get_journal_entry(tenant, entry.id).await.unwrap();
    assert_eq!(with_txns.transactions.len(), 2);

    let posted = ledger
        .post_journal_entry(tenant, entry.id, actor)
        .await
        .unwrap();
    assert_eq!(posted.status, JournalStatus::Posted);
    assert!(posted.posted);
    assert_eq!(posted.posted_by, Some(actor));
    assert!(posted.posted_at.is_some());

    let err = ledger
        .post_journal_entry(tenant, entry.id, actor)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = ledger
        .update_transaction(
            tenant,
            first.id,
            TransactionPatch {
                description: Some("edited".into()),
                ..TransactionPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImmutableRecord);

    let err = ledger.delete_transaction(tenant, second.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImmutableRecord);

    let err = ledger
        .detach_transaction(tenant, entry.id, first.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let posted_only = ledger
        .list_journal_entries(tenant, Some(JournalStatus::Posted))
        .await
        .unwrap();
    assert_eq!(posted_only.len(), 1);
    assert_eq!(posted_only[0].id, entry.id);
}

#[tokio::test]
async fn test_cancel_releases_transactions() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let actor = UserId::new();
    let cash = open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;
    let txn = book(&ledger, tenant, d(1, 10), &cash, &sales, dec!(60)).await;

    let entry = ledger
        .create_journal_entry(tenant, NewJournalEntry::new(d(1, 10), "Draft"))
        .await
        .unwrap();
    ledger.attach_transaction(tenant, entry.id, txn.id).await.unwrap();

    let cancelled = ledger
        .cancel_journal_entry(tenant, entry.id, actor)
        .await
        .unwrap();
    assert_eq!(cancelled.status, JournalStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(actor));

    let released = ledger.get_transaction(tenant, txn.id).await.unwrap();
    assert_eq!(released.journal_entry_id, None);

    let err = ledger
        .post_journal_entry(tenant, entry.id, actor)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::EntryNotDraft {
            status: JournalStatus::Cancelled,
            ..
        }
    ));

    let next = ledger
        .create_journal_entry(tenant, NewJournalEntry::new(d(1, 10), "Retry"))
        .await
        .unwrap();
    ledger.attach_transaction(tenant, next.id, txn.id).await.unwrap();
    ledger.detach_transaction(tenant, next.id, txn.id).await.unwrap();
    assert_eq!(
        ledger.get_transaction(tenant, txn.id).await.unwrap().journal_entry_id,
        None
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_posts_have_one_winner() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let cash = open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;
    let txn = book(&ledger, tenant, d(1, 10), &cash, &sales, dec!(60)).await;
    let entry = ledger
        .create_journal_entry(tenant, NewJournalEntry::new(d(1, 10), "Race"))
        .await
        .unwrap();
    ledger.attach_transaction(tenant, entry.id, txn.id).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .post_journal_entry(tenant, entry.id, UserId::new())
                    .await
            })
        })
        .collect();

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(err) if err.kind() == ErrorKind::Conflict => conflicts += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn test_period_close_locks_dates() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let actor = UserId::new();
    let cash = open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;
    let rent = open(&ledger, tenant, "6100", AccountType::Expense, AccountCategory::Rent).await;

    let january = ledger
        .create_period(tenant, NewPeriod::new("January 2026", d(1, 1), d(1, 31)))
        .await
        .unwrap();
    let err = ledger
        .create_period(tenant, NewPeriod::new("Overlap", d(1, 15), d(2, 15)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    book(&ledger, tenant, d(1, 10), &cash, &sales, dec!(1000)).await;
    book(&ledger, tenant, d(1, 20), &rent, &cash, dec!(300)).await;
    let february = book(&ledger, tenant, d(2, 3), &cash, &sales, dec!(50)).await;

    let closed = ledger.close_period(tenant, january.id, actor).await.unwrap();
    assert!(closed.is_closed);
    assert_eq!(closed.closed_by, Some(actor));
    assert_eq!(closed.snapshot.total_revenue, dec!(1000));
    assert_eq!(closed.snapshot.total_expenses, dec!(300));
    assert_eq!(closed.snapshot.net_income, dec!(700));

    let again = ledger
        .close_period(tenant, january.id, UserId::new())
        .await
        .unwrap();
    assert_eq!(again, closed);

    let backdated = NewTransaction::new(
        TransactionType::Income,
        d(1, 15),
        cash.id,
        sales.id,
        dec!(5),
        "late sale",
    );
    let err = ledger.create_transaction(tenant, backdated).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImmutableRecord);

    let err = ledger
        .update_transaction(
            tenant,
            february.id,
            TransactionPatch {
                transaction_date: Some(d(1, 31)),
                ..TransactionPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::PeriodClosed { .. }));

    assert_eq!(
        ledger
            .get_period_for_date(tenant, d(1, 31))
            .await
            .unwrap()
            .map(|p| p.id),
        Some(january.id)
    );
    assert!(ledger.get_period_for_date(tenant, d(2, 1)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_current_period_contains_today() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let today = Utc::now().date_naive();

    assert!(ledger.get_current_period(tenant).await.unwrap().is_none());

    let period = ledger
        .create_period(
            tenant,
            NewPeriod::new(
                "Current",
                today.checked_sub_days(Days::new(10)).unwrap(),
                today.checked_add_days(Days::new(10)).unwrap(),
            ),
        )
        .await
        .unwrap();
    let current = ledger.get_current_period(tenant).await.unwrap();
    assert_eq!(current.map(|p| p.id), Some(period.id));

    ledger
        .close_period(tenant, period.id, UserId::new())
        .await
        .unwrap();
    assert!(ledger.get_current_period(tenant).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sequential_numbering() {
    let ledger = ledger_with(&LedgerConfig {
        numbering: NumberingMode::Sequential,
        ..LedgerConfig::default()
    });
    let tenant = TenantId::new();
    let cash = open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;

    let first = book(&ledger, tenant, d(4, 2), &cash, &sales, dec!(1)).await;
    let second = book(&ledger, tenant, d(4, 2), &cash, &sales, dec!(1)).await;
    assert_eq!(first.number, "TXN-20260402-00000001");
    assert_eq!(second.number, "TXN-20260402-00000002");

    let entry = ledger
        .create_journal_entry(tenant, NewJournalEntry::new(d(4, 2), "Batch"))
        .await
        .unwrap();
    assert_eq!(entry.number, "JE-20260402-00000001");

    let other = TenantId::new();
    let cash = open(&ledger, other, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        other,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;
    let theirs = book(&ledger, other, d(4, 2), &cash, &sales, dec!(1)).await;
    assert_eq!(theirs.number, "TXN-20260402-00000001");
}

#[tokio::test]
async fn test_reports_follow_writes() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let cash = open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;
    let as_of = Some(d(12, 31));

    book(&ledger, tenant, d(5, 1), &cash, &sales, dec!(10)).await;
    let before = ledger.get_trial_balance(tenant, as_of).await.unwrap();
    let cached = ledger.get_trial_balance(tenant, as_of).await.unwrap();
    assert_eq!(before, cached);
    assert_eq!(before.total_debit, dec!(10));

    book(&ledger, tenant, d(5, 2), &cash, &sales, dec!(15)).await;
    let after = ledger.get_trial_balance(tenant, as_of).await.unwrap();
    assert_eq!(after.total_debit, dec!(25));

    let sheet = ledger.get_balance_sheet(tenant, as_of).await.unwrap();
    assert!(sheet.is_balanced);
    assert_eq!(sheet.total_assets, dec!(25));
    assert_eq!(sheet.unclosed_earnings, dec!(25));

    let statement = ledger
        .get_income_statement(tenant, d(5, 2), d(5, 31))
        .await
        .unwrap();
    assert_eq!(statement.net_income, dec!(15));

    let err = ledger
        .get_income_statement(tenant, d(5, 31), d(5, 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_refresh_balance_hints() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let cash = open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let sales = open(
        &ledger,
        tenant,
        "4000",
        AccountType::Revenue,
        AccountCategory::SalesRevenue,
    )
    .await;
    book(&ledger, tenant, d(6, 1), &cash, &sales, dec!(75)).await;
    assert_eq!(
        ledger.get_account(tenant, cash.id).await.unwrap().current_balance,
        Decimal::ZERO
    );

    let balances = ledger.refresh_balance_hints(tenant).await.unwrap();
    assert_eq!(balances.len(), 2);
    assert_eq!(
        ledger.get_account(tenant, cash.id).await.unwrap().current_balance,
        dec!(75)
    );
    assert_eq!(
        ledger.get_account(tenant, sales.id).await.unwrap().current_balance,
        dec!(75)
    );

    let found = ledger
        .find_accounts_by_category(tenant, AccountCategory::Cash)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, cash.id);
}

#[tokio::test]
async fn test_budget_tracking() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let cash = open(&ledger, tenant, "1000", AccountType::Asset, AccountCategory::Cash).await;
    let rent = open(&ledger, tenant, "6100", AccountType::Expense, AccountCategory::Rent).await;
    book(&ledger, tenant, d(1, 15), &rent, &cash, dec!(800)).await;
    book(&ledger, tenant, d(4, 15), &rent, &cash, dec!(900)).await;

    let budget = ledger
        .create_budget(tenant, NewBudget::new("Q1", d(1, 1), d(3, 31), dec!(5000)))
        .await
        .unwrap();
    assert_eq!(budget.remaining_amount, dec!(5000));

    let item = ledger
        .create_budget_item(tenant, budget.id, NewBudgetItem::new(rent.id, dec!(1000)))
        .await
        .unwrap();
    let err = ledger
        .create_budget_item(tenant, budget.id, NewBudgetItem::new(rent.id, dec!(1)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let report = ledger.budget_vs_actual(tenant, budget.id).await.unwrap();
    assert_eq!(report.lines.len(), 1);
    assert_eq!(report.lines[0].variance.actual, dec!(800));
    assert_eq!(report.lines[0].variance.variance, dec!(200));
    assert_eq!(report.lines[0].variance.utilization_percent, dec!(80.00));

    let patched = ledger
        .update_budget_item(
            tenant,
            item.id,
            BudgetItemPatch {
                spent_amount: Some(dec!(800)),
                ..BudgetItemPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(patched.remaining_amount, dec!(200));

    ledger
        .update_budget(
            tenant,
            budget.id,
            BudgetPatch {
                status: Some(BudgetStatus::Closed),
                ..BudgetPatch::default()
            },
        )
        .await
        .unwrap();
    let err = ledger
        .update_budget_item(tenant, item.id, BudgetItemPatch::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImmutableRecord);

    ledger.delete_budget(tenant, budget.id).await.unwrap();
    let err = ledger.get_budget_item(tenant, item.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(ledger.list_budgets(tenant).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_budget_rejects_unknown_links() {
    let ledger = ledger();
    let tenant = TenantId::new();
    let mut input = NewBudget::new("FY", d(1, 1), d(12, 31), dec!(100));
    input.period_id = Some(tally_shared::types::FiscalPeriodId::new());
    let err = ledger.create_budget(tenant, input).await.unwrap_err();
    assert!(matches!(err, LedgerError::PeriodNotFound(_)));

    let budget = ledger
        .create_budget(tenant, NewBudget::new("FY", d(1, 1), d(12, 31), dec!(100)))
        .await
        .unwrap();
    let err = ledger
        .create_budget_item(
            tenant,
            budget.id,
            NewBudgetItem::new(tally_shared::types::AccountId::new(), dec!(10)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));
}
