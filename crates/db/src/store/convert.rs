//! Conversions between `SeaORM` models and ledger domain types.

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::Set;
use tally_core::accounts::{self as domain_accounts, Account};
use tally_core::budget::{self as domain_budget, Budget, BudgetItem};
use tally_core::error::LedgerError;
use tally_core::fiscal::{FinancialPeriod, PeriodSnapshot};
use tally_core::journal::{self as domain_journal, JournalEntry};
use tally_core::ledger::{self as domain_ledger, DocumentKind, DocumentReference, LedgerTransaction};
use tally_shared::types::CurrencyCode;
use uuid::Uuid;

use crate::entities::sea_orm_active_enums::{
    AccountCategory, AccountType, BudgetStatus, JournalStatus, TransactionStatus, TransactionType,
};
use crate::entities::{
    accounts, budget_items, budgets, financial_periods, journal_entries, ledger_transactions,
};

/// A stored row that no longer parses into a domain value.
#[derive(Debug, thiserror::Error)]
#[error("Row {id} in {table} has invalid {field}: '{value}'")]
pub struct CorruptRow {
    table: &'static str,
    id: Uuid,
    field: &'static str,
    value: String,
}

impl From<CorruptRow> for LedgerError {
    fn from(err: CorruptRow) -> Self {
        Self::Storage(err.to_string())
    }
}

fn utc(ts: DateTime<FixedOffset>) -> DateTime<Utc> {
    ts.with_timezone(&Utc)
}

fn currency(table: &'static str, id: Uuid, value: &str) -> Result<CurrencyCode, CorruptRow> {
    CurrencyCode::parse(value).map_err(|_| CorruptRow {
        table,
        id,
        field: "currency",
        value: value.to_string(),
    })
}

// ========== Enums ==========

macro_rules! mirror_enum {
    ($domain:ty, $db:ty, [$($variant:ident),+ $(,)?]) => {
        impl From<$domain> for $db {
            fn from(value: $domain) -> Self {
                type Source = $domain;
                match value {
                    $(Source::$variant => Self::$variant,)+
                }
            }
        }

        impl From<$db> for $domain {
            fn from(value: $db) -> Self {
                type Source = $db;
                match value {
                    $(Source::$variant => Self::$variant,)+
                }
            }
        }
    };
}

mirror_enum!(
    domain_accounts::AccountType,
    AccountType,
    [Asset, Liability, Equity, Revenue, Expense]
);

mirror_enum!(
    domain_accounts::AccountCategory,
    AccountCategory,
    [
        Cash,
        Bank,
        AccountsReceivable,
        Inventory,
        FixedAsset,
        Equipment,
        AccountsPayable,
        AccruedLiability,
        Loan,
        OwnerEquity,
        RetainedEarnings,
        SalesRevenue,
        ServiceRevenue,
        OtherIncome,
        CostOfGoodsSold,
        OperatingExpense,
        Payroll,
        Rent,
        Utilities,
        Tax,
        Other,
    ]
);

mirror_enum!(
    domain_ledger::TransactionType,
    TransactionType,
    [Income, Expense, Transfer, Adjustment, Refund]
);

mirror_enum!(
    domain_ledger::TransactionStatus,
    TransactionStatus,
    [Pending, Completed, Cancelled, Failed]
);

mirror_enum!(
    domain_journal::JournalStatus,
    JournalStatus,
    [Draft, Posted, Cancelled]
);

mirror_enum!(
    domain_budget::BudgetStatus,
    BudgetStatus,
    [Draft, Active, Closed]
);

// ========== Accounts ==========

impl TryFrom<accounts::Model> for Account {
    type Error = CorruptRow;

    fn try_from(m: accounts::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            currency: currency("accounts", m.id, &m.currency)?,
            id: m.id.into(),
            tenant_id: m.tenant_id.into(),
            code: m.code,
            name: m.name,
            description: m.description,
            account_type: m.account_type.into(),
            category: m.category.into(),
            parent_id: m.parent_id.map(Into::into),
            is_active: m.is_active,
            is_system: m.is_system,
            opening_balance: m.opening_balance,
            current_balance: m.current_balance,
            created_at: utc(m.created_at),
            updated_at: utc(m.updated_at),
        })
    }
}

impl From<&Account> for accounts::ActiveModel {
    fn from(a: &Account) -> Self {
        Self {
            id: Set(a.id.into_inner()),
            tenant_id: Set(a.tenant_id.into_inner()),
            code: Set(a.code.clone()),
            name: Set(a.name.clone()),
            description: Set(a.description.clone()),
            account_type: Set(a.account_type.into()),
            category: Set(a.category.into()),
            parent_id: Set(a.parent_id.map(|p| p.into_inner())),
            is_active: Set(a.is_active),
            is_system: Set(a.is_system),
            opening_balance: Set(a.opening_balance),
            current_balance: Set(a.current_balance),
            currency: Set(a.currency.to_string()),
            created_at: Set(a.created_at.into()),
            updated_at: Set(a.updated_at.into()),
        }
    }
}

// ========== Transactions ==========

impl TryFrom<ledger_transactions::Model> for LedgerTransaction {
    type Error = CorruptRow;

    fn try_from(m: ledger_transactions::Model) -> Result<Self, Self::Error> {
        let reference = match (m.reference_kind, m.reference_id) {
            (Some(kind), Some(id)) => {
                let kind: DocumentKind = kind.parse().map_err(|_| CorruptRow {
                    table: "ledger_transactions",
                    id: m.id,
                    field: "reference_kind",
                    value: kind.clone(),
                })?;
                Some(DocumentReference::new(kind, id))
            }
            _ => None,
        };

        Ok(Self {
            currency: currency("ledger_transactions", m.id, &m.currency)?,
            id: m.id.into(),
            tenant_id: m.tenant_id.into(),
            number: m.number,
            transaction_date: m.transaction_date,
            transaction_type: m.transaction_type.into(),
            status: m.status.into(),
            debit_account_id: m.debit_account_id.into(),
            credit_account_id: m.credit_account_id.into(),
            amount: m.amount,
            description: m.description,
            reference,
            journal_entry_id: m.journal_entry_id.map(Into::into),
            created_by: m.created_by.map(Into::into),
            created_at: utc(m.created_at),
            updated_at: utc(m.updated_at),
        })
    }
}

impl From<&LedgerTransaction> for ledger_transactions::ActiveModel {
    fn from(t: &LedgerTransaction) -> Self {
        Self {
            id: Set(t.id.into_inner()),
            tenant_id: Set(t.tenant_id.into_inner()),
            number: Set(t.number.clone()),
            transaction_date: Set(t.transaction_date),
            transaction_type: Set(t.transaction_type.into()),
            status: Set(t.status.into()),
            debit_account_id: Set(t.debit_account_id.into_inner()),
            credit_account_id: Set(t.credit_account_id.into_inner()),
            amount: Set(t.amount),
            currency: Set(t.currency.to_string()),
            description: Set(t.description.clone()),
            reference_kind: Set(t.reference.as_ref().map(|r| r.kind.as_str().to_string())),
            reference_id: Set(t.reference.as_ref().map(|r| r.id.clone())),
            journal_entry_id: Set(t.journal_entry_id.map(|e| e.into_inner())),
            created_by: Set(t.created_by.map(|u| u.into_inner())),
            created_at: Set(t.created_at.into()),
            updated_at: Set(t.updated_at.into()),
        }
    }
}

// ========== Journal Entries ==========

impl From<journal_entries::Model> for JournalEntry {
    fn from(m: journal_entries::Model) -> Self {
        Self {
            id: m.id.into(),
            tenant_id: m.tenant_id.into(),
            number: m.number,
            entry_date: m.entry_date,
            description: m.description,
            status: m.status.into(),
            posted: m.posted,
            posted_at: m.posted_at.map(utc),
            posted_by: m.posted_by.map(Into::into),
            cancelled_at: m.cancelled_at.map(utc),
            cancelled_by: m.cancelled_by.map(Into::into),
            created_by: m.created_by.map(Into::into),
            created_at: utc(m.created_at),
            updated_at: utc(m.updated_at),
        }
    }
}

impl From<&JournalEntry> for journal_entries::ActiveModel {
    fn from(e: &JournalEntry) -> Self {
        Self {
            id: Set(e.id.into_inner()),
            tenant_id: Set(e.tenant_id.into_inner()),
            number: Set(e.number.clone()),
            entry_date: Set(e.entry_date),
            description: Set(e.description.clone()),
            status: Set(e.status.into()),
            posted: Set(e.posted),
            posted_at: Set(e.posted_at.map(Into::into)),
            posted_by: Set(e.posted_by.map(|u| u.into_inner())),
            cancelled_at: Set(e.cancelled_at.map(Into::into)),
            cancelled_by: Set(e.cancelled_by.map(|u| u.into_inner())),
            created_by: Set(e.created_by.map(|u| u.into_inner())),
            created_at: Set(e.created_at.into()),
            updated_at: Set(e.updated_at.into()),
        }
    }
}

// ========== Financial Periods ==========

impl From<financial_periods::Model> for FinancialPeriod {
    fn from(m: financial_periods::Model) -> Self {
        Self {
            id: m.id.into(),
            tenant_id: m.tenant_id.into(),
            name: m.name,
            start_date: m.start_date,
            end_date: m.end_date,
            is_closed: m.is_closed,
            closed_at: m.closed_at.map(utc),
            closed_by: m.closed_by.map(Into::into),
            snapshot: PeriodSnapshot {
                total_revenue: m.total_revenue,
                total_expenses: m.total_expenses,
                net_income: m.net_income,
            },
            created_at: utc(m.created_at),
            updated_at: utc(m.updated_at),
        }
    }
}

impl From<&FinancialPeriod> for financial_periods::ActiveModel {
    fn from(p: &FinancialPeriod) -> Self {
        Self {
            id: Set(p.id.into_inner()),
            tenant_id: Set(p.tenant_id.into_inner()),
            name: Set(p.name.clone()),
            start_date: Set(p.start_date),
            end_date: Set(p.end_date),
            is_closed: Set(p.is_closed),
            closed_at: Set(p.closed_at.map(Into::into)),
            closed_by: Set(p.closed_by.map(|u| u.into_inner())),
            total_revenue: Set(p.snapshot.total_revenue),
            total_expenses: Set(p.snapshot.total_expenses),
            net_income: Set(p.snapshot.net_income),
            created_at: Set(p.created_at.into()),
            updated_at: Set(p.updated_at.into()),
        }
    }
}

// ========== Budgets ==========

impl From<budgets::Model> for Budget {
    fn from(m: budgets::Model) -> Self {
        Self {
            id: m.id.into(),
            tenant_id: m.tenant_id.into(),
            name: m.name,
            description: m.description,
            period_id: m.period_id.map(Into::into),
            start_date: m.start_date,
            end_date: m.end_date,
            total_amount: m.total_amount,
            allocated_amount: m.allocated_amount,
            spent_amount: m.spent_amount,
            remaining_amount: m.remaining_amount,
            status: m.status.into(),
            created_at: utc(m.created_at),
            updated_at: utc(m.updated_at),
        }
    }
}

impl From<&Budget> for budgets::ActiveModel {
    fn from(b: &Budget) -> Self {
        Self {
            id: Set(b.id.into_inner()),
            tenant_id: Set(b.tenant_id.into_inner()),
            name: Set(b.name.clone()),
            description: Set(b.description.clone()),
            period_id: Set(b.period_id.map(|p| p.into_inner())),
            start_date: Set(b.start_date),
            end_date: Set(b.end_date),
            total_amount: Set(b.total_amount),
            allocated_amount: Set(b.allocated_amount),
            spent_amount: Set(b.spent_amount),
            remaining_amount: Set(b.remaining_amount),
            status: Set(b.status.into()),
            created_at: Set(b.created_at.into()),
            updated_at: Set(b.updated_at.into()),
        }
    }
}

impl From<budget_items::Model> for BudgetItem {
    fn from(m: budget_items::Model) -> Self {
        Self {
            id: m.id.into(),
            tenant_id: m.tenant_id.into(),
            budget_id: m.budget_id.into(),
            account_id: m.account_id.into(),
            budgeted_amount: m.budgeted_amount,
            allocated_amount: m.allocated_amount,
            spent_amount: m.spent_amount,
            remaining_amount: m.remaining_amount,
            notes: m.notes,
            created_at: utc(m.created_at),
            updated_at: utc(m.updated_at),
        }
    }
}

impl From<&BudgetItem> for budget_items::ActiveModel {
    fn from(i: &BudgetItem) -> Self {
        Self {
            id: Set(i.id.into_inner()),
            tenant_id: Set(i.tenant_id.into_inner()),
            budget_id: Set(i.budget_id.into_inner()),
            account_id: Set(i.account_id.into_inner()),
            budgeted_amount: Set(i.budgeted_amount),
            allocated_amount: Set(i.allocated_amount),
            spent_amount: Set(i.spent_amount),
            remaining_amount: Set(i.remaining_amount),
            notes: Set(i.notes.clone()),
            created_at: Set(i.created_at.into()),
            updated_at: Set(i.updated_at.into()),
        }
    }
}
