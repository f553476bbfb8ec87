//! `SeaORM` entity definitions for the ledger tables.

pub mod accounts;
pub mod budget_items;
pub mod budgets;
pub mod financial_periods;
pub mod journal_entries;
pub mod ledger_transactions;
pub mod sea_orm_active_enums;
