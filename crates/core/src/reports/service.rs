//! Report generation service.
//!
//! Every report is derived from account definitions plus per-account movement
//! totals. Stored balance hints are never read.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_shared::types::AccountId;

use super::types::{
    BalanceSheetReport, BalanceSheetSection, IncomeStatementLine, IncomeStatementReport,
    IncomeStatementSection, TrialBalanceLine, TrialBalanceReport,
};
use crate::accounts::{Account, AccountType, NormalBalance};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{AccountBalance, Movement};

/// Service for generating financial reports.
pub struct ReportService;

impl ReportService {
    /// Balance of one account from its movement up to `as_of`.
    #[must_use]
    pub fn account_balance(
        account: &Account,
        movement: Movement,
        as_of: Option<NaiveDate>,
    ) -> AccountBalance {
        AccountBalance::compute(account, movement, as_of)
    }

    /// Generates a trial balance.
    ///
    /// Each balance goes in the column of its sign on the debit axis, so a
    /// revenue account with a positive balance lands in the credit column.
    /// Inactive accounts are listed only while they still carry a balance.
    #[must_use]
    pub fn generate_trial_balance(
        accounts: &[Account],
        movements: &HashMap<AccountId, Movement>,
        as_of: NaiveDate,
    ) -> TrialBalanceReport {
        let mut lines = Vec::with_capacity(accounts.len());
        for account in sorted_by_code(accounts) {
            let balance = Self::account_balance(account, movement_of(movements, account.id), None)
                .balance;
            if !account.is_active && balance.is_zero() {
                continue;
            }
            let debit_side = match account.normal_balance() {
                NormalBalance::Debit => balance,
                NormalBalance::Credit => -balance,
            };
            let (debit_balance, credit_balance) = if debit_side >= Decimal::ZERO {
                (debit_side, Decimal::ZERO)
            } else {
                (Decimal::ZERO, -debit_side)
            };
            lines.push(TrialBalanceLine {
                account_id: account.id,
                code: account.code.clone(),
                name: account.name.clone(),
                account_type: account.account_type,
                debit_balance,
                credit_balance,
            });
        }

        let total_debit: Decimal = lines.iter().map(|l| l.debit_balance).sum();
        let total_credit: Decimal = lines.iter().map(|l| l.credit_balance).sum();

        TrialBalanceReport {
            as_of,
            lines,
            total_debit,
            total_credit,
            is_balanced: total_debit == total_credit,
        }
    }

    /// Generates an income statement from movements dated within `[start, end]`.
    ///
    /// Opening balances are not period flow and are ignored.
    pub fn generate_income_statement(
        accounts: &[Account],
        movements: &HashMap<AccountId, Movement>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<IncomeStatementReport> {
        if start > end {
            return Err(LedgerError::InvalidDateRange { start, end });
        }

        let mut revenue = IncomeStatementSection::default();
        let mut expenses = IncomeStatementSection::default();

        for account in sorted_by_code(accounts) {
            let section = match account.account_type {
                AccountType::Revenue => &mut revenue,
                AccountType::Expense => &mut expenses,
                _ => continue,
            };
            let movement = movement_of(movements, account.id);
            let amount = account
                .normal_balance()
                .signed_change(movement.debit, movement.credit);
            if !account.is_active && amount.is_zero() {
                continue;
            }
            section.total += amount;
            section.accounts.push(IncomeStatementLine {
                account_id: account.id,
                code: account.code.clone(),
                name: account.name.clone(),
                amount,
            });
        }

        let net_income = revenue.total - expenses.total;
        Ok(IncomeStatementReport {
            period_start: start,
            period_end: end,
            revenue,
            expenses,
            net_income,
        })
    }

    /// Generates a balance sheet as of a date.
    ///
    /// Revenue and expense balances are folded into equity as unclosed
    /// earnings, so `assets == liabilities + equity` holds between closings.
    #[must_use]
    pub fn generate_balance_sheet(
        accounts: &[Account],
        movements: &HashMap<AccountId, Movement>,
        as_of: NaiveDate,
    ) -> BalanceSheetReport {
        let mut assets = BalanceSheetSection::default();
        let mut liabilities = BalanceSheetSection::default();
        let mut equity = BalanceSheetSection::default();
        let mut unclosed_earnings = Decimal::ZERO;

        for account in sorted_by_code(accounts) {
            let balance =
                Self::account_balance(account, movement_of(movements, account.id), Some(as_of));
            match account.account_type {
                AccountType::Asset => add_to_section(&mut assets, balance),
                AccountType::Liability => add_to_section(&mut liabilities, balance),
                AccountType::Equity => add_to_section(&mut equity, balance),
                AccountType::Revenue => unclosed_earnings += balance.balance,
                AccountType::Expense => unclosed_earnings -= balance.balance,
            }
        }
        equity.total += unclosed_earnings;

        let total_assets = assets.total;
        let total_liabilities = liabilities.total;
        let total_equity = equity.total;
        let total_liabilities_and_equity = total_liabilities + total_equity;

        BalanceSheetReport {
            as_of,
            assets,
            liabilities,
            equity,
            unclosed_earnings,
            total_assets,
            total_liabilities,
            total_equity,
            total_liabilities_and_equity,
            is_balanced: total_assets == total_liabilities_and_equity,
        }
    }
}

fn add_to_section(section: &mut BalanceSheetSection, balance: AccountBalance) {
    section.total += balance.balance;
    section.accounts.push(balance);
}

fn movement_of(movements: &HashMap<AccountId, Movement>, id: AccountId) -> Movement {
    movements.get(&id).copied().unwrap_or_default()
}

fn sorted_by_code(accounts: &[Account]) -> Vec<&Account> {
    let mut sorted: Vec<&Account> = accounts.iter().collect();
    sorted.sort_by(|a, b| a.code.cmp(&b.code));
    sorted
}
