//! Report operations, served through the report cache.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tally_shared::types::{AccountId, TenantId};
use tracing::debug;

use super::GeneralLedger;
use crate::accounts::{Account, AccountFilter};
use crate::cache::{CachedReport, ReportKey};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{AccountBalance, DateWindow, Movement};
use crate::reports::{BalanceSheetReport, IncomeStatementReport, ReportService, TrialBalanceReport};
use crate::store::LedgerStore;

impl<S: LedgerStore> GeneralLedger<S> {
    /// Balance of one account, over all history or up to `as_of`.
    pub async fn get_account_balance(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<AccountBalance> {
        let key = ReportKey::AccountBalance { account_id, as_of };
        let generation = self.cache.generation(tenant_id);
        if let Some(CachedReport::AccountBalance(hit)) = self.cache.get(tenant_id, generation, &key)
        {
            debug!(tenant_id = %tenant_id, ?key, "Report cache hit");
            return Ok((*hit).clone());
        }

        let account = self.get_account(tenant_id, account_id).await?;
        let movements = self.movements(tenant_id, DateWindow::up_to(as_of)).await?;
        let movement = movements.get(&account_id).copied().unwrap_or_default();
        let balance = ReportService::account_balance(&account, movement, as_of);

        self.cache.put(
            tenant_id,
            generation,
            key,
            CachedReport::AccountBalance(Arc::new(balance.clone())),
        );
        Ok(balance)
    }

    /// Trial balance as of a date (today when `None`).
    pub async fn get_trial_balance(
        &self,
        tenant_id: TenantId,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<TrialBalanceReport> {
        let as_of = as_of.unwrap_or_else(Self::today);
        let key = ReportKey::TrialBalance { as_of };
        let generation = self.cache.generation(tenant_id);
        if let Some(CachedReport::TrialBalance(hit)) = self.cache.get(tenant_id, generation, &key) {
            debug!(tenant_id = %tenant_id, ?key, "Report cache hit");
            return Ok((*hit).clone());
        }

        let (accounts, movements) = self
            .report_inputs(tenant_id, DateWindow::up_to(Some(as_of)))
            .await?;
        let report = ReportService::generate_trial_balance(&accounts, &movements, as_of);

        self.cache.put(
            tenant_id,
            generation,
            key,
            CachedReport::TrialBalance(Arc::new(report.clone())),
        );
        Ok(report)
    }

    /// Income statement over movements dated within `[start, end]`.
    pub async fn get_income_statement(
        &self,
        tenant_id: TenantId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<IncomeStatementReport> {
        if start > end {
            return Err(LedgerError::InvalidDateRange { start, end });
        }
        let key = ReportKey::IncomeStatement { start, end };
        let generation = self.cache.generation(tenant_id);
        if let Some(CachedReport::IncomeStatement(hit)) =
            self.cache.get(tenant_id, generation, &key)
        {
            debug!(tenant_id = %tenant_id, ?key, "Report cache hit");
            return Ok((*hit).clone());
        }

        let (accounts, movements) = self
            .report_inputs(tenant_id, DateWindow::between(start, end))
            .await?;
        let report = ReportService::generate_income_statement(&accounts, &movements, start, end)?;

        self.cache.put(
            tenant_id,
            generation,
            key,
            CachedReport::IncomeStatement(Arc::new(report.clone())),
        );
        Ok(report)
    }

    /// Balance sheet as of a date (today when `None`).
    pub async fn get_balance_sheet(
        &self,
        tenant_id: TenantId,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<BalanceSheetReport> {
        let as_of = as_of.unwrap_or_else(Self::today);
        let key = ReportKey::BalanceSheet { as_of };
        let generation = self.cache.generation(tenant_id);
        if let Some(CachedReport::BalanceSheet(hit)) = self.cache.get(tenant_id, generation, &key) {
            debug!(tenant_id = %tenant_id, ?key, "Report cache hit");
            return Ok((*hit).clone());
        }

        let (accounts, movements) = self
            .report_inputs(tenant_id, DateWindow::up_to(Some(as_of)))
            .await?;
        let report = ReportService::generate_balance_sheet(&accounts, &movements, as_of);

        self.cache.put(
            tenant_id,
            generation,
            key,
            CachedReport::BalanceSheet(Arc::new(report.clone())),
        );
        Ok(report)
    }

    async fn movements(
        &self,
        tenant_id: TenantId,
        window: DateWindow,
    ) -> LedgerResult<HashMap<AccountId, Movement>> {
        self.read("account_movements", || {
            self.store.account_movements(tenant_id, window)
        })
        .await
    }

    async fn report_inputs(
        &self,
        tenant_id: TenantId,
        window: DateWindow,
    ) -> LedgerResult<(Vec<Account>, HashMap<AccountId, Movement>)> {
        let accounts = self
            .list_accounts(tenant_id, &AccountFilter::default())
            .await?;
        let movements = self.movements(tenant_id, window).await?;
        Ok((accounts, movements))
    }
}
