//! Financial period operations.

use chrono::NaiveDate;
use tally_shared::types::{FiscalPeriodId, TenantId, UserId};
use tracing::{debug, info};

use super::GeneralLedger;
use crate::error::{LedgerError, LedgerResult};
use crate::fiscal::{FinancialPeriod, NewPeriod, PeriodService};
use crate::store::LedgerStore;

impl<S: LedgerStore> GeneralLedger<S> {
    /// Creates an open period that overlaps no existing one.
    pub async fn create_period(
        &self,
        tenant_id: TenantId,
        input: NewPeriod,
    ) -> LedgerResult<FinancialPeriod> {
        let existing = self.store.list_periods(tenant_id).await?;
        PeriodService::validate_new(&input, &existing)?;

        let period = PeriodService::build(tenant_id, input, Self::now());
        self.store.insert_period(&period).await?;
        self.invalidate(tenant_id);

        info!(
            tenant_id = %tenant_id,
            period_id = %period.id,
            start = %period.start_date,
            end = %period.end_date,
            "Financial period created"
        );
        Ok(period)
    }

    /// Fetches a period.
    pub async fn get_period(
        &self,
        tenant_id: TenantId,
        id: FiscalPeriodId,
    ) -> LedgerResult<FinancialPeriod> {
        self.read("get_period", || self.store.get_period(tenant_id, id))
            .await?
            .ok_or(LedgerError::PeriodNotFound(id))
    }

    /// Lists periods by start date.
    pub async fn list_periods(&self, tenant_id: TenantId) -> LedgerResult<Vec<FinancialPeriod>> {
        self.read("list_periods", || self.store.list_periods(tenant_id))
            .await
    }

    /// The open period containing today, if any.
    pub async fn get_current_period(
        &self,
        tenant_id: TenantId,
    ) -> LedgerResult<Option<FinancialPeriod>> {
        let periods = self.list_periods(tenant_id).await?;
        Ok(PeriodService::current(&periods, Self::today()).cloned())
    }

    /// The period containing a date, open or closed.
    pub async fn get_period_for_date(
        &self,
        tenant_id: TenantId,
        date: NaiveDate,
    ) -> LedgerResult<Option<FinancialPeriod>> {
        let periods = self.list_periods(tenant_id).await?;
        Ok(PeriodService::covering(&periods, date).cloned())
    }

    /// Closes a period and snapshots its income statement.
    ///
    /// Closing an already closed period returns it unchanged.
    pub async fn close_period(
        &self,
        tenant_id: TenantId,
        id: FiscalPeriodId,
        actor: UserId,
    ) -> LedgerResult<FinancialPeriod> {
        let (period, closed_now) = self
            .store
            .close_period(tenant_id, id, actor, Self::now())
            .await?;

        if closed_now {
            self.invalidate(tenant_id);
            info!(
                tenant_id = %tenant_id,
                period_id = %id,
                closed_by = %actor,
                net_income = %period.snapshot.net_income,
                "Financial period closed"
            );
        } else {
            debug!(tenant_id = %tenant_id, period_id = %id, "Period already closed");
        }
        Ok(period)
    }
}
