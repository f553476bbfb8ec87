//! General ledger facade.
//!
//! [`GeneralLedger`] exposes every ledger operation, tenant-scoped, on top of
//! a [`LedgerStore`]. It validates input through the pure services, lets the
//! store enforce commit-time guards, keeps the report cache coherent and
//! emits one structured log line per mutation.

mod accounts;
mod budgets;
mod journal;
mod periods;
mod reports;
mod transactions;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tally_shared::config::{AppConfig, LedgerConfig, NumberingMode};
use tally_shared::types::{CurrencyCode, TenantId};
use tracing::warn;

use crate::cache::{self, NoopReportCache, ReportCache};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{NumberGenerator, NumberKind};
use crate::store::LedgerStore;

/// Double-entry general ledger over a storage backend.
pub struct GeneralLedger<S> {
    store: Arc<S>,
    cache: Arc<dyn ReportCache>,
    numbering: NumberingMode,
    number_attempts: u32,
    default_currency: CurrencyCode,
}

impl<S> Clone for GeneralLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            numbering: self.numbering,
            number_attempts: self.number_attempts,
            default_currency: self.default_currency,
        }
    }
}

impl<S: LedgerStore> GeneralLedger<S> {
    /// Creates a ledger with explicit settings.
    pub fn new(
        store: Arc<S>,
        config: &LedgerConfig,
        cache: Arc<dyn ReportCache>,
    ) -> LedgerResult<Self> {
        let default_currency = CurrencyCode::parse(&config.default_currency)
            .map_err(|_| LedgerError::InvalidCurrency(config.default_currency.clone()))?;
        Ok(Self {
            store,
            cache,
            numbering: config.numbering,
            number_attempts: config.number_attempts.max(1),
            default_currency,
        })
    }

    /// Creates a ledger from application configuration.
    pub fn from_config(store: Arc<S>, config: &AppConfig) -> LedgerResult<Self> {
        Self::new(store, &config.ledger, cache::from_config(&config.cache))
    }

    /// Creates a ledger with default settings and no report cache.
    pub fn uncached(store: Arc<S>) -> LedgerResult<Self> {
        Self::new(store, &LedgerConfig::default(), Arc::new(NoopReportCache))
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Runs a read, retrying once when the store reports a transient failure.
    async fn read<T, F, Fut>(&self, op: &'static str, f: F) -> LedgerResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        match f().await {
            Err(err) if err.is_retryable() => {
                warn!(op, error = %err, "Read failed, retrying once");
                f().await
            }
            other => other,
        }
    }

    /// Drops every cached report of the tenant. Called after each write.
    fn invalidate(&self, tenant_id: TenantId) {
        self.cache.invalidate(tenant_id);
    }

    async fn next_number(
        &self,
        tenant_id: TenantId,
        kind: NumberKind,
        date: NaiveDate,
    ) -> LedgerResult<String> {
        match self.numbering {
            NumberingMode::Random => Ok(NumberGenerator::random(kind, date)),
            NumberingMode::Sequential => {
                let sequence = self
                    .store
                    .next_sequence(tenant_id, kind.sequence_name())
                    .await?;
                Ok(NumberGenerator::sequential(kind, date, sequence))
            }
        }
    }

    /// Builds and inserts a numbered record, regenerating the number on a
    /// uniqueness collision.
    async fn insert_numbered<T, B, I, Fut>(
        &self,
        tenant_id: TenantId,
        kind: NumberKind,
        date: NaiveDate,
        build: B,
        insert: I,
    ) -> LedgerResult<T>
    where
        B: Fn(String) -> T,
        I: Fn(T) -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        for attempt in 1..=self.number_attempts {
            let number = self.next_number(tenant_id, kind, date).await?;
            match insert(build(number)).await {
                Err(LedgerError::DuplicateNumber(number)) => {
                    warn!(
                        tenant_id = %tenant_id,
                        number = %number,
                        attempt,
                        "Generated number already taken, regenerating"
                    );
                }
                other => return other,
            }
        }
        Err(LedgerError::NumberExhausted(self.number_attempts))
    }
}
