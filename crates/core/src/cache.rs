//! Report result caching.
//!
//! The cache only ever saves latency. Entries are keyed by a per-tenant
//! generation; every committed write bumps the tenant's generation so older
//! entries become unreachable and age out through LRU or TTL.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use dashmap::DashMap;
use moka::sync::Cache;
use tally_shared::config::CacheConfig;
use tally_shared::types::{AccountId, TenantId};

use crate::ledger::AccountBalance;
use crate::reports::{BalanceSheetReport, IncomeStatementReport, TrialBalanceReport};

/// Identifies a report within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKey {
    /// Single account balance.
    AccountBalance {
        /// Account.
        account_id: AccountId,
        /// Cut-off date; all history when `None`.
        as_of: Option<NaiveDate>,
    },
    /// Trial balance.
    TrialBalance {
        /// Cut-off date.
        as_of: NaiveDate,
    },
    /// Income statement.
    IncomeStatement {
        /// First day.
        start: NaiveDate,
        /// Last day.
        end: NaiveDate,
    },
    /// Balance sheet.
    BalanceSheet {
        /// Cut-off date.
        as_of: NaiveDate,
    },
}

/// A cached report.
#[derive(Debug, Clone)]
pub enum CachedReport {
    /// Single account balance.
    AccountBalance(Arc<AccountBalance>),
    /// Trial balance.
    TrialBalance(Arc<TrialBalanceReport>),
    /// Income statement.
    IncomeStatement(Arc<IncomeStatementReport>),
    /// Balance sheet.
    BalanceSheet(Arc<BalanceSheetReport>),
}

/// Cache port for derived reports.
///
/// Readers take the generation *before* reading the store and pass the same
/// value to `put`, so a report computed across a concurrent write is filed
/// under a generation nobody asks for again.
pub trait ReportCache: Send + Sync {
    /// Current generation for a tenant.
    fn generation(&self, tenant_id: TenantId) -> u64;

    /// Looks up a report.
    fn get(&self, tenant_id: TenantId, generation: u64, key: &ReportKey) -> Option<CachedReport>;

    /// Stores a report.
    fn put(&self, tenant_id: TenantId, generation: u64, key: ReportKey, report: CachedReport);

    /// Makes every cached report of the tenant unreachable.
    fn invalidate(&self, tenant_id: TenantId);
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReportCache;

impl ReportCache for NoopReportCache {
    fn generation(&self, _tenant_id: TenantId) -> u64 {
        0
    }

    fn get(
        &self,
        _tenant_id: TenantId,
        _generation: u64,
        _key: &ReportKey,
    ) -> Option<CachedReport> {
        None
    }

    fn put(&self, _tenant_id: TenantId, _generation: u64, _key: ReportKey, _report: CachedReport) {}

    fn invalidate(&self, _tenant_id: TenantId) {}
}

/// Default cache capacity (number of entries).
const DEFAULT_CACHE_CAPACITY: u64 = 1_000;

/// Default time-to-live for cache entries (5 minutes).
const DEFAULT_TTL_SECS: u64 = 300;

type EntryKey = (TenantId, u64, ReportKey);

/// In-process LRU + TTL cache backed by Moka.
#[derive(Clone)]
pub struct MokaReportCache {
    cache: Cache<EntryKey, CachedReport>,
    generations: Arc<DashMap<TenantId, u64>>,
}

impl MokaReportCache {
    /// Creates a cache with default settings.
    ///
    /// Default: 1000 entries max, 5 minute TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_CACHE_CAPACITY, DEFAULT_TTL_SECS)
    }

    /// Creates a cache with custom capacity and TTL.
    #[must_use]
    pub fn with_config(max_capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            cache,
            generations: Arc::new(DashMap::new()),
        }
    }

    /// Number of entries currently held, stale generations included.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl Default for MokaReportCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MokaReportCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaReportCache")
            .field("entries", &self.cache.entry_count())
            .field("tenants", &self.generations.len())
            .finish()
    }
}

impl ReportCache for MokaReportCache {
    fn generation(&self, tenant_id: TenantId) -> u64 {
        self.generations.get(&tenant_id).map_or(0, |g| *g)
    }

    fn get(&self, tenant_id: TenantId, generation: u64, key: &ReportKey) -> Option<CachedReport> {
        self.cache.get(&(tenant_id, generation, *key))
    }

    fn put(&self, tenant_id: TenantId, generation: u64, key: ReportKey, report: CachedReport) {
        self.cache.insert((tenant_id, generation, key), report);
    }

    fn invalidate(&self, tenant_id: TenantId) {
        *self.generations.entry(tenant_id).or_insert(0) += 1;
    }
}

/// Builds the cache described by configuration.
#[must_use]
pub fn from_config(config: &CacheConfig) -> Arc<dyn ReportCache> {
    if config.enabled {
        Arc::new(MokaReportCache::with_config(
            config.max_capacity,
            config.ttl_secs,
        ))
    } else {
        Arc::new(NoopReportCache)
    }
}
