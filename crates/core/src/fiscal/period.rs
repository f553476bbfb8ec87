//! Financial period types and rules.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{FiscalPeriodId, TenantId, UserId};

use crate::error::{LedgerError, LedgerResult};

/// Revenue, expense and net income captured when a period closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSnapshot {
    /// Revenue earned in the period.
    pub total_revenue: Decimal,
    /// Expenses incurred in the period.
    pub total_expenses: Decimal,
    /// Revenue minus expenses.
    pub net_income: Decimal,
}

/// A bounded date range that can be closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialPeriod {
    /// Unique identifier.
    pub id: FiscalPeriodId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Period name (e.g., "January 2026").
    pub name: String,
    /// First day, inclusive.
    pub start_date: NaiveDate,
    /// Last day, inclusive.
    pub end_date: NaiveDate,
    /// Closed periods reject transactions dated inside them.
    pub is_closed: bool,
    /// When the period was closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Who closed the period.
    pub closed_by: Option<UserId>,
    /// Totals captured at close; zero while open.
    pub snapshot: PeriodSnapshot,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl FinancialPeriod {
    /// Returns true if the given date falls within this period.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Returns true if `[start, end]` shares at least one day with this period.
    #[must_use]
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end_date && end >= self.start_date
    }
}

/// Input for creating a period.
#[derive(Debug, Clone)]
pub struct NewPeriod {
    /// Period name.
    pub name: String,
    /// First day, inclusive.
    pub start_date: NaiveDate,
    /// Last day, inclusive.
    pub end_date: NaiveDate,
}

impl NewPeriod {
    /// Creates a period input.
    #[must_use]
    pub fn new(name: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            start_date,
            end_date,
        }
    }
}

/// Service for period rules.
pub struct PeriodService;

impl PeriodService {
    /// Validates a creation request against the tenant's existing periods.
    ///
    /// # Errors
    ///
    /// - `MissingField` for a blank name
    /// - `InvalidDateRange` unless `start < end`
    /// - `PeriodOverlap` if any existing period shares a day
    pub fn validate_new(input: &NewPeriod, existing: &[FinancialPeriod]) -> LedgerResult<()> {
        if input.name.trim().is_empty() {
            return Err(LedgerError::MissingField("name"));
        }
        if input.start_date >= input.end_date {
            return Err(LedgerError::InvalidDateRange {
                start: input.start_date,
                end: input.end_date,
            });
        }
        Self::ensure_no_overlap(input, existing)
    }

    /// Fails with `PeriodOverlap` if `input` intersects an existing period.
    pub fn ensure_no_overlap(input: &NewPeriod, existing: &[FinancialPeriod]) -> LedgerResult<()> {
        match existing
            .iter()
            .find(|p| p.overlaps(input.start_date, input.end_date))
        {
            Some(clash) => Err(LedgerError::PeriodOverlap(clash.name.clone())),
            None => Ok(()),
        }
    }

    /// Builds an open period.
    #[must_use]
    pub fn build(tenant_id: TenantId, input: NewPeriod, now: DateTime<Utc>) -> FinancialPeriod {
        FinancialPeriod {
            id: FiscalPeriodId::new(),
            tenant_id,
            name: input.name.trim().to_string(),
            start_date: input.start_date,
            end_date: input.end_date,
            is_closed: false,
            closed_at: None,
            closed_by: None,
            snapshot: PeriodSnapshot::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The open period containing `today`; earliest start wins.
    #[must_use]
    pub fn current<'a>(
        periods: &'a [FinancialPeriod],
        today: NaiveDate,
    ) -> Option<&'a FinancialPeriod> {
        periods
            .iter()
            .filter(|p| !p.is_closed && p.contains_date(today))
            .min_by_key(|p| p.start_date)
    }

    /// The period containing `date`, open or closed; earliest start wins.
    #[must_use]
    pub fn covering<'a>(
        periods: &'a [FinancialPeriod],
        date: NaiveDate,
    ) -> Option<&'a FinancialPeriod> {
        periods
            .iter()
            .filter(|p| p.contains_date(date))
            .min_by_key(|p| p.start_date)
    }

    /// Fails with `PeriodClosed` if a closed period contains `date`.
    pub fn ensure_date_open(periods: &[FinancialPeriod], date: NaiveDate) -> LedgerResult<()> {
        match periods.iter().find(|p| p.is_closed && p.contains_date(date)) {
            Some(period) => Err(LedgerError::PeriodClosed {
                date,
                period: period.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Returns the period closed with the given snapshot.
    #[must_use]
    pub fn close(
        period: &FinancialPeriod,
        snapshot: PeriodSnapshot,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> FinancialPeriod {
        FinancialPeriod {
            is_closed: true,
            closed_at: Some(now),
            closed_by: Some(actor),
            snapshot,
            updated_at: now,
            ..period.clone()
        }
    }
}
