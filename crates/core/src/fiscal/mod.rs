//! Financial period management.

pub mod period;

pub use period::{FinancialPeriod, NewPeriod, PeriodService, PeriodSnapshot};
