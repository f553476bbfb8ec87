//! Financial report generation.
//!
//! Pure derivations from accounts and movement totals:
//! - Account balance
//! - Trial balance
//! - Income statement (period flow)
//! - Balance sheet (with unclosed earnings)

pub mod service;
pub mod types;


pub use service::ReportService;
pub use types::*;
