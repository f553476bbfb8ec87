//! Budget tracking and variance analysis.
//!
//! Budget and item amounts are caller-maintained. The budget-vs-actual report
//! reads the ledger for comparison and never writes those amounts back.

pub mod service;
pub mod types;
pub mod variance;


pub use service::BudgetService;
pub use types::{
    Budget, BudgetItem, BudgetItemPatch, BudgetPatch, BudgetStatus, BudgetVsActualLine,
    BudgetVsActualReport, NewBudget, NewBudgetItem, VarianceResult, VarianceStatus,
};
pub use variance::budget_vs_actual;
