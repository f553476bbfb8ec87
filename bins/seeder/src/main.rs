//! Seeds a tenant with a standard chart of accounts and a monthly fiscal
//! calendar.
//!
//! Usage: seeder [TENANT_ID] [YEAR]
//!
//! Defaults to the development tenant and the current year. Records that
//! already exist are left alone, so the seeder can be re-run safely.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Datelike, Months, NaiveDate, Utc};
use tally_core::accounts::{AccountCategory, AccountType, NewAccount};
use tally_core::fiscal::NewPeriod;
use tally_core::{ErrorKind, GeneralLedger};
use tally_db::PgLedgerStore;
use tally_shared::AppConfig;
use tally_shared::config::LoggingConfig;
use tally_shared::types::TenantId;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Development tenant used when none is given.
const DEV_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// System accounts every tenant starts with.
const CHART: &[(&str, &str, AccountType, AccountCategory)] = &[
    ("1000", "Cash", AccountType::Asset, AccountCategory::Cash),
    ("1100", "Bank", AccountType::Asset, AccountCategory::Bank),
    ("1200", "Accounts Receivable", AccountType::Asset, AccountCategory::AccountsReceivable),
    ("1300", "Inventory", AccountType::Asset, AccountCategory::Inventory),
    ("1500", "Fixed Assets", AccountType::Asset, AccountCategory::FixedAsset),
    ("1600", "Equipment", AccountType::Asset, AccountCategory::Equipment),
    ("2000", "Accounts Payable", AccountType::Liability, AccountCategory::AccountsPayable),
    ("2100", "Accrued Liabilities", AccountType::Liability, AccountCategory::AccruedLiability),
    ("2500", "Loans", AccountType::Liability, AccountCategory::Loan),
    ("3000", "Owner Equity", AccountType::Equity, AccountCategory::OwnerEquity),
    ("3100", "Retained Earnings", AccountType::Equity, AccountCategory::RetainedEarnings),
    ("4000", "Sales Revenue", AccountType::Revenue, AccountCategory::SalesRevenue),
    ("4100", "Service Revenue", AccountType::Revenue, AccountCategory::ServiceRevenue),
    ("4900", "Other Income", AccountType::Revenue, AccountCategory::OtherIncome),
    ("5000", "Cost of Goods Sold", AccountType::Expense, AccountCategory::CostOfGoodsSold),
    ("6000", "Operating Expenses", AccountType::Expense, AccountCategory::OperatingExpense),
    ("6100", "Rent", AccountType::Expense, AccountCategory::Rent),
    ("6200", "Payroll", AccountType::Expense, AccountCategory::Payroll),
    ("6300", "Utilities", AccountType::Expense, AccountCategory::Utilities),
    ("6900", "Taxes", AccountType::Expense, AccountCategory::Tax),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let mut args = std::env::args().skip(1);
    let tenant: TenantId = args
        .next()
        .as_deref()
        .unwrap_or(DEV_TENANT_ID)
        .parse()
        .context("TENANT_ID must be a UUID")?;
    let year = match args.next() {
        Some(year) => year.parse().context("YEAR must be a number")?,
        None => Utc::now().year(),
    };

    let db = tally_db::connect(&config.database).await?;
    let ledger = GeneralLedger::from_config(Arc::new(PgLedgerStore::new(db)), &config)?;

    info!(%tenant, year, "Seeding tenant");
    let accounts = seed_chart(&ledger, tenant).await?;
    let periods = seed_calendar(&ledger, tenant, year).await?;
    info!(%tenant, accounts, periods, "Seeding complete");

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Creates the missing system accounts. Returns how many were created.
async fn seed_chart(
    ledger: &GeneralLedger<PgLedgerStore>,
    tenant: TenantId,
) -> anyhow::Result<usize> {
    let mut created = 0;
    for &(code, name, account_type, category) in CHART {
        match ledger.get_account_by_code(tenant, code).await {
            Ok(_) => {
                info!(code, "Account already exists, skipping");
                continue;
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        ledger
            .create_account(
                tenant,
                NewAccount::new(code, name, account_type, category).system(),
            )
            .await
            .with_context(|| format!("Failed to create account {code}"))?;
        created += 1;
    }
    Ok(created)
}

/// Creates one period per month of `year` where no period covers that month
/// yet. Returns how many were created.
async fn seed_calendar(
    ledger: &GeneralLedger<PgLedgerStore>,
    tenant: TenantId,
    year: i32,
) -> anyhow::Result<usize> {
    let mut created = 0;
    for month in 1..=12 {
        let start = NaiveDate::from_ymd_opt(year, month, 1).context("Year out of range")?;
        let end = start
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .context("Year out of range")?;

        if ledger.get_period_for_date(tenant, start).await?.is_some()
            || ledger.get_period_for_date(tenant, end).await?.is_some()
        {
            info!(%start, "Period already exists, skipping");
            continue;
        }

        let name = format!("{} {year}", start.format("%B"));
        ledger
            .create_period(tenant, NewPeriod::new(name, start, end))
            .await
            .with_context(|| format!("Failed to create period starting {start}"))?;
        created += 1;
    }
    Ok(created)
}
