//! Chart of accounts types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, CurrencyCode, TenantId};

/// Top level account classification. Drives balance polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Resources owned.
    Asset,
    /// Obligations owed.
    Liability,
    /// Owner's residual interest.
    Equity,
    /// Income earned.
    Revenue,
    /// Costs incurred.
    Expense,
}

impl AccountType {
    /// All account types in chart order.
    pub const ALL: [Self; 5] = [
        Self::Asset,
        Self::Liability,
        Self::Equity,
        Self::Revenue,
        Self::Expense,
    ];

    /// Returns the side on which this type's balance increases.
    ///
    /// Asset/Expense increase with debits; Liability/Equity/Revenue with credits.
    #[must_use]
    pub const fn normal_balance(self) -> NormalBalance {
        match self {
            Self::Asset | Self::Expense => NormalBalance::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NormalBalance::Credit,
        }
    }

    /// Returns the canonical upper case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Revenue => "REVENUE",
            Self::Expense => "EXPENSE",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ASSET" => Ok(Self::Asset),
            "LIABILITY" => Ok(Self::Liability),
            "EQUITY" => Ok(Self::Equity),
            "REVENUE" => Ok(Self::Revenue),
            "EXPENSE" => Ok(Self::Expense),
            _ => Err(format!("Unknown account type: {s}")),
        }
    }
}

/// Side on which an account's balance grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalBalance {
    /// Asset and expense accounts.
    Debit,
    /// Liability, equity and revenue accounts.
    Credit,
}

impl NormalBalance {
    /// Balance change produced by the given debit and credit totals.
    #[must_use]
    pub fn signed_change(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }
}

/// Finer classification. Informational only, never affects polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum AccountCategory {
    Cash,
    Bank,
    AccountsReceivable,
    Inventory,
    FixedAsset,
    Equipment,
    AccountsPayable,
    AccruedLiability,
    Loan,
    OwnerEquity,
    RetainedEarnings,
    SalesRevenue,
    ServiceRevenue,
    OtherIncome,
    CostOfGoodsSold,
    OperatingExpense,
    Payroll,
    Rent,
    Utilities,
    Tax,
    Other,
}

/// A chart of accounts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Code, unique per tenant. Reports sort by it.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Free text description.
    pub description: Option<String>,
    /// Account type.
    pub account_type: AccountType,
    /// Account category.
    pub category: AccountCategory,
    /// Parent in the account tree.
    pub parent_id: Option<AccountId>,
    /// Inactive accounts reject new transactions and drop out of the trial balance.
    pub is_active: bool,
    /// System accounts cannot be deleted.
    pub is_system: bool,
    /// Balance carried in before the first transaction.
    pub opening_balance: Decimal,
    /// Cached balance hint. Never authoritative.
    pub current_balance: Decimal,
    /// Currency the account is kept in.
    pub currency: CurrencyCode,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Polarity of this account.
    #[must_use]
    pub const fn normal_balance(&self) -> NormalBalance {
        self.account_type.normal_balance()
    }
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Account type.
    pub account_type: AccountType,
    /// Account category.
    pub category: AccountCategory,
    /// Parent account.
    pub parent_id: Option<AccountId>,
    /// Opening balance.
    pub opening_balance: Decimal,
    /// Currency; the configured default when `None`.
    pub currency: Option<CurrencyCode>,
    /// Whether the account is active.
    pub is_active: bool,
    /// Whether the account is a protected system account.
    pub is_system: bool,
}

impl NewAccount {
    /// Creates an active, non-system account with zero opening balance.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
        category: AccountCategory,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            description: None,
            account_type,
            category,
            parent_id: None,
            opening_balance: Decimal::ZERO,
            currency: None,
            is_active: true,
            is_system: false,
        }
    }

    /// Sets the opening balance.
    #[must_use]
    pub const fn with_opening_balance(mut self, amount: Decimal) -> Self {
        self.opening_balance = amount;
        self
    }

    /// Sets the parent account.
    #[must_use]
    pub const fn with_parent(mut self, parent_id: AccountId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the currency.
    #[must_use]
    pub const fn with_currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = Some(currency);
        self
    }

    /// Marks the account as a system account.
    #[must_use]
    pub const fn system(mut self) -> Self {
        self.is_system = true;
        self
    }
}

/// Partial update for an account. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    /// New code.
    pub code: Option<String>,
    /// New name.
    pub name: Option<String>,
    /// New description (`Some(None)` clears it).
    pub description: Option<Option<String>>,
    /// New type. Rejected once transactions reference the account.
    pub account_type: Option<AccountType>,
    /// New category.
    pub category: Option<AccountCategory>,
    /// New parent (`Some(None)` detaches from the tree).
    pub parent_id: Option<Option<AccountId>>,
    /// New active flag.
    pub is_active: Option<bool>,
    /// New opening balance.
    pub opening_balance: Option<Decimal>,
    /// New currency. Rejected once transactions reference the account.
    pub currency: Option<CurrencyCode>,
}

/// Filter options for listing accounts.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    /// Filter by account type.
    pub account_type: Option<AccountType>,
    /// Filter by category.
    pub category: Option<AccountCategory>,
    /// Filter by active status.
    pub is_active: Option<bool>,
    /// Filter by parent (`Some(None)` = root accounts only).
    pub parent_id: Option<Option<AccountId>>,
}

impl AccountFilter {
    /// Returns true if the account passes every set criterion.
    #[must_use]
    pub fn matches(&self, account: &Account) -> bool {
        self.account_type.is_none_or(|t| account.account_type == t)
            && self.category.is_none_or(|c| account.category == c)
            && self.is_active.is_none_or(|a| account.is_active == a)
            && self.parent_id.is_none_or(|p| account.parent_id == p)
    }
}

/// Records that point at an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountReferences {
    /// Transactions using the account on either side.
    pub transactions: u64,
    /// Budget items tracking the account.
    pub budget_items: u64,
    /// Direct child accounts.
    pub children: u64,
}

impl AccountReferences {
    /// Returns true if nothing references the account.
    #[must_use]
    pub const fn is_unreferenced(&self) -> bool {
        self.transactions == 0 && self.budget_items == 0 && self.children == 0
    }
}
