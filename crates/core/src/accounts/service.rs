//! Pure chart of accounts rules.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tally_shared::types::{AccountId, CurrencyCode, TenantId};

use super::types::{Account, AccountPatch, AccountReferences, NewAccount};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::ensure_storable_amount;

const MAX_CODE_LEN: usize = 32;
const MAX_NAME_LEN: usize = 255;

/// Service for chart of accounts validation and state changes.
pub struct AccountService;

impl AccountService {
    /// Validates an account creation request.
    pub fn validate_new(input: &NewAccount) -> LedgerResult<()> {
        Self::validate_code(&input.code)?;
        Self::validate_name(&input.name)?;
        ensure_storable_amount("opening_balance", input.opening_balance)
    }

    /// Builds the account record for a validated request.
    #[must_use]
    pub fn build(
        tenant_id: TenantId,
        input: NewAccount,
        default_currency: CurrencyCode,
        now: DateTime<Utc>,
    ) -> Account {
        Account {
            id: AccountId::new(),
            tenant_id,
            code: input.code.trim().to_string(),
            name: input.name.trim().to_string(),
            description: input.description,
            account_type: input.account_type,
            category: input.category,
            parent_id: input.parent_id,
            is_active: input.is_active,
            is_system: input.is_system,
            opening_balance: input.opening_balance,
            current_balance: input.opening_balance,
            currency: input.currency.unwrap_or(default_currency),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the account with the patch applied.
    ///
    /// Type and currency are locked once any transaction references the account.
    pub fn apply_patch(
        account: &Account,
        patch: AccountPatch,
        references: AccountReferences,
        now: DateTime<Utc>,
    ) -> LedgerResult<Account> {
        let mut updated = account.clone();

        if let Some(code) = patch.code {
            Self::validate_code(&code)?;
            updated.code = code.trim().to_string();
        }
        if let Some(name) = patch.name {
            Self::validate_name(&name)?;
            updated.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            updated.description = description;
        }
        if let Some(account_type) = patch.account_type {
            updated.account_type = account_type;
        }
        if let Some(currency) = patch.currency {
            updated.currency = currency;
        }
        Self::ensure_fields_unlocked(account, &updated, references)?;
        if let Some(category) = patch.category {
            updated.category = category;
        }
        if let Some(parent_id) = patch.parent_id {
            updated.parent_id = parent_id;
        }
        if let Some(is_active) = patch.is_active {
            updated.is_active = is_active;
        }
        if let Some(opening_balance) = patch.opening_balance {
            ensure_storable_amount("opening_balance", opening_balance)?;
            updated.opening_balance = opening_balance;
        }
        updated.updated_at = now;

        Ok(updated)
    }

    /// Rejects a type or currency change on an account that transactions
    /// already reference.
    pub fn ensure_fields_unlocked(
        stored: &Account,
        updated: &Account,
        references: AccountReferences,
    ) -> LedgerResult<()> {
        if references.transactions == 0 {
            return Ok(());
        }
        let field = if updated.account_type != stored.account_type {
            "account_type"
        } else if updated.currency != stored.currency {
            "currency"
        } else {
            return Ok(());
        };
        Err(LedgerError::AccountFieldLocked {
            account: stored.id,
            field,
        })
    }

    /// Rejects a parent assignment that would close a loop in the tree.
    ///
    /// `parent_of` resolves an account's current parent within the tenant.
    pub fn ensure_acyclic(
        account_id: AccountId,
        new_parent: Option<AccountId>,
        parent_of: impl Fn(AccountId) -> Option<AccountId>,
    ) -> LedgerResult<()> {
        let mut seen = HashSet::new();
        let mut cursor = new_parent;
        while let Some(current) = cursor {
            if current == account_id {
                return Err(LedgerError::ParentCycle(account_id));
            }
            // A pre-existing loop that does not involve this account.
            if !seen.insert(current) {
                break;
            }
            cursor = parent_of(current);
        }
        Ok(())
    }

    /// Checks that an account may be deleted.
    pub fn ensure_deletable(account: &Account, references: AccountReferences) -> LedgerResult<()> {
        if account.is_system {
            return Err(LedgerError::SystemAccount(account.id));
        }
        if !references.is_unreferenced() {
            return Err(LedgerError::AccountInUse {
                account: account.id,
                transactions: references.transactions,
                budget_items: references.budget_items,
                children: references.children,
            });
        }
        Ok(())
    }

    fn validate_code(code: &str) -> LedgerResult<()> {
        let code = code.trim();
        if code.is_empty() {
            return Err(LedgerError::MissingField("code"));
        }
        if code.chars().count() > MAX_CODE_LEN {
            return Err(LedgerError::FieldTooLong {
                field: "code",
                max: MAX_CODE_LEN,
            });
        }
        Ok(())
    }

    fn validate_name(name: &str) -> LedgerResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::MissingField("name"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(LedgerError::FieldTooLong {
                field: "name",
                max: MAX_NAME_LEN,
            });
        }
        Ok(())
    }
}
