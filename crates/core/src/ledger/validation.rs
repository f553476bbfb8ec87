//! Business rule validation for ledger transactions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, CurrencyCode, TenantId, TransactionId};

use super::types::{LedgerTransaction, NewTransaction, TransactionPatch};
use crate::accounts::Account;
use crate::error::{LedgerError, LedgerResult};

const MAX_DESCRIPTION_LEN: usize = 1_000;

/// Decimal places kept for stored amounts.
pub const AMOUNT_SCALE: u32 = 4;

/// Largest magnitude a stored amount may take (15 integer digits, 4 fractional).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_313_682_943, 2_328_306_436, 0, false, 4);

/// Rejects amounts the ledger cannot store exactly.
///
/// Trailing zeros do not count towards the scale, so `1.50000` is accepted.
///
/// # Errors
///
/// - `AmountTooPrecise` for more than [`AMOUNT_SCALE`] decimal places
/// - `AmountOutOfRange` when `|amount|` exceeds [`MAX_AMOUNT`]
pub fn ensure_storable_amount(field: &'static str, amount: Decimal) -> LedgerResult<()> {
    let scale = amount.normalize().scale();
    if scale > AMOUNT_SCALE {
        return Err(LedgerError::AmountTooPrecise {
            field,
            scale,
            max: AMOUNT_SCALE,
        });
    }
    if amount.abs() > MAX_AMOUNT {
        return Err(LedgerError::AmountOutOfRange { field, amount });
    }
    Ok(())
}

/// Validates and assembles ledger transactions.
pub struct TransactionValidator;

impl TransactionValidator {
    /// Checks the rules that need no stored state.
    ///
    /// # Errors
    ///
    /// - `NonPositiveAmount` if `amount <= 0`
    /// - `AmountTooPrecise` / `AmountOutOfRange` if the amount cannot be stored
    /// - `SameAccount` if both sides name the same account
    /// - `MissingField` / `FieldTooLong` for the description
    pub fn validate_shape(
        amount: Decimal,
        debit_account_id: AccountId,
        credit_account_id: AccountId,
        description: &str,
    ) -> LedgerResult<()> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        ensure_storable_amount("amount", amount)?;
        if debit_account_id == credit_account_id {
            return Err(LedgerError::SameAccount(debit_account_id));
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(LedgerError::MissingField("description"));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(LedgerError::FieldTooLong {
                field: "description",
                max: MAX_DESCRIPTION_LEN,
            });
        }
        Ok(())
    }

    /// Checks both sides against their accounts and settles the currency.
    ///
    /// When `requested` is `None` the debit account's currency is used.
    pub fn validate_accounts(
        debit: &Account,
        credit: &Account,
        requested: Option<CurrencyCode>,
    ) -> LedgerResult<CurrencyCode> {
        let currency = requested.unwrap_or(debit.currency);
        for account in [debit, credit] {
            if !account.is_active {
                return Err(LedgerError::AccountInactive(account.id));
            }
            if account.currency != currency {
                return Err(LedgerError::CurrencyMismatch {
                    account: account.id,
                    expected: account.currency,
                    actual: currency,
                });
            }
        }
        Ok(currency)
    }

    /// Builds the transaction record for a validated input.
    #[must_use]
    pub fn build(
        tenant_id: TenantId,
        input: NewTransaction,
        number: String,
        currency: CurrencyCode,
        now: DateTime<Utc>,
    ) -> LedgerTransaction {
        LedgerTransaction {
            id: TransactionId::new(),
            tenant_id,
            number,
            transaction_date: input.transaction_date,
            transaction_type: input.transaction_type,
            status: input.status,
            debit_account_id: input.debit_account_id,
            credit_account_id: input.credit_account_id,
            amount: input.amount,
            currency,
            description: input.description.trim().to_string(),
            reference: input.reference,
            journal_entry_id: None,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the transaction with the patch applied. Does not validate.
    ///
    /// Currency is cleared back to "follow the debit account" only when the
    /// patch names a new debit account without naming a currency.
    #[must_use]
    pub fn apply_patch(
        txn: &LedgerTransaction,
        patch: TransactionPatch,
        now: DateTime<Utc>,
    ) -> (LedgerTransaction, Option<CurrencyCode>) {
        let mut updated = txn.clone();
        let requested_currency = patch.currency.or_else(|| {
            patch
                .debit_account_id
                .is_none()
                .then_some(txn.currency)
        });

        if let Some(date) = patch.transaction_date {
            updated.transaction_date = date;
        }
        if let Some(transaction_type) = patch.transaction_type {
            updated.transaction_type = transaction_type;
        }
        if let Some(status) = patch.status {
            updated.status = status;
        }
        if let Some(debit) = patch.debit_account_id {
            updated.debit_account_id = debit;
        }
        if let Some(credit) = patch.credit_account_id {
            updated.credit_account_id = credit;
        }
        if let Some(amount) = patch.amount {
            updated.amount = amount;
        }
        if let Some(description) = patch.description {
            updated.description = description.trim().to_string();
        }
        if let Some(reference) = patch.reference {
            updated.reference = reference;
        }
        updated.updated_at = now;

        (updated, requested_currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{AccountCategory, AccountService, AccountType, NewAccount};
    use crate::error::ErrorKind;
    use crate::ledger::TransactionType;
    use chrono::NaiveDate;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn account(code: &str, account_type: AccountType) -> Account {
        AccountService::build(
            TenantId::new(),
            NewAccount::new(code, code, account_type, AccountCategory::Other),
            CurrencyCode::USD,
            Utc::now(),
        )
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-0.01))]
    #[case(dec!(-100))]
    fn test_rejects_non_positive_amount(#[case] amount: Decimal) {
        let err = TransactionValidator::validate_shape(
            amount,
            AccountId::new(),
            AccountId::new(),
            "Sale",
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::NonPositiveAmount(_)));
    }

    #[test]
    fn test_max_amount_is_largest_numeric_19_4() {
        assert_eq!(MAX_AMOUNT, dec!(999_999_999_999_999.9999));
    }

    #[rstest]
    #[case(dec!(0.0001))]
    #[case(dec!(1.50000))]
    #[case(dec!(999_999_999_999_999.9999))]
    fn test_accepts_storable_amount(#[case] amount: Decimal) {
        TransactionValidator::validate_shape(amount, AccountId::new(), AccountId::new(), "Sale")
            .unwrap();
    }

    #[rstest]
    #[case(dec!(0.00001), 5)]
    #[case(dec!(1.23456), 5)]
    #[case(dec!(10.000000001), 9)]
    fn test_rejects_amount_below_stored_precision(#[case] amount: Decimal, #[case] scale: u32) {
        let err = TransactionValidator::validate_shape(
            amount,
            AccountId::new(),
            AccountId::new(),
            "Sale",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::AmountTooPrecise { field: "amount", scale: s, max: 4 } if s == scale
        ));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[rstest]
    #[case(dec!(1_000_000_000_000_000))]
    #[case(Decimal::MAX)]
    fn test_rejects_amount_above_stored_range(#[case] amount: Decimal) {
        let err = TransactionValidator::validate_shape(
            amount,
            AccountId::new(),
            AccountId::new(),
            "Sale",
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::AmountOutOfRange { field: "amount", .. }));
    }

    #[test]
    fn test_storable_amount_bounds_are_symmetric() {
        assert!(ensure_storable_amount("opening_balance", -MAX_AMOUNT).is_ok());
        assert!(ensure_storable_amount("opening_balance", -MAX_AMOUNT - dec!(0.0001)).is_err());
    }

    #[test]
    fn test_rejects_same_account_both_sides() {
        let id = AccountId::new();
        let err = TransactionValidator::validate_shape(dec!(10), id, id, "Loop").unwrap_err();
        assert!(matches!(err, LedgerError::SameAccount(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_rejects_blank_description() {
        let err = TransactionValidator::validate_shape(
            dec!(10),
            AccountId::new(),
            AccountId::new(),
            "   ",
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::MissingField("description")));
    }

    #[test]
    fn test_validate_accounts_defaults_to_debit_currency() {
        let cash = account("1000", AccountType::Asset);
        let sales = account("4000", AccountType::Revenue);
        let currency = TransactionValidator::validate_accounts(&cash, &sales, None).unwrap();
        assert_eq!(currency, CurrencyCode::USD);
    }

    #[test]
    fn test_validate_accounts_rejects_inactive_and_mismatched() {
        let cash = account("1000", AccountType::Asset);
        let mut sales = account("4000", AccountType::Revenue);

        let eur = CurrencyCode::parse("EUR").unwrap();
        let err = TransactionValidator::validate_accounts(&cash, &sales, Some(eur)).unwrap_err();
        assert!(matches!(err, LedgerError::CurrencyMismatch { .. }));

        sales.is_active = false;
        let err = TransactionValidator::validate_accounts(&cash, &sales, None).unwrap_err();
        assert!(matches!(err, LedgerError::AccountInactive(id) if id == sales.id));
    }

    #[test]
    fn test_apply_patch_keeps_currency_unless_debit_changes() {
        let cash = account("1000", AccountType::Asset);
        let sales = account("4000", AccountType::Revenue);
        let input = NewTransaction::new(
            TransactionType::Income,
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            cash.id,
            sales.id,
            dec!(100),
            "Sale",
        );
        let txn = TransactionValidator::build(
            cash.tenant_id,
            input,
            "TXN-20260105-AAAAAAAA".into(),
            CurrencyCode::USD,
            Utc::now(),
        );

        let (updated, currency) = TransactionValidator::apply_patch(
            &txn,
            TransactionPatch {
                amount: Some(dec!(150)),
                ..TransactionPatch::default()
            },
            Utc::now(),
        );
        assert_eq!(updated.amount, dec!(150));
        assert_eq!(currency, Some(CurrencyCode::USD));

        let (_, currency) = TransactionValidator::apply_patch(
            &txn,
            TransactionPatch {
                debit_account_id: Some(AccountId::new()),
                ..TransactionPatch::default()
            },
            Utc::now(),
        );
        assert_eq!(currency, None);
    }
}
