//! Transaction and journal entry numbers.
//!
//! Format: `{PREFIX}-{YYYYMMDD}-{SUFFIX}` where the suffix is eight characters,
//! either random uppercase alphanumerics or a zero-padded per-tenant counter.

use chrono::NaiveDate;
use rand::Rng;

const SUFFIX_LEN: usize = 8;
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// What a number identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberKind {
    /// Ledger transaction (`TXN-`).
    Transaction,
    /// Journal entry (`JE-`).
    JournalEntry,
}

impl NumberKind {
    /// Number prefix.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Transaction => "TXN",
            Self::JournalEntry => "JE",
        }
    }

    /// Counter name used for sequential numbering.
    #[must_use]
    pub const fn sequence_name(self) -> &'static str {
        match self {
            Self::Transaction => "ledger_transaction",
            Self::JournalEntry => "journal_entry",
        }
    }
}

/// Number generation.
pub struct NumberGenerator;

impl NumberGenerator {
    /// Number with a random suffix.
    #[must_use]
    pub fn random(kind: NumberKind, date: NaiveDate) -> String {
        let mut rng = rand::rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(CHARSET[rng.random_range(0..CHARSET.len())]))
            .collect();
        Self::format(kind, date, &suffix)
    }

    /// Number with a counter suffix.
    #[must_use]
    pub fn sequential(kind: NumberKind, date: NaiveDate, sequence: u64) -> String {
        Self::format(kind, date, &format!("{sequence:0>SUFFIX_LEN$}"))
    }

    /// Returns true if `number` has the shape of a `kind` number.
    #[must_use]
    pub fn is_well_formed(kind: NumberKind, number: &str) -> bool {
        let mut parts = number.splitn(3, '-');
        let (Some(prefix), Some(date), Some(suffix)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        prefix == kind.prefix()
            && NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
            && suffix.len() == SUFFIX_LEN
            && suffix.bytes().all(|b| CHARSET.contains(&b))
    }

    fn format(kind: NumberKind, date: NaiveDate, suffix: &str) -> String {
        format!("{}-{}-{suffix}", kind.prefix(), date.format("%Y%m%d"))
    }
}
