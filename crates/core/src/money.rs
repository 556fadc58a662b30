use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;
use thiserror::Error;

/// Two amounts closer than this are considered the same amount.
pub const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid amount: {0}")]
pub struct ParseMoneyError(pub String);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::from(cents) / Decimal::from(100))
    }

    pub fn to_cents(self) -> i64 {
        (self.0 * Decimal::from(100))
            .round()
            .to_i64()
            .unwrap_or_default()
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    /// Compares magnitudes within [`AMOUNT_TOLERANCE`]; the sign is ignored
    /// because stored ledger amounts may be signed or unsigned.
    pub fn approx_eq(self, other: Money) -> bool {
        (self.0.abs() - other.0.abs()).abs() < AMOUNT_TOLERANCE
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// True when every group after the first is exactly three digits and the
/// first has one to three.
fn valid_groups(int_part: &str, sep: char) -> bool {
    let mut groups = int_part.split(sep);
    let first_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()));
    first_ok && groups.all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()))
}

/// Rewrites grouping and decimal marks into plain `1234.56` form.
///
/// `1,234.56` and `1.234,56` are grouped forms. A lone comma followed by
/// exactly two digits (`4,75`) is a decimal comma. Any other comma must sit
/// on a thousands boundary or the text is rejected.
fn normalize_separators(text: &str) -> Option<String> {
    match (text.rfind(','), text.rfind('.')) {
        (None, _) => Some(text.to_string()),
        (Some(comma), Some(dot)) if dot > comma => {
            valid_groups(&text[..dot], ',').then(|| text.replace(',', ""))
        }
        (Some(comma), Some(_)) => {
            let (int_part, frac) = (&text[..comma], &text[comma + 1..]);
            (valid_groups(int_part, '.') && !frac.contains('.'))
                .then(|| format!("{}.{}", int_part.replace('.', ""), frac))
        }
        (Some(comma), None) => {
            let frac = &text[comma + 1..];
            if text.matches(',').count() == 1 && frac.len() == 2 {
                Some(text.replacen(',', ".", 1))
            } else {
                valid_groups(text, ',').then(|| text.replace(',', ""))
            }
        }
    }
}

/// Parses statement amount text: `4.75`, `-4.75`, `+4.75`, `$1,234.56`,
/// `(75.25)`, `$-4.75` and decimal-comma `-4,75` / `1.234,56` are accepted.
/// A doubled sign such as `--5` or `(-5)` is rejected.
impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMoneyError(s.to_string());
        let trimmed = s.trim();
        let (parenthesized, inner) = match trimmed
            .strip_prefix('(')
            .and_then(|v| v.strip_suffix(')'))
        {
            Some(inner) => (true, inner),
            None => (false, trimmed),
        };
        let cleaned: String = inner
            .chars()
            .filter(|c| !matches!(c, '$' | ' ' | '"'))
            .collect();
        let minus = cleaned.starts_with('-');
        let unsigned = cleaned
            .strip_prefix(['-', '+'])
            .unwrap_or(&cleaned);
        let signed = unsigned.len() < cleaned.len();
        if unsigned.is_empty() || (parenthesized && signed) {
            return Err(err());
        }
        if !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            return Err(err());
        }
        let digits = normalize_separators(unsigned).ok_or_else(err)?;
        let value = Decimal::from_str(&digits).map_err(|_| err())?;
        let value = if parenthesized != minus { -value } else { value };
        Ok(Money::from_decimal(value))
    }
}
