use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Money amount represented as integer **minor units**.
///
/// Balances, prices and rewards are all stored as `i64` minor units; this type
/// only exists at the edges (parsing operator input, formatting logs) so that
/// no floating-point value ever reaches the ledger.
///
/// # Examples
///
/// ```rust
/// use engine::Money;
///
/// let amount = Money::new(12_34);
/// assert_eq!(amount.minor(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
/// assert_eq!("10,5".parse::<Money>().unwrap().minor(), 1050);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses a decimal string into minor units.
    ///
    /// Accepts `.` or `,` as decimal separator, an optional leading `+`/`-`
    /// and at most 2 fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed(s, 2)
            .map(Money)
            .map_err(|reason| EngineError::InvalidAmount(reason.to_string()))
    }
}

/// A rate expressed in basis points (1 bp = 0.01%).
///
/// Interest and cancellation rates may be negative (a penalty).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(i32);

impl Rate {
    pub const ZERO: Rate = Rate(0);
    pub const BASIS: i64 = 10_000;

    #[must_use]
    pub const fn from_bp(bp: i32) -> Self {
        Self(bp)
    }

    #[must_use]
    pub const fn bp(self) -> i32 {
        self.0
    }

    /// `round(amount × rate)`, rounding half away from zero.
    #[must_use]
    pub fn of(self, amount_minor: i64) -> i64 {
        round_div(
            i128::from(amount_minor) * i128::from(self.0),
            i128::from(Self::BASIS),
        )
    }

    /// `round(amount × (1 + rate))`.
    #[must_use]
    pub fn grow(self, amount_minor: i64) -> i64 {
        amount_minor + self.of(amount_minor)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}%", abs / 100, abs % 100)
    }
}

impl FromStr for Rate {
    type Err = EngineError;

    /// Parses a percentage (`"3.5"`, `"3.5%"`, `"-1"`) into basis points.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed);
        let bp = parse_fixed(trimmed, 2)
            .map_err(|reason| EngineError::InvalidRate(reason.to_string()))?;
        i32::try_from(bp)
            .map(Rate)
            .map_err(|_| EngineError::InvalidRate("rate too large".to_string()))
    }
}

/// Integer division rounding half away from zero.
pub(crate) fn round_div(numerator: i128, denominator: i128) -> i64 {
    let half = denominator.abs() / 2;
    let adjusted = if (numerator < 0) != (denominator < 0) {
        numerator - half * denominator.signum()
    } else {
        numerator + half * denominator.signum()
    };
    // Callers keep operands in i64 range, the quotient always fits.
    (adjusted / denominator) as i64
}

/// Parses a signed decimal with at most `decimals` fractional digits into an
/// integer scaled by `10^decimals`.
pub(crate) fn parse_fixed(s: &str, decimals: u32) -> Result<i64, &'static str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("empty amount");
    }

    let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
        (true, stripped)
    } else if let Some(stripped) = trimmed.strip_prefix('+') {
        (false, stripped)
    } else {
        (false, trimmed)
    };

    let rest = rest.trim().replace(',', ".");
    if rest.is_empty() {
        return Err("empty amount");
    }

    let mut parts = rest.split('.');
    let whole = parts.next().ok_or("invalid amount")?;
    let frac = parts.next().unwrap_or("");
    if parts.next().is_some() {
        return Err("invalid amount");
    }
    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return Err("invalid amount");
    }
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err("invalid amount");
    }
    if frac.len() > decimals as usize {
        return Err("too many decimals");
    }

    let scale = 10i64.pow(decimals);
    let whole: i64 = whole.parse().map_err(|_| "invalid amount")?;
    let frac_value: i64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        padded.parse().map_err(|_| "invalid amount")?
    };

    let total = whole
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or("amount too large")?;

    Ok(if negative { -total } else { total })
}
