//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} id")))
}

/// Parse an optional UUID column.
pub(crate) fn parse_optional_uuid(value: Option<&str>, label: &str) -> ResultEngine<Option<Uuid>> {
    value.map(|raw| parse_uuid(raw, label)).transpose()
}

/// Trim and NFC-normalize a display name, rejecting empty values.
///
/// Names are compared for uniqueness (instrument names within a classroom),
/// so visually identical inputs must map to the same stored string.
pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let normalized: String = value.trim().nfc().collect();
    if normalized.is_empty() {
        return Err(EngineError::InvalidId(format!("{label} name must not be empty")));
    }
    Ok(normalized)
}

/// Trim optional free text; blank input becomes `None`.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.nfc().collect())
}

/// Validate a strictly positive money amount.
pub(crate) fn require_positive_amount(amount_minor: i64, label: &str) -> ResultEngine<()> {
    if amount_minor <= 0 {
        return Err(EngineError::InvalidAmount(format!(
            "{label} must be > 0"
        )));
    }
    Ok(())
}

/// `a × b` on money values, failing instead of wrapping.
pub(crate) fn checked_total(a: i64, b: i64, label: &str) -> ResultEngine<i64> {
    a.checked_mul(b)
        .ok_or_else(|| EngineError::InvalidAmount(format!("{label} overflows")))
}

/// Sum of money values, failing instead of wrapping.
pub(crate) fn checked_sum<I>(values: I, label: &str) -> ResultEngine<i64>
where
    I: IntoIterator<Item = i64>,
{
    values.into_iter().try_fold(0i64, |acc, value| {
        acc.checked_add(value)
            .ok_or_else(|| EngineError::InvalidAmount(format!("{label} overflows")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_sum_rejects_overflow() {
        assert_eq!(checked_sum([1, 2, 3], "total").unwrap(), 6);
        assert_eq!(checked_sum(Vec::new(), "total").unwrap(), 0);
        let err = checked_sum([i64::MAX, 1], "total").unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    #[test]
    fn names_are_trimmed_and_composed() {
        // "e" + combining acute accent
        let decomposed = "  Cafe\u{0301} ";
        assert_eq!(
            normalize_required_name(decomposed, "instrument").unwrap(),
            "Caf\u{00e9}"
        );
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(normalize_required_name("   ", "account").is_err());
    }

    #[test]
    fn blank_optional_text_is_none() {
        assert_eq!(normalize_optional_text(Some("   ")), None);
        assert_eq!(normalize_optional_text(None), None);
        assert_eq!(
            normalize_optional_text(Some(" lunch ")),
            Some("lunch".to_string())
        );
    }

    #[test]
    fn totals_detect_overflow() {
        assert_eq!(checked_total(3, 100, "cost").unwrap(), 300);
        assert!(checked_total(i64::MAX, 2, "cost").is_err());
    }
}
