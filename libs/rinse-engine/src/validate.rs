use rinse_api::value::Scalar;

use crate::metrics::{Counter, Metrics};

/// Normalize one primitive.
///
/// - Text: control characters removed, surrounding whitespace trimmed.
/// - Float: NaN / ±Infinity → `Null`.
/// - Null, Bool, Int and finite Float unchanged.
/// - Decimal (not a plain primitive): unchanged, with a warning.
///
/// Idempotent: `validate(validate(x)) == validate(x)`.
pub fn validate(value: Scalar) -> Scalar {
    match value {
        Scalar::Text(s) => Scalar::Text(clean_text(&s)),
        Scalar::Float(f) if !f.is_finite() => Scalar::Null,
        Scalar::Decimal(d) => {
            tracing::warn!(kind = "decimal", "passing non-primitive value through validation unchanged");
            Scalar::Decimal(d)
        }
        other => other,
    }
}

/// [`validate`], counting pass-through values.
pub fn validate_counted(value: Scalar, metrics: &Metrics) -> Scalar {
    if matches!(value, Scalar::Decimal(_)) {
        metrics.incr(Counter::ValidationPassthroughs);
    }
    validate(value)
}

/// Strip control characters, then trim.
pub fn clean_text(s: &str) -> String {
    if !s.chars().any(char::is_control) {
        return s.trim().to_string();
    }
    let stripped: String = s.chars().filter(|c| !c.is_control()).collect();
    stripped.trim().to_string()
}
