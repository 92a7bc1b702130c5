//! Lenient readers for compute engine output.
//!
//! Engines differ in how they spell fields and whether numbers arrive as
//! JSON numbers or strings; these helpers accept either and try aliases in
//! order.

use serde_json::Value;

/// Numeric value at `key`, accepting numbers and numeric strings.
pub fn number(value: &Value, key: &str) -> Option<f64> {
    as_number(value.get(key)?)
}

/// First alias that yields a number.
pub fn number_any(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| number(value, k))
}

/// Number inside a nested object, e.g. `fit_indices.cfi`.
pub fn nested_number(value: &Value, parent: &str, key: &str) -> Option<f64> {
    number(value.get(parent)?, key)
}

pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// String value at `key`.
pub fn text<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key)?.as_str()
}

/// Child value (object or array) at the first present alias.
pub fn child<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| value.get(*k)).filter(|v| !v.is_null())
}

/// Estimate and p-value of a coefficient-like entry.
///
/// Accepts either an object (`{"estimate": .., "p_value": ..}`) or a bare number.
pub fn estimate_and_p(value: &Value) -> (Option<f64>, Option<f64>) {
    if let Some(n) = as_number(value) {
        return (Some(n), None);
    }
    (
        number_any(value, &["estimate", "coefficient", "b", "beta", "value"]),
        number_any(value, &["p_value", "pvalue", "p"]),
    )
}

/// Fraction or percentage normalised to a percentage.
pub fn as_percentage(value: f64) -> f64 {
    if value.abs() <= 1.0 {
        value * 100.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_accepts_strings() {
        let v = json!({ "a": 0.5, "b": "0.25", "c": "n/a", "d": null });
        assert_eq!(number(&v, "a"), Some(0.5));
        assert_eq!(number(&v, "b"), Some(0.25));
        assert_eq!(number(&v, "c"), None);
        assert_eq!(number(&v, "d"), None);
        assert_eq!(number_any(&v, &["x", "b", "a"]), Some(0.25));
    }

    #[test]
    fn test_estimate_and_p_shapes() {
        assert_eq!(estimate_and_p(&json!(0.3)), (Some(0.3), None));
        assert_eq!(
            estimate_and_p(&json!({ "coefficient": 0.3, "p": 0.01 })),
            (Some(0.3), Some(0.01))
        );
    }

    #[test]
    fn test_percentage_normalisation() {
        assert!((as_percentage(0.643) - 64.3).abs() < 1e-9);
        assert_eq!(as_percentage(64.3), 64.3);
    }
}
