use serde_json::{json, Map, Value};

use super::types::{ValidationResult, ValidationSeverity};
use crate::dataset::Dataset;
use crate::stats::{mean, quantile_sorted, sorted, std_dev};

const Z_CUTOFF: f64 = 3.0;
const IQR_FENCE: f64 = 1.5;

/// Outliers in one variable by the |z| > 3 rule and by Tukey fences.
pub(crate) fn count_outliers(values: &[f64]) -> (usize, usize) {
    let z_count = match (mean(values), std_dev(values)) {
        (Some(m), Some(sd)) if sd > 0.0 => values
            .iter()
            .filter(|v| ((*v - m) / sd).abs() > Z_CUTOFF)
            .count(),
        _ => 0,
    };

    let s = sorted(values);
    let iqr_count = match (quantile_sorted(&s, 0.25), quantile_sorted(&s, 0.75)) {
        (Some(q1), Some(q3)) => {
            let iqr = q3 - q1;
            let (lo, hi) = (q1 - IQR_FENCE * iqr, q3 + IQR_FENCE * iqr);
            values.iter().filter(|v| **v < lo || **v > hi).count()
        }
        _ => 0,
    };

    (z_count, iqr_count)
}

pub(crate) fn check(dataset: &Dataset, variables: &[String]) -> ValidationResult {
    let mut total_outliers = 0usize;
    let mut total_values = 0usize;
    let mut by_variable = Map::new();

    for name in variables {
        let Some(values) = dataset.numeric_values(name) else {
            continue;
        };
        let (z_count, iqr_count) = count_outliers(&values);
        let kept = z_count.max(iqr_count);
        total_outliers += kept;
        total_values += values.len();
        by_variable.insert(
            name.clone(),
            json!({ "z_score": z_count, "iqr": iqr_count, "count": kept, "n": values.len() }),
        );
    }

    if total_values == 0 {
        return ValidationResult::new(
            "outliers",
            ValidationSeverity::Pass,
            "No numeric values to screen for outliers",
        );
    }

    let pct = total_outliers as f64 / total_values as f64 * 100.0;
    let severity = if pct <= 5.0 {
        ValidationSeverity::Pass
    } else if pct <= 10.0 {
        ValidationSeverity::Warning
    } else {
        ValidationSeverity::Critical
    };

    let message = format!(
        "{} potential outliers across {} values ({:.1}%)",
        total_outliers, total_values, pct
    );
    let mut result = ValidationResult::new("outliers", severity, message).with_details(json!({
        "outlier_count": total_outliers,
        "total_values": total_values,
        "percentage": (pct * 100.0).round() / 100.0,
        "by_variable": Value::Object(by_variable),
    }));

    if severity != ValidationSeverity::Pass {
        result = result
            .with_recommendation("Inspect flagged outliers for data entry errors")
            .with_recommendation("Report results with and without extreme cases, or use robust estimators");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_outliers_keeps_both_rules() {
        let mut values: Vec<f64> = (0..20).map(|i| (i % 5) as f64).collect();
        values.push(100.0);
        let (z, iqr) = count_outliers(&values);
        assert_eq!(z, 1);
        assert_eq!(iqr, 1);

        let constant = vec![2.0; 10];
        assert_eq!(count_outliers(&constant), (0, 0));
    }

    fn column(values: &[f64]) -> Dataset {
        let mut rows = vec![vec!["x".to_string()]];
        rows.extend(values.iter().map(|v| vec![v.to_string()]));
        Dataset::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_single_outlier_in_forty_passes() {
        let mut values: Vec<f64> = (0..39).map(|i| (i % 5) as f64).collect();
        values.push(100.0);
        let result = check(&column(&values), &["x".to_string()]);
        assert_eq!(result.details["outlier_count"], json!(1));
        assert_eq!(result.severity, ValidationSeverity::Pass);
        assert!(result.recommendations.is_empty());
    }

    #[test]
    fn test_larger_rule_count_is_kept() {
        // Three equal extremes inflate the standard deviation enough that no
        // value passes |z| > 3, while all three sit outside the Tukey fences.
        let mut values: Vec<f64> = (0..17).map(|i| (i % 3) as f64).collect();
        values.extend([50.0, 50.0, 50.0]);
        assert_eq!(count_outliers(&values), (0, 3));

        let result = check(&column(&values), &["x".to_string()]);
        assert_eq!(result.details["outlier_count"], json!(3));
        assert_eq!(result.details["by_variable"]["x"]["z_score"], json!(0));
        assert_eq!(result.details["by_variable"]["x"]["iqr"], json!(3));
        // 3 of 20 values
        assert_eq!(result.severity, ValidationSeverity::Critical);
    }

    #[test]
    fn test_severity_from_percentage() {
        let mut rows = vec![vec!["x".to_string()]];
        for i in 0..18 {
            rows.push(vec![(i % 3).to_string()]);
        }
        rows.push(vec!["50".to_string()]);
        rows.push(vec!["-50".to_string()]);
        let ds = Dataset::from_rows(&rows).unwrap();
        let result = check(&ds, &["x".to_string()]);
        // 2 of 20 values
        assert_eq!(result.severity, ValidationSeverity::Warning);
        assert_eq!(result.details["outlier_count"], json!(2));
    }
}
