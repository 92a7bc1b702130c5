use serde_json::json;

use super::types::{ValidationContext, ValidationResult, ValidationSeverity};
use crate::analysis::AnalysisType;
use crate::dataset::Dataset;

/// Free parameters of a measurement model: loadings and error variances per
/// item plus the construct covariances. A caller-supplied count wins.
pub(crate) fn parameter_count(dataset: &Dataset, context: &ValidationContext) -> usize {
    if let Some(count) = context.parameter_count {
        return count;
    }
    let items = context.roles.resolve_numeric_columns(dataset).len();
    let constructs = context.roles.construct_items.len().max(1);
    2 * items + constructs * (constructs - 1) / 2
}

/// Minimum row count for a type, after the variable/parameter adjustments.
pub(crate) fn required_sample(
    dataset: &Dataset,
    analysis_type: AnalysisType,
    context: &ValidationContext,
) -> usize {
    let base = analysis_type.profile().min_sample;
    match analysis_type {
        AnalysisType::Efa => base.max(5 * context.roles.resolve_numeric_columns(dataset).len()),
        AnalysisType::Cfa | AnalysisType::Sem => base.max(10 * parameter_count(dataset, context)),
        _ => base,
    }
}

pub(crate) fn check(
    dataset: &Dataset,
    analysis_type: AnalysisType,
    context: &ValidationContext,
) -> ValidationResult {
    let n = dataset.n_rows();
    let minimum = required_sample(dataset, analysis_type, context);
    let recommended = minimum as f64 * 1.5;

    let severity = if n as f64 >= recommended {
        ValidationSeverity::Pass
    } else if n >= minimum {
        ValidationSeverity::Warning
    } else {
        ValidationSeverity::Critical
    };

    let label = analysis_type.profile().label;
    let message = match severity {
        ValidationSeverity::Pass => format!("Sample size adequate for {}: n = {}", label, n),
        ValidationSeverity::Warning => format!(
            "Sample size meets the minimum for {} (n = {}, minimum {}) but is below the recommended {:.0}",
            label, n, minimum, recommended
        ),
        ValidationSeverity::Critical => format!(
            "Sample size too small for {}: n = {}, minimum required {}",
            label, n, minimum
        ),
    };

    let mut details = json!({
        "n": n,
        "minimum_required": minimum,
        "recommended": recommended,
        "analysis_type": analysis_type,
    });
    if matches!(analysis_type, AnalysisType::Cfa | AnalysisType::Sem) {
        let params = parameter_count(dataset, context).max(1);
        let ratio = n as f64 / params as f64;
        details["parameters"] = json!(params);
        details["observations_per_parameter"] = json!((ratio * 100.0).round() / 100.0);
    }
    let mut result = ValidationResult::new("sample_size", severity, message).with_details(details);

    match severity {
        ValidationSeverity::Pass => {}
        ValidationSeverity::Warning => {
            result = result.with_recommendation(format!(
                "Consider collecting more data; at least {:.0} observations are recommended for {}",
                recommended, label
            ));
        }
        ValidationSeverity::Critical => {
            result = result
                .with_recommendation(format!(
                    "Collect at least {} observations before relying on {} results",
                    minimum, label
                ))
                .with_recommendation("Treat any estimates from this sample as exploratory");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{VariableRole, VariableRoleMap};

    fn numeric_dataset(n: usize, p: usize) -> Dataset {
        let mut rows = vec![(0..p).map(|j| format!("v{}", j)).collect::<Vec<_>>()];
        for i in 0..n {
            rows.push((0..p).map(|j| ((i * (j + 3)) % 17).to_string()).collect());
        }
        Dataset::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_efa_minimum_scales_with_variables() {
        let ds = numeric_dataset(10, 30);
        let ctx = ValidationContext::default();
        assert_eq!(required_sample(&ds, AnalysisType::Efa, &ctx), 150);
        let ds = numeric_dataset(10, 5);
        assert_eq!(required_sample(&ds, AnalysisType::Efa, &ctx), 100);
    }

    #[test]
    fn test_cfa_minimum_uses_parameter_count() {
        let ds = numeric_dataset(10, 12);
        let roles = VariableRoleMap::new()
            .with_construct("a", ["v0", "v1", "v2", "v3", "v4", "v5"])
            .with_construct("b", ["v6", "v7", "v8", "v9", "v10", "v11"]);
        let ctx = ValidationContext::new(roles);
        // 2 * 12 items + 1 covariance
        assert_eq!(parameter_count(&ds, &ctx), 25);
        assert_eq!(required_sample(&ds, AnalysisType::Cfa, &ctx), 250);
        let ctx = ctx.with_parameter_count(8);
        assert_eq!(required_sample(&ds, AnalysisType::Cfa, &ctx), 200);
    }

    #[test]
    fn test_sem_reports_observations_per_parameter() {
        let ds = numeric_dataset(250, 4);
        let ctx = ValidationContext::default().with_parameter_count(20);
        let result = check(&ds, AnalysisType::Sem, &ctx);
        assert_eq!(result.details["parameters"], json!(20));
        assert_eq!(result.details["observations_per_parameter"], json!(12.5));

        let result = check(&ds, AnalysisType::Regression, &ctx);
        assert!(result.details.get("observations_per_parameter").is_none());
    }

    #[test]
    fn test_regression_bands() {
        let ctx = ValidationContext::new(
            VariableRoleMap::new()
                .with_role(VariableRole::Dependent, ["v0"])
                .with_role(VariableRole::Independent, ["v1"]),
        );
        let sev = |n| check(&numeric_dataset(n, 2), AnalysisType::Regression, &ctx).severity;
        assert_eq!(sev(49), ValidationSeverity::Critical);
        assert_eq!(sev(50), ValidationSeverity::Warning);
        assert_eq!(sev(74), ValidationSeverity::Warning);
        assert_eq!(sev(75), ValidationSeverity::Pass);
    }
}
