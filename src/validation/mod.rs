//! Prerequisite checks run before a dataset is sent to the compute engine.
//!
//! [`ValidationEngine::validate`] is synchronous, performs no I/O and never
//! fails: every problem it finds is reported as a graded
//! [`ValidationResult`], never as an error. The same inputs always yield the
//! same [`ComprehensiveValidationResult`].
//!
//! Checks run for every analysis type:
//! - `sample_size`
//! - `missing_data`
//! - `outliers`
//!
//! Checks gated on the analysis type:
//! - `normality`, `homoscedasticity`, `independence`
//! - `variable_count`, `sampling_adequacy`, `sphericity` (EFA/CFA)
//! - `multivariate_normality` (SEM; the SEM sample-size rule lives in
//!   `sample_size`)

mod assumptions;
mod missing;
mod outliers;
mod sample_size;
mod types;

pub use types::{
    ComprehensiveValidationResult, ValidationContext, ValidationResult, ValidationSeverity,
    MAX_VALIDATION_RECOMMENDATIONS,
};

use tracing::{debug, warn};

use crate::analysis::AnalysisType;
use crate::dataset::Dataset;

/// Runs the prerequisite battery for a dataset and analysis type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationEngine;

impl ValidationEngine {
    /// Create a new validation engine
    pub fn new() -> Self {
        Self
    }

    /// Run every applicable check and aggregate the outcomes.
    pub fn validate(
        &self,
        dataset: &Dataset,
        analysis_type: AnalysisType,
        context: &ValidationContext,
    ) -> ComprehensiveValidationResult {
        let profile = analysis_type.profile();
        let variables = context.roles.resolve_numeric_columns(dataset);

        let mut results = vec![
            sample_size::check(dataset, analysis_type, context),
            missing::check(dataset),
            outliers::check(dataset, &dataset.numeric_columns()),
        ];

        if profile.checks_normality {
            results.push(assumptions::normality(dataset, context));
        }
        if profile.checks_homoscedasticity {
            results.extend(assumptions::homoscedasticity(dataset, context));
        }
        if profile.checks_independence {
            results.push(assumptions::independence(dataset));
        }
        if profile.checks_factorability {
            results.extend(assumptions::factorability(dataset, &variables));
        }
        if profile.checks_sem {
            results.push(assumptions::multivariate_normality(dataset, &variables));
        }

        for r in &results {
            debug!(test = %r.test_name, severity = %r.severity, "{}", r.message);
        }

        let combined = ComprehensiveValidationResult::from_results(results);
        if combined.overall_severity == ValidationSeverity::Critical {
            warn!(
                analysis_type = %analysis_type,
                critical = combined.flagged().filter(|r| r.severity == ValidationSeverity::Critical).count(),
                "Validation found critical issues"
            );
        }
        combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{VariableRole, VariableRoleMap};

    fn survey(n: usize) -> Dataset {
        let mut rows = vec![vec!["satisfaction".to_string(), "price".to_string(), "quality".to_string()]];
        for i in 0..n {
            let price = (i % 9) as f64;
            let quality = ((i * 7) % 11) as f64;
            let satisfaction = 0.4 * price + 0.3 * quality + ((i * 13) % 5) as f64;
            rows.push(vec![satisfaction.to_string(), price.to_string(), quality.to_string()]);
        }
        Dataset::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_descriptive_runs_only_core_checks() {
        let result = ValidationEngine::new().validate(&survey(60), AnalysisType::Descriptive, &ValidationContext::default());
        let names: Vec<&str> = result.results.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["missing_data", "outliers", "sample_size"]);
    }

    #[test]
    fn test_regression_adds_assumption_checks() {
        let roles = VariableRoleMap::new()
            .with_role(VariableRole::Dependent, ["satisfaction"])
            .with_role(VariableRole::Independent, ["price"]);
        let result = ValidationEngine::new().validate(&survey(60), AnalysisType::Regression, &ValidationContext::new(roles));
        for name in ["normality", "homoscedasticity", "independence"] {
            assert!(result.get(name).is_some(), "missing {}", name);
        }
        assert!(result.get("sampling_adequacy").is_none());
    }

    #[test]
    fn test_overall_is_worst_of_individual_results() {
        let result = ValidationEngine::new().validate(&survey(20), AnalysisType::Efa, &ValidationContext::default());
        let worst = result.results.values().map(|r| r.severity).max().unwrap();
        assert_eq!(result.overall_severity, worst);
        assert_eq!(result.severity_of("sample_size"), Some(ValidationSeverity::Critical));
    }
}
