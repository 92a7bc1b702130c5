use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataset::VariableRoleMap;

/// Maximum number of merged recommendations on a comprehensive result.
pub const MAX_VALIDATION_RECOMMENDATIONS: usize = 10;

/// How well a prerequisite is met. Ordered `Pass < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationSeverity {
    Pass,
    Warning,
    Critical,
}

impl ValidationSeverity {
    /// Get the severity as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationSeverity::Pass => "PASS",
            ValidationSeverity::Warning => "WARNING",
            ValidationSeverity::Critical => "CRITICAL",
        }
    }

    /// Map a p-value onto the `> 0.05` / `> 0.01` / else bands.
    pub fn from_p_value(p: f64) -> Self {
        if p > 0.05 {
            ValidationSeverity::Pass
        } else if p > 0.01 {
            ValidationSeverity::Warning
        } else {
            ValidationSeverity::Critical
        }
    }
}

impl std::fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one named check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Check name, e.g. `sample_size`.
    pub test_name: String,
    /// How well the prerequisite is met.
    pub severity: ValidationSeverity,
    /// One-line human summary.
    pub message: String,
    /// Check-specific structured numbers.
    #[serde(default)]
    pub details: Value,
    /// Remedies, empty on PASS for most checks.
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Test statistic, when the check runs a formal test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistic: Option<f64>,
    /// p-value of that test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
}

impl ValidationResult {
    /// Create a result with empty details
    pub fn new(test_name: impl Into<String>, severity: ValidationSeverity, message: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            severity,
            message: message.into(),
            details: Value::Object(Default::default()),
            recommendations: Vec::new(),
            statistic: None,
            p_value: None,
        }
    }

    /// Attach structured details
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Append a recommendation
    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    /// Attach the test statistic and p-value
    pub fn with_test(mut self, statistic: f64, p_value: Option<f64>) -> Self {
        self.statistic = Some(statistic);
        self.p_value = p_value;
        self
    }
}

/// Aggregate of every check run for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveValidationResult {
    /// Worst severity over `results`; PASS when empty.
    pub overall_severity: ValidationSeverity,
    /// Check name → outcome.
    pub results: BTreeMap<String, ValidationResult>,
    /// Pass/warning/critical counts in prose.
    pub summary: String,
    /// Merged remedies, first-seen order, at most ten.
    pub recommendations: Vec<String>,
}

impl ComprehensiveValidationResult {
    /// Aggregate results given in run order.
    ///
    /// Overall severity is the worst individual severity (`Pass` when empty);
    /// recommendations keep first-seen order across the run, without
    /// duplicates, up to [`MAX_VALIDATION_RECOMMENDATIONS`].
    pub fn from_results(results: Vec<ValidationResult>) -> Self {
        let overall_severity = results
            .iter()
            .map(|r| r.severity)
            .max()
            .unwrap_or(ValidationSeverity::Pass);

        let count = |s: ValidationSeverity| results.iter().filter(|r| r.severity == s).count();
        let summary = format!(
            "Validation completed: {} passed, {} warnings, {} critical issues.",
            count(ValidationSeverity::Pass),
            count(ValidationSeverity::Warning),
            count(ValidationSeverity::Critical),
        );

        let mut recommendations: Vec<String> = Vec::new();
        for rec in results.iter().flat_map(|r| r.recommendations.iter()) {
            if recommendations.len() >= MAX_VALIDATION_RECOMMENDATIONS {
                break;
            }
            if !recommendations.contains(rec) {
                recommendations.push(rec.clone());
            }
        }

        let results = results
            .into_iter()
            .map(|r| (r.test_name.clone(), r))
            .collect();

        Self {
            overall_severity,
            results,
            summary,
            recommendations,
        }
    }

    /// Look up a check by name.
    pub fn get(&self, test_name: &str) -> Option<&ValidationResult> {
        self.results.get(test_name)
    }

    /// Severity of a check, if it ran.
    pub fn severity_of(&self, test_name: &str) -> Option<ValidationSeverity> {
        self.get(test_name).map(|r| r.severity)
    }

    /// Checks that did not pass, in name order.
    pub fn flagged(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results
            .values()
            .filter(|r| r.severity != ValidationSeverity::Pass)
    }
}

/// Request-specific inputs to validation beyond the dataset and type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationContext {
    /// Role assignment; empty means every numeric column is analysed.
    pub roles: VariableRoleMap,
    /// Free model parameters for CFA/SEM, when the caller knows them.
    pub parameter_count: Option<usize>,
}

impl ValidationContext {
    pub fn new(roles: VariableRoleMap) -> Self {
        Self {
            roles,
            parameter_count: None,
        }
    }

    pub fn with_parameter_count(mut self, count: usize) -> Self {
        self.parameter_count = Some(count);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_severity_ordering() {
        assert!(ValidationSeverity::Pass < ValidationSeverity::Warning);
        assert!(ValidationSeverity::Warning < ValidationSeverity::Critical);
        assert_eq!(
            serde_json::to_string(&ValidationSeverity::Critical).unwrap(),
            "\"CRITICAL\""
        );
    }

    #[test]
    fn test_empty_results_pass() {
        let result = ComprehensiveValidationResult::from_results(Vec::new());
        assert_eq!(result.overall_severity, ValidationSeverity::Pass);
        assert_eq!(
            result.summary,
            "Validation completed: 0 passed, 0 warnings, 0 critical issues."
        );
    }

    #[test]
    fn test_overall_is_worst_and_recommendations_dedupe() {
        let results = vec![
            ValidationResult::new("a", ValidationSeverity::Warning, "a")
                .with_recommendation("collect more data")
                .with_recommendation("check coding"),
            ValidationResult::new("b", ValidationSeverity::Critical, "b")
                .with_recommendation("check coding"),
            ValidationResult::new("c", ValidationSeverity::Pass, "c"),
        ];
        let result = ComprehensiveValidationResult::from_results(results);
        assert_eq!(result.overall_severity, ValidationSeverity::Critical);
        assert_eq!(result.recommendations, vec!["collect more data", "check coding"]);
        assert_eq!(
            result.summary,
            "Validation completed: 1 passed, 1 warnings, 1 critical issues."
        );
        assert_eq!(result.flagged().count(), 2);
    }

    #[test]
    fn test_recommendations_capped() {
        let results = (0..15)
            .map(|i| {
                ValidationResult::new(format!("check_{i:02}"), ValidationSeverity::Warning, "w")
                    .with_recommendation(format!("rec {i}"))
            })
            .collect();
        let result = ComprehensiveValidationResult::from_results(results);
        assert_eq!(result.recommendations.len(), MAX_VALIDATION_RECOMMENDATIONS);
        assert_eq!(result.recommendations[0], "rec 0");
    }

    #[test]
    fn test_p_value_bands() {
        assert_eq!(ValidationSeverity::from_p_value(0.2), ValidationSeverity::Pass);
        assert_eq!(ValidationSeverity::from_p_value(0.03), ValidationSeverity::Warning);
        assert_eq!(ValidationSeverity::from_p_value(0.01), ValidationSeverity::Critical);
    }
}
