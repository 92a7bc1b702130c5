//! Bounded, de-duplicated recommendation lists.
//!
//! Sources are merged in a fixed order: validation recommendations first,
//! then triggers on the raw numeric output, then standing reminders.

use serde_json::Value;

use crate::analysis::AnalysisType;
use crate::engine::AnalysisExecutionResult;
use crate::interpretation::fields::{as_number, nested_number, number, number_any};
use crate::validation::ComprehensiveValidationResult;

/// Upper bound on a generated list.
pub const MAX_RECOMMENDATIONS: usize = 15;

/// Reminders appended to every list.
pub const BEST_PRACTICES: [&str; 3] = [
    "Report effect sizes alongside significance tests",
    "Replicate the findings in an independent sample",
    "Document how each statistical assumption was checked",
];

/// VIF above this flags multicollinearity.
const VIF_LIMIT: f64 = 5.0;

/// Merges validation advice, result triggers and standing reminders.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationGenerator;

impl RecommendationGenerator {
    /// Create a new recommendation generator
    pub fn new() -> Self {
        Self
    }

    /// Ordered, de-duplicated list of at most [`MAX_RECOMMENDATIONS`] entries.
    pub fn generate(
        &self,
        analysis_type: AnalysisType,
        execution: &AnalysisExecutionResult,
        validation: &ComprehensiveValidationResult,
    ) -> Vec<String> {
        let candidates = validation
            .recommendations
            .iter()
            .cloned()
            .chain(result_triggers(analysis_type, &execution.results))
            .chain(BEST_PRACTICES.iter().map(|s| s.to_string()));

        let mut out: Vec<String> = Vec::with_capacity(MAX_RECOMMENDATIONS);
        for rec in candidates {
            if out.len() == MAX_RECOMMENDATIONS {
                break;
            }
            if !out.contains(&rec) {
                out.push(rec);
            }
        }
        out
    }
}

fn fit(results: &Value, key: &str) -> Option<f64> {
    nested_number(results, "fit_indices", key).or_else(|| number(results, key))
}

fn result_triggers(analysis_type: AnalysisType, results: &Value) -> Vec<String> {
    let mut out = Vec::new();
    match analysis_type {
        AnalysisType::Reliability => {
            if let Some(alpha) = number_any(results, &["cronbach_alpha", "alpha"]) {
                if alpha < 0.7 {
                    out.push(format!(
                        "Cronbach's alpha of {:.2} is below .70; revise or remove weak items",
                        alpha
                    ));
                } else if alpha > 0.95 {
                    out.push(format!(
                        "Cronbach's alpha of {:.2} exceeds .95; check for redundant items",
                        alpha
                    ));
                }
            }
        }
        AnalysisType::Cfa | AnalysisType::Sem => {
            if let Some(cfi) = fit(results, "cfi") {
                if cfi < 0.95 {
                    out.push(format!(
                        "CFI of {:.3} is below .95; inspect modification indices for misspecification",
                        cfi
                    ));
                }
            }
            if let Some(rmsea) = fit(results, "rmsea") {
                if rmsea > 0.08 {
                    out.push(format!(
                        "RMSEA of {:.3} exceeds .08; the model may need respecification",
                        rmsea
                    ));
                }
            }
        }
        AnalysisType::Regression => {
            if let Some(r2) = number_any(results, &["r_squared", "r2"]) {
                if r2 < 0.1 {
                    out.push(format!(
                        "R² of {:.3} is low; consider additional predictors",
                        r2
                    ));
                }
            }
            if let Some(Value::Object(vif)) = results.get("vif") {
                for (variable, value) in vif {
                    if as_number(value).is_some_and(|v| v > VIF_LIMIT) {
                        out.push(format!(
                            "{} has VIF above {}; address multicollinearity",
                            variable, VIF_LIMIT
                        ));
                    }
                }
            }
        }
        _ => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{ValidationResult, ValidationSeverity};
    use serde_json::json;

    fn validation_with(recs: &[&str]) -> ComprehensiveValidationResult {
        let results = recs
            .iter()
            .enumerate()
            .map(|(i, r)| {
                ValidationResult::new(format!("check_{:02}", i), ValidationSeverity::Warning, "w")
                    .with_recommendation(*r)
            })
            .collect();
        ComprehensiveValidationResult::from_results(results)
    }

    #[test]
    fn test_order_validation_then_triggers_then_reminders() {
        let generator = RecommendationGenerator::new();
        let execution = AnalysisExecutionResult::new(json!({ "cronbach_alpha": 0.62 }));
        let recs = generator.generate(AnalysisType::Reliability, &execution, &validation_with(&["collect more data"]));
        assert_eq!(recs[0], "collect more data");
        assert!(recs[1].starts_with("Cronbach's alpha of 0.62"));
        assert_eq!(&recs[2..], &BEST_PRACTICES.map(String::from)[..]);
    }

    #[test]
    fn test_fit_and_vif_triggers() {
        let triggers = result_triggers(
            AnalysisType::Sem,
            &json!({ "fit_indices": { "cfi": 0.91, "rmsea": 0.09 } }),
        );
        assert_eq!(triggers.len(), 2);

        let triggers = result_triggers(
            AnalysisType::Regression,
            &json!({ "r_squared": 0.05, "vif": { "price": 6.2, "quality": 1.4 } }),
        );
        assert_eq!(triggers.len(), 2);
        assert!(triggers[1].starts_with("price has VIF above 5"));
    }

    #[test]
    fn test_numeric_strings_trigger_like_numbers() {
        let triggers = result_triggers(
            AnalysisType::Regression,
            &json!({ "r_squared": "0.42", "vif": { "price": "6.2", "quality": "1.4", "brand": "n/a" } }),
        );
        assert_eq!(triggers, vec!["price has VIF above 5; address multicollinearity".to_string()]);

        let triggers = result_triggers(AnalysisType::Cfa, &json!({ "cfi": "0.88" }));
        assert_eq!(triggers.len(), 1);
        assert!(triggers[0].starts_with("CFI of 0.880"));
    }

    #[test]
    fn test_bounded_and_unique() {
        let many: Vec<String> = (0..10).map(|i| format!("rec {}", i)).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let validation = validation_with(&refs);
        let execution = AnalysisExecutionResult::new(json!({
            "r_squared": 0.02,
            "vif": { "a": 9.0, "b": 8.0, "c": 7.0, "d": 6.0 }
        }));
        let recs = RecommendationGenerator::new().generate(AnalysisType::Regression, &execution, &validation);
        assert_eq!(recs.len(), MAX_RECOMMENDATIONS);
        let mut unique = recs.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), recs.len());
    }
}
