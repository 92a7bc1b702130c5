//! Assumption checks that only apply to some analysis types.

use std::collections::{BTreeMap, HashSet};

use serde_json::{json, Map, Value};

use super::types::{ValidationContext, ValidationResult, ValidationSeverity};
use crate::dataset::{Cell, ColumnKind, Dataset, VariableRole, VariableRoleMap};
use crate::stats::hypothesis::SHAPIRO_MAX_N;
use crate::stats::matrix::correlation;
use crate::stats::{
    bartlett_sphericity, excess_kurtosis, kaiser_meyer_olkin, kolmogorov_smirnov_normal, levene,
    mardia, residual_variance_proxy, shapiro_wilk, skewness,
};

const ALPHA: f64 = 0.05;
/// Numeric predictors with at most this many levels are treated as groups.
const GROUPING_MAX_LEVELS: usize = 5;

/// Columns bound to one role, with construct names expanded to their items.
fn role_columns(roles: &VariableRoleMap, role: VariableRole, dataset: &Dataset) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in roles.get(role) {
        let expanded = roles
            .construct_items
            .get(name)
            .cloned()
            .unwrap_or_else(|| vec![name.clone()]);
        for column in expanded {
            if dataset.has_column(&column) && !out.contains(&column) {
                out.push(column);
            }
        }
    }
    out
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub(crate) fn normality(dataset: &Dataset, context: &ValidationContext) -> ValidationResult {
    let mut candidates: Vec<String> = role_columns(&context.roles, VariableRole::Dependent, dataset)
        .into_iter()
        .filter(|c| dataset.kind(c) == Some(ColumnKind::Numeric))
        .collect();
    if candidates.is_empty() {
        candidates = context.roles.resolve_numeric_columns(dataset);
    }

    let mut tests = Map::new();
    let mut skipped: Vec<String> = Vec::new();
    let mut failed: Vec<String> = Vec::new();
    for name in &candidates {
        let values = dataset.numeric_values(name).unwrap_or_default();
        let (method, outcome) = if values.len() <= SHAPIRO_MAX_N {
            ("shapiro_wilk", shapiro_wilk(&values))
        } else {
            ("kolmogorov_smirnov", kolmogorov_smirnov_normal(&values))
        };
        match outcome {
            Some(o) => {
                let normal = o.p_value > ALPHA;
                if !normal {
                    failed.push(name.clone());
                }
                tests.insert(
                    name.clone(),
                    json!({
                        "method": method,
                        "statistic": round4(o.statistic),
                        "p_value": round4(o.p_value),
                        "normal": normal,
                        "skewness": skewness(&values).map(round4),
                        "excess_kurtosis": excess_kurtosis(&values).map(round4),
                    }),
                );
            }
            None => skipped.push(name.clone()),
        }
    }

    let tested = tests.len();
    let details = json!({ "tests": Value::Object(tests), "failed": failed, "skipped": skipped });
    if tested == 0 {
        return ValidationResult::new(
            "normality",
            ValidationSeverity::Warning,
            "Normality could not be tested (too few or constant values)",
        )
        .with_details(details)
        .with_recommendation("Inspect variable distributions visually (histograms, Q-Q plots)");
    }

    let fail_ratio = failed.len() as f64 / tested as f64;
    let severity = if failed.is_empty() {
        ValidationSeverity::Pass
    } else if fail_ratio <= 0.3 {
        ValidationSeverity::Warning
    } else {
        ValidationSeverity::Critical
    };
    let message = if failed.is_empty() {
        format!("All {} tested variables are consistent with normality", tested)
    } else {
        format!(
            "{} of {} tested variables deviate from normality: {}",
            failed.len(),
            tested,
            failed.join(", ")
        )
    };

    let mut result = ValidationResult::new("normality", severity, message).with_details(details);
    if severity != ValidationSeverity::Pass {
        result = result
            .with_recommendation("Consider transforming non-normal variables or using robust standard errors")
            .with_recommendation("Use bootstrapped confidence intervals for non-normal outcomes");
    }
    result
}

/// Equal error variance across the sole predictor.
///
/// Returns `None` when the request does not have exactly one predictor or no
/// numeric outcome.
pub(crate) fn homoscedasticity(dataset: &Dataset, context: &ValidationContext) -> Option<ValidationResult> {
    let predictors = role_columns(&context.roles, VariableRole::Independent, dataset);
    let [predictor] = predictors.as_slice() else {
        return None;
    };
    let outcome = role_columns(&context.roles, VariableRole::Dependent, dataset)
        .into_iter()
        .find(|c| dataset.kind(c) == Some(ColumnKind::Numeric))?;

    let grouping = match dataset.kind(predictor) {
        Some(ColumnKind::Categorical) => true,
        Some(ColumnKind::Numeric) => dataset.distinct_count(predictor) <= GROUPING_MAX_LEVELS,
        _ => return None,
    };

    let (method, result) = if grouping {
        let p_idx = dataset.column_index(predictor)?;
        let o_idx = dataset.column_index(&outcome)?;
        let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for row in dataset.rows() {
            if let (Some(label), Some(y)) = (row[p_idx].label(), row[o_idx].as_f64()) {
                groups.entry(label).or_default().push(y);
            }
        }
        let groups: Vec<Vec<f64>> = groups.into_values().collect();
        ("levene", levene(&groups))
    } else {
        (
            "residual_correlation",
            residual_variance_proxy(&dataset.paired_values(predictor, &outcome)),
        )
    };

    let details = json!({ "method": method, "predictor": predictor, "outcome": outcome });
    let Some(test) = result else {
        return Some(
            ValidationResult::new(
                "homoscedasticity",
                ValidationSeverity::Warning,
                "Homoscedasticity could not be evaluated (too few observations per group)",
            )
            .with_details(details)
            .with_recommendation("Inspect residual plots for unequal variance"),
        );
    };

    let severity = ValidationSeverity::from_p_value(test.p_value);
    let message = match severity {
        ValidationSeverity::Pass => format!("Error variance appears homogeneous (p = {:.3})", test.p_value),
        _ => format!("Evidence of unequal error variance (p = {:.3})", test.p_value),
    };
    let mut result = ValidationResult::new("homoscedasticity", severity, message)
        .with_details(details)
        .with_test(round4(test.statistic), Some(round4(test.p_value)));
    if severity != ValidationSeverity::Pass {
        result = result.with_recommendation("Use heteroscedasticity-consistent (robust) standard errors");
        if grouping {
            result = result.with_recommendation("Consider Welch's correction for unequal group variances");
        }
    }
    Some(result)
}

fn row_key(row: &[Cell]) -> String {
    row.iter()
        .map(|c| c.label().unwrap_or_else(|| "\u{0}".to_string()))
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

pub(crate) fn independence(dataset: &Dataset) -> ValidationResult {
    let n = dataset.n_rows();
    let mut seen: HashSet<String> = HashSet::with_capacity(n);
    let duplicates = dataset
        .rows()
        .iter()
        .filter(|row| !seen.insert(row_key(row)))
        .count();
    let pct = if n == 0 { 0.0 } else { duplicates as f64 / n as f64 * 100.0 };

    let severity = if duplicates == 0 {
        ValidationSeverity::Pass
    } else if pct <= 5.0 {
        ValidationSeverity::Warning
    } else {
        ValidationSeverity::Critical
    };
    let message = if duplicates == 0 {
        "No duplicate observations found".to_string()
    } else {
        format!("{} duplicate rows ({:.1}% of observations)", duplicates, pct)
    };

    let mut result = ValidationResult::new("independence", severity, message).with_details(json!({
        "duplicate_rows": duplicates,
        "percentage": (pct * 100.0).round() / 100.0,
    }));
    if severity != ValidationSeverity::Pass {
        result = result.with_recommendation("Check for duplicate submissions and remove repeated responses");
    }
    result
}

/// Variable floor, sampling adequacy and sphericity for factor analysis.
pub(crate) fn factorability(dataset: &Dataset, variables: &[String]) -> Vec<ValidationResult> {
    let p = variables.len();
    if p < 3 {
        return vec![ValidationResult::new(
            "variable_count",
            ValidationSeverity::Critical,
            format!("Factor analysis needs at least 3 variables, found {}", p),
        )
        .with_details(json!({ "variables": p, "minimum": 3 }))
        .with_recommendation("Include at least three indicator items per factor")];
    }

    let mut results = vec![ValidationResult::new(
        "variable_count",
        ValidationSeverity::Pass,
        format!("{} variables available for factor analysis", p),
    )
    .with_details(json!({ "variables": p, "minimum": 3 }))];

    let cases = dataset.complete_cases(variables);
    let n = cases.len();
    let Some(corr) = correlation(&cases) else {
        let message = "Correlation matrix could not be computed (constant variable or too few complete cases)";
        for name in ["sampling_adequacy", "sphericity"] {
            results.push(
                ValidationResult::new(name, ValidationSeverity::Critical, message)
                    .with_details(json!({ "complete_cases": n }))
                    .with_recommendation("Remove constant items and check for complete cases"),
            );
        }
        return results;
    };

    results.push(match kaiser_meyer_olkin(&corr) {
        Some(kmo) => {
            let severity = if kmo >= 0.6 {
                ValidationSeverity::Pass
            } else if kmo >= 0.5 {
                ValidationSeverity::Warning
            } else {
                ValidationSeverity::Critical
            };
            let mut r = ValidationResult::new(
                "sampling_adequacy",
                severity,
                format!("Kaiser-Meyer-Olkin measure = {:.3}", kmo),
            )
            .with_details(json!({ "kmo": round4(kmo), "complete_cases": n }))
            .with_test(round4(kmo), None);
            if severity != ValidationSeverity::Pass {
                r = r.with_recommendation("Remove items with low sampling adequacy before factoring");
            }
            r
        }
        None => ValidationResult::new(
            "sampling_adequacy",
            ValidationSeverity::Critical,
            "Correlation matrix is singular; sampling adequacy undefined",
        )
        .with_details(json!({ "complete_cases": n }))
        .with_recommendation("Remove redundant or perfectly collinear items"),
    });

    results.push(match bartlett_sphericity(&corr, n) {
        Some(test) => {
            let severity = if test.p_value < ALPHA {
                ValidationSeverity::Pass
            } else {
                ValidationSeverity::Critical
            };
            let mut r = ValidationResult::new(
                "sphericity",
                severity,
                format!(
                    "Bartlett's test of sphericity: chi2 = {:.2}, p = {:.4}",
                    test.statistic, test.p_value
                ),
            )
            .with_details(json!({ "df": p * (p - 1) / 2, "complete_cases": n }))
            .with_test(round4(test.statistic), Some(round4(test.p_value)));
            if severity != ValidationSeverity::Pass {
                r = r.with_recommendation("Items are not sufficiently correlated for factor analysis");
            }
            r
        }
        None => ValidationResult::new(
            "sphericity",
            ValidationSeverity::Critical,
            "Correlation matrix is singular; sphericity test undefined",
        )
        .with_details(json!({ "complete_cases": n }))
        .with_recommendation("Remove redundant or perfectly collinear items"),
    });

    results
}

/// Mardia's multivariate normality over the analysis variables.
pub(crate) fn multivariate_normality(dataset: &Dataset, variables: &[String]) -> ValidationResult {
    let cases = dataset.complete_cases(variables);

    match mardia(&cases) {
        Some(m) => {
            let failures = [m.skewness_p, m.kurtosis_p]
                .iter()
                .filter(|p| **p <= ALPHA)
                .count();
            let severity = match failures {
                0 => ValidationSeverity::Pass,
                1 => ValidationSeverity::Warning,
                _ => ValidationSeverity::Critical,
            };
            let mut r = ValidationResult::new(
                "multivariate_normality",
                severity,
                format!(
                    "Mardia skewness p = {:.4}, kurtosis p = {:.4}",
                    m.skewness_p, m.kurtosis_p
                ),
            )
            .with_details(json!({
                "skewness": round4(m.skewness),
                "skewness_statistic": round4(m.skewness_statistic),
                "skewness_p": round4(m.skewness_p),
                "kurtosis": round4(m.kurtosis),
                "kurtosis_statistic": round4(m.kurtosis_statistic),
                "kurtosis_p": round4(m.kurtosis_p),
                "complete_cases": cases.len(),
            }));
            if severity != ValidationSeverity::Pass {
                r = r.with_recommendation("Use a robust estimator (MLR) or bootstrap standard errors");
            }
            r
        }
        None => ValidationResult::new(
            "multivariate_normality",
            ValidationSeverity::Warning,
            "Multivariate normality could not be assessed (too few complete cases or singular covariance)",
        )
        .with_details(json!({ "complete_cases": cases.len(), "variables": variables.len() }))
        .with_recommendation("Use a robust estimator (MLR) or bootstrap standard errors"),
    }
}
