use std::collections::HashMap;

use serde_json::{json, Map, Value};

use super::types::{ValidationResult, ValidationSeverity};
use crate::dataset::Dataset;

/// Number of missingness patterns reported.
const TOP_PATTERNS: usize = 10;

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn classify(overall_pct: f64, worst_pct: f64) -> ValidationSeverity {
    if overall_pct <= 5.0 && worst_pct <= 10.0 {
        ValidationSeverity::Pass
    } else if overall_pct <= 15.0 && worst_pct <= 25.0 {
        ValidationSeverity::Warning
    } else {
        ValidationSeverity::Critical
    }
}

pub(crate) fn check(dataset: &Dataset) -> ValidationResult {
    let n_rows = dataset.n_rows();
    let columns = dataset.columns();

    let mut per_column = vec![0usize; columns.len()];
    // pattern -> (count, first row seen)
    let mut patterns: HashMap<Vec<usize>, (usize, usize)> = HashMap::new();
    for (row_idx, row) in dataset.rows().iter().enumerate() {
        let missing: Vec<usize> = row
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_missing())
            .map(|(i, _)| i)
            .collect();
        for &i in &missing {
            per_column[i] += 1;
        }
        patterns.entry(missing).or_insert((0, row_idx)).0 += 1;
    }

    let total_missing: usize = per_column.iter().sum();
    let overall = percent(total_missing, n_rows * columns.len());
    let (worst_column, worst_count) = per_column
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
        .map(|(i, c)| (columns.get(i).cloned(), *c))
        .unwrap_or((None, 0));
    let worst = percent(worst_count, n_rows);

    let mut ranked: Vec<(Vec<usize>, usize, usize)> = patterns
        .into_iter()
        .map(|(pattern, (count, first))| (pattern, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    let top_patterns: Vec<Value> = ranked
        .iter()
        .take(TOP_PATTERNS)
        .map(|(pattern, count, _)| {
            json!({
                "missing_columns": pattern.iter().map(|&i| columns[i].clone()).collect::<Vec<_>>(),
                "count": count,
                "percentage": round2(percent(*count, n_rows)),
            })
        })
        .collect();

    let by_variable: Map<String, Value> = columns
        .iter()
        .zip(&per_column)
        .map(|(name, &count)| (name.clone(), json!(round2(percent(count, n_rows)))))
        .collect();

    let severity = classify(overall, worst);
    let message = match severity {
        ValidationSeverity::Pass => format!("Missing data minimal: {:.1}% overall", overall),
        ValidationSeverity::Warning => format!(
            "Moderate missing data: {:.1}% overall, up to {:.1}% in a single variable",
            overall, worst
        ),
        ValidationSeverity::Critical => format!(
            "Substantial missing data: {:.1}% overall, up to {:.1}% in a single variable",
            overall, worst
        ),
    };

    let mut result = ValidationResult::new("missing_data", severity, message).with_details(json!({
        "overall_percentage": round2(overall),
        "worst_variable": worst_column,
        "worst_variable_percentage": round2(worst),
        "missing_cells": total_missing,
        "by_variable": by_variable,
        "patterns": top_patterns,
    }));

    match severity {
        ValidationSeverity::Pass => {}
        ValidationSeverity::Warning => {
            result = result.with_recommendation(
                "Consider multiple imputation or full information maximum likelihood for missing values",
            );
        }
        ValidationSeverity::Critical => {
            result = result
                .with_recommendation("Investigate whether values are missing completely at random before analysis")
                .with_recommendation(
                    "Consider multiple imputation or full information maximum likelihood for missing values",
                );
        }
    }
    result
}
