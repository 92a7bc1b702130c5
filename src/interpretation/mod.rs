//! Human-readable interpretation of compute engine output.
//!
//! [`InterpretationEngine::interpret`] reads the raw results for one analysis
//! type, classifies the numbers against fixed bands (reliability, sampling
//! adequacy, model fit, significance, effect size) and writes five
//! independent texts. Output is deterministic for identical inputs.

pub mod bands;
pub(crate) mod fields;
mod narrative;

use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisType, ResearchContext};
use crate::engine::AnalysisExecutionResult;
use crate::validation::{ComprehensiveValidationResult, ValidationSeverity};

use narrative::Findings;

/// Five audience-specific readings of one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    /// Test statistics, p-values and effect sizes in prose
    pub statistical: String,
    /// What the result means for practitioners
    pub practical: String,
    /// Procedure and prerequisite check summary
    pub methodological: String,
    /// Every WARNING or CRITICAL check, echoed
    pub limitations: String,
    /// Theory and hypothesis framing with APA reporting hints
    pub academic: String,
}

/// Turns raw results and validation outcomes into [`Interpretation`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpretationEngine;

impl InterpretationEngine {
    /// Create a new interpretation engine
    pub fn new() -> Self {
        Self
    }

    /// Interpret one execution result. Missing fields in `execution` are
    /// reported in the text rather than treated as errors.
    pub fn interpret(
        &self,
        execution: &AnalysisExecutionResult,
        analysis_type: AnalysisType,
        context: &ResearchContext,
        validation: &ComprehensiveValidationResult,
    ) -> Interpretation {
        let findings = narrative::findings(analysis_type, &execution.results);
        let sample_size = context
            .sample_size
            .or_else(|| observed_sample_size(validation))
            .unwrap_or(0);

        Interpretation {
            statistical: findings.sentences.join(" "),
            practical: practical(analysis_type, &findings, context, sample_size),
            methodological: methodological(analysis_type, validation, sample_size),
            limitations: limitations(validation),
            academic: academic(analysis_type, &findings, context),
        }
    }
}

/// Row count recorded by the sample size check.
fn observed_sample_size(validation: &ComprehensiveValidationResult) -> Option<usize> {
    validation
        .get("sample_size")?
        .details
        .get("n")?
        .as_u64()
        .map(|n| n as usize)
}

fn practical(
    analysis_type: AnalysisType,
    findings: &Findings,
    context: &ResearchContext,
    sample_size: usize,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    match (findings.significant, &findings.effect) {
        (Some(true), Some(effect)) => parts.push(format!(
            "The analysis found a statistically significant result with {}, which is likely to be meaningful beyond this sample.",
            effect
        )),
        (Some(true), None) => parts.push(
            "The analysis found a statistically significant result; its practical size should be judged against domain benchmarks.".to_string(),
        ),
        (Some(false), _) => parts.push(
            "No statistically significant effect was detected, so the observed pattern may reflect sampling variability.".to_string(),
        ),
        (None, _) => {}
    }

    if let Some(quality) = &findings.quality {
        let sentence = match analysis_type {
            AnalysisType::Reliability => format!(
                "The scale shows {}, so its composite score can be {} for substantive analyses.",
                quality,
                if quality.starts_with("poor") || quality.starts_with("questionable") {
                    "used only with caution"
                } else {
                    "used"
                }
            ),
            AnalysisType::Efa => format!("The item set shows {} for extracting common factors.", quality),
            AnalysisType::Cfa | AnalysisType::Sem => {
                format!("The hypothesised model shows {} to the observed data.", quality)
            }
            _ => format!("The data show {}.", quality),
        };
        parts.push(sentence);
    }

    parts.push(format!("These conclusions rest on {} observations.", sample_size));
    if let Some(discipline) = &context.discipline {
        parts.push(format!(
            "Practitioners in {} should weigh the effect against the cost of acting on it.",
            discipline
        ));
    }
    parts.join(" ")
}

fn methodological(
    analysis_type: AnalysisType,
    validation: &ComprehensiveValidationResult,
    sample_size: usize,
) -> String {
    let profile = analysis_type.profile();
    let mut parts = vec![
        format!(
            "{} was conducted on {} observations using the {} procedure.",
            profile.label, sample_size, profile.operation
        ),
        validation.summary.clone(),
    ];

    let critical: Vec<&str> = validation
        .flagged()
        .filter(|r| r.severity == ValidationSeverity::Critical)
        .map(|r| r.test_name.as_str())
        .collect();
    let warnings: Vec<&str> = validation
        .flagged()
        .filter(|r| r.severity == ValidationSeverity::Warning)
        .map(|r| r.test_name.as_str())
        .collect();

    if critical.is_empty() && warnings.is_empty() {
        parts.push("All prerequisite checks passed.".to_string());
    }
    if !critical.is_empty() {
        parts.push(format!(
            "Critical prerequisite issues ({}) mean the estimates should be treated as provisional.",
            critical.join(", ")
        ));
    }
    if !warnings.is_empty() {
        parts.push(format!("Checks with warnings: {}.", warnings.join(", ")));
    }
    parts.join(" ")
}

fn check_title(test_name: &str) -> String {
    let mut title = test_name.replace('_', " ");
    if let Some(first) = title.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    title
}

fn limitations(validation: &ComprehensiveValidationResult) -> String {
    let flagged: Vec<String> = validation
        .flagged()
        .map(|r| format!("{} ({}): {}.", check_title(&r.test_name), r.severity, r.message.trim_end_matches('.')))
        .collect();
    if flagged.is_empty() {
        return "No prerequisite violations were detected; the usual limits of observational, cross-sectional data still apply.".to_string();
    }
    let mut text = flagged.join(" ");
    text.push_str(" Results should be interpreted in light of these issues.");
    text
}

fn academic(analysis_type: AnalysisType, findings: &Findings, context: &ResearchContext) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(framework) = &context.theoretical_framework {
        parts.push(format!(
            "Interpreted within {}, the {} results speak to the framework's proposed relationships.",
            framework,
            analysis_type.profile().label.to_lowercase()
        ));
    }

    for (i, hypothesis) in context.hypotheses.iter().enumerate() {
        let verdict = match findings.significant {
            Some(true) => "is supported by",
            Some(false) => "is not supported by",
            None => "should be evaluated against",
        };
        parts.push(format!("H{} ({}) {} these results.", i + 1, hypothesis.trim_end_matches('.'), verdict));
    }

    for question in &context.research_questions {
        parts.push(format!("Research question addressed: {}", question));
    }

    if findings.report.is_empty() {
        parts.push("Report the full compute engine output alongside the validation summary.".to_string());
    } else {
        parts.push(format!(
            "Following APA conventions, report {}.",
            findings.report.join("; ")
        ));
    }
    parts.join(" ")
}
