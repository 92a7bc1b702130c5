//! Per-type readings of raw compute engine output.

use serde_json::Value;

use super::bands::{
    alpha_band, classify_fit, cohens_d_band, correlation_band, eta_squared_band, format_p,
    format_p_starred, kmo_band,
};
use super::fields::{
    as_number, as_percentage, child, estimate_and_p, nested_number, number, number_any, text,
};
use crate::analysis::AnalysisType;

const ALPHA: f64 = 0.05;

/// What the numbers say, before it is phrased for each audience.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Findings {
    /// Sentences of the statistical interpretation, in order.
    pub sentences: Vec<String>,
    /// Whether the focal effect reached significance, when the type has one.
    pub significant: Option<bool>,
    /// Effect magnitude phrase, e.g. "a medium effect (Cohen's d = 0.62)".
    pub effect: Option<String>,
    /// Measurement or fit quality phrase, e.g. "good internal consistency".
    pub quality: Option<String>,
    /// Statistics an academic write-up should report.
    pub report: Vec<String>,
}

impl Findings {
    fn say(&mut self, sentence: impl Into<String>) {
        self.sentences.push(sentence.into());
    }

    fn missing(&mut self, what: &str) {
        self.say(format!("The compute engine did not report {}.", what));
    }
}

pub(crate) fn findings(analysis_type: AnalysisType, results: &Value) -> Findings {
    let mut f = Findings::default();
    match analysis_type {
        AnalysisType::Descriptive => descriptive(results, &mut f),
        AnalysisType::Reliability => reliability(results, &mut f),
        AnalysisType::Efa => efa(results, &mut f),
        AnalysisType::Cfa | AnalysisType::Sem => model_fit(analysis_type, results, &mut f),
        AnalysisType::Regression => regression(results, &mut f),
        AnalysisType::Anova => anova(results, &mut f),
        AnalysisType::Ttest => ttest(results, &mut f),
        AnalysisType::Correlation => correlation(results, &mut f),
        AnalysisType::Mediation => mediation(results, &mut f),
        AnalysisType::Moderation => moderation(results, &mut f),
    }
    f
}

fn descriptive(results: &Value, f: &mut Findings) {
    let Some(Value::Object(vars)) = child(results, &["variables", "descriptives"]) else {
        f.missing("per-variable descriptive statistics");
        return;
    };
    let mut skewed: Vec<&str> = Vec::new();
    for (name, stats) in vars {
        let mean = number_any(stats, &["mean", "m"]);
        let sd = number_any(stats, &["sd", "std", "std_dev"]);
        match (mean, sd) {
            (Some(m), Some(s)) => f.say(format!("{}: M = {:.2}, SD = {:.2}.", name, m, s)),
            (Some(m), None) => f.say(format!("{}: M = {:.2}.", name, m)),
            _ => {}
        }
        let skew = number_any(stats, &["skewness", "skew"]).unwrap_or(0.0);
        let kurt = number_any(stats, &["kurtosis", "excess_kurtosis"]).unwrap_or(0.0);
        if skew.abs() > 2.0 || kurt.abs() > 7.0 {
            skewed.push(name.as_str());
        }
    }
    if skewed.is_empty() {
        f.say("No variable shows marked skewness or kurtosis.");
        f.quality = Some("approximately symmetric distributions".to_string());
    } else {
        f.say(format!(
            "Marked departures from normality (|skewness| > 2 or |kurtosis| > 7): {}.",
            skewed.join(", ")
        ));
        f.quality = Some("some strongly non-normal distributions".to_string());
    }
    f.report.push("means and standard deviations".to_string());
}

fn reliability(results: &Value, f: &mut Findings) {
    let Some(alpha) = number_any(results, &["cronbach_alpha", "alpha"]) else {
        f.missing("Cronbach's alpha");
        return;
    };
    let band = alpha_band(alpha);
    let items = number_any(results, &["n_items", "items"]);
    match items {
        Some(k) => f.say(format!(
            "Cronbach's alpha = {:.3} across {:.0} items, indicating {} internal consistency.",
            alpha, k, band
        )),
        None => f.say(format!(
            "Cronbach's alpha = {:.3}, indicating {} internal consistency.",
            alpha, band
        )),
    }
    if alpha > 0.95 {
        f.say("Values above .95 can signal redundant items.");
    }
    f.quality = Some(format!("{} internal consistency", band));
    f.report.push(format!("Cronbach's alpha = {:.2}", alpha));
}

fn efa(results: &Value, f: &mut Findings) {
    match number_any(results, &["kmo", "kmo_overall"]) {
        Some(kmo) => {
            let band = kmo_band(kmo);
            f.say(format!(
                "The Kaiser-Meyer-Olkin measure was {:.3} ({}).",
                kmo, band
            ));
            f.quality = Some(format!("{} sampling adequacy", band));
            f.report.push(format!("KMO = {:.2}", kmo));
        }
        None => f.missing("the KMO measure"),
    }
    let factors = number_any(results, &["n_factors", "factors"]);
    let explained = number_any(results, &["variance_explained", "total_variance_explained"]).map(as_percentage);
    match (factors, explained) {
        (Some(k), Some(v)) => {
            f.say(format!(
                "{:.0} factors were extracted, explaining {:.1}% of the total variance.",
                k, v
            ));
            f.report.push(format!("{:.1}% variance explained", v));
        }
        (None, Some(v)) => {
            f.say(format!("The solution explains {:.1}% of the total variance.", v));
            f.report.push(format!("{:.1}% variance explained", v));
        }
        (Some(k), None) => f.say(format!("{:.0} factors were extracted.", k)),
        (None, None) => f.missing("variance explained"),
    }
}

fn fit_index(results: &Value, key: &str) -> Option<f64> {
    nested_number(results, "fit_indices", key).or_else(|| number(results, key))
}

fn model_fit(analysis_type: AnalysisType, results: &Value, f: &mut Findings) {
    let cfi = fit_index(results, "cfi");
    let tli = fit_index(results, "tli");
    let rmsea = fit_index(results, "rmsea");
    let srmr = fit_index(results, "srmr");

    let mut parts: Vec<String> = Vec::new();
    if let Some(v) = cfi {
        parts.push(format!("CFI = {:.3}", v));
    }
    if let Some(v) = tli {
        parts.push(format!("TLI = {:.3}", v));
    }
    if let Some(v) = rmsea {
        parts.push(format!("RMSEA = {:.3}", v));
    }
    if let Some(v) = srmr {
        parts.push(format!("SRMR = {:.3}", v));
    }

    match classify_fit(cfi, rmsea, srmr) {
        Some(quality) => {
            f.say(format!("Model fit was {} ({}).", quality, parts.join(", ")));
            f.quality = Some(format!("{} model fit", quality));
            f.report.push(parts.join(", "));
        }
        None => f.missing("fit indices (CFI, RMSEA, SRMR)"),
    }

    if analysis_type == AnalysisType::Sem {
        let Some(Value::Array(paths)) = child(results, &["paths", "structural_paths"]) else {
            return;
        };
        let mut significant = 0usize;
        let mut tested = 0usize;
        for path in paths {
            let from = text(path, "from").unwrap_or("?");
            let to = text(path, "to").unwrap_or("?");
            let (estimate, p) = estimate_and_p(path);
            let Some(estimate) = estimate else { continue };
            match p {
                Some(p) => {
                    tested += 1;
                    if p < ALPHA {
                        significant += 1;
                    }
                    f.say(format!("{} -> {}: beta = {:.3}, {}.", from, to, estimate, format_p_starred(p)));
                }
                None => f.say(format!("{} -> {}: beta = {:.3}.", from, to, estimate)),
            }
        }
        if tested > 0 {
            f.significant = Some(significant > 0);
            f.say(format!("{} of {} structural paths were significant.", significant, tested));
        }
    }
}

fn regression(results: &Value, f: &mut Findings) {
    let r2 = number_any(results, &["r_squared", "r2"]);
    let adj = number_any(results, &["adj_r_squared", "adjusted_r_squared"]);
    let fstat = number_any(results, &["f_statistic", "f"]);
    let fp = number_any(results, &["f_pvalue", "f_p_value", "p_value"]);

    match r2 {
        Some(r2) => {
            let mut sentence = format!(
                "The model explained {:.1}% of the variance in the outcome (R² = {:.3}",
                r2 * 100.0,
                r2
            );
            if let Some(adj) = adj {
                sentence.push_str(&format!(", adjusted R² = {:.3}", adj));
            }
            if let Some(fs) = fstat {
                sentence.push_str(&format!(", F = {:.2}", fs));
            }
            if let Some(p) = fp {
                sentence.push_str(&format!(", {}", format_p_starred(p)));
            }
            sentence.push_str(").");
            f.say(sentence);
            f.effect = Some(format!("{:.1}% of explained variance", r2 * 100.0));
            f.report.push(format!("R² = {:.2}", r2));
        }
        None => f.missing("R²"),
    }
    if let Some(p) = fp {
        f.significant = Some(p < ALPHA);
        f.report.push(format!("F-test {}", format_p(p)));
    }

    if let Some(Value::Object(coefs)) = child(results, &["coefficients"]) {
        let mut significant: Vec<String> = Vec::new();
        for (name, entry) in coefs {
            if name.eq_ignore_ascii_case("intercept") || name == "(Intercept)" || name == "const" {
                continue;
            }
            let (estimate, p) = estimate_and_p(entry);
            if let (Some(b), Some(p)) = (estimate, p) {
                f.say(format!("{}: b = {:.3}, {}.", name, b, format_p_starred(p)));
                if p < ALPHA {
                    significant.push(name.clone());
                }
            }
        }
        if !significant.is_empty() {
            f.say(format!("Significant predictors: {}.", significant.join(", ")));
        }
    }
}

fn anova(results: &Value, f: &mut Findings) {
    let fstat = number_any(results, &["f_statistic", "f"]);
    let p = number_any(results, &["p_value", "pvalue"]);
    let eta2 = number_any(results, &["eta_squared", "eta2"]);
    let df1 = number_any(results, &["df_between", "df1"]);
    let df2 = number_any(results, &["df_within", "df2"]);

    match (fstat, p) {
        (Some(fs), Some(p)) => {
            let head = match (df1, df2) {
                (Some(a), Some(b)) => format!("F({:.0}, {:.0}) = {:.2}", a, b, fs),
                _ => format!("F = {:.2}", fs),
            };
            f.say(format!(
                "The group effect was {} ({}, {}).",
                if p < ALPHA { "significant" } else { "not significant" },
                head,
                format_p_starred(p)
            ));
            f.significant = Some(p < ALPHA);
            f.report.push(format!("{}, {}", head, format_p(p)));
        }
        _ => f.missing("the F-test"),
    }
    if let Some(eta2) = eta2 {
        let band = eta_squared_band(eta2);
        f.say(format!("Eta-squared = {:.3}, a {} effect.", eta2, band));
        f.effect = Some(format!("a {} effect (η² = {:.3})", band, eta2));
        f.report.push(format!("η² = {:.2}", eta2));
    }
}

fn ttest(results: &Value, f: &mut Findings) {
    let t = number_any(results, &["t_statistic", "t"]);
    let p = number_any(results, &["p_value", "pvalue"]);
    let d = number_any(results, &["cohens_d", "effect_size", "d"]);
    let df = number_any(results, &["df", "degrees_of_freedom"]);

    match (t, p) {
        (Some(t), Some(p)) => {
            let head = match df {
                Some(df) => format!("t({:.0}) = {:.2}", df, t),
                None => format!("t = {:.2}", t),
            };
            f.say(format!(
                "The group difference was {} ({}, {}).",
                if p < ALPHA { "significant" } else { "not significant" },
                head,
                format_p_starred(p)
            ));
            f.significant = Some(p < ALPHA);
            f.report.push(format!("{}, {}", head, format_p(p)));
        }
        _ => f.missing("the t-test"),
    }
    if let Some(d) = d {
        let band = cohens_d_band(d);
        f.say(format!("Cohen's d = {:.2}, a {} effect.", d, band));
        f.effect = Some(format!("a {} effect (Cohen's d = {:.2})", band, d));
        f.report.push(format!("d = {:.2}", d));
    }
}

fn correlation(results: &Value, f: &mut Findings) {
    let Some(Value::Array(pairs)) = child(results, &["pairs", "correlations"]) else {
        f.missing("pairwise correlations");
        return;
    };
    let mut significant = 0usize;
    let mut strongest: Option<(f64, String)> = None;
    for pair in pairs {
        let a = text(pair, "var1").unwrap_or("?");
        let b = text(pair, "var2").unwrap_or("?");
        let Some(r) = pair.get("r").and_then(as_number) else { continue };
        let p = number_any(pair, &["p_value", "p"]);
        let band = correlation_band(r);
        match p {
            Some(p) => {
                if p < ALPHA {
                    significant += 1;
                }
                f.say(format!("{} and {}: r = {:.2} ({}), {}.", a, b, r, band, format_p_starred(p)));
            }
            None => f.say(format!("{} and {}: r = {:.2} ({}).", a, b, r, band)),
        }
        if strongest.as_ref().map_or(true, |(best, _)| r.abs() > best.abs()) {
            strongest = Some((r, format!("{} and {}", a, b)));
        }
    }
    f.say(format!("{} of {} correlations were significant.", significant, pairs.len()));
    f.significant = Some(significant > 0);
    if let Some((r, label)) = strongest {
        f.effect = Some(format!("a {} association between {} (r = {:.2})", correlation_band(r), label, r));
        f.report.push(format!("r = {:.2}", r));
    }
}

fn mediation(results: &Value, f: &mut Findings) {
    let indirect = child(results, &["indirect_effect", "indirect"]);
    let estimate = indirect.and_then(|v| estimate_and_p(v).0);
    let lower = indirect.and_then(|v| number_any(v, &["ci_lower", "lower"]));
    let upper = indirect.and_then(|v| number_any(v, &["ci_upper", "upper"]));

    match (estimate, lower, upper) {
        (Some(ab), Some(lo), Some(hi)) => {
            let supported = lo > 0.0 || hi < 0.0;
            f.significant = Some(supported);
            f.say(format!(
                "The indirect effect was {:.3} (95% CI [{:.3}, {:.3}]), an interval that {} zero.",
                ab,
                lo,
                hi,
                if supported { "excludes" } else { "includes" }
            ));
            f.report.push(format!("indirect effect = {:.2}, 95% CI [{:.2}, {:.2}]", ab, lo, hi));

            let direct_p = child(results, &["direct_effect", "direct"]).and_then(|v| estimate_and_p(v).1);
            if supported {
                let kind = match direct_p {
                    Some(p) if p >= ALPHA => "full",
                    Some(_) => "partial",
                    None => "some",
                };
                f.say(format!("This supports {} mediation.", kind));
                f.effect = Some(format!("{} mediation (indirect effect = {:.3})", kind, ab));
            } else {
                f.say("Mediation is not supported.");
            }
        }
        _ => f.missing("the indirect effect with its confidence interval"),
    }
}

fn moderation(results: &Value, f: &mut Findings) {
    let interaction = child(results, &["interaction", "interaction_effect"]);
    let (estimate, p) = interaction.map(estimate_and_p).unwrap_or((None, None));
    match (estimate, p) {
        (Some(b), Some(p)) => {
            let supported = p < ALPHA;
            f.significant = Some(supported);
            f.say(format!(
                "The interaction term was {} (b = {:.3}, {}); moderation is {}.",
                if supported { "significant" } else { "not significant" },
                b,
                format_p_starred(p),
                if supported { "supported" } else { "not supported" }
            ));
            f.effect = Some(format!("an interaction of b = {:.3}", b));
            f.report.push(format!("interaction b = {:.2}, {}", b, format_p(p)));
        }
        _ => f.missing("the interaction term"),
    }
    if let Some(delta) = number_any(results, &["r_squared_change", "delta_r_squared"]) {
        f.say(format!("The interaction added {:.1}% explained variance.", delta * 100.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reliability_band_in_text() {
        let f = findings(AnalysisType::Reliability, &json!({ "cronbach_alpha": 0.84, "n_items": 6 }));
        assert_eq!(
            f.sentences[0],
            "Cronbach's alpha = 0.840 across 6 items, indicating good internal consistency."
        );
        assert_eq!(f.quality.as_deref(), Some("good internal consistency"));
    }

    #[test]
    fn test_missing_field_is_reported() {
        let f = findings(AnalysisType::Reliability, &json!({}));
        assert_eq!(f.sentences, vec!["The compute engine did not report Cronbach's alpha."]);
    }

    #[test]
    fn test_cfa_reads_nested_fit_indices() {
        let f = findings(
            AnalysisType::Cfa,
            &json!({ "fit_indices": { "cfi": 0.93, "tli": 0.91, "rmsea": 0.07, "srmr": 0.06 } }),
        );
        assert_eq!(f.quality.as_deref(), Some("acceptable model fit"));
        assert!(f.sentences[0].starts_with("Model fit was acceptable (CFI = 0.930"));
    }

    #[test]
    fn test_ttest_effect_and_stars() {
        let f = findings(
            AnalysisType::Ttest,
            &json!({ "t_statistic": 2.45, "p_value": 0.019, "cohens_d": 0.62, "df": 38 }),
        );
        assert_eq!(f.significant, Some(true));
        assert_eq!(
            f.sentences[0],
            "The group difference was significant (t(38) = 2.45, p = .019 *)."
        );
        assert_eq!(f.effect.as_deref(), Some("a medium effect (Cohen's d = 0.62)"));
    }

    #[test]
    fn test_mediation_ci_excluding_zero() {
        let f = findings(
            AnalysisType::Mediation,
            &json!({
                "indirect_effect": { "estimate": 0.21, "ci_lower": 0.08, "ci_upper": 0.35 },
                "direct_effect": { "estimate": 0.05, "p_value": 0.40 }
            }),
        );
        assert_eq!(f.significant, Some(true));
        assert!(f.sentences.iter().any(|s| s == "This supports full mediation."));

        let f = findings(
            AnalysisType::Mediation,
            &json!({ "indirect_effect": { "estimate": 0.05, "ci_lower": -0.02, "ci_upper": 0.12 } }),
        );
        assert_eq!(f.significant, Some(false));
    }

    #[test]
    fn test_moderation_uses_p_value() {
        let f = findings(
            AnalysisType::Moderation,
            &json!({ "interaction": { "estimate": 0.12, "p_value": 0.2 } }),
        );
        assert_eq!(f.significant, Some(false));
    }

    #[test]
    fn test_correlation_pairs() {
        let f = findings(
            AnalysisType::Correlation,
            &json!({ "pairs": [
                { "var1": "price", "var2": "quality", "r": 0.54, "p_value": 0.0001 },
                { "var1": "price", "var2": "age", "r": -0.1, "p_value": 0.4 }
            ]}),
        );
        assert_eq!(f.sentences[0], "price and quality: r = 0.54 (moderate), p < .001 ***.");
        assert_eq!(f.sentences[2], "1 of 2 correlations were significant.");
        assert_eq!(f.significant, Some(true));
    }
}
