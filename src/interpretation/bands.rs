//! Threshold tables that map numeric output onto verbal labels.

use serde::{Deserialize, Serialize};

/// Cronbach's alpha: .9/.8/.7/.6 cut points.
pub fn alpha_band(alpha: f64) -> &'static str {
    if alpha >= 0.9 {
        "excellent"
    } else if alpha >= 0.8 {
        "good"
    } else if alpha >= 0.7 {
        "acceptable"
    } else if alpha >= 0.6 {
        "questionable"
    } else {
        "poor"
    }
}

/// Kaiser's labels for the KMO measure.
pub fn kmo_band(kmo: f64) -> &'static str {
    if kmo >= 0.9 {
        "marvelous"
    } else if kmo >= 0.8 {
        "meritorious"
    } else if kmo >= 0.7 {
        "middling"
    } else if kmo >= 0.6 {
        "mediocre"
    } else if kmo >= 0.5 {
        "miserable"
    } else {
        "unacceptable"
    }
}

/// Overall model fit category. Ordered best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitQuality {
    Excellent,
    Acceptable,
    Poor,
}

impl FitQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitQuality::Excellent => "excellent",
            FitQuality::Acceptable => "acceptable",
            FitQuality::Poor => "poor",
        }
    }

    fn higher_is_better(value: f64, excellent: f64, acceptable: f64) -> Self {
        if value >= excellent {
            FitQuality::Excellent
        } else if value >= acceptable {
            FitQuality::Acceptable
        } else {
            FitQuality::Poor
        }
    }

    fn lower_is_better(value: f64, excellent: f64, acceptable: f64) -> Self {
        if value <= excellent {
            FitQuality::Excellent
        } else if value <= acceptable {
            FitQuality::Acceptable
        } else {
            FitQuality::Poor
        }
    }
}

impl std::fmt::Display for FitQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Majority vote over the available CFI, RMSEA and SRMR verdicts.
///
/// Ties resolve to the worse category. `None` when no index is available.
pub fn classify_fit(cfi: Option<f64>, rmsea: Option<f64>, srmr: Option<f64>) -> Option<FitQuality> {
    let votes: Vec<FitQuality> = [
        cfi.map(|v| FitQuality::higher_is_better(v, 0.95, 0.90)),
        rmsea.map(|v| FitQuality::lower_is_better(v, 0.05, 0.08)),
        srmr.map(|v| FitQuality::lower_is_better(v, 0.05, 0.08)),
    ]
    .into_iter()
    .flatten()
    .collect();

    let tally = |q: FitQuality| votes.iter().filter(|v| **v == q).count();
    // max_by_key keeps the last of equal maxima, so list the worst last.
    [FitQuality::Excellent, FitQuality::Acceptable, FitQuality::Poor]
        .into_iter()
        .filter(|q| tally(*q) > 0)
        .max_by_key(|q| tally(*q))
}

/// `***` p < .001, `**` p < .01, `*` p < .05.
pub fn significance_stars(p: f64) -> &'static str {
    if p < 0.001 {
        "***"
    } else if p < 0.01 {
        "**"
    } else if p < 0.05 {
        "*"
    } else {
        ""
    }
}

/// Cohen's d magnitude label.
pub fn cohens_d_band(d: f64) -> &'static str {
    let d = d.abs();
    if d >= 0.8 {
        "large"
    } else if d >= 0.5 {
        "medium"
    } else if d >= 0.2 {
        "small"
    } else {
        "negligible"
    }
}

/// Eta-squared magnitude label.
pub fn eta_squared_band(eta2: f64) -> &'static str {
    if eta2 >= 0.14 {
        "large"
    } else if eta2 >= 0.06 {
        "medium"
    } else if eta2 >= 0.01 {
        "small"
    } else {
        "negligible"
    }
}

/// Correlation strength label.
pub fn correlation_band(r: f64) -> &'static str {
    let r = r.abs();
    if r >= 0.7 {
        "strong"
    } else if r >= 0.5 {
        "moderate"
    } else if r >= 0.3 {
        "weak"
    } else {
        "negligible"
    }
}

/// APA-style p-value: `p < .001` or `p = .023`.
pub fn format_p(p: f64) -> String {
    if p < 0.001 {
        "p < .001".to_string()
    } else {
        let s = format!("{:.3}", p.min(1.0));
        format!("p = {}", s.trim_start_matches('0'))
    }
}

/// `p` with its stars appended when significant.
pub fn format_p_starred(p: f64) -> String {
    let stars = significance_stars(p);
    if stars.is_empty() {
        format_p(p)
    } else {
        format!("{} {}", format_p(p), stars)
    }
}
