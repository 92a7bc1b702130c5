//! Reference distributions used to turn test statistics into p-values.
//!
//! Tails come from `statrs`. Only the Kolmogorov limiting series and the
//! exact three-observation Shapiro-Wilk p-value are computed here.

use std::f64::consts::PI;

use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

fn standard_normal() -> Option<Normal> {
    Normal::new(0.0, 1.0).ok()
}

/// Standard normal cumulative distribution.
pub fn normal_cdf(z: f64) -> f64 {
    standard_normal().map_or(f64::NAN, |n| n.cdf(z))
}

/// Standard normal upper tail `P(Z > z)`.
pub fn normal_sf(z: f64) -> f64 {
    standard_normal().map_or(f64::NAN, |n| n.sf(z))
}

/// Inverse of the standard normal CDF.
pub fn normal_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    standard_normal().map_or(f64::NAN, |n| n.inverse_cdf(p))
}

/// Upper tail of the chi-square distribution. Invalid `df` yields 1.
pub fn chi_square_sf(x: f64, df: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    ChiSquared::new(df).map_or(1.0, |d| d.sf(x).clamp(0.0, 1.0))
}

/// Upper tail of the F distribution with `(d1, d2)` degrees of freedom.
pub fn f_sf(f: f64, d1: f64, d2: f64) -> f64 {
    if f <= 0.0 {
        return 1.0;
    }
    FisherSnedecor::new(d1, d2).map_or(1.0, |d| d.sf(f).clamp(0.0, 1.0))
}

/// Two-sided p-value of Student's t.
pub fn t_two_sided(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    StudentsT::new(0.0, 1.0, df).map_or(1.0, |d| (2.0 * d.sf(t.abs())).clamp(0.0, 1.0))
}

/// Kolmogorov limiting distribution upper tail `Q_KS(lambda)`.
pub fn kolmogorov_sf(lambda: f64) -> f64 {
    if lambda < 0.2 {
        return 1.0;
    }
    let mut sum = 0.0;
    let mut sign = 1.0;
    for k in 1..=100 {
        let k = k as f64;
        let term = sign * 2.0 * (-2.0 * k * k * lambda * lambda).exp();
        sum += term;
        if term.abs() < 1e-12 {
            break;
        }
        sign = -sign;
    }
    sum.clamp(0.0, 1.0)
}

/// `asin`-based exact p-value for the three-observation Shapiro-Wilk case.
pub(crate) fn shapiro_n3_p(w: f64) -> f64 {
    let p = 6.0 / PI * (w.sqrt().asin() - 0.75_f64.sqrt().asin());
    p.clamp(0.0, 1.0)
}
