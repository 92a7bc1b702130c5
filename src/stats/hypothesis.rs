//! Classical tests used as prerequisite checks.

use serde::{Deserialize, Serialize};

use super::distributions::{
    chi_square_sf, f_sf, kolmogorov_sf, normal_cdf, normal_quantile, normal_sf, shapiro_n3_p,
    t_two_sided,
};
use super::matrix::{covariance, determinant, invert, Matrix};
use super::{mean, median, pearson, sorted, std_dev};

/// Largest sample the Shapiro-Wilk approximation is calibrated for.
pub const SHAPIRO_MAX_N: usize = 5000;

/// Statistic and p-value of a test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

/// Mardia's multivariate skewness and kurtosis tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MardiaOutcome {
    pub skewness: f64,
    pub skewness_statistic: f64,
    pub skewness_p: f64,
    pub kurtosis: f64,
    pub kurtosis_statistic: f64,
    pub kurtosis_p: f64,
}

/// Shapiro-Wilk W with Royston's (1995) p-value approximation, `3 <= n <= 5000`.
pub fn shapiro_wilk(values: &[f64]) -> Option<TestOutcome> {
    let n = values.len();
    if !(3..=SHAPIRO_MAX_N).contains(&n) {
        return None;
    }
    let x = sorted(values);
    let range = x[n - 1] - x[0];
    if range <= 0.0 {
        return None;
    }

    let a = shapiro_coefficients(n);
    let m = mean(&x)?;
    let ss: f64 = x.iter().map(|v| (v - m).powi(2)).sum();
    let num: f64 = a.iter().zip(&x).map(|(ai, xi)| ai * xi).sum();
    let w = (num * num / ss).min(1.0);

    let p_value = if n == 3 {
        shapiro_n3_p(w)
    } else if w >= 1.0 {
        1.0
    } else if n <= 11 {
        let nf = n as f64;
        let gamma = 0.459 * nf - 2.273;
        let mu = 0.5440 - 0.39978 * nf + 0.025054 * nf.powi(2) - 0.0006714 * nf.powi(3);
        let sigma = (1.3822 - 0.77857 * nf + 0.062767 * nf.powi(2) - 0.0020322 * nf.powi(3)).exp();
        let arg = gamma - (1.0 - w).ln();
        if arg <= 0.0 {
            0.0
        } else {
            normal_sf((-arg.ln() - mu) / sigma)
        }
    } else {
        let ln_n = (n as f64).ln();
        let mu = -1.5861 - 0.31082 * ln_n - 0.083751 * ln_n.powi(2) + 0.0038915 * ln_n.powi(3);
        let sigma = (-0.4803 - 0.082676 * ln_n + 0.0030302 * ln_n.powi(2)).exp();
        normal_sf(((1.0 - w).ln() - mu) / sigma)
    };

    Some(TestOutcome {
        statistic: w,
        p_value: p_value.clamp(0.0, 1.0),
    })
}

fn shapiro_coefficients(n: usize) -> Vec<f64> {
    let mut a = vec![0.0; n];
    if n == 3 {
        a[0] = -std::f64::consts::FRAC_1_SQRT_2;
        a[2] = std::f64::consts::FRAC_1_SQRT_2;
        return a;
    }

    let nf = n as f64;
    let m: Vec<f64> = (1..=n)
        .map(|i| normal_quantile((i as f64 - 0.375) / (nf + 0.25)))
        .collect();
    let mm: f64 = m.iter().map(|v| v * v).sum();
    let u = 1.0 / nf.sqrt();
    let poly = |c: f64, k: [f64; 5]| {
        c + k[0] * u + k[1] * u.powi(2) + k[2] * u.powi(3) + k[3] * u.powi(4) + k[4] * u.powi(5)
    };

    let an = poly(
        m[n - 1] / mm.sqrt(),
        [0.221157, -0.147981, -2.071190, 4.434685, -2.706056],
    );

    if n > 5 {
        let an1 = poly(
            m[n - 2] / mm.sqrt(),
            [0.042981, -0.293762, -1.752461, 5.682633, -3.582633],
        );
        let phi = (mm - 2.0 * m[n - 1].powi(2) - 2.0 * m[n - 2].powi(2))
            / (1.0 - 2.0 * an.powi(2) - 2.0 * an1.powi(2));
        for i in 2..n - 2 {
            a[i] = m[i] / phi.sqrt();
        }
        a[1] = -an1;
        a[n - 2] = an1;
    } else {
        let phi = (mm - 2.0 * m[n - 1].powi(2)) / (1.0 - 2.0 * an.powi(2));
        for i in 1..n - 1 {
            a[i] = m[i] / phi.sqrt();
        }
    }
    a[0] = -an;
    a[n - 1] = an;
    a
}

/// One-sample Kolmogorov-Smirnov against a normal with estimated mean and sd.
pub fn kolmogorov_smirnov_normal(values: &[f64]) -> Option<TestOutcome> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let m = mean(values)?;
    let sd = std_dev(values)?;
    if sd <= 0.0 {
        return None;
    }
    let x = sorted(values);
    let nf = n as f64;
    let d = x
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let f = normal_cdf((v - m) / sd);
            ((i + 1) as f64 / nf - f).max(f - i as f64 / nf)
        })
        .fold(0.0_f64, f64::max);
    let sqrt_n = nf.sqrt();
    let lambda = (sqrt_n + 0.12 + 0.11 / sqrt_n) * d;
    Some(TestOutcome {
        statistic: d,
        p_value: kolmogorov_sf(lambda),
    })
}

/// Levene's test for equal variances, median-centred (Brown-Forsythe variant).
pub fn levene(groups: &[Vec<f64>]) -> Option<TestOutcome> {
    let groups: Vec<&Vec<f64>> = groups.iter().filter(|g| g.len() >= 2).collect();
    let k = groups.len();
    let total: usize = groups.iter().map(|g| g.len()).sum();
    if k < 2 || total <= k {
        return None;
    }

    let deviations: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| {
            let med = median(g).unwrap_or(0.0);
            g.iter().map(|v| (v - med).abs()).collect()
        })
        .collect();
    let group_means: Vec<f64> = deviations.iter().map(|d| mean(d).unwrap_or(0.0)).collect();
    let grand = deviations.iter().flatten().sum::<f64>() / total as f64;

    let between: f64 = deviations
        .iter()
        .zip(&group_means)
        .map(|(d, gm)| d.len() as f64 * (gm - grand).powi(2))
        .sum();
    let within: f64 = deviations
        .iter()
        .zip(&group_means)
        .map(|(d, gm)| d.iter().map(|z| (z - gm).powi(2)).sum::<f64>())
        .sum();

    let df1 = (k - 1) as f64;
    let df2 = (total - k) as f64;
    if within <= 0.0 {
        return if between <= 0.0 {
            Some(TestOutcome {
                statistic: 0.0,
                p_value: 1.0,
            })
        } else {
            None
        };
    }
    let f = (df2 / df1) * between / within;
    Some(TestOutcome {
        statistic: f,
        p_value: f_sf(f, df1, df2),
    })
}

/// Correlation between a continuous predictor and squared OLS residuals.
///
/// A simplified stand-in for Breusch-Pagan: regress `y` on `x`, correlate
/// `x` with the squared residuals and test that correlation with Student's t.
pub fn residual_variance_proxy(pairs: &[(f64, f64)]) -> Option<TestOutcome> {
    let n = pairs.len();
    if n < 4 {
        return None;
    }
    let x: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let y: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    let mx = mean(&x)?;
    let my = mean(&y)?;
    let sxx: f64 = x.iter().map(|v| (v - mx).powi(2)).sum();
    if sxx <= 0.0 {
        return None;
    }
    let sxy: f64 = x.iter().zip(&y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let squared: Vec<f64> = x
        .iter()
        .zip(&y)
        .map(|(a, b)| (b - intercept - slope * a).powi(2))
        .collect();

    let r = match pearson(&x, &squared) {
        Some(r) => r,
        None => {
            return Some(TestOutcome {
                statistic: 0.0,
                p_value: 1.0,
            })
        }
    };
    let df = (n - 2) as f64;
    if r.abs() >= 1.0 {
        return Some(TestOutcome {
            statistic: r,
            p_value: 0.0,
        });
    }
    let t = r * (df / (1.0 - r * r)).sqrt();
    Some(TestOutcome {
        statistic: r,
        p_value: t_two_sided(t, df),
    })
}

/// Bartlett's test of sphericity on a correlation matrix from `n` cases.
pub fn bartlett_sphericity(corr: &Matrix, n: usize) -> Option<TestOutcome> {
    let p = corr.len();
    if p < 2 || n < 2 {
        return None;
    }
    let det = determinant(corr);
    if det <= 0.0 || !det.is_finite() {
        return None;
    }
    let pf = p as f64;
    let chi2 = -((n as f64 - 1.0) - (2.0 * pf + 5.0) / 6.0) * det.ln();
    let df = pf * (pf - 1.0) / 2.0;
    Some(TestOutcome {
        statistic: chi2,
        p_value: chi_square_sf(chi2, df),
    })
}

/// Overall Kaiser-Meyer-Olkin measure of sampling adequacy.
pub fn kaiser_meyer_olkin(corr: &Matrix) -> Option<f64> {
    let p = corr.len();
    if p < 2 {
        return None;
    }
    let inv = invert(corr)?;
    let mut r2 = 0.0;
    let mut partial2 = 0.0;
    for i in 0..p {
        for j in 0..p {
            if i == j {
                continue;
            }
            r2 += corr[i][j].powi(2);
            let denom = (inv[i][i] * inv[j][j]).sqrt();
            if denom > 0.0 {
                partial2 += (-inv[i][j] / denom).powi(2);
            }
        }
    }
    if r2 + partial2 <= 0.0 {
        return None;
    }
    Some(r2 / (r2 + partial2))
}

/// Mardia's tests of multivariate skewness and kurtosis on complete cases.
pub fn mardia(cases: &[Vec<f64>]) -> Option<MardiaOutcome> {
    let n = cases.len();
    let p = cases.first()?.len();
    if p == 0 || n <= p + 1 {
        return None;
    }
    let cov = covariance(cases, 0)?;
    let inv = invert(&cov)?;
    let means: Vec<f64> = (0..p)
        .map(|j| cases.iter().map(|r| r[j]).sum::<f64>() / n as f64)
        .collect();
    let centred: Vec<Vec<f64>> = cases
        .iter()
        .map(|r| r.iter().zip(&means).map(|(v, m)| v - m).collect())
        .collect();
    let transformed: Vec<Vec<f64>> = centred
        .iter()
        .map(|c| {
            (0..p)
                .map(|i| (0..p).map(|j| inv[i][j] * c[j]).sum())
                .collect()
        })
        .collect();

    let nf = n as f64;
    let pf = p as f64;
    // b1 = n⁻² Σᵢⱼ (cᵢ·S⁻¹cⱼ)³ = n⁻² Σₐᵦᵧ C[a,b,c] · T[a,b,c], where C and T are
    // the summed third-order products of the centred and transformed cases.
    let centred_moments = third_moments(&centred, p);
    let transformed_moments = third_moments(&transformed, p);
    let b1 = centred_moments
        .iter()
        .zip(&transformed_moments)
        .map(|(c, t)| c * t)
        .sum::<f64>()
        / (nf * nf);
    let b2 = centred
        .iter()
        .zip(&transformed)
        .map(|(c, t)| c.iter().zip(t).map(|(a, b)| a * b).sum::<f64>().powi(2))
        .sum::<f64>()
        / nf;

    let skew_stat = nf * b1 / 6.0;
    let skew_df = pf * (pf + 1.0) * (pf + 2.0) / 6.0;
    let kurt_stat = (b2 - pf * (pf + 2.0)) / (8.0 * pf * (pf + 2.0) / nf).sqrt();

    Some(MardiaOutcome {
        skewness: b1,
        skewness_statistic: skew_stat,
        skewness_p: chi_square_sf(skew_stat, skew_df),
        kurtosis: b2,
        kurtosis_statistic: kurt_stat,
        kurtosis_p: (2.0 * normal_sf(kurt_stat.abs())).min(1.0),
    })
}

/// `Σᵢ xᵢₐ xᵢᵦ xᵢᵧ` for every index triple, flattened `a * p² + b * p + c`.
fn third_moments(rows: &[Vec<f64>], p: usize) -> Vec<f64> {
    let mut out = vec![0.0; p * p * p];
    for row in rows {
        for a in 0..p {
            for b in 0..p {
                let ab = row[a] * row[b];
                let base = (a * p + b) * p;
                for c in 0..p {
                    out[base + c] += ab * row[c];
                }
            }
        }
    }
    out
}
