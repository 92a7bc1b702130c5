//! Small dense square matrices stored row-major as `Vec<Vec<f64>>`.

/// Row-major dense matrix.
pub type Matrix = Vec<Vec<f64>>;

const SINGULAR_PIVOT: f64 = 1e-12;

/// Covariance matrix of complete cases (`ddof` = 0 for population, 1 for sample).
pub fn covariance(cases: &[Vec<f64>], ddof: usize) -> Option<Matrix> {
    let n = cases.len();
    let p = cases.first()?.len();
    if n <= ddof || p == 0 {
        return None;
    }
    let means: Vec<f64> = (0..p)
        .map(|j| cases.iter().map(|r| r[j]).sum::<f64>() / n as f64)
        .collect();
    let mut cov = vec![vec![0.0; p]; p];
    for row in cases {
        for i in 0..p {
            let di = row[i] - means[i];
            for j in i..p {
                cov[i][j] += di * (row[j] - means[j]);
            }
        }
    }
    let denom = (n - ddof) as f64;
    for i in 0..p {
        for j in i..p {
            cov[i][j] /= denom;
            cov[j][i] = cov[i][j];
        }
    }
    Some(cov)
}

/// Correlation matrix of complete cases; `None` if any variable is constant.
pub fn correlation(cases: &[Vec<f64>]) -> Option<Matrix> {
    let cov = covariance(cases, 1)?;
    let p = cov.len();
    let sd: Vec<f64> = (0..p).map(|i| cov[i][i].sqrt()).collect();
    if sd.iter().any(|s| *s <= 0.0 || !s.is_finite()) {
        return None;
    }
    let mut corr = vec![vec![0.0; p]; p];
    for i in 0..p {
        for j in 0..p {
            corr[i][j] = if i == j {
                1.0
            } else {
                (cov[i][j] / (sd[i] * sd[j])).clamp(-1.0, 1.0)
            };
        }
    }
    Some(corr)
}

/// Determinant by LU decomposition with partial pivoting.
pub fn determinant(m: &Matrix) -> f64 {
    let n = m.len();
    let mut a = m.clone();
    let mut det = 1.0;
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < f64::MIN_POSITIVE {
            return 0.0;
        }
        if pivot != col {
            a.swap(pivot, col);
            det = -det;
        }
        det *= a[col][col];
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
        }
    }
    det
}

/// Inverse by Gauss-Jordan elimination; `None` when (numerically) singular.
pub fn invert(m: &Matrix) -> Option<Matrix> {
    let n = m.len();
    let mut a: Matrix = m
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();

    for col in 0..n {
        let pivot = (col..n).max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))?;
        if a[pivot][col].abs() < SINGULAR_PIVOT {
            return None;
        }
        a.swap(pivot, col);
        let diag = a[col][col];
        for v in a[col].iter_mut() {
            *v /= diag;
        }
        for row in 0..n {
            if row != col {
                let factor = a[row][col];
                if factor != 0.0 {
                    for k in 0..2 * n {
                        a[row][k] -= factor * a[col][k];
                    }
                }
            }
        }
    }

    Some(a.into_iter().map(|r| r[n..].to_vec()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinant() {
        let m = vec![vec![4.0, 3.0], vec![6.0, 3.0]];
        assert!((determinant(&m) + 6.0).abs() < 1e-12);
        let singular = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(determinant(&singular).abs() < 1e-12);
    }

    #[test]
    fn test_invert() {
        let m = vec![vec![4.0, 7.0], vec![2.0, 6.0]];
        let inv = invert(&m).unwrap();
        assert!((inv[0][0] - 0.6).abs() < 1e-12);
        assert!((inv[0][1] + 0.7).abs() < 1e-12);
        assert!((inv[1][0] + 0.2).abs() < 1e-12);
        assert!((inv[1][1] - 0.4).abs() < 1e-12);
        assert!(invert(&vec![vec![1.0, 2.0], vec![2.0, 4.0]]).is_none());
    }

    #[test]
    fn test_correlation_matrix() {
        let cases = vec![
            vec![1.0, 2.0, 5.0],
            vec![2.0, 4.0, 3.0],
            vec![3.0, 6.0, 4.0],
            vec![4.0, 8.0, 1.0],
        ];
        let r = correlation(&cases).unwrap();
        assert!((r[0][1] - 1.0).abs() < 1e-12);
        assert_eq!(r[2][2], 1.0);
        assert!(r[0][2] < 0.0);

        let constant = vec![vec![1.0, 1.0], vec![2.0, 1.0], vec![3.0, 1.0]];
        assert!(correlation(&constant).is_none());
    }
}
