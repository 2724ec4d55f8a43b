//! Small dense least-squares solver.
//!
//! Householder QR on row-major matrices. Sized for polynomial fits with
//! a handful of columns; no attempt at blocking or pivoting.

/// Solve `min ||A x - b||` for a tall `rows x cols` matrix `a`.
///
/// Returns `None` when the shapes disagree, the system is
/// under-determined, or `A` is numerically rank deficient.
pub fn lstsq(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let rows = a.len();
    let cols = a.first()?.len();
    if cols == 0 || rows < cols || b.len() != rows || a.iter().any(|r| r.len() != cols) {
        return None;
    }

    let mut r: Vec<Vec<f64>> = a.to_vec();
    let mut qtb = b.to_vec();
    let scale = r
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let tol = scale * 1e-12 * rows as f64;

    for k in 0..cols {
        let norm = (k..rows).map(|i| r[i][k] * r[i][k]).sum::<f64>().sqrt();
        if norm <= tol {
            return None;
        }
        let alpha = if r[k][k] > 0.0 { -norm } else { norm };

        let mut v: Vec<f64> = (k..rows).map(|i| r[i][k]).collect();
        v[0] -= alpha;
        let v_norm_sq: f64 = v.iter().map(|x| x * x).sum();
        if v_norm_sq == 0.0 {
            continue;
        }

        for j in k..cols {
            let dot: f64 = (k..rows).map(|i| v[i - k] * r[i][j]).sum();
            let f = 2.0 * dot / v_norm_sq;
            for i in k..rows {
                r[i][j] -= f * v[i - k];
            }
        }

        let dot: f64 = (k..rows).map(|i| v[i - k] * qtb[i]).sum();
        let f = 2.0 * dot / v_norm_sq;
        for i in k..rows {
            qtb[i] -= f * v[i - k];
        }
    }

    let mut x = vec![0.0; cols];
    for k in (0..cols).rev() {
        let tail: f64 = (k + 1..cols).map(|j| r[k][j] * x[j]).sum();
        x[k] = (qtb[k] - tail) / r[k][k];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Vandermonde matrix with columns `t^0 .. t^degree`.
pub fn vandermonde(ts: &[f64], degree: usize) -> Vec<Vec<f64>> {
    ts.iter()
        .map(|&t| {
            let mut row = Vec::with_capacity(degree + 1);
            let mut p = 1.0;
            for _ in 0..=degree {
                row.push(p);
                p *= t;
            }
            row
        })
        .collect()
}

/// Evaluate `c0 + c1 t + c2 t^2 + ...` by Horner's rule.
pub fn horner(coefficients: &[f64], t: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * t + c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_line_is_recovered() {
        let ts = [0.0, 1.0, 2.0, 3.0];
        let ys: Vec<f64> = ts.iter().map(|t| 2.0 + 3.0 * t).collect();
        let x = lstsq(&vandermonde(&ts, 1), &ys).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-10);
        assert!((x[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_overdetermined_fit_minimizes_residual() {
        // A constant fit is the mean of the observations.
        let a = vandermonde(&[-1.0, 0.0, 1.0, 0.0], 0);
        let x = lstsq(&a, &[1.0, 1.0, 1.0, 5.0]).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rank_deficient_returns_none() {
        let a = vandermonde(&[1.0, 1.0, 1.0], 2);
        assert!(lstsq(&a, &[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn test_underdetermined_returns_none() {
        let a = vandermonde(&[0.0, 1.0], 2);
        assert!(lstsq(&a, &[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_horner_matches_direct_evaluation() {
        let c = [1.0, -2.0, 0.5];
        let t = 3.0;
        assert!((horner(&c, t) - (1.0 - 6.0 + 4.5)).abs() < 1e-12);
    }
}
