//! Least-squares polynomial fitting.
//!
//! The fit is done in a scaled variable: the data domain `[min x, max x]`
//! maps linearly onto `[-1, 1]`, which keeps high-degree fits well
//! conditioned. Evaluation applies the same mapping.

use serde::Serialize;

use insitu_common::error::{InsituError, InsituResult};
use insitu_data_model::table::{CellValue, Workbook};

use crate::linalg::{horner, lstsq, vandermonde};

/// Sheet with the measured `x`/`y` pairs.
pub const FITTING_SHEET: &str = "fitting data";

/// Sheet with the `x` values to evaluate; `y` is written back here.
pub const CALCULATION_SHEET: &str = "calculation data";

/// A fitted polynomial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolynomialFit {
    /// Coefficients in the scaled variable, lowest degree first.
    coefficients: Vec<f64>,
    /// Data domain mapped onto `[-1, 1]`.
    domain: (f64, f64),
}

impl PolynomialFit {
    /// Fit a polynomial of `degree` through `(xs, ys)`.
    pub fn fit(xs: &[f64], ys: &[f64], degree: usize) -> InsituResult<Self> {
        if xs.len() != ys.len() {
            return Err(InsituError::parse(format!(
                "x and y differ in length ({} vs {})",
                xs.len(),
                ys.len()
            )));
        }
        if xs.iter().chain(ys).any(|v| !v.is_finite()) {
            return Err(InsituError::parse("fitting data contains non-finite values"));
        }

        let (lo, hi) = xs
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        if xs.is_empty() || lo == hi {
            return Err(InsituError::insufficient_data(
                "fitting data needs at least two distinct x values",
            ));
        }

        let mut distinct = xs.to_vec();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        if distinct.len() <= degree {
            return Err(InsituError::insufficient_data(format!(
                "degree {degree} needs at least {} distinct x values, got {}",
                degree + 1,
                distinct.len()
            )));
        }

        let domain = (lo, hi);
        let ts: Vec<f64> = xs.iter().map(|&x| map_to_window(x, domain)).collect();
        let coefficients = lstsq(&vandermonde(&ts, degree), ys).ok_or_else(|| {
            InsituError::insufficient_data(format!("degree {degree} fit is rank deficient"))
        })?;

        tracing::debug!(degree, points = xs.len(), ?domain, "Fitted polynomial");
        Ok(Self {
            coefficients,
            domain,
        })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    /// Evaluate at `x` (extrapolates outside the domain).
    pub fn eval(&self, x: f64) -> f64 {
        horner(&self.coefficients, map_to_window(x, self.domain))
    }

    /// Root-mean-square residual over `(xs, ys)`.
    pub fn rms_residual(&self, xs: &[f64], ys: &[f64]) -> f64 {
        if xs.is_empty() {
            return 0.0;
        }
        let sum: f64 = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| (self.eval(x) - y).powi(2))
            .sum();
        (sum / xs.len() as f64).sqrt()
    }
}

fn map_to_window(x: f64, (lo, hi): (f64, f64)) -> f64 {
    (2.0 * x - (lo + hi)) / (hi - lo)
}

/// `count` evenly spaced values over `[start, end]`, both ends included.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Result of fitting a workbook.
#[derive(Debug, Clone, Serialize)]
pub struct WorkbookFit {
    pub fit: PolynomialFit,
    /// Points the polynomial was fitted through.
    pub fitting_points: Vec<(f64, f64)>,
    /// Evaluated calculation points (rows with a numeric `x`).
    pub calculated_points: Vec<(f64, f64)>,
    pub rms_residual: f64,
}

/// Fit `y(x)` on the fitting sheet and write `y` into the calculation sheet.
///
/// Fitting rows missing either value are ignored. Calculation rows
/// without a numeric `x` get an empty `y`. Other sheets are untouched.
pub fn fit_calculation_sheet(workbook: &mut Workbook, degree: usize) -> InsituResult<WorkbookFit> {
    let fitting = workbook.require_sheet(FITTING_SHEET)?;
    let xs = fitting.numeric_column("x")?;
    let ys = fitting.numeric_column("y")?;
    let fitting_points: Vec<(f64, f64)> = xs
        .iter()
        .zip(&ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    let ignored = xs.len() - fitting_points.len();
    if ignored > 0 {
        tracing::warn!(ignored, sheet = FITTING_SHEET, "Ignoring incomplete fitting rows");
    }

    let (fx, fy): (Vec<f64>, Vec<f64>) = fitting_points.iter().copied().unzip();
    let fit = PolynomialFit::fit(&fx, &fy, degree)?;
    let rms_residual = fit.rms_residual(&fx, &fy);

    let calculation = workbook
        .sheet_mut(CALCULATION_SHEET)
        .ok_or_else(|| InsituError::schema(format!("sheet {CALCULATION_SHEET:?} not found")))?;
    let calc_x = calculation.numeric_column("x")?;
    let values: Vec<Option<f64>> = calc_x.iter().map(|x| x.map(|x| fit.eval(x))).collect();
    let calculated_points = calc_x
        .iter()
        .zip(&values)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    calculation.set_column("y", values.into_iter().map(CellValue::from).collect());

    tracing::info!(degree, points = fx.len(), rms_residual, "Fitted calculation sheet");
    Ok(WorkbookFit {
        fit,
        fitting_points,
        calculated_points,
        rms_residual,
    })
}
