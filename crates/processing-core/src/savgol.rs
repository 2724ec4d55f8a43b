//! Savitzky-Golay smoothing.
//!
//! Interior samples are convolved with the least-squares coefficients of
//! a centered window. The first and last `window / 2` samples are taken
//! from a polynomial fitted to the first/last full window instead of
//! padding the signal.

use insitu_common::error::{InsituError, InsituResult};
use insitu_data_model::sample::SmoothedCurve;

use crate::linalg::{horner, lstsq, vandermonde};

/// Smoothing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmoothingConfig {
    /// Window length; must be odd and greater than `polyorder`.
    pub window: usize,

    /// Degree of the local polynomial.
    pub polyorder: usize,

    /// Shrink the window to the largest odd length that fits the data
    /// instead of failing when the series is shorter than `window`.
    pub shrink_to_fit: bool,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 37,
            polyorder: 2,
            shrink_to_fit: false,
        }
    }
}

impl SmoothingConfig {
    /// Window length to use for a series of `len` samples.
    pub fn resolve_window(&self, len: usize) -> InsituResult<usize> {
        if self.window <= len {
            return Ok(self.window);
        }
        if !self.shrink_to_fit {
            return Err(InsituError::insufficient_data(format!(
                "smoothing window {} exceeds the {len} available samples",
                self.window
            )));
        }

        let shrunk = if len % 2 == 1 { len } else { len.saturating_sub(1) };
        if shrunk <= self.polyorder {
            return Err(InsituError::insufficient_data(format!(
                "{len} samples cannot support a polynomial of order {}",
                self.polyorder
            )));
        }
        tracing::debug!(configured = self.window, shrunk, "Shrinking smoothing window");
        Ok(shrunk)
    }
}

/// A configured Savitzky-Golay filter.
#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window: usize,
    polyorder: usize,
    coefficients: Vec<f64>,
}

impl SavitzkyGolay {
    /// Build a filter; the window must be odd and exceed `polyorder`.
    pub fn new(window: usize, polyorder: usize) -> InsituResult<Self> {
        if window % 2 == 0 {
            return Err(InsituError::config(format!(
                "smoothing window must be odd, got {window}"
            )));
        }
        if window <= polyorder {
            return Err(InsituError::config(format!(
                "smoothing window {window} must exceed polynomial order {polyorder}"
            )));
        }

        let half = (window / 2) as f64;
        let positions: Vec<f64> = (0..window).map(|i| i as f64 - half).collect();
        let design = vandermonde(&positions, polyorder);

        let mut coefficients = Vec::with_capacity(window);
        let mut unit = vec![0.0; window];
        for k in 0..window {
            unit[k] = 1.0;
            let fit = lstsq(&design, &unit).ok_or_else(|| {
                InsituError::config(format!(
                    "degenerate smoothing design (window {window}, order {polyorder})"
                ))
            })?;
            coefficients.push(fit[0]);
            unit[k] = 0.0;
        }

        Ok(Self {
            window,
            polyorder,
            coefficients,
        })
    }

    /// Build a filter sized for a series of `len` samples.
    pub fn for_length(config: &SmoothingConfig, len: usize) -> InsituResult<Self> {
        Self::new(config.resolve_window(len)?, config.polyorder)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn polyorder(&self) -> usize {
        self.polyorder
    }

    /// Convolution coefficients, centered on the middle entry.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Smooth `signal`; output has the same length.
    pub fn apply(&self, signal: &[f64]) -> InsituResult<Vec<f64>> {
        let n = signal.len();
        if n < self.window {
            return Err(InsituError::insufficient_data(format!(
                "smoothing window {} exceeds the {n} available samples",
                self.window
            )));
        }

        let half = self.window / 2;
        let mut out = vec![0.0; n];

        for i in half..n - half {
            out[i] = signal[i - half..=i + half]
                .iter()
                .zip(&self.coefficients)
                .map(|(x, c)| x * c)
                .sum();
        }

        let left = self.fit_edge(&signal[..self.window])?;
        for (i, slot) in out.iter_mut().enumerate().take(half) {
            *slot = horner(&left, i as f64);
        }

        let start = n - self.window;
        let right = self.fit_edge(&signal[start..])?;
        for j in self.window - half..self.window {
            out[start + j] = horner(&right, j as f64);
        }

        Ok(out)
    }

    fn fit_edge(&self, segment: &[f64]) -> InsituResult<Vec<f64>> {
        let positions: Vec<f64> = (0..segment.len()).map(|i| i as f64).collect();
        lstsq(&vandermonde(&positions, self.polyorder), segment).ok_or_else(|| {
            InsituError::insufficient_data("edge polynomial fit is rank deficient or non-finite")
        })
    }
}

/// Smooth both columns with one filter sized for their common length.
pub fn smooth_curve(
    epsilon: &[f64],
    sigma: &[f64],
    config: &SmoothingConfig,
) -> InsituResult<SmoothedCurve> {
    if epsilon.len() != sigma.len() {
        return Err(InsituError::parse(format!(
            "strain and stress columns differ in length ({} vs {})",
            epsilon.len(),
            sigma.len()
        )));
    }

    let filter = SavitzkyGolay::for_length(config, epsilon.len())?;
    tracing::info!(
        samples = epsilon.len(),
        window = filter.window(),
        polyorder = filter.polyorder(),
        "Smoothing curve"
    );
    Ok(SmoothedCurve::new(filter.apply(epsilon)?, filter.apply(sigma)?))
}
