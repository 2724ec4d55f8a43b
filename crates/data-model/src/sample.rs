//! Sample, time series, and smoothed curve types.
//!
//! A run builds these once, keeps them in memory for the duration of the
//! pipeline, and drops them after the outputs are written.

use std::fmt;

use serde::Serialize;

/// Column holding strain values.
pub const EPSILON_COLUMN: &str = "ε (%)";

/// Column holding stress values.
pub const SIGMA_COLUMN: &str = "σ (MPa)";

/// One input row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Raw content of the time-like first column.
    pub raw_time: String,
    /// Strain, percent.
    pub epsilon: f64,
    /// Stress, MPa.
    pub sigma: f64,
}

impl Sample {
    pub fn new(raw_time: impl Into<String>, epsilon: f64, sigma: f64) -> Self {
        Self {
            raw_time: raw_time.into(),
            epsilon,
            sigma,
        }
    }
}

/// Why a row was left out of the series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RowRejection {
    /// The time field matched neither supported format.
    UnparseableTime { row: usize, raw: String },
    /// A required numeric cell was empty or non-numeric.
    MissingValue { row: usize, column: String },
}

impl RowRejection {
    /// Zero-based data row index (header excluded).
    pub fn row(&self) -> usize {
        match self {
            Self::UnparseableTime { row, .. } | Self::MissingValue { row, .. } => *row,
        }
    }
}

impl fmt::Display for RowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnparseableTime { row, raw } => {
                write!(f, "row {row}: unparseable time field {raw:?}")
            }
            Self::MissingValue { row, column } => {
                write!(f, "row {row}: missing numeric value in {column:?}")
            }
        }
    }
}

/// Retained samples with derived elapsed and playback times.
///
/// All vectors have the same length. `elapsed_secs[0]` is zero whenever
/// the series is non-empty.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    samples: Vec<Sample>,
    source_rows: Vec<usize>,
    elapsed_secs: Vec<f64>,
    playback_secs: Vec<f64>,
}

impl TimeSeries {
    /// Assemble a series. Panics if the vectors disagree in length,
    /// which would be a bug in the normalizer.
    pub fn new(
        samples: Vec<Sample>,
        source_rows: Vec<usize>,
        elapsed_secs: Vec<f64>,
        playback_secs: Vec<f64>,
    ) -> Self {
        assert_eq!(samples.len(), source_rows.len());
        assert_eq!(samples.len(), elapsed_secs.len());
        assert_eq!(samples.len(), playback_secs.len());
        Self {
            samples,
            source_rows,
            elapsed_secs,
            playback_secs,
        }
    }

    /// Data row index each retained sample came from.
    pub fn source_rows(&self) -> &[usize] {
        &self.source_rows
    }

    pub fn elapsed_secs(&self) -> &[f64] {
        &self.elapsed_secs
    }

    /// Playback offsets from the zero epoch, in seconds. Negative when
    /// the input is not sorted by time.
    pub fn playback_secs(&self) -> &[f64] {
        &self.playback_secs
    }

    pub fn epsilon(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.epsilon).collect()
    }

    pub fn sigma(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.sigma).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Smoothed strain/stress arrays, fixed after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmoothedCurve {
    epsilon: Vec<f64>,
    sigma: Vec<f64>,
}

impl SmoothedCurve {
    /// Panics if the arrays differ in length.
    pub fn new(epsilon: Vec<f64>, sigma: Vec<f64>) -> Self {
        assert_eq!(epsilon.len(), sigma.len());
        Self { epsilon, sigma }
    }

    pub fn epsilon(&self) -> &[f64] {
        &self.epsilon
    }

    pub fn sigma(&self) -> &[f64] {
        &self.sigma
    }

    pub fn len(&self) -> usize {
        self.epsilon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epsilon.is_empty()
    }

    /// Point `i` as `(epsilon, sigma)`.
    pub fn point(&self, i: usize) -> Option<(f64, f64)> {
        Some((*self.epsilon.get(i)?, *self.sigma.get(i)?))
    }

    /// `[min, max]` over the whole epsilon series.
    pub fn epsilon_range(&self) -> Option<(f64, f64)> {
        finite_range(&self.epsilon)
    }

    /// `[min, max]` over the whole sigma series.
    pub fn sigma_range(&self) -> Option<(f64, f64)> {
        finite_range(&self.sigma)
    }
}

/// `[min, max]` over the finite values of a slice.
pub fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_ranges_cover_full_series() {
        let curve = SmoothedCurve::new(vec![0.5, 2.0, 1.0], vec![10.0, 5.0, 30.0]);
        assert_eq!(curve.epsilon_range(), Some((0.5, 2.0)));
        assert_eq!(curve.sigma_range(), Some((5.0, 30.0)));
        assert_eq!(curve.point(1), Some((2.0, 5.0)));
        assert_eq!(curve.point(3), None);
    }

    #[test]
    fn test_finite_range_ignores_nan() {
        assert_eq!(finite_range(&[f64::NAN, 1.0, 3.0]), Some((1.0, 3.0)));
        assert_eq!(finite_range(&[]), None);
    }

    #[test]
    fn test_rejection_display_names_row() {
        let r = RowRejection::UnparseableTime {
            row: 2,
            raw: "bad".to_string(),
        };
        assert_eq!(r.row(), 2);
        assert_eq!(r.to_string(), "row 2: unparseable time field \"bad\"");
    }

    #[test]
    fn test_series_exposes_columns() {
        let series = TimeSeries::new(
            vec![Sample::new("a", 1.0, 2.0), Sample::new("b", 3.0, 4.0)],
            vec![0, 2],
            vec![0.0, 1.5],
            vec![0.0, 0.03],
        );
        assert_eq!(series.epsilon(), vec![1.0, 3.0]);
        assert_eq!(series.sigma(), vec![2.0, 4.0]);
        assert_eq!(series.source_rows(), &[0, 2]);
        assert_eq!(series.playback_secs(), &[0.0, 0.03]);
    }
}
