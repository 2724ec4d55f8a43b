pub mod check;
pub mod curve_video;
pub mod image_video;
pub mod merge;
pub mod polyfit;
pub mod time_diff;
pub mod timestamps;

use std::str::FromStr;

/// Axis limits given on the command line as `MIN,MAX`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisPair(pub f64, pub f64);

impl FromStr for AxisPair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s
            .split_once(',')
            .ok_or_else(|| format!("expected MIN,MAX, got {s:?}"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid limit {v:?}: {e}"))
        };
        let (min, max) = (parse(min)?, parse(max)?);
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(format!("limits must satisfy MIN < MAX, got {s:?}"));
        }
        Ok(Self(min, max))
    }
}

impl From<AxisPair> for (f64, f64) {
    fn from(pair: AxisPair) -> Self {
        (pair.0, pair.1)
    }
}
