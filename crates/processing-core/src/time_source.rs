//! Time sources for the first table column.
//!
//! The label of the first column selects how its cells are read:
//! `Time(Sec)` holds duration strings, `File name` holds timestamped
//! image names. Both map a raw cell to seconds, or to nothing.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use insitu_common::error::{InsituError, InsituResult};

/// Label of a duration-string first column.
pub const DURATION_LABEL: &str = "Time(Sec)";

/// Label of an image-filename first column.
pub const FILENAME_LABEL: &str = "File name";

/// How the time-like first column is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// `H:M:S[.fff]` or `M:S[.fff]`.
    Duration,
    /// `image-HHMMSS_fff.jpg`.
    Filename,
}

impl TimeSource {
    /// Pick a source from the first column's label.
    pub fn from_label(label: &str) -> InsituResult<Self> {
        match label.trim() {
            DURATION_LABEL => Ok(Self::Duration),
            FILENAME_LABEL => Ok(Self::Filename),
            other => Err(InsituError::schema(format!(
                "unsupported first column {other:?} (expected {DURATION_LABEL:?} or {FILENAME_LABEL:?})"
            ))),
        }
    }

    /// Seconds encoded by `raw`, or `None` when it does not parse.
    pub fn parse(&self, raw: &str) -> Option<f64> {
        match self {
            Self::Duration => parse_duration(raw),
            Self::Filename => ImageStamp::parse(raw).map(|s| s.total_seconds()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Duration => DURATION_LABEL,
            Self::Filename => FILENAME_LABEL,
        }
    }
}

impl fmt::Display for TimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parse `H:M:S[.fff]` or `M:S[.fff]` into seconds.
///
/// Each field is a non-negative decimal number; hours default to zero
/// in the two-field form.
pub fn parse_duration(raw: &str) -> Option<f64> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    let fields = parts
        .iter()
        .map(|p| parse_field(p))
        .collect::<Option<Vec<f64>>>()?;

    let (hours, minutes, seconds) = match fields.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0.0, *m, *s),
        _ => return None,
    };
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn parse_field(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn image_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^image-(\d{2})(\d{2})(\d{2})_(\d{3})\.jpg$").expect("static regex is valid")
    })
}

/// Time-of-day decoded from an image name like `image-161547_677.jpg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageStamp {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub millis: u32,
}

impl ImageStamp {
    /// Decode a bare file name (no directory part).
    pub fn parse(name: &str) -> Option<Self> {
        let caps = image_name_pattern().captures(name.trim())?;
        let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        Some(Self {
            hours: field(1)?,
            minutes: field(2)?,
            seconds: field(3)?,
            millis: field(4)?,
        })
    }

    /// `hh*3600 + mm*60 + ss + ms/1000`.
    pub fn total_seconds(&self) -> f64 {
        f64::from(self.hours) * 3600.0
            + f64::from(self.minutes) * 60.0
            + f64::from(self.seconds)
            + f64::from(self.millis) / 1000.0
    }

    /// Sort key in the `HHMMSS_fff` form used by the file names.
    pub fn key(&self) -> String {
        format!(
            "{:02}{:02}{:02}_{:03}",
            self.hours, self.minutes, self.seconds, self.millis
        )
    }

    /// Human-readable `HHhMMmSS.fffs`.
    pub fn display_time(&self) -> String {
        format!(
            "{:02}h{:02}m{:02}.{:03}s",
            self.hours, self.minutes, self.seconds, self.millis
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_dispatch() {
        assert_eq!(TimeSource::from_label("Time(Sec)").unwrap(), TimeSource::Duration);
        assert_eq!(TimeSource::from_label("File name").unwrap(), TimeSource::Filename);
        let err = TimeSource::from_label("Displacement").unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_duration_formats() {
        assert_eq!(parse_duration("00:00:05"), Some(5.0));
        assert_eq!(parse_duration("01:02:03"), Some(3723.0));
        assert_eq!(parse_duration("2:30.5"), Some(150.5));
        assert_eq!(parse_duration(" 0:0:1.250 "), Some(1.25));
    }

    #[test]
    fn test_duration_rejects_garbage() {
        assert_eq!(parse_duration("bad"), None);
        assert_eq!(parse_duration("12"), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
        assert_eq!(parse_duration("00:-1:00"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("00::05"), None);
    }

    #[test]
    fn test_image_stamp_literal_computation() {
        let stamp = ImageStamp::parse("image-161547_677.jpg").unwrap();
        assert_eq!(stamp.key(), "161547_677");
        assert_eq!(stamp.display_time(), "16h15m47.677s");
        let expected = 16.0 * 3600.0 + 15.0 * 60.0 + 47.0 + 0.677;
        assert!((stamp.total_seconds() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_image_stamp_requires_exact_pattern() {
        assert!(ImageStamp::parse("image-16154_677.jpg").is_none());
        assert!(ImageStamp::parse("image-161547_677.png").is_none());
        assert!(ImageStamp::parse("frames/image-161547_677.jpg").is_none());
        assert!(ImageStamp::parse("img-161547_677.jpg").is_none());
    }
}
