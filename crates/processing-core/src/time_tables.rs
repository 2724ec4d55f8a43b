//! Time-offset tables.
//!
//! Two small reports used to line up acquisition logs:
//! offsets between timestamped image files, and offsets between
//! clock readings logged in a `Time(Sec)` column.

use chrono::{NaiveTime, Timelike};

use insitu_common::error::{InsituError, InsituResult};
use insitu_data_model::table::{CellValue, Table};

use crate::time_source::{ImageStamp, DURATION_LABEL, FILENAME_LABEL};

/// Header of the offset column in the image timestamp table.
pub const IMAGE_OFFSET_LABEL: &str = "Time difference (s)";

/// Header of the offset column in the logged-time table.
pub const LOGGED_OFFSET_LABEL: &str = "Time Difference (s)";

/// One timestamped image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTimestamp {
    pub file_name: String,
    pub stamp: ImageStamp,
    /// Seconds after the earliest image, rounded to milliseconds.
    pub offset_secs: f64,
}

/// Decode, sort, and offset a set of image file names.
///
/// Names that do not follow the `image-HHMMSS_fff.jpg` pattern are
/// skipped. Sorting is by time of day; the earliest image is the base.
pub fn image_timestamps<S: AsRef<str>>(names: &[S]) -> Vec<ImageTimestamp> {
    let mut stamped: Vec<(String, ImageStamp)> = names
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            match ImageStamp::parse(name) {
                Some(stamp) => Some((name.to_string(), stamp)),
                None => {
                    tracing::debug!(name, "Ignoring file without an image timestamp");
                    None
                }
            }
        })
        .collect();
    stamped.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    let Some(base) = stamped.first().map(|(_, s)| s.total_seconds()) else {
        return Vec::new();
    };

    stamped
        .into_iter()
        .map(|(file_name, stamp)| ImageTimestamp {
            offset_secs: round_millis(stamp.total_seconds() - base),
            file_name,
            stamp,
        })
        .collect()
}

/// Build the image timestamp sheet (`File name`, offset, readable time).
pub fn image_timestamp_table<S: AsRef<str>>(
    sheet: &str,
    names: &[S],
) -> InsituResult<Table> {
    let stamps = image_timestamps(names);
    if stamps.is_empty() {
        return Err(InsituError::insufficient_data(
            "no file names match image-HHMMSS_fff.jpg",
        ));
    }

    let mut table = Table::new(
        sheet,
        vec![
            FILENAME_LABEL.to_string(),
            IMAGE_OFFSET_LABEL.to_string(),
            "Time".to_string(),
        ],
    );
    for s in stamps {
        table.push_row(vec![
            CellValue::Text(s.file_name),
            CellValue::Number(s.offset_secs),
            CellValue::Text(s.stamp.display_time()),
        ]);
    }
    Ok(table)
}

/// Parse a logged clock reading.
///
/// Accepted forms are `HH:MM:SS ffffff` (fraction after a space, read as
/// leading digits of the second), `HH:MM:SS.fff`, and `HH:MM:SS`.
pub fn parse_logged_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    let (clock, fraction) = match raw.split_once(' ') {
        Some((clock, fraction)) => (clock, Some(fraction.trim())),
        None => (raw, None),
    };

    let time = NaiveTime::parse_from_str(clock, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(clock, "%H:%M:%S%.f"))
        .ok()?;

    match fraction {
        None => Some(time),
        Some(digits) => {
            if time.nanosecond() != 0
                || digits.is_empty()
                || digits.len() > 6
                || !digits.chars().all(|c| c.is_ascii_digit())
            {
                return None;
            }
            let micros: u32 = format!("{digits:0<6}").parse().ok()?;
            time.with_nanosecond(micros * 1_000)
        }
    }
}

/// Offset every `Time(Sec)` reading against the first parseable one.
///
/// Unparseable readings keep their row with an empty offset.
pub fn logged_time_offsets(table: &Table) -> InsituResult<Vec<Option<f64>>> {
    let raw = table.text_column(DURATION_LABEL)?;

    let mut base: Option<NaiveTime> = None;
    let offsets = raw
        .iter()
        .map(|cell| {
            let time = parse_logged_time(cell)?;
            let base = *base.get_or_insert(time);
            let delta = time.signed_duration_since(base);
            delta
                .num_microseconds()
                .map(|us| us as f64 / 1_000_000.0)
        })
        .collect::<Vec<_>>();

    let skipped = offsets.iter().filter(|o| o.is_none()).count();
    if skipped > 0 {
        tracing::warn!(skipped, sheet = %table.name, "Unparseable time readings left blank");
    }
    Ok(offsets)
}

/// Build the logged-time offset sheet (`Time(Sec)`, offset).
pub fn logged_time_table(input: &Table, sheet: &str) -> InsituResult<Table> {
    let offsets = logged_time_offsets(input)?;
    let originals = input
        .column(DURATION_LABEL)?
        .into_iter()
        .cloned()
        .collect();

    Ok(Table::from_columns(
        sheet,
        vec![
            (DURATION_LABEL.to_string(), originals),
            (
                LOGGED_OFFSET_LABEL.to_string(),
                offsets.into_iter().map(CellValue::from).collect(),
            ),
        ],
    )?)
}

fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}
