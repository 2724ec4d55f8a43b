//! Time normalization of loaded tables.
//!
//! Every data row yields either a retained [`Sample`] or a
//! [`RowRejection`]. Retained samples keep their input order; elapsed
//! time is measured from the first retained sample and playback
//! timestamps are elapsed time compressed by the speed factor.

use insitu_common::clock::PlaybackClock;
use insitu_common::error::{InsituError, InsituResult};
use insitu_data_model::sample::{RowRejection, Sample, TimeSeries, EPSILON_COLUMN, SIGMA_COLUMN};
use insitu_data_model::table::Table;

use crate::time_source::TimeSource;

/// A normalized series plus the rows that were left out.
#[derive(Debug, Clone)]
pub struct NormalizedSeries {
    pub source: TimeSource,
    pub series: TimeSeries,
    pub rejections: Vec<RowRejection>,
}

/// Per-row outcome: the parsed time in seconds, or why the row is dropped.
pub fn parse_rows(source: TimeSource, raw: &[String]) -> Vec<Result<f64, RowRejection>> {
    raw.iter()
        .enumerate()
        .map(|(row, cell)| {
            source.parse(cell).ok_or_else(|| RowRejection::UnparseableTime {
                row,
                raw: cell.clone(),
            })
        })
        .collect()
}

/// Elapsed seconds relative to the first entry.
///
/// No sorting is performed; unsorted input yields negative offsets.
pub fn elapsed_from_first(times: &[f64]) -> Vec<f64> {
    match times.first() {
        Some(&base) => times.iter().map(|t| t - base).collect(),
        None => Vec::new(),
    }
}

/// Normalize a table whose first column is a supported time source.
///
/// Fails with a schema error when the first label is unsupported or a
/// required column is missing, and with an insufficient-data error when
/// no row survives.
pub fn normalize_table(table: &Table, speed_factor: f64) -> InsituResult<NormalizedSeries> {
    let clock = PlaybackClock::new(speed_factor)?;

    let label = table
        .first_header()
        .ok_or_else(|| InsituError::schema(format!("sheet {:?} has no columns", table.name)))?;
    let source = TimeSource::from_label(label)?;

    let raw_times = table.text_column(source.label())?;
    let epsilon = table.numeric_column(EPSILON_COLUMN)?;
    let sigma = table.numeric_column(SIGMA_COLUMN)?;

    let mut samples = Vec::new();
    let mut source_rows = Vec::new();
    let mut times = Vec::new();
    let mut rejections = Vec::new();

    for (row, parsed) in parse_rows(source, &raw_times).into_iter().enumerate() {
        let seconds = match parsed {
            Ok(seconds) => seconds,
            Err(rejection) => {
                tracing::warn!(%rejection, source = %source, "Skipping row");
                rejections.push(rejection);
                continue;
            }
        };

        let values = [(EPSILON_COLUMN, epsilon[row]), (SIGMA_COLUMN, sigma[row])];
        if let Some((column, _)) = values.iter().find(|(_, v)| v.is_none()) {
            let rejection = RowRejection::MissingValue {
                row,
                column: column.to_string(),
            };
            tracing::warn!(%rejection, "Skipping row");
            rejections.push(rejection);
            continue;
        }

        samples.push(Sample::new(
            raw_times[row].clone(),
            epsilon[row].unwrap_or_default(),
            sigma[row].unwrap_or_default(),
        ));
        source_rows.push(row);
        times.push(seconds);
    }

    if samples.is_empty() {
        return Err(InsituError::insufficient_data(format!(
            "no valid {source} entries in sheet {:?} ({} rows rejected)",
            table.name,
            rejections.len()
        )));
    }

    let elapsed = elapsed_from_first(&times);
    let playback = clock.playback_timestamps(&elapsed)?;

    tracing::info!(
        source = %source,
        retained = samples.len(),
        rejected = rejections.len(),
        span_secs = elapsed.last().copied().unwrap_or_default(),
        "Normalized time column"
    );

    Ok(NormalizedSeries {
        source,
        series: TimeSeries::new(samples, source_rows, elapsed, playback),
        rejections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use insitu_common::clock::pacing_delay;
    use insitu_data_model::table::CellValue;
    use std::time::Duration;

    fn table(first: &str, times: &[&str], eps: &[Option<f64>], sig: &[Option<f64>]) -> Table {
        Table::from_columns(
            "input_data",
            vec![
                (first.to_string(), times.iter().map(|&t| t.into()).collect()),
                (
                    EPSILON_COLUMN.to_string(),
                    eps.iter().map(|&v| CellValue::from(v)).collect(),
                ),
                (
                    SIGMA_COLUMN.to_string(),
                    sig.iter().map(|&v| CellValue::from(v)).collect(),
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_filename_series_offsets() {
        let names = [
            "image-000000_000.jpg",
            "image-000001_001.jpg",
            "image-000002_002.jpg",
            "image-000003_003.jpg",
            "image-000004_004.jpg",
        ];
        let vals = [Some(1.0); 5];
        let t = table("File name", &names, &vals, &vals);

        let normalized = normalize_table(&t, 50.0).unwrap();
        assert_eq!(normalized.source, TimeSource::Filename);
        let expected = [0.0, 1.001, 2.002, 3.003, 4.004];
        for (got, want) in normalized.series.elapsed_secs().iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "got {got}, want {want}");
        }
    }

    #[test]
    fn test_filename_series_with_growing_millis() {
        let names = [
            "image-000000_000.jpg",
            "image-000001_004.jpg",
            "image-000002_008.jpg",
            "image-000003_012.jpg",
            "image-000004_016.jpg",
        ];
        let vals = [Some(0.5); 5];
        let t = table("File name", &names, &vals, &vals);

        let normalized = normalize_table(&t, 50.0).unwrap();
        let expected = [0.0, 1.004, 2.008, 3.012, 4.016];
        for (got, want) in normalized.series.elapsed_secs().iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "got {got}, want {want}");
        }
    }

    #[test]
    fn test_bad_duration_row_is_dropped_uniformly() {
        let t = table(
            "Time(Sec)",
            &["00:00:00", "00:00:05", "bad", "00:00:10"],
            &[Some(0.1), Some(0.2), Some(0.3), Some(0.4)],
            &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
        );

        let normalized = normalize_table(&t, 50.0).unwrap();
        assert_eq!(normalized.series.elapsed_secs(), &[0.0, 5.0, 10.0]);
        assert_eq!(normalized.series.epsilon(), vec![0.1, 0.2, 0.4]);
        assert_eq!(normalized.series.sigma(), vec![1.0, 2.0, 4.0]);
        assert_eq!(normalized.series.source_rows(), &[0, 1, 3]);
        assert_eq!(normalized.rejections.len(), 1);
        assert_eq!(normalized.rejections[0].row(), 2);
    }

    #[test]
    fn test_missing_numeric_value_drops_row() {
        let t = table(
            "Time(Sec)",
            &["00:00:00", "00:00:01"],
            &[Some(0.1), None],
            &[Some(1.0), Some(2.0)],
        );
        let normalized = normalize_table(&t, 1.0).unwrap();
        assert_eq!(normalized.series.len(), 1);
        assert!(matches!(
            normalized.rejections[0],
            RowRejection::MissingValue { row: 1, .. }
        ));
    }

    #[test]
    fn test_non_finite_text_value_drops_row() {
        let t = Table::from_columns(
            "input_data",
            vec![
                (
                    "Time(Sec)".to_string(),
                    vec!["00:00:00".into(), "00:00:01".into(), "00:00:02".into()],
                ),
                (
                    EPSILON_COLUMN.to_string(),
                    vec![CellValue::Number(0.1), "NaN".into(), CellValue::Number(0.3)],
                ),
                (
                    SIGMA_COLUMN.to_string(),
                    vec![CellValue::Number(1.0), CellValue::Number(2.0), "inf".into()],
                ),
            ],
        )
        .unwrap();

        let normalized = normalize_table(&t, 50.0).unwrap();
        assert_eq!(normalized.series.len(), 1);
        assert_eq!(normalized.series.epsilon(), vec![0.1]);
        assert_eq!(normalized.rejections.len(), 2);
        assert!(matches!(
            &normalized.rejections[0],
            RowRejection::MissingValue { row: 1, column } if column == EPSILON_COLUMN
        ));
        assert!(matches!(
            &normalized.rejections[1],
            RowRejection::MissingValue { row: 2, column } if column == SIGMA_COLUMN
        ));
    }

    #[test]
    fn test_playback_deltas_follow_speed_factor() {
        let t = table(
            "Time(Sec)",
            &["0:00", "0:50"],
            &[Some(0.0), Some(1.0)],
            &[Some(0.0), Some(1.0)],
        );
        let normalized = normalize_table(&t, 50.0).unwrap();
        let playback = normalized.series.playback_secs();
        assert_eq!(playback, &[0.0, 1.0]);
        assert_eq!(pacing_delay(playback, 0), Duration::from_secs(1));
    }

    #[test]
    fn test_unsorted_rows_keep_negative_offsets() {
        let t = table(
            "Time(Sec)",
            &["00:00:10", "00:00:00", "00:00:15"],
            &[Some(0.0); 3],
            &[Some(0.0); 3],
        );
        let normalized = normalize_table(&t, 1.0).unwrap();
        let playback = normalized.series.playback_secs();
        assert_eq!(normalized.series.elapsed_secs(), &[0.0, -10.0, 5.0]);
        assert_eq!(pacing_delay(playback, 0), Duration::ZERO);
        assert_eq!(pacing_delay(playback, 1), Duration::from_secs(15));
    }

    #[test]
    fn test_out_of_range_duration_fails_without_panicking() {
        let t = table(
            "Time(Sec)",
            &["00:00:00", "99999999999999999999:00:00"],
            &[Some(0.0); 2],
            &[Some(0.0); 2],
        );
        let err = normalize_table(&t, 50.0).unwrap_err();
        assert!(matches!(err, InsituError::Parse { .. }), "{err}");
    }

    #[test]
    fn test_first_valid_entry_is_the_base() {
        let t = table(
            "Time(Sec)",
            &["???", "00:01:00", "00:01:30"],
            &[Some(0.0); 3],
            &[Some(0.0); 3],
        );
        let normalized = normalize_table(&t, 50.0).unwrap();
        assert_eq!(normalized.series.elapsed_secs(), &[0.0, 30.0]);
    }

    #[test]
    fn test_unsupported_label_is_schema_error() {
        let t = table("Displacement", &["1"], &[Some(0.0)], &[Some(0.0)]);
        let err = normalize_table(&t, 50.0).unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_missing_stress_column_is_schema_error() {
        let t = Table::from_columns(
            "input_data",
            vec![("Time(Sec)".to_string(), vec!["00:00:00".into()])],
        )
        .unwrap();
        let err = normalize_table(&t, 50.0).unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_no_valid_rows_is_insufficient_data() {
        let t = table("File name", &["a.jpg", "b.jpg"], &[Some(0.0); 2], &[Some(0.0); 2]);
        let err = normalize_table(&t, 50.0).unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_non_positive_speed_factor_is_rejected() {
        let t = table("Time(Sec)", &["00:00:00"], &[Some(0.0)], &[Some(0.0)]);
        assert!(normalize_table(&t, 0.0).is_err());
    }
}
