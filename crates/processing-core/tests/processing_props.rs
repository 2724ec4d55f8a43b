use insitu_data_model::sample::{EPSILON_COLUMN, SIGMA_COLUMN};
use insitu_data_model::table::{CellValue, Table};
use insitu_processing_core::savgol::{smooth_curve, SmoothingConfig};
use insitu_processing_core::time_source::ImageStamp;
use insitu_processing_core::{normalize_table, PolynomialFit};
use proptest::prelude::*;

fn clock_text(secs: u32) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

fn duration_table(times: &[String]) -> Table {
    let n = times.len();
    Table::from_columns(
        "input_data",
        vec![
            (
                "Time(Sec)".to_string(),
                times.iter().map(|t| CellValue::from(t.as_str())).collect(),
            ),
            (EPSILON_COLUMN.to_string(), vec![CellValue::Number(0.5); n]),
            (SIGMA_COLUMN.to_string(), vec![CellValue::Number(10.0); n]),
        ],
    )
    .unwrap()
}

proptest! {
    #[test]
    fn sorted_durations_start_at_zero_and_never_decrease(
        mut secs in proptest::collection::vec(0u32..86_000, 1..60),
    ) {
        secs.sort_unstable();
        let times: Vec<String> = secs.iter().map(|&s| clock_text(s)).collect();

        let normalized = normalize_table(&duration_table(&times), 50.0).unwrap();
        let elapsed = normalized.series.elapsed_secs();

        prop_assert_eq!(elapsed.len(), secs.len());
        prop_assert_eq!(elapsed[0], 0.0);
        prop_assert!(elapsed.windows(2).all(|w| w[0] <= w[1]));

        let playback = normalized.series.playback_secs();
        prop_assert!(playback.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn image_names_follow_time_of_day_formula(
        h in 0u32..24,
        m in 0u32..60,
        s in 0u32..60,
        ms in 0u32..1000,
    ) {
        let name = format!("image-{h:02}{m:02}{s:02}_{ms:03}.jpg");
        let stamp = ImageStamp::parse(&name).unwrap();
        let expected = f64::from(h) * 3600.0 + f64::from(m) * 60.0 + f64::from(s) + f64::from(ms) / 1000.0;
        prop_assert!((stamp.total_seconds() - expected).abs() < 1e-9);
        prop_assert_eq!(format!("image-{}.jpg", stamp.key()), name);
    }

    #[test]
    fn smoothing_preserves_length(
        values in proptest::collection::vec(-1000.0f64..1000.0, 37..200),
    ) {
        let sigma: Vec<f64> = values.iter().map(|v| v * 2.0).collect();
        let curve = smooth_curve(&values, &sigma, &SmoothingConfig::default()).unwrap();
        prop_assert_eq!(curve.len(), values.len());
        prop_assert!(curve.epsilon().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn linear_data_is_fitted_exactly(
        slope in -50.0f64..50.0,
        intercept in -100.0f64..100.0,
        count in 3usize..40,
    ) {
        let xs: Vec<f64> = (0..count).map(|i| i as f64 * 0.5).collect();
        let ys: Vec<f64> = xs.iter().map(|x| slope * x + intercept).collect();
        let fit = PolynomialFit::fit(&xs, &ys, 1).unwrap();
        for (&x, &y) in xs.iter().zip(&ys) {
            prop_assert!((fit.eval(x) - y).abs() < 1e-6);
        }
    }
}
