//! Fit a polynomial to the "fitting data" sheet and fill "calculation data".

use std::path::PathBuf;

use clap::Args;

use insitu_common::config::AppConfig;
use insitu_data_model::workbook::{load_workbook, save_workbook, sibling_with_suffix};
use insitu_processing_core::polyfit::{fit_calculation_sheet, linspace};
use insitu_render_engine::font::load_font;
use insitu_render_engine::plot::render_fit_chart;

const CURVE_SAMPLES: usize = 100;

#[derive(Debug, Args)]
pub struct PolyfitArgs {
    /// Workbook with "fitting data" and "calculation data" sheets
    pub input: PathBuf,

    /// Polynomial degree
    #[arg(short, long, default_value = "9")]
    pub degree: usize,

    /// Where to write the updated workbook (defaults to <input>_fitted.xlsx)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also render a PNG chart of the fit
    #[arg(long)]
    pub chart: Option<PathBuf>,

    /// TrueType/OpenType font for chart labels
    #[arg(long)]
    pub font: Option<PathBuf>,
}

pub fn run(args: PolyfitArgs, config: &AppConfig) -> anyhow::Result<()> {
    println!("Fitting degree-{} polynomial: {}", args.degree, args.input.display());

    let mut workbook = load_workbook(&args.input)?;
    let result = fit_calculation_sheet(&mut workbook, args.degree)?;

    let output = args
        .output
        .unwrap_or_else(|| sibling_with_suffix(&args.input, "_fitted"));
    save_workbook(&output, &workbook)?;

    println!("  Fitting points: {}", result.fitting_points.len());
    println!("  Calculated points: {}", result.calculated_points.len());
    println!("  RMS residual: {:.6}", result.rms_residual);
    println!("Workbook written: {}", output.display());

    if let Some(chart) = args.chart {
        let (lo, hi) = result.fit.domain();
        let curve: Vec<(f64, f64)> = linspace(lo, hi, CURVE_SAMPLES)
            .into_iter()
            .map(|x| (x, result.fit.eval(x)))
            .collect();
        let font = load_font(args.font.as_deref().or(config.curve.font.as_deref()));
        let image = render_fit_chart(
            &result.fitting_points,
            &curve,
            &result.calculated_points,
            config.video.width,
            config.video.height,
            font,
        )?;
        if let Some(parent) = chart.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        image
            .save(&chart)
            .map_err(|e| anyhow::anyhow!("Failed to save chart {}: {e}", chart.display()))?;
        println!("Chart written: {}", chart.display());
    }

    Ok(())
}
