//! Render the animated stress-strain video.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use insitu_common::clock::Sleeper;
use insitu_common::config::AppConfig;
use insitu_processing_core::SmoothingConfig;
use insitu_render_engine::{CurveVideoJob, CurveVideoPipeline, CurveVideoSummary, PipelineStage};

use super::AxisPair;

#[derive(Debug, Args)]
pub struct CurveVideoArgs {
    /// Input spreadsheet (.xlsx/.xls/.ods) or CSV
    pub input: PathBuf,

    /// Output video file
    #[arg(short, long, default_value = "stress_strain.avi")]
    pub output: PathBuf,

    /// Sheet holding the input table
    #[arg(long)]
    pub sheet: Option<String>,

    /// Real seconds per playback second
    #[arg(long)]
    pub speed: Option<f64>,

    /// Savitzky-Golay window length (odd)
    #[arg(long)]
    pub window: Option<usize>,

    /// Savitzky-Golay polynomial order
    #[arg(long)]
    pub polyorder: Option<usize>,

    /// Shrink the smoothing window when the series is shorter than it
    #[arg(long)]
    pub shrink_window: bool,

    /// Fixed strain axis limits as MIN,MAX
    #[arg(long, allow_hyphen_values = true)]
    pub xlim: Option<AxisPair>,

    /// Fixed stress axis limits as MIN,MAX
    #[arg(long, allow_hyphen_values = true)]
    pub ylim: Option<AxisPair>,

    #[arg(long)]
    pub fps: Option<u32>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    /// ffmpeg encoder name, or "auto" to pick by container
    #[arg(long)]
    pub codec: Option<String>,

    /// TrueType/OpenType font for labels
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Save the last rendered frame as PNG
    #[arg(long)]
    pub debug_frame: Option<PathBuf>,

    /// Render as fast as possible instead of pacing against the timestamps
    #[arg(long)]
    pub no_pace: bool,
}

/// Skips pacing delays entirely.
struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&mut self, _duration: Duration) {}
}

pub fn build_job(args: &CurveVideoArgs, config: &AppConfig) -> CurveVideoJob {
    let mut job = CurveVideoJob::new(&args.input, &args.output);
    job.sheet = args.sheet.clone().unwrap_or_else(|| config.curve.sheet.clone());
    job.speed_factor = args.speed.unwrap_or(config.curve.speed_factor);
    job.smoothing = SmoothingConfig {
        window: args.window.unwrap_or(config.curve.smoothing_window),
        polyorder: args.polyorder.unwrap_or(config.curve.polyorder),
        shrink_to_fit: args.shrink_window,
    };
    job.xlim = args.xlim.map(Into::into);
    job.ylim = args.ylim.map(Into::into);
    job.fps = args.fps.unwrap_or(config.video.fps);
    job.width = args.width.unwrap_or(config.video.width);
    job.height = args.height.unwrap_or(config.video.height);
    job.codec = args.codec.clone().unwrap_or_else(|| config.video.codec.clone());
    job.font = args.font.clone().or_else(|| config.curve.font.clone());
    job.debug_frame = args.debug_frame.clone();
    job
}

fn progress(stage: PipelineStage) {
    match stage {
        PipelineStage::Rendering { frame, total } => {
            if frame + 1 == total || frame % 25 == 0 {
                print!("\r  Rendering: {}/{} frames  ", frame + 1, total);
            }
        }
        PipelineStage::Finalizing => println!(),
        _ => {}
    }
}

pub fn run(args: CurveVideoArgs, config: &AppConfig) -> anyhow::Result<()> {
    let job = build_job(&args, config);
    tracing::debug!(?job, "Resolved curve video job");

    println!("Rendering curve video from: {}", job.input.display());
    println!("  Sheet: {}", job.sheet);
    println!("  Output: {}", job.output.display());
    println!(
        "  Frames: {}x{} @ {}fps, speed factor {}",
        job.width, job.height, job.fps, job.speed_factor
    );

    let summary = if args.no_pace {
        CurveVideoPipeline::with_sleeper(job, NoSleep)
            .on_stage(Box::new(progress))
            .run()?
    } else {
        CurveVideoPipeline::new(job).on_stage(Box::new(progress)).run()?
    };

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &CurveVideoSummary) {
    println!("Curve video complete: {}", summary.output.display());
    println!(
        "  Samples: {} retained, {} rejected",
        summary.retained, summary.rejected
    );
    println!("  Smoothing window: {}", summary.window);
    println!(
        "  Frames written: {} (paced over {:.1}s)",
        summary.frames_written,
        summary.paced.as_secs_f64()
    );
    println!("  Smoothed data: {}", summary.smoothed.display());
}
