//! Animated stress-strain video.
//!
//! Load → normalize time → smooth → render one frame per retained sample
//! → encode. Frame generation is paced against the playback timestamps;
//! the encoded stream itself runs at a fixed frame rate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbImage;
use serde::Serialize;

use insitu_common::clock::{FramePacer, Sleeper, ThreadSleeper};
use insitu_common::error::{InsituError, InsituResult};
use insitu_data_model::sample::SmoothedCurve;
use insitu_data_model::table::{CellValue, Table, Workbook};
use insitu_data_model::workbook::{load_sheet, save_workbook, sibling_with_suffix};
use insitu_processing_core::normalize::{normalize_table, NormalizedSeries};
use insitu_processing_core::savgol::{smooth_curve, SmoothingConfig};

use crate::font::load_font;
use crate::plot::{AxisLimits, ChartLabels, FrameRenderer};
use crate::video::{FrameSink, VideoWriter};

/// Sheet holding the smoothed columns in the sibling workbook.
pub const SMOOTHED_SHEET: &str = "Smoothed_Data";
pub const SMOOTHED_EPSILON_COLUMN: &str = "Smoothed ε (%)";
pub const SMOOTHED_SIGMA_COLUMN: &str = "Smoothed σ (MPa)";

/// Stages of a curve-video run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStage {
    Idle,
    Loading,
    Normalizing,
    Smoothing,
    Rendering { frame: usize, total: usize },
    Finalizing,
    Done,
    Failed,
}

/// Stage notifications for callers that report progress.
pub type StageCallback = Box<dyn FnMut(PipelineStage) + Send>;

/// A curve-video job.
#[derive(Debug, Clone)]
pub struct CurveVideoJob {
    /// Spreadsheet or CSV input.
    pub input: PathBuf,

    /// Output video file.
    pub output: PathBuf,

    /// Sheet to read.
    pub sheet: String,

    /// Real seconds per playback second.
    pub speed_factor: f64,

    pub smoothing: SmoothingConfig,

    /// Fixed x/y axis limits; computed from the smoothed series when absent.
    pub xlim: Option<(f64, f64)>,
    pub ylim: Option<(f64, f64)>,

    pub fps: u32,
    pub width: u32,
    pub height: u32,

    /// Encoder name or `auto`.
    pub codec: String,

    pub font: Option<PathBuf>,

    /// Write the last rendered frame here as PNG.
    pub debug_frame: Option<PathBuf>,
}

impl CurveVideoJob {
    /// A job with default rendering settings.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            sheet: "input_data".to_string(),
            speed_factor: 50.0,
            smoothing: SmoothingConfig::default(),
            xlim: None,
            ylim: None,
            fps: 24,
            width: 640,
            height: 480,
            codec: "auto".to_string(),
            font: None,
            debug_frame: None,
        }
    }

    /// Where the smoothed columns are saved.
    pub fn smoothed_path(&self) -> PathBuf {
        sibling_with_suffix(&self.input, "_smoothed")
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct CurveVideoSummary {
    pub retained: usize,
    pub rejected: usize,
    pub window: usize,
    pub frames_written: u64,
    /// Sum of the delays requested between frames.
    pub paced: Duration,
    pub output: PathBuf,
    pub smoothed: PathBuf,
}

/// Drives a [`CurveVideoJob`] through its stages.
pub struct CurveVideoPipeline<S: Sleeper = ThreadSleeper> {
    job: CurveVideoJob,
    stage: PipelineStage,
    sleeper: Option<S>,
    on_stage: Option<StageCallback>,
}

impl CurveVideoPipeline<ThreadSleeper> {
    pub fn new(job: CurveVideoJob) -> Self {
        Self::with_sleeper(job, ThreadSleeper)
    }
}

impl<S: Sleeper> CurveVideoPipeline<S> {
    pub fn with_sleeper(job: CurveVideoJob, sleeper: S) -> Self {
        Self {
            job,
            stage: PipelineStage::Idle,
            sleeper: Some(sleeper),
            on_stage: None,
        }
    }

    pub fn on_stage(mut self, callback: StageCallback) -> Self {
        self.on_stage = Some(callback);
        self
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Run every stage once. Any failure ends in [`PipelineStage::Failed`].
    pub fn run(&mut self) -> InsituResult<CurveVideoSummary> {
        if self.stage != PipelineStage::Idle {
            return Err(InsituError::unsupported("a pipeline runs only once"));
        }
        match self.run_stages() {
            Ok(summary) => {
                self.enter(PipelineStage::Done);
                Ok(summary)
            }
            Err(err) => {
                let failed_in = self.stage;
                self.enter(PipelineStage::Failed);
                tracing::error!(stage = ?failed_in, error = %err, "Curve video failed");
                Err(err)
            }
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        match stage {
            PipelineStage::Rendering { frame, total } => {
                tracing::trace!(frame, total, "Rendering frame");
            }
            other => tracing::info!(stage = ?other, "Curve video stage"),
        }
        self.stage = stage;
        if let Some(cb) = self.on_stage.as_mut() {
            cb(stage);
        }
    }

    fn run_stages(&mut self) -> InsituResult<CurveVideoSummary> {
        self.enter(PipelineStage::Loading);
        let table = load_sheet(&self.job.input, &self.job.sheet)?;

        self.enter(PipelineStage::Normalizing);
        let normalized = normalize_table(&table, self.job.speed_factor)?;

        self.enter(PipelineStage::Smoothing);
        let curve = smooth_curve(
            &normalized.series.epsilon(),
            &normalized.series.sigma(),
            &self.job.smoothing,
        )?;
        let window = self.job.smoothing.resolve_window(curve.len())?;
        let smoothed = self.job.smoothed_path();
        save_workbook(&smoothed, &smoothed_workbook(&curve))?;
        tracing::info!(path = %smoothed.display(), "Saved smoothed data");

        let (frames_written, paced) = self.render(&normalized, &curve)?;

        Ok(CurveVideoSummary {
            retained: normalized.series.len(),
            rejected: normalized.rejections.len(),
            window,
            frames_written,
            paced,
            output: self.job.output.clone(),
            smoothed,
        })
    }

    /// Returns the number of encoded frames and the total pacing delay.
    fn render(
        &mut self,
        normalized: &NormalizedSeries,
        curve: &SmoothedCurve,
    ) -> InsituResult<(u64, Duration)> {
        let job = &self.job;
        if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                InsituError::Io(std::io::Error::new(
                    e.kind(),
                    format!("cannot create output directory {}: {e}", parent.display()),
                ))
            })?;
        }

        let limits = AxisLimits::for_curve(curve, job.xlim, job.ylim)?;
        let renderer = FrameRenderer::new(
            job.width,
            job.height,
            limits,
            &ChartLabels::stress_strain(),
            load_font(job.font.as_deref()),
        )?;

        let mut writer = VideoWriter::create(&job.output, job.width, job.height, job.fps, &job.codec)?;
        let paced = self.render_frames(&renderer, curve, normalized.series.playback_secs(), &mut writer)?;

        self.enter(PipelineStage::Finalizing);
        Ok((writer.finish()?, paced))
    }

    /// Render one frame per point into `sink`, pacing after each write.
    fn render_frames<K: FrameSink>(
        &mut self,
        renderer: &FrameRenderer,
        curve: &SmoothedCurve,
        playback_secs: &[f64],
        sink: &mut K,
    ) -> InsituResult<Duration> {
        let points: Vec<(f64, f64)> = curve
            .epsilon()
            .iter()
            .copied()
            .zip(curve.sigma().iter().copied())
            .collect();
        let sleeper = self
            .sleeper
            .take()
            .ok_or_else(|| InsituError::unsupported("a pipeline runs only once"))?;
        let mut pacer = FramePacer::with_sleeper(playback_secs.to_vec(), sleeper);

        let total = points.len();
        let mut frame = renderer.blank_frame();
        for index in 0..total {
            self.enter(PipelineStage::Rendering { frame: index, total });
            renderer.render_curve_frame(&points, index, &mut frame)?;
            sink.push_frame(&frame)?;
            pacer.after_frame(index);
        }

        if let Some(path) = &self.job.debug_frame {
            save_debug_frame(&frame, path);
        }
        drop(frame);

        let paced = pacer.total_slept();
        tracing::debug!(
            requested = ?paced,
            wall = ?pacer.wall_elapsed(),
            "Frame pacing finished"
        );
        self.sleeper = Some(pacer.into_sleeper());
        Ok(paced)
    }
}

/// Workbook holding the smoothed series.
pub fn smoothed_workbook(curve: &SmoothedCurve) -> Workbook {
    let column = |values: &[f64]| values.iter().map(|&v| CellValue::Number(v)).collect();
    let mut table = Table::new(
        SMOOTHED_SHEET,
        vec![
            SMOOTHED_EPSILON_COLUMN.to_string(),
            SMOOTHED_SIGMA_COLUMN.to_string(),
        ],
    );
    table.set_column(SMOOTHED_EPSILON_COLUMN, column(curve.epsilon()));
    table.set_column(SMOOTHED_SIGMA_COLUMN, column(curve.sigma()));
    Workbook::with_sheet(table)
}

fn save_debug_frame(frame: &RgbImage, path: &Path) {
    match frame.save(path) {
        Ok(()) => tracing::info!(path = %path.display(), "Wrote debug frame"),
        Err(err) => tracing::warn!(path = %path.display(), error = %err, "Failed to write debug frame"),
    }
}
