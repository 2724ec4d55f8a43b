//! In-situ Render Engine
//!
//! Rasterizes charts and drives ffmpeg to produce the videos of an
//! in-situ mechanical test.
//!
//! # Pipeline Architecture
//!
//! ```text
//! workbook ──┐
//!            ├── Normalize time (processing-core)
//!            │         │
//!            │         ├── Savitzky-Golay smoothing ──▶ <input>_smoothed.xlsx
//!            │         │
//!            │         ▼
//!            │   FrameRenderer (one scoped RGB buffer)
//!            │         │
//!            │         ▼
//!            │   VideoWriter (ffmpeg, fixed fps) ◀── FramePacer
//!            │         │
//!            ▼         ▼
//! image folder ──▶ image video ──┬── split / speed / overlay / concat
//!                                ▼
//!                          merged video
//! ```

pub mod compose;
pub mod curve_video;
pub mod font;
pub mod image_sequence;
pub mod plot;
pub mod video;

pub use curve_video::{CurveVideoJob, CurveVideoPipeline, CurveVideoSummary, PipelineStage};
pub use video::{probe, VideoInfo, VideoWriter};
