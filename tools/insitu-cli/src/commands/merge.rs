//! Overlay the curve video onto the image-sequence video.

use std::path::PathBuf;

use clap::Args;

use insitu_common::config::AppConfig;
use insitu_render_engine::compose::{merge_videos, MergeJob};

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Folder holding the .jpg frames the image video was built from
    #[arg(long)]
    pub images: PathBuf,

    /// Video assembled from the image folder
    #[arg(long)]
    pub image_video: PathBuf,

    /// Stress-strain curve video
    #[arg(long)]
    pub stress_video: PathBuf,

    /// File name of the image where loading starts
    #[arg(long)]
    pub start_image: String,

    /// File name of the image where loading ends
    #[arg(long)]
    pub end_image: String,

    /// Merged output video
    #[arg(short, long, default_value = "final_merged_video.mp4")]
    pub output: PathBuf,

    /// Directory for intermediate clips (defaults to the output directory)
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Keep intermediate clips instead of deleting them
    #[arg(long)]
    pub keep_intermediates: bool,

    /// Overlay height as a fraction of the image video height
    #[arg(long)]
    pub overlay_scale: Option<f64>,
}

pub fn run(args: MergeArgs, config: &AppConfig) -> anyhow::Result<()> {
    let mut settings = config.compose.clone();
    if let Some(scale) = args.overlay_scale {
        anyhow::ensure!(
            scale > 0.0 && scale <= 1.0,
            "overlay scale must be in (0, 1], got {scale}"
        );
        settings.overlay_scale = scale;
    }

    let job = MergeJob {
        image_folder: args.images,
        image_video: args.image_video,
        stress_video: args.stress_video,
        start_image: args.start_image,
        end_image: args.end_image,
        output: args.output,
        work_dir: args.work_dir,
        keep_intermediates: args.keep_intermediates,
    };

    tracing::debug!(?job, ?settings, "Resolved merge job");
    println!("Merging videos");
    println!("  Image video: {}", job.image_video.display());
    println!("  Stress video: {}", job.stress_video.display());
    println!("  Loading: {} -> {}", job.start_image, job.end_image);

    let summary = merge_videos(&job, &settings)?;

    println!(
        "  Frames {}..={} of the image video at {:.3}fps",
        summary.start_frame, summary.end_frame, summary.image_fps
    );
    println!(
        "  Stress video: {} frames re-timed to {:.3}fps",
        summary.stress_frames, summary.stress_fps
    );
    println!("Merged video written: {}", summary.output.display());
    Ok(())
}
