//! Assemble a folder of `.jpg` images into videos.

use std::path::PathBuf;

use clap::Args;

use insitu_common::config::AppConfig;
use insitu_render_engine::image_sequence::{build_image_video, CropArea, ImageVideoJob};

#[derive(Debug, Args)]
pub struct ImageVideoArgs {
    /// Folder holding the .jpg frames
    pub folder: PathBuf,

    /// Output video without labels
    #[arg(short, long, default_value = "output_video.avi")]
    pub output: PathBuf,

    /// Output video with file names drawn on each frame
    /// (defaults to <output stem>_with_filename)
    #[arg(long)]
    pub labeled_output: Option<PathBuf>,

    /// Crop area as x,y,width,height; the crop is scaled back to full size
    #[arg(long)]
    pub crop: Option<CropArea>,

    #[arg(long)]
    pub fps: Option<u32>,

    /// ffmpeg encoder name, or "auto" to pick by container
    #[arg(long)]
    pub codec: Option<String>,

    /// TrueType/OpenType font for the file name labels
    #[arg(long)]
    pub font: Option<PathBuf>,
}

pub fn build_job(args: ImageVideoArgs, config: &AppConfig) -> ImageVideoJob {
    let labeled_output = args
        .labeled_output
        .unwrap_or_else(|| ImageVideoJob::default_labeled_path(&args.output));
    ImageVideoJob {
        folder: args.folder,
        output: args.output,
        labeled_output,
        fps: args.fps.unwrap_or(config.video.fps),
        crop: args.crop,
        codec: args.codec.unwrap_or_else(|| config.video.codec.clone()),
        font: args.font.or_else(|| config.curve.font.clone()),
    }
}

pub fn run(args: ImageVideoArgs, config: &AppConfig) -> anyhow::Result<()> {
    let job = build_job(args, config);

    println!("Building videos from: {}", job.folder.display());
    if let Some(crop) = job.crop {
        println!("  Crop: {crop}");
    }

    let summary = build_image_video(&job)?;

    println!(
        "  Frames: {} at {}x{} @ {}fps",
        summary.frames_written, summary.width, summary.height, job.fps
    );
    if !summary.skipped.is_empty() {
        println!("  Skipped {} unreadable images:", summary.skipped.len());
        for path in &summary.skipped {
            println!("    {}", path.display());
        }
    }
    println!("Video written: {}", job.output.display());
    println!("Labeled video written: {}", job.labeled_output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_labeled_output_defaults_next_to_output() {
        let args = ImageVideoArgs {
            folder: PathBuf::from("frames"),
            output: PathBuf::from("out/run.avi"),
            labeled_output: None,
            crop: Some("1,2,30,40".parse().unwrap()),
            fps: None,
            codec: None,
            font: None,
        };
        let job = build_job(args, &AppConfig::default());
        assert_eq!(job.labeled_output, Path::new("out/run_with_filename.avi"));
        assert_eq!(job.fps, 24);
        assert_eq!(job.codec, "auto");
        assert_eq!(job.crop.map(|c| c.width), Some(30));
    }
}
