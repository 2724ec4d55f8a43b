//! Video compositing with ffmpeg filter graphs.
//!
//! ```text
//! image video ──split@start──┬── part 1 ───────────────────────┐
//!                            └── part 2 ──┐                    ├── concat (white pad) ──▶ output
//! curve video ──speed(new fps)────────────┴── overlay (corner) ┘
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;

use insitu_common::config::ComposeDefaults;
use insitu_common::error::{InsituError, InsituResult};

use crate::image_sequence::frame_index_of_image;
use crate::video::{codec_args, probe, run_ffmpeg, VideoInfo};

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn base_args() -> Vec<String> {
    ["-y", "-hide_banner", "-loglevel", "error"]
        .map(String::from)
        .to_vec()
}

fn encode_args(settings: &ComposeDefaults, fps: f64) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        settings.codec.clone(),
        "-b:v".to_string(),
        settings.bitrate.clone(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-r".to_string(),
        format_rate(fps),
        "-an".to_string(),
    ]
}

fn format_rate(fps: f64) -> String {
    let text = format!("{fps:.6}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn ensure_parent(path: &Path) -> InsituResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Re-time `input` to `new_fps` without dropping or duplicating frames.
pub fn adjust_speed(input: &Path, output: &Path, new_fps: f64) -> InsituResult<VideoInfo> {
    if !new_fps.is_finite() || new_fps <= 0.0 {
        return Err(InsituError::config(format!(
            "frame rate must be positive, got {new_fps}"
        )));
    }
    let info = probe(input)?;
    ensure_parent(output)?;

    let mut args = base_args();
    args.extend([
        "-itsscale".to_string(),
        format_rate(info.fps / new_fps),
        "-i".to_string(),
        path_arg(input),
        "-r".to_string(),
        format_rate(new_fps),
        "-an".to_string(),
    ]);
    args.extend(codec_args(output, "auto"));
    args.push(path_arg(output));

    tracing::info!(
        input = %input.display(),
        from_fps = info.fps,
        to_fps = new_fps,
        frames = info.frame_count,
        "Adjusting video speed"
    );
    run_ffmpeg(&args)?;
    Ok(info)
}

/// Filter graph splitting one stream into `[0, frame)` and `[frame, end)`.
pub fn split_filter(frame: u64) -> String {
    format!(
        "[0:v]split=2[a][b];\
         [a]trim=end_frame={frame},setpts=PTS-STARTPTS[first];\
         [b]trim=start_frame={frame},setpts=PTS-STARTPTS[second]"
    )
}

/// Write frames before `frame` to `first` and the rest to `second`.
pub fn split_at_frame(input: &Path, frame: u64, first: &Path, second: &Path) -> InsituResult<VideoInfo> {
    let info = probe(input)?;
    if frame == 0 || frame >= info.frame_count {
        return Err(InsituError::insufficient_data(format!(
            "split frame {frame} must fall inside 1..{} of {}",
            info.frame_count,
            input.display()
        )));
    }
    ensure_parent(first)?;
    ensure_parent(second)?;

    let mut args = base_args();
    args.extend([
        "-i".to_string(),
        path_arg(input),
        "-filter_complex".to_string(),
        split_filter(frame),
    ]);
    for (label, out) in [("[first]", first), ("[second]", second)] {
        args.extend(["-map".to_string(), label.to_string(), "-an".to_string()]);
        args.extend(codec_args(out, "auto"));
        args.push(path_arg(out));
    }

    tracing::info!(input = %input.display(), frame, "Splitting video");
    run_ffmpeg(&args)?;
    Ok(info)
}

/// Height of the overlay: background height times `scale`, rounded to even.
pub fn overlay_height(background_height: u32, scale: f64) -> u32 {
    let h = (f64::from(background_height) * scale).round() as u32;
    (h / 2 * 2).max(2)
}

/// Filter graph placing input 1 at the bottom-right of input 0.
///
/// When the overlay outlasts the background by `hold_secs`, the last
/// background frame is held for that long.
pub fn overlay_filter(overlay_h: u32, margin: u32, hold_secs: f64) -> String {
    let background = if hold_secs > 0.0 {
        format!("tpad=stop_mode=clone:stop_duration={hold_secs:.3}")
    } else {
        "null".to_string()
    };
    format!(
        "[1:v]scale=-2:{overlay_h}[ov];\
         [0:v]{background}[bg];\
         [bg][ov]overlay=W-w-{margin}:H-h-{margin}:eof_action=pass[out]"
    )
}

/// Shrink `overlay` into the bottom-right corner of `background`.
pub fn overlay_bottom_right(
    background: &Path,
    overlay: &Path,
    output: &Path,
    settings: &ComposeDefaults,
) -> InsituResult<()> {
    let bg = probe(background)?;
    let ov = probe(overlay)?;
    ensure_parent(output)?;

    let hold = (ov.duration_secs - bg.duration_secs).max(0.0);
    let filter = overlay_filter(
        overlay_height(bg.height, settings.overlay_scale),
        settings.overlay_margin_px,
        hold,
    );

    let mut args = base_args();
    args.extend([
        "-i".to_string(),
        path_arg(background),
        "-i".to_string(),
        path_arg(overlay),
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "[out]".to_string(),
    ]);
    args.extend(encode_args(settings, bg.fps));
    args.push(path_arg(output));

    tracing::info!(
        background = %background.display(),
        overlay = %overlay.display(),
        hold_secs = hold,
        "Overlaying video"
    );
    run_ffmpeg(&args)
}

/// Filter graph fitting input 0 into a white `width x height` canvas and
/// playing it before input 1.
pub fn concat_filter(width: u32, height: u32, fps: f64) -> String {
    let fps = format_rate(fps);
    format!(
        "[0:v]scale={width}:{height}:force_original_aspect_ratio=decrease,\
         pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:white,setsar=1,fps={fps}[a];\
         [1:v]scale={width}:{height},setsar=1,fps={fps}[b];\
         [a][b]concat=n=2:v=1:a=0[out]"
    )
}

/// Play `first` (fitted and padded to `second`'s size) then `second`.
pub fn concat_with_padding(
    first: &Path,
    second: &Path,
    output: &Path,
    settings: &ComposeDefaults,
) -> InsituResult<()> {
    let a = probe(first)?;
    let b = probe(second)?;
    ensure_parent(output)?;

    let mut args = base_args();
    args.extend([
        "-i".to_string(),
        path_arg(first),
        "-i".to_string(),
        path_arg(second),
        "-filter_complex".to_string(),
        concat_filter(b.width, b.height, a.fps),
        "-map".to_string(),
        "[out]".to_string(),
    ]);
    args.extend(encode_args(settings, a.fps));
    args.push(path_arg(output));

    tracing::info!(
        first = %first.display(),
        second = %second.display(),
        width = b.width,
        height = b.height,
        "Concatenating videos"
    );
    run_ffmpeg(&args)
}

/// Frame rate that stretches `stress_frames` over the image frames
/// `start..=end` shown at `image_fps`.
pub fn synchronized_fps(stress_frames: u64, start: usize, end: usize, image_fps: f64) -> InsituResult<f64> {
    if end < start {
        return Err(InsituError::config(format!(
            "end image (frame {end}) comes before start image (frame {start})"
        )));
    }
    if stress_frames == 0 {
        return Err(InsituError::insufficient_data("stress-strain video has no frames"));
    }
    let window = (end - start + 1) as f64;
    Ok(stress_frames as f64 / window * image_fps)
}

/// Inputs of the merge workflow.
#[derive(Debug, Clone)]
pub struct MergeJob {
    /// Folder with the source `.jpg` images.
    pub image_folder: PathBuf,
    /// Video assembled from those images.
    pub image_video: PathBuf,
    /// Animated stress-strain video.
    pub stress_video: PathBuf,
    /// Image at which loading starts.
    pub start_image: String,
    /// Image at which loading ends.
    pub end_image: String,
    pub output: PathBuf,
    /// Where intermediate clips go; defaults to the output's folder.
    pub work_dir: Option<PathBuf>,
    pub keep_intermediates: bool,
}

/// What the merge workflow decided and produced.
#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    pub start_frame: usize,
    pub end_frame: usize,
    pub image_fps: f64,
    pub stress_frames: u64,
    pub stress_fps: f64,
    pub output: PathBuf,
}

/// Overlay the speed-matched curve video onto the image video from the
/// start image on, keeping the frames before it untouched.
pub fn merge_videos(job: &MergeJob, settings: &ComposeDefaults) -> InsituResult<MergeSummary> {
    let locate = |name: &str| -> InsituResult<usize> {
        frame_index_of_image(name, &job.image_folder)?.ok_or_else(|| {
            InsituError::FileNotFound {
                path: job.image_folder.join(name),
            }
        })
    };
    let start_frame = locate(&job.start_image)?;
    let end_frame = locate(&job.end_image)?;

    let image_info = probe(&job.image_video)?;
    let stress_info = probe(&job.stress_video)?;
    let stress_fps = synchronized_fps(stress_info.frame_count, start_frame, end_frame, image_info.fps)?;

    tracing::info!(
        start_frame,
        end_frame,
        image_fps = image_info.fps,
        stress_frames = stress_info.frame_count,
        stress_fps,
        "Planned merge"
    );

    let work_dir = job
        .work_dir
        .clone()
        .or_else(|| job.output.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&work_dir)?;
    let stem = job
        .output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "merged".to_string());
    let work = |suffix: &str| work_dir.join(format!("{stem}_{suffix}.mp4"));

    let adjusted = work("adjusted_stress");
    adjust_speed(&job.stress_video, &adjusted, stress_fps)?;

    let mut intermediates = vec![adjusted.clone()];
    if start_frame == 0 {
        overlay_bottom_right(&job.image_video, &adjusted, &job.output, settings)?;
    } else {
        let part1 = work("part1");
        let part2 = work("part2");
        let overlaid = work("overlaid");
        split_at_frame(&job.image_video, start_frame as u64, &part1, &part2)?;
        overlay_bottom_right(&part2, &adjusted, &overlaid, settings)?;
        concat_with_padding(&part1, &overlaid, &job.output, settings)?;
        intermediates.extend([part1, part2, overlaid]);
    }

    if !job.keep_intermediates {
        for path in &intermediates {
            if let Err(err) = std::fs::remove_file(path) {
                tracing::debug!(path = %path.display(), error = %err, "Could not remove intermediate");
            }
        }
    }

    Ok(MergeSummary {
        start_frame,
        end_frame,
        image_fps: image_info.fps,
        stress_frames: stress_info.frame_count,
        stress_fps,
        output: job.output.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{ffmpeg_available, VideoWriter};
    use image::{Rgb, RgbImage};

    #[test]
    fn test_synchronized_fps() {
        let fps = synchronized_fps(120, 10, 69, 24.0).unwrap();
        assert!((fps - 48.0).abs() < 1e-12);
        assert!(synchronized_fps(120, 5, 4, 24.0).is_err());
        assert!(synchronized_fps(0, 0, 4, 24.0)
            .unwrap_err()
            .is_insufficient_data());
    }

    #[test]
    fn test_overlay_height_is_even_quarter() {
        assert_eq!(overlay_height(480, 0.25), 120);
        assert_eq!(overlay_height(1078, 0.25), 270);
        assert_eq!(overlay_height(4, 0.1), 2);
    }

    #[test]
    fn test_overlay_filter_holds_background_only_when_needed() {
        let held = overlay_filter(120, 10, 2.5);
        assert!(held.contains("tpad=stop_mode=clone:stop_duration=2.500"));
        assert!(held.contains("overlay=W-w-10:H-h-10:eof_action=pass"));

        let plain = overlay_filter(120, 10, 0.0);
        assert!(!plain.contains("tpad"));
        assert!(plain.contains("[1:v]scale=-2:120[ov]"));
    }

    #[test]
    fn test_concat_filter_pads_with_white() {
        let f = concat_filter(1280, 720, 24.0);
        assert!(f.contains("pad=1280:720:(ow-iw)/2:(oh-ih)/2:white"));
        assert!(f.contains("fps=24[a]"));
        assert!(f.ends_with("concat=n=2:v=1:a=0[out]"));
    }

    #[test]
    fn test_split_filter_bounds() {
        let f = split_filter(30);
        assert!(f.contains("trim=end_frame=30"));
        assert!(f.contains("trim=start_frame=30"));
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(24.0), "24");
        assert_eq!(format_rate(29.97), "29.97");
        assert_eq!(format_rate(0.5), "0.5");
    }

    fn solid_clip(path: &Path, w: u32, h: u32, frames: usize, color: [u8; 3]) {
        let mut writer = VideoWriter::create(path, w, h, 24, "auto").unwrap();
        let frame = RgbImage::from_pixel(w, h, Rgb(color));
        for _ in 0..frames {
            writer.write_frame(&frame).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_compose_primitives_with_ffmpeg() {
        if !ffmpeg_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let bg = dir.path().join("bg.mp4");
        let ov = dir.path().join("ov.mp4");
        solid_clip(&bg, 160, 120, 24, [20, 20, 20]);
        solid_clip(&ov, 80, 60, 48, [200, 0, 0]);

        let fast = dir.path().join("fast.mp4");
        let before = adjust_speed(&ov, &fast, 48.0).unwrap();
        let after = probe(&fast).unwrap();
        assert_eq!(after.frame_count, before.frame_count);
        assert!((after.fps - 48.0).abs() < 0.01);

        let (p1, p2) = (dir.path().join("p1.mp4"), dir.path().join("p2.mp4"));
        split_at_frame(&bg, 10, &p1, &p2).unwrap();
        assert_eq!(probe(&p1).unwrap().frame_count, 10);
        assert_eq!(probe(&p2).unwrap().frame_count, 14);
        assert!(split_at_frame(&bg, 0, &p1, &p2).is_err());

        let settings = ComposeDefaults::default();
        let overlaid = dir.path().join("overlaid.mp4");
        overlay_bottom_right(&bg, &ov, &overlaid, &settings).unwrap();
        let info = probe(&overlaid).unwrap();
        assert_eq!((info.width, info.height), (160, 120));
        assert!(info.duration_secs >= 1.9);

        let joined = dir.path().join("joined.mp4");
        concat_with_padding(&ov, &bg, &joined, &settings).unwrap();
        let info = probe(&joined).unwrap();
        assert_eq!((info.width, info.height), (160, 120));
        assert!(info.duration_secs >= 2.9);
    }
}
