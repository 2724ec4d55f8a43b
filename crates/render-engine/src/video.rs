//! ffmpeg/ffprobe process plumbing.
//!
//! Frames are streamed to an `ffmpeg` child as raw RGB24 over stdin;
//! container metadata comes from `ffprobe` JSON. stderr of long-running
//! children is drained on a helper thread so the pipe never fills.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use image::RgbImage;
use serde::Serialize;

use insitu_common::error::{InsituError, InsituResult};

/// Basic properties of a video file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: u64,
    pub duration_secs: f64,
}

pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Both `ffmpeg` and `ffprobe` are on PATH.
pub fn ffmpeg_available() -> bool {
    command_exists("ffmpeg") && command_exists("ffprobe")
}

/// Parse an ffprobe rate such as `30000/1001` or `24`.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Probe a video file's first video stream.
pub fn probe(path: &Path) -> InsituResult<VideoInfo> {
    if !path.is_file() {
        return Err(InsituError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .output()
        .map_err(|e| InsituError::video(format!("Failed to start ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(InsituError::video(format!(
            "ffprobe failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let info = video_info_from_probe(&json).ok_or_else(|| {
        InsituError::video(format!("{} has no readable video stream", path.display()))
    })?;
    tracing::debug!(path = %path.display(), ?info, "Probed video");
    Ok(info)
}

/// Extract [`VideoInfo`] from `ffprobe -print_format json` output.
pub fn video_info_from_probe(json: &serde_json::Value) -> Option<VideoInfo> {
    let stream = json["streams"].as_array()?.first()?;

    let width = u32::try_from(stream["width"].as_u64()?).ok()?;
    let height = u32::try_from(stream["height"].as_u64()?).ok()?;
    let fps = stream["r_frame_rate"]
        .as_str()
        .and_then(parse_frame_rate)
        .or_else(|| stream["avg_frame_rate"].as_str().and_then(parse_frame_rate))?;

    let number = |v: &serde_json::Value| {
        v.as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .or_else(|| v.as_f64())
    };
    let duration_secs = number(&stream["duration"])
        .or_else(|| number(&json["format"]["duration"]))
        .unwrap_or(0.0);
    let frame_count = stream["nb_frames"]
        .as_str()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or_else(|| (duration_secs * fps).round().max(0.0) as u64);

    Some(VideoInfo {
        width,
        height,
        fps,
        frame_count,
        duration_secs,
    })
}

/// Encoder arguments for `path`.
///
/// `codec` is an ffmpeg encoder name, or `auto` to pick one from the
/// container extension.
pub fn codec_args(path: &Path, codec: &str) -> Vec<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let codec = if codec.eq_ignore_ascii_case("auto") {
        match ext.as_str() {
            "mp4" | "mov" | "mkv" => "libx264",
            "webm" => "libvpx-vp9",
            _ => "mpeg4",
        }
    } else {
        codec
    };

    let mut args = vec!["-c:v".to_string(), codec.to_string()];
    match codec {
        "libx264" | "libx265" => args.extend(["-pix_fmt", "yuv420p"].map(String::from)),
        "mpeg4" => {
            args.extend(["-q:v", "3"].map(String::from));
            if ext == "avi" {
                args.extend(["-vtag", "xvid"].map(String::from));
            }
        }
        _ => {}
    }
    args
}

/// Run ffmpeg to completion; the error carries ffmpeg's stderr.
pub fn run_ffmpeg(args: &[String]) -> InsituResult<()> {
    tracing::debug!(?args, "Running ffmpeg");
    let output = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| InsituError::video(format!("Failed to start ffmpeg: {e}")))?;

    if !output.status.success() {
        return Err(InsituError::video(format!(
            "ffmpeg failed (status {}): {}",
            output.status,
            stderr_tail(&String::from_utf8_lossy(&output.stderr))
        )));
    }
    Ok(())
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    lines[lines.len().saturating_sub(8)..].join("\n")
}

/// Destination for rendered frames, written in order.
pub trait FrameSink {
    fn push_frame(&mut self, frame: &RgbImage) -> InsituResult<()>;
}

impl FrameSink for VideoWriter {
    fn push_frame(&mut self, frame: &RgbImage) -> InsituResult<()> {
        self.write_frame(frame)
    }
}

/// Streams RGB frames into an ffmpeg encoder.
///
/// Dropping an unfinished writer closes the stream and reaps the child,
/// so the output file is finalized on error paths too.
pub struct VideoWriter {
    path: PathBuf,
    width: u32,
    height: u32,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    frames_written: u64,
}

impl VideoWriter {
    /// Open an output stream at a fixed size and frame rate.
    pub fn create(
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        codec: &str,
    ) -> InsituResult<Self> {
        if width == 0 || height == 0 || fps == 0 {
            return Err(InsituError::video(format!(
                "invalid stream parameters {width}x{height} @ {fps} fps"
            )));
        }

        let mut args: Vec<String> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
        ]
        .map(String::from)
        .to_vec();
        args.push(format!("{width}x{height}"));
        args.push("-r".to_string());
        args.push(fps.to_string());
        args.extend(["-i", "-", "-an"].map(String::from));
        if width % 2 == 1 || height % 2 == 1 {
            args.extend(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"].map(String::from));
        }
        args.extend(codec_args(path, codec));
        args.push(path.to_string_lossy().into_owned());

        tracing::debug!(?args, "Starting ffmpeg encoder");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| InsituError::video(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child.stdin.take();
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| InsituError::video("Failed to capture ffmpeg stderr"))?;
        let stderr_task = std::thread::spawn(move || -> String {
            let mut output = String::new();
            let mut stderr = stderr;
            match stderr.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(
            path = %path.display(),
            pid = child.id(),
            width,
            height,
            fps,
            "Opened video stream"
        );

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            child,
            stdin,
            stderr_task: Some(stderr_task),
            frames_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one frame; it must match the stream size.
    pub fn write_frame(&mut self, frame: &RgbImage) -> InsituResult<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(InsituError::video(format!(
                "frame is {:?}, stream expects {}x{}",
                frame.dimensions(),
                self.width,
                self.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| InsituError::video("video stream already closed"))?;
        if let Err(e) = stdin.write_all(frame.as_raw()) {
            let detail = self.close();
            return Err(InsituError::video(format!(
                "writing frame {} to {} failed: {e}{detail}",
                self.frames_written,
                self.path.display()
            )));
        }
        self.frames_written += 1;
        tracing::trace!(frame = self.frames_written, "Wrote frame");
        Ok(())
    }

    /// Flush and close the stream. Returns the number of frames written.
    pub fn finish(mut self) -> InsituResult<u64> {
        drop(self.stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| InsituError::video(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr = self.join_stderr();

        if !status.success() {
            return Err(InsituError::video(format!(
                "ffmpeg encoding of {} failed (status {status}): {}",
                self.path.display(),
                stderr_tail(&stderr)
            )));
        }

        tracing::info!(
            path = %self.path.display(),
            frames = self.frames_written,
            "Finalized video stream"
        );
        Ok(self.frames_written)
    }

    fn join_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default()
    }

    /// Close stdin, reap the child, and return its stderr as context.
    fn close(&mut self) -> String {
        drop(self.stdin.take());
        let _ = self.child.wait();
        let stderr = self.join_stderr();
        if stderr.trim().is_empty() {
            String::new()
        } else {
            format!(" ({})", stderr_tail(&stderr))
        }
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        if self.stdin.is_some() || self.stderr_task.is_some() {
            let detail = self.close();
            tracing::warn!(
                path = %self.path.display(),
                frames = self.frames_written,
                detail = %detail,
                "Video stream closed before finish"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("24"), Some(24.0));
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("n/a"), None);
    }

    #[test]
    fn test_video_info_from_probe_json() {
        let json = serde_json::json!({
            "streams": [{
                "width": 1280,
                "height": 720,
                "r_frame_rate": "25/1",
                "nb_frames": "250",
                "duration": "10.000000"
            }],
            "format": { "duration": "10.04" }
        });
        let info = video_info_from_probe(&json).unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.frame_count, 250);
        assert_eq!(info.duration_secs, 10.0);
    }

    #[test]
    fn test_frame_count_falls_back_to_duration() {
        let json = serde_json::json!({
            "streams": [{ "width": 640, "height": 480, "r_frame_rate": "24/1" }],
            "format": { "duration": "2.5" }
        });
        let info = video_info_from_probe(&json).unwrap();
        assert_eq!(info.frame_count, 60);
        assert!(video_info_from_probe(&serde_json::json!({ "streams": [] })).is_none());
    }

    #[test]
    fn test_codec_args_follow_container() {
        let avi = codec_args(Path::new("out.avi"), "auto");
        assert_eq!(&avi[..2], &["-c:v", "mpeg4"]);
        assert!(avi.windows(2).any(|w| w[0] == "-vtag" && w[1] == "xvid"));

        let mp4 = codec_args(Path::new("out.MP4"), "auto");
        assert_eq!(&mp4[..2], &["-c:v", "libx264"]);
        assert!(mp4.contains(&"yuv420p".to_string()));

        let forced = codec_args(Path::new("out.mp4"), "mpeg4");
        assert_eq!(&forced[..2], &["-c:v", "mpeg4"]);
        assert!(!forced.contains(&"xvid".to_string()));
    }

    #[test]
    fn test_writer_round_trip_with_ffmpeg() {
        if !ffmpeg_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");

        let mut writer = VideoWriter::create(&path, 64, 48, 24, "auto").unwrap();
        let frame = RgbImage::from_pixel(64, 48, image::Rgb([10, 200, 30]));
        for _ in 0..12 {
            writer.write_frame(&frame).unwrap();
        }
        assert!(writer.write_frame(&RgbImage::new(8, 8)).is_err());
        assert_eq!(writer.finish().unwrap(), 12);

        let info = probe(&path).unwrap();
        assert_eq!((info.width, info.height), (64, 48));
        assert_eq!(info.fps, 24.0);
        assert_eq!(info.frame_count, 12);
    }
}
