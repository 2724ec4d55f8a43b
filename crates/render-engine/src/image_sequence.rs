//! Image folders: listing, lookup, and assembly into videos.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ab_glyph::{FontVec, PxScale};
use image::imageops::{self, FilterType};
use image::{GenericImageView, RgbImage};
use imageproc::drawing::draw_text_mut;
use serde::Serialize;

use insitu_common::error::{InsituError, InsituResult};

use crate::font::load_font;
use crate::plot::WHITE;
use crate::video::VideoWriter;

/// Names of all regular files in `folder`, sorted.
pub fn list_file_names(folder: &Path) -> InsituResult<Vec<String>> {
    if !folder.is_dir() {
        return Err(InsituError::FileNotFound {
            path: folder.to_path_buf(),
        });
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// `.jpg` files in `folder`, sorted by file name.
pub fn list_images(folder: &Path) -> InsituResult<Vec<PathBuf>> {
    Ok(list_file_names(folder)?
        .into_iter()
        .filter(|name| is_jpeg_name(name))
        .map(|name| folder.join(name))
        .collect())
}

/// Exact, case-sensitive `.jpg` suffix.
fn is_jpeg_name(name: &str) -> bool {
    name.ends_with(".jpg")
}

/// Position of `name` in the sorted image list of `folder`.
pub fn frame_index_of_image(name: &str, folder: &Path) -> InsituResult<Option<usize>> {
    let images = list_images(folder)?;
    Ok(images
        .iter()
        .position(|p| p.file_name().is_some_and(|f| f == name)))
}

/// Rectangle cut out of every frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropArea {
    /// Fails unless the area is non-empty and inside a `width x height` frame.
    pub fn check_within(&self, width: u32, height: u32) -> InsituResult<()> {
        let fits = self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|r| r <= width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= height);
        if fits {
            Ok(())
        } else {
            Err(InsituError::config(format!(
                "crop area {self} does not fit a {width}x{height} frame"
            )))
        }
    }
}

impl fmt::Display for CropArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for CropArea {
    type Err = InsituError;

    /// Parse `x,y,width,height`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|e| InsituError::parse(format!("invalid crop area {s:?}: {e}")))?;
        match parts[..] {
            [x, y, width, height] => Ok(Self {
                x,
                y,
                width,
                height,
            }),
            _ => Err(InsituError::parse(format!(
                "crop area needs four values x,y,width,height, got {s:?}"
            ))),
        }
    }
}

/// Crop (if requested) and bring `image` to the output frame size.
pub fn prepare_frame(image: &RgbImage, crop: Option<CropArea>, width: u32, height: u32) -> RgbImage {
    let cropped = match crop {
        Some(c) => imageops::crop_imm(image, c.x, c.y, c.width, c.height).to_image(),
        None => image.clone(),
    };
    if cropped.dimensions() == (width, height) {
        cropped
    } else {
        imageops::resize(&cropped, width, height, FilterType::Triangle)
    }
}

/// Draw `text` in white at (10, 30).
pub fn label_frame(frame: &mut RgbImage, text: &str, font: &FontVec) {
    draw_text_mut(frame, WHITE, 10, 30, PxScale::from(24.0), font, text);
}

/// Assemble a folder of `.jpg` images into two videos.
#[derive(Debug, Clone)]
pub struct ImageVideoJob {
    pub folder: PathBuf,
    /// Frames without any overlay.
    pub output: PathBuf,
    /// Frames with the source file name drawn on them.
    pub labeled_output: PathBuf,
    pub fps: u32,
    pub crop: Option<CropArea>,
    pub codec: String,
    pub font: Option<PathBuf>,
}

impl ImageVideoJob {
    /// `<stem>_with_filename.<ext>` next to `output`.
    pub fn default_labeled_path(output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let name = match output.extension() {
            Some(ext) => format!("{stem}_with_filename.{}", ext.to_string_lossy()),
            None => format!("{stem}_with_filename"),
        };
        output.with_file_name(name)
    }
}

/// Outcome of an image-sequence run.
#[derive(Debug, Clone, Serialize)]
pub struct ImageVideoSummary {
    pub frames_written: u64,
    pub skipped: Vec<PathBuf>,
    pub width: u32,
    pub height: u32,
}

/// Build both videos. The first image fixes the frame size.
pub fn build_image_video(job: &ImageVideoJob) -> InsituResult<ImageVideoSummary> {
    let images = list_images(&job.folder)?;
    let first = images.first().ok_or_else(|| {
        InsituError::insufficient_data(format!("no .jpg images in {}", job.folder.display()))
    })?;
    let first_image = image::open(first)
        .map_err(|e| InsituError::render(format!("cannot read {}: {e}", first.display())))?;
    let (width, height) = (first_image.width(), first_image.height());
    drop(first_image);

    if let Some(crop) = job.crop {
        crop.check_within(width, height)?;
    }

    for out in [&job.output, &job.labeled_output] {
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }

    let font = load_font(job.font.as_deref());
    let mut plain = VideoWriter::create(&job.output, width, height, job.fps, &job.codec)?;
    let mut labeled = VideoWriter::create(&job.labeled_output, width, height, job.fps, &job.codec)?;

    tracing::info!(
        images = images.len(),
        width,
        height,
        crop = ?job.crop,
        "Building image-sequence videos"
    );

    let mut skipped = Vec::new();
    for path in &images {
        let image = match image::open(path) {
            Ok(img) => img.to_rgb8(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable image");
                skipped.push(path.clone());
                continue;
            }
        };

        let mut frame = prepare_frame(&image, job.crop, width, height);
        plain.write_frame(&frame)?;

        if let Some(font) = &font {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            label_frame(&mut frame, &name, font);
        }
        labeled.write_frame(&frame)?;
    }

    let frames_written = plain.finish()?;
    labeled.finish()?;

    Ok(ImageVideoSummary {
        frames_written,
        skipped,
        width,
        height,
    })
}
