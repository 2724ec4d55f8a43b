//! Chart rasterization.
//!
//! A [`FrameRenderer`] owns the static part of a chart (background,
//! grid, ticks, title, axis labels) rendered once at construction.
//! Each frame copies that base into a caller-owned buffer and draws the
//! data series and legend on top.

use ab_glyph::{FontVec, PxScale};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut, text_size,
};
use imageproc::rect::Rect;

use insitu_common::error::{InsituError, InsituResult};
use insitu_data_model::sample::{finite_range, SmoothedCurve};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 128, 0]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const LEGEND_BORDER: Rgb<u8> = Rgb([200, 200, 200]);

const TITLE_PX: f32 = 18.0;
const LABEL_PX: f32 = 15.0;
const TICK_PX: f32 = 12.0;

/// Closed data interval shown on one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    /// Validated explicit range.
    pub fn new(min: f64, max: f64) -> InsituResult<Self> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(InsituError::config(format!(
                "axis range must satisfy min < max, got [{min}, {max}]"
            )));
        }
        Ok(Self { min, max })
    }

    /// Range covering `values`; a degenerate span is widened by 0.5 each way.
    pub fn covering(values: &[f64]) -> Option<Self> {
        let (min, max) = finite_range(values)?;
        if min == max {
            return Some(Self {
                min: min - 0.5,
                max: max + 0.5,
            });
        }
        Some(Self { min, max })
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }
}

/// Axis limits for a whole chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimits {
    pub x: AxisRange,
    pub y: AxisRange,
}

impl AxisLimits {
    /// Explicit limits win; otherwise `[min, max]` of the full series.
    pub fn resolve(
        xs: &[f64],
        ys: &[f64],
        xlim: Option<(f64, f64)>,
        ylim: Option<(f64, f64)>,
    ) -> InsituResult<Self> {
        let axis = |lim: Option<(f64, f64)>, values: &[f64], name: &str| match lim {
            Some((lo, hi)) => AxisRange::new(lo, hi),
            None => AxisRange::covering(values).ok_or_else(|| {
                InsituError::insufficient_data(format!("no finite {name} values to scale the axis"))
            }),
        };
        Ok(Self {
            x: axis(xlim, xs, "x")?,
            y: axis(ylim, ys, "y")?,
        })
    }

    /// Limits for an animated curve, computed once over every sample.
    pub fn for_curve(
        curve: &SmoothedCurve,
        xlim: Option<(f64, f64)>,
        ylim: Option<(f64, f64)>,
    ) -> InsituResult<Self> {
        Self::resolve(curve.epsilon(), curve.sigma(), xlim, ylim)
    }
}

/// How a series is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeriesStyle {
    Markers { radius: i32 },
    Line,
}

/// One data series in data coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Series<'a> {
    pub label: &'a str,
    pub color: Rgb<u8>,
    pub style: SeriesStyle,
    pub points: &'a [(f64, f64)],
}

/// Static chart text.
#[derive(Debug, Clone)]
pub struct ChartLabels {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

impl ChartLabels {
    pub fn stress_strain() -> Self {
        Self {
            title: "Stress-Strain Curve (Smoothed)".to_string(),
            x_label: "ε (%)".to_string(),
            y_label: "σ (MPa)".to_string(),
        }
    }

    pub fn polynomial_fit() -> Self {
        Self {
            title: "Polynomial Fit and Calculation Results".to_string(),
            x_label: "x".to_string(),
            y_label: "y".to_string(),
        }
    }
}

/// Pixel placement of the plot area inside the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl PlotArea {
    /// Margins scaled from a 640x480 layout.
    pub fn for_frame(width: u32, height: u32) -> Self {
        let sx = |px: f64| (px * f64::from(width) / 640.0).round() as u32;
        let sy = |px: f64| (px * f64::from(height) / 480.0).round() as u32;
        let left = sx(80.0);
        let right = sx(20.0);
        let top = sy(40.0);
        let bottom = sy(55.0);
        Self {
            left,
            top,
            width: width.saturating_sub(left + right).max(1),
            height: height.saturating_sub(top + bottom).max(1),
        }
    }

    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }

    /// Map a data point to pixel coordinates.
    pub fn project(&self, limits: &AxisLimits, x: f64, y: f64) -> (f32, f32) {
        let fx = (x - limits.x.min) / limits.x.span();
        let fy = (y - limits.y.min) / limits.y.span();
        let px = f64::from(self.left) + fx * f64::from(self.width);
        let py = f64::from(self.bottom()) - fy * f64::from(self.height);
        (px as f32, py as f32)
    }
}

/// Renders chart frames of a fixed size.
pub struct FrameRenderer {
    width: u32,
    height: u32,
    area: PlotArea,
    limits: AxisLimits,
    font: Option<FontVec>,
    base: RgbImage,
}

impl FrameRenderer {
    pub fn new(
        width: u32,
        height: u32,
        limits: AxisLimits,
        labels: &ChartLabels,
        font: Option<FontVec>,
    ) -> InsituResult<Self> {
        if width < 64 || height < 64 {
            return Err(InsituError::render(format!(
                "frame size {width}x{height} is too small for a chart"
            )));
        }
        let area = PlotArea::for_frame(width, height);
        let base = draw_base(width, height, &area, &limits, labels, font.as_ref());
        Ok(Self {
            width,
            height,
            area,
            limits,
            font,
            base,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn limits(&self) -> &AxisLimits {
        &self.limits
    }

    /// A blank buffer of the right size.
    pub fn blank_frame(&self) -> RgbImage {
        RgbImage::from_pixel(self.width, self.height, WHITE)
    }

    /// Draw `series` (in order) plus a legend into `frame`.
    pub fn render(&self, series: &[Series<'_>], frame: &mut RgbImage) -> InsituResult<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(InsituError::render(format!(
                "frame buffer is {:?}, expected {}x{}",
                frame.dimensions(),
                self.width,
                self.height
            )));
        }
        frame.copy_from_slice(self.base.as_raw());

        for s in series {
            self.draw_series(s, frame);
        }
        self.draw_legend(series, frame);
        Ok(())
    }

    /// One animation frame: points before `index` as history, `index` highlighted.
    pub fn render_curve_frame(
        &self,
        points: &[(f64, f64)],
        index: usize,
        frame: &mut RgbImage,
    ) -> InsituResult<()> {
        let current = points.get(index..=index).ok_or_else(|| {
            InsituError::render(format!(
                "frame index {index} out of range for {} points",
                points.len()
            ))
        })?;
        let series = [
            Series {
                label: "Previous Points",
                color: BLUE,
                style: SeriesStyle::Markers { radius: 2 },
                points: &points[..index],
            },
            Series {
                label: "Current Point",
                color: RED,
                style: SeriesStyle::Markers { radius: 5 },
                points: current,
            },
        ];
        self.render(&series, frame)
    }

    fn draw_series(&self, series: &Series<'_>, frame: &mut RgbImage) {
        match series.style {
            SeriesStyle::Markers { radius } => {
                for &(x, y) in series.points {
                    if !self.limits.x.contains(x) || !self.limits.y.contains(y) {
                        continue;
                    }
                    let (px, py) = self.area.project(&self.limits, x, y);
                    draw_filled_circle_mut(
                        frame,
                        (px.round() as i32, py.round() as i32),
                        radius,
                        series.color,
                    );
                }
            }
            SeriesStyle::Line => {
                for pair in series.points.windows(2) {
                    let (a, b) = (pair[0], pair[1]);
                    let inside = |(x, y): (f64, f64)| {
                        self.limits.x.contains(x) && self.limits.y.contains(y)
                    };
                    if !inside(a) || !inside(b) {
                        continue;
                    }
                    let pa = self.area.project(&self.limits, a.0, a.1);
                    let pb = self.area.project(&self.limits, b.0, b.1);
                    draw_line_segment_mut(frame, pa, pb, series.color);
                    draw_line_segment_mut(frame, (pa.0, pa.1 + 1.0), (pb.0, pb.1 + 1.0), series.color);
                }
            }
        }
    }

    fn draw_legend(&self, series: &[Series<'_>], frame: &mut RgbImage) {
        if series.is_empty() {
            return;
        }
        let scale = PxScale::from(TICK_PX);
        let row_h = (TICK_PX * 1.4) as u32;
        let swatch = 18u32;
        let text_w = self
            .font
            .as_ref()
            .map(|font| {
                series
                    .iter()
                    .map(|s| text_size(scale, font, s.label).0)
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);

        let x0 = self.area.left + 8;
        let y0 = self.area.top + 8;
        let box_w = swatch + 16 + text_w;
        let box_h = row_h * series.len() as u32 + 8;
        let rect = Rect::at(x0 as i32, y0 as i32).of_size(box_w, box_h);
        draw_filled_rect_mut(frame, rect, WHITE);
        draw_hollow_rect_mut(frame, rect, LEGEND_BORDER);

        for (i, s) in series.iter().enumerate() {
            let cy = (y0 + 4 + row_h * i as u32 + row_h / 2) as i32;
            let cx = (x0 + 4 + swatch / 2) as i32;
            match s.style {
                SeriesStyle::Markers { radius } => {
                    draw_filled_circle_mut(frame, (cx, cy), radius.max(3), s.color);
                }
                SeriesStyle::Line => {
                    let half = (swatch / 2) as f32;
                    let y = cy as f32;
                    draw_line_segment_mut(frame, (cx as f32 - half, y), (cx as f32 + half, y), s.color);
                }
            }
            if let Some(font) = &self.font {
                let tx = (x0 + 8 + swatch) as i32;
                let ty = cy - (TICK_PX / 2.0) as i32;
                draw_text_mut(frame, BLACK, tx, ty, scale, font, s.label);
            }
        }
    }
}

fn draw_base(
    width: u32,
    height: u32,
    area: &PlotArea,
    limits: &AxisLimits,
    labels: &ChartLabels,
    font: Option<&FontVec>,
) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, WHITE);
    let tick_scale = PxScale::from(TICK_PX);

    let x_ticks = nice_ticks(limits.x.min, limits.x.max, 6);
    let y_ticks = nice_ticks(limits.y.min, limits.y.max, 6);

    for &t in &x_ticks {
        let (px, _) = area.project(limits, t, limits.y.min);
        let bottom = area.bottom() as f32;
        draw_line_segment_mut(&mut img, (px, area.top as f32), (px, bottom), GRID);
        draw_line_segment_mut(&mut img, (px, bottom), (px, bottom + 5.0), BLACK);
        if let Some(font) = font {
            let text = format_tick(t, &x_ticks);
            let (w, _) = text_size(tick_scale, font, &text);
            draw_text_mut(
                &mut img,
                BLACK,
                px as i32 - (w / 2) as i32,
                bottom as i32 + 8,
                tick_scale,
                font,
                &text,
            );
        }
    }

    for &t in &y_ticks {
        let (_, py) = area.project(limits, limits.x.min, t);
        let left = area.left as f32;
        draw_line_segment_mut(&mut img, (left, py), (area.right() as f32, py), GRID);
        draw_line_segment_mut(&mut img, (left - 5.0, py), (left, py), BLACK);
        if let Some(font) = font {
            let text = format_tick(t, &y_ticks);
            let (w, h) = text_size(tick_scale, font, &text);
            draw_text_mut(
                &mut img,
                BLACK,
                area.left as i32 - 8 - w as i32,
                py as i32 - (h / 2) as i32,
                tick_scale,
                font,
                &text,
            );
        }
    }

    let frame_rect = Rect::at(area.left as i32, area.top as i32).of_size(area.width, area.height);
    draw_hollow_rect_mut(&mut img, frame_rect, BLACK);

    if let Some(font) = font {
        let title_scale = PxScale::from(TITLE_PX);
        let (w, _) = text_size(title_scale, font, &labels.title);
        let tx = area.left as i32 + (area.width as i32 - w as i32) / 2;
        draw_text_mut(&mut img, BLACK, tx, (area.top as i32 - 28).max(2), title_scale, font, &labels.title);

        let label_scale = PxScale::from(LABEL_PX);
        let (w, _) = text_size(label_scale, font, &labels.x_label);
        let tx = area.left as i32 + (area.width as i32 - w as i32) / 2;
        draw_text_mut(&mut img, BLACK, tx, area.bottom() as i32 + 28, label_scale, font, &labels.x_label);

        let rotated = rotated_label(font, label_scale, &labels.y_label);
        let ly = area.top as i64 + (i64::from(area.height) - i64::from(rotated.height())) / 2;
        imageops::overlay(&mut img, &rotated, 6, ly.max(0));
    }

    img
}

/// Chart of a polynomial fit: fitting points, the fitted curve, and the
/// evaluated calculation points.
pub fn render_fit_chart(
    fitting: &[(f64, f64)],
    curve: &[(f64, f64)],
    calculated: &[(f64, f64)],
    width: u32,
    height: u32,
    font: Option<FontVec>,
) -> InsituResult<RgbImage> {
    let all: Vec<(f64, f64)> = fitting.iter().chain(curve).chain(calculated).copied().collect();
    let (xs, ys): (Vec<f64>, Vec<f64>) = all.into_iter().unzip();
    let limits = AxisLimits::resolve(&xs, &ys, None, None)?;

    let renderer = FrameRenderer::new(width, height, limits, &ChartLabels::polynomial_fit(), font)?;
    let series = [
        Series {
            label: "Fitting Data",
            color: RED,
            style: SeriesStyle::Markers { radius: 4 },
            points: fitting,
        },
        Series {
            label: "Polynomial Fit",
            color: BLUE,
            style: SeriesStyle::Line,
            points: curve,
        },
        Series {
            label: "Calculated Data",
            color: GREEN,
            style: SeriesStyle::Markers { radius: 4 },
            points: calculated,
        },
    ];
    let mut image = renderer.blank_frame();
    renderer.render(&series, &mut image)?;
    Ok(image)
}

/// Render `text` on white and rotate it to read bottom-to-top.
fn rotated_label(font: &FontVec, scale: PxScale, text: &str) -> RgbImage {
    let (w, h) = text_size(scale, font, text);
    let mut label = RgbImage::from_pixel(w.max(1) + 2, h.max(1) + 4, WHITE);
    draw_text_mut(&mut label, BLACK, 1, 0, scale, font, text);
    imageops::rotate270(&label)
}

/// Evenly spaced "round" tick values inside `[min, max]`.
pub fn nice_ticks(min: f64, max: f64, target: usize) -> Vec<f64> {
    if !(min.is_finite() && max.is_finite()) || min >= max || target == 0 {
        return Vec::new();
    }
    let raw = (max - min) / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);

    let first = (min / step).ceil() as i64;
    let last = (max / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

fn format_tick(value: f64, ticks: &[f64]) -> String {
    let step = match ticks {
        [a, b, ..] => (b - a).abs(),
        _ => 1.0,
    };
    let decimals = (-step.log10().floor()).max(0.0) as usize;
    let decimals = if step * 10f64.powi(decimals as i32) % 1.0 > 1e-9 {
        decimals + 1
    } else {
        decimals
    };
    let text = format!("{value:.decimals$}");
    if text.starts_with('-') && text[1..].chars().all(|c| c == '0' || c == '.') {
        text[1..].to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> FrameRenderer {
        let limits = AxisLimits {
            x: AxisRange::new(0.0, 10.0).unwrap(),
            y: AxisRange::new(0.0, 100.0).unwrap(),
        };
        FrameRenderer::new(640, 480, limits, &ChartLabels::stress_strain(), None).unwrap()
    }

    #[test]
    fn test_auto_limits_cover_full_series() {
        let curve = SmoothedCurve::new(vec![0.5, 2.0, 1.0], vec![10.0, 30.0, 20.0]);
        let limits = AxisLimits::for_curve(&curve, None, Some((0.0, 50.0))).unwrap();
        assert_eq!(limits.x, AxisRange { min: 0.5, max: 2.0 });
        assert_eq!(limits.y, AxisRange { min: 0.0, max: 50.0 });
    }

    #[test]
    fn test_degenerate_and_invalid_ranges() {
        let r = AxisRange::covering(&[3.0, 3.0]).unwrap();
        assert_eq!((r.min, r.max), (2.5, 3.5));
        assert!(AxisRange::new(1.0, 1.0).is_err());
        assert!(AxisRange::covering(&[]).is_none());
    }

    #[test]
    fn test_projection_maps_corners() {
        let r = renderer();
        let area = PlotArea::for_frame(640, 480);
        let (x0, y0) = area.project(r.limits(), 0.0, 0.0);
        let (x1, y1) = area.project(r.limits(), 10.0, 100.0);
        assert_eq!((x0, y0), (area.left as f32, area.bottom() as f32));
        assert_eq!((x1, y1), (area.right() as f32, area.top as f32));
    }

    #[test]
    fn test_curve_frame_highlights_current_point() {
        let r = renderer();
        let points = [(2.0, 20.0), (5.0, 50.0), (8.0, 80.0)];
        let mut frame = r.blank_frame();
        r.render_curve_frame(&points, 1, &mut frame).unwrap();

        let area = PlotArea::for_frame(640, 480);
        let (px, py) = area.project(r.limits(), 5.0, 50.0);
        assert_eq!(*frame.get_pixel(px as u32, py as u32), RED);
        let (px, py) = area.project(r.limits(), 2.0, 20.0);
        assert_eq!(*frame.get_pixel(px as u32, py as u32), BLUE);
        let (px, py) = area.project(r.limits(), 8.0, 80.0);
        assert_ne!(*frame.get_pixel(px as u32, py as u32), BLUE);
    }

    #[test]
    fn test_frame_buffer_is_fully_rewritten() {
        let r = renderer();
        let points = [(2.0, 20.0), (9.0, 90.0)];
        let mut frame = r.blank_frame();
        r.render_curve_frame(&points, 1, &mut frame).unwrap();
        r.render_curve_frame(&points, 0, &mut frame).unwrap();

        let area = PlotArea::for_frame(640, 480);
        let (px, py) = area.project(r.limits(), 9.0, 90.0);
        assert_ne!(*frame.get_pixel(px as u32, py as u32), RED);
    }

    #[test]
    fn test_wrong_buffer_size_and_index_are_rejected() {
        let r = renderer();
        let mut small = RgbImage::new(10, 10);
        assert!(r.render(&[], &mut small).is_err());
        let mut frame = r.blank_frame();
        assert!(r.render_curve_frame(&[(1.0, 1.0)], 1, &mut frame).is_err());
    }

    #[test]
    fn test_fit_chart_draws_all_series() {
        let fitting = [(0.0, 0.0), (10.0, 100.0)];
        let curve: Vec<(f64, f64)> = (0..=10).map(|i| (i as f64, (i * i) as f64)).collect();
        let calculated = [(5.0, 25.0)];
        let image = render_fit_chart(&fitting, &curve, &calculated, 640, 480, None).unwrap();

        let area = PlotArea::for_frame(640, 480);
        let limits = AxisLimits {
            x: AxisRange::new(0.0, 10.0).unwrap(),
            y: AxisRange::new(0.0, 100.0).unwrap(),
        };
        let (px, py) = area.project(&limits, 5.0, 25.0);
        assert_eq!(*image.get_pixel(px as u32, py as u32), GREEN);
        assert!(image.pixels().any(|p| *p == BLUE));
        assert!(image.pixels().any(|p| *p == RED));
    }

    #[test]
    fn test_nice_ticks() {
        assert_eq!(nice_ticks(0.0, 10.0, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        let ticks = nice_ticks(0.13, 0.87, 6);
        assert!(ticks.iter().all(|t| (0.13..=0.87).contains(t)));
        assert!(nice_ticks(1.0, 1.0, 5).is_empty());
    }

    #[test]
    fn test_tick_labels_use_step_precision() {
        assert_eq!(format_tick(0.5, &[0.0, 0.5]), "0.5");
        assert_eq!(format_tick(100.0, &[0.0, 20.0]), "100");
        assert_eq!(format_tick(0.25, &[0.0, 0.25]), "0.25");
    }
}
