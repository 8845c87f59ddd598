//! Spectrogram raster rendering
//!
//! Time runs left to right (oldest first), frequency bottom to top from 0 Hz
//! to Nyquist. Colours are scaled between the finite minimum and maximum of
//! the matrix; NaN cells are left as background.

use super::PersistError;
use super::font::{self, GLYPH_HEIGHT};
use crate::config::Colormap;
use tiny_skia::*;

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 500;
const LEFT: u32 = 90;
const RIGHT: u32 = 130;
const TOP: u32 = 44;
const BOTTOM: u32 = 84;
const BAR_GAP: u32 = 20;
const BAR_WIDTH: u32 = 20;

const BACKGROUND: [u8; 3] = [255, 255, 255];

const SPECTRAL: &[(f32, [u8; 3])] = &[
    (0.00, [0, 0, 0]),
    (0.05, [119, 0, 136]),
    (0.10, [136, 0, 153]),
    (0.15, [0, 0, 170]),
    (0.20, [0, 0, 221]),
    (0.25, [0, 119, 221]),
    (0.30, [0, 153, 221]),
    (0.35, [0, 170, 170]),
    (0.40, [0, 170, 136]),
    (0.45, [0, 153, 0]),
    (0.50, [0, 187, 0]),
    (0.55, [0, 221, 0]),
    (0.60, [0, 255, 0]),
    (0.65, [187, 255, 0]),
    (0.70, [238, 238, 0]),
    (0.75, [255, 204, 0]),
    (0.80, [255, 153, 0]),
    (0.85, [255, 0, 0]),
    (0.90, [221, 0, 0]),
    (0.95, [204, 0, 0]),
    (1.00, [204, 204, 204]),
];

const VIRIDIS: &[(f32, [u8; 3])] = &[
    (0.00, [68, 1, 84]),
    (0.25, [59, 82, 139]),
    (0.50, [33, 145, 140]),
    (0.75, [94, 201, 98]),
    (1.00, [253, 231, 37]),
];

const GRAY: &[(f32, [u8; 3])] = &[(0.0, [0, 0, 0]), (1.0, [255, 255, 255])];

/// Everything needed to draw one snapshot
#[derive(Debug, Clone, Copy)]
pub struct Raster<'a> {
    /// Row-major `rows × bin_count`
    pub magnitudes: &'a [f32],
    pub bin_count: usize,
    pub relative_times: &'a [f64],
    pub nyquist_hz: f64,
    pub colormap: Colormap,
    pub title: &'a str,
    pub caption: &'a str,
}

impl Raster<'_> {
    fn rows(&self) -> usize {
        if self.bin_count == 0 {
            0
        } else {
            self.magnitudes.len() / self.bin_count
        }
    }
}

/// Interpolated colour for `t` in `[0, 1]`
pub fn color_at(colormap: Colormap, t: f32) -> [u8; 3] {
    let stops = match colormap {
        Colormap::Spectral => SPECTRAL,
        Colormap::Viridis => VIRIDIS,
        Colormap::Gray => GRAY,
    };
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

    let upper = stops.partition_point(|(pos, _)| *pos < t).min(stops.len() - 1);
    if upper == 0 {
        return stops[0].1;
    }
    let (p0, c0) = stops[upper - 1];
    let (p1, c1) = stops[upper];
    let f = if p1 > p0 { (t - p0) / (p1 - p0) } else { 0.0 };
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * f).round() as u8;
    [mix(c0[0], c1[0]), mix(c0[1], c1[1]), mix(c0[2], c1[2])]
}

/// Finite minimum and maximum; `None` when nothing is finite
pub fn value_range(values: &[f32]) -> Option<(f32, f32)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn normalize(v: f32, lo: f32, hi: f32) -> f32 {
    if hi > lo { (v - lo) / (hi - lo) } else { 0.5 }
}

fn set_pixel(pixmap: &mut Pixmap, x: u32, y: u32, rgb: [u8; 3]) {
    let width = pixmap.width();
    if let Some(color) = PremultipliedColorU8::from_rgba(rgb[0], rgb[1], rgb[2], 255) {
        if let Some(px) = pixmap.pixels_mut().get_mut((y * width + x) as usize) {
            *px = color;
        }
    }
}

/// Render the snapshot to a new pixmap
pub fn render(raster: &Raster) -> Result<Pixmap, PersistError> {
    let rows = raster.rows();
    if rows == 0 {
        return Err(PersistError::EmptyRaster);
    }
    let mut pixmap = Pixmap::new(WIDTH, HEIGHT).ok_or(PersistError::EmptyRaster)?;
    pixmap.fill(Color::from_rgba8(BACKGROUND[0], BACKGROUND[1], BACKGROUND[2], 255));

    let plot_w = WIDTH - LEFT - RIGHT;
    let plot_h = HEIGHT - TOP - BOTTOM;
    let range = value_range(raster.magnitudes);

    if let Some((lo, hi)) = range {
        for py in 0..plot_h {
            // origin at the bottom
            let bin = ((plot_h - 1 - py) as usize * raster.bin_count) / plot_h as usize;
            for px in 0..plot_w {
                let row = (px as usize * rows) / plot_w as usize;
                let v = raster.magnitudes[row * raster.bin_count + bin];
                if v.is_finite() {
                    let rgb = color_at(raster.colormap, normalize(v, lo, hi));
                    set_pixel(&mut pixmap, LEFT + px, TOP + py, rgb);
                }
            }
        }

        let bar_x = LEFT + plot_w + BAR_GAP;
        for py in 0..plot_h {
            let rgb = color_at(raster.colormap, (plot_h - 1 - py) as f32 / (plot_h - 1).max(1) as f32);
            for px in 0..BAR_WIDTH {
                set_pixel(&mut pixmap, bar_x + px, TOP + py, rgb);
            }
        }
        let label_x = (bar_x + BAR_WIDTH + 6) as f32;
        draw_label(&mut pixmap, &format_value(hi), label_x, TOP as f32);
        draw_label(&mut pixmap, &format_value(lo), label_x, (TOP + plot_h) as f32 - GLYPH_HEIGHT);
    }

    draw_frame(&mut pixmap, LEFT as f32, TOP as f32, plot_w as f32, plot_h as f32);
    draw_axes(&mut pixmap, raster, plot_w as f32, plot_h as f32);

    let title_x = ((WIDTH as f32 - font::text_width(raster.title, 2.0)) / 2.0).max(4.0);
    font::draw_text(&mut pixmap, raster.title, title_x, 12.0, 2.0, Color::BLACK);
    font::draw_text(
        &mut pixmap,
        raster.caption,
        10.0,
        HEIGHT as f32 - 10.0 - GLYPH_HEIGHT * 2.0,
        2.0,
        Color::from_rgba8(60, 60, 60, 255),
    );

    Ok(pixmap)
}

fn draw_label(pixmap: &mut Pixmap, text: &str, x: f32, y: f32) {
    font::draw_text(pixmap, text, x, y, 1.0, Color::BLACK);
}

fn draw_axes(pixmap: &mut Pixmap, raster: &Raster, plot_w: f32, plot_h: f32) {
    let left = LEFT as f32;
    let top = TOP as f32;
    let bottom = top + plot_h;

    let first = raster.relative_times.first().copied().unwrap_or(0.0);
    let last = raster.relative_times.last().copied().unwrap_or(0.0);
    let start = format!("{:.1}", first);
    let end = format!("{:.1}", last);
    draw_label(pixmap, &start, left, bottom + 6.0);
    draw_label(pixmap, &end, left + plot_w - font::text_width(&end, 1.0), bottom + 6.0);
    let x_title = "TIME (S)";
    draw_label(pixmap, x_title, left + (plot_w - font::text_width(x_title, 1.0)) / 2.0, bottom + 20.0);

    let nyquist = format!("{:.0}", raster.nyquist_hz);
    draw_label(pixmap, &nyquist, left - 6.0 - font::text_width(&nyquist, 1.0), top);
    draw_label(pixmap, "0", left - 6.0 - font::text_width("0", 1.0), bottom - GLYPH_HEIGHT);
    draw_label(pixmap, "FREQ (HZ)", 8.0, top + plot_h / 2.0);
}

fn draw_frame(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32) {
    let Some(rect) = Rect::from_xywh(x, y, w, h) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color_rgba8(0, 0, 0, 255);
    paint.anti_alias = false;
    let stroke = Stroke {
        width: 1.0,
        ..Stroke::default()
    };
    let path = PathBuilder::from_rect(rect);
    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

fn format_value(v: f32) -> String {
    let magnitude = v.abs();
    if magnitude != 0.0 && !(0.01..10_000.0).contains(&magnitude) {
        format!("{:.2E}", v)
    } else {
        format!("{:.2}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster<'a>(magnitudes: &'a [f32], bins: usize, times: &'a [f64]) -> Raster<'a> {
        Raster {
            magnitudes,
            bin_count: bins,
            relative_times: times,
            nyquist_hz: 500.0,
            colormap: Colormap::Gray,
            title: "60S SPECTROGRAM SNAPSHOT",
            caption: "CAPTURED AT: 2026-10-18 12:00:00",
        }
    }

    fn rgb(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 3] {
        let p = pixmap.pixel(x, y).unwrap();
        [p.red(), p.green(), p.blue()]
    }

    #[test]
    fn test_colormap_endpoints() {
        assert_eq!(color_at(Colormap::Gray, 0.0), [0, 0, 0]);
        assert_eq!(color_at(Colormap::Gray, 1.0), [255, 255, 255]);
        assert_eq!(color_at(Colormap::Gray, 2.0), [255, 255, 255]);
        assert_eq!(color_at(Colormap::Viridis, 0.0), [68, 1, 84]);
        assert_eq!(color_at(Colormap::Spectral, 0.85), [255, 0, 0]);
        let mid = color_at(Colormap::Gray, 0.5);
        assert!((127..=128).contains(&mid[0]));
    }

    #[test]
    fn test_value_range_ignores_nan() {
        assert_eq!(value_range(&[f32::NAN, 2.0, -1.0, f32::INFINITY]), Some((-1.0, 2.0)));
        assert_eq!(value_range(&[f32::NAN]), None);
        assert_eq!(value_range(&[]), None);
    }

    #[test]
    fn test_nan_rows_stay_background() {
        // three time rows, one bin each: black, white, missing
        let magnitudes = [0.0, 1.0, f32::NAN];
        let times = [-2.0, -1.0, 0.0];
        let pixmap = render(&raster(&magnitudes, 1, &times)).unwrap();
        assert_eq!(pixmap.width(), WIDTH);
        assert_eq!(pixmap.height(), HEIGHT);

        let y = TOP + (HEIGHT - TOP - BOTTOM) / 2;
        assert_eq!(rgb(&pixmap, LEFT + 10, y), [0, 0, 0]);
        assert_eq!(rgb(&pixmap, WIDTH - RIGHT - 10, y), BACKGROUND);
    }

    #[test]
    fn test_low_frequencies_at_bottom() {
        // one row, two bins: bin 0 low value, bin 1 high value
        let magnitudes = [1.0, 3.0];
        let times = [0.0];
        let pixmap = render(&raster(&magnitudes, 2, &times)).unwrap();
        let x = LEFT + 50;
        assert_eq!(rgb(&pixmap, x, HEIGHT - BOTTOM - 5), [0, 0, 0]);
        assert_eq!(rgb(&pixmap, x, TOP + 5), [255, 255, 255]);
    }

    #[test]
    fn test_empty_matrix_is_rejected() {
        let result = render(&raster(&[], 4, &[]));
        assert!(matches!(result, Err(PersistError::EmptyRaster)));
    }
}
