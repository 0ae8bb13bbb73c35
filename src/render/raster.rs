use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut},
    rect::Rect,
};
use ndarray::Array2;

use super::{font, RenderError, Renderer};
use crate::{
    colormap::{level_index, Colormap},
    plot::{format_level, PlotSpec},
    ticks::downsample,
};

const TICK_LENGTH: u32 = 5;
const MIN_PLOT_SIZE: u32 = 10;

/// Draws plots straight to a PNG with the `image` crate.
///
/// Text is drawn with a built-in bitmap font, each font pixel being
/// `2 * font_scale` image pixels wide.
#[derive(Debug, Clone)]
pub struct RasterRenderer {
    pub background: [u8; 3],
    pub foreground: [u8; 3],
    /// Colour for points with no data or outside the contour levels
    pub missing: [u8; 3],
}

impl Default for RasterRenderer {
    fn default() -> Self {
        Self {
            background: [255, 255, 255],
            foreground: [0, 0, 0],
            missing: [255, 255, 255],
        }
    }
}

impl Renderer for RasterRenderer {
    fn render(&self, spec: &PlotSpec, output: &Path) -> Result<(), RenderError> {
        let img = self.draw(spec)?;
        img.save_with_format(output, ImageFormat::Png)
            .map_err(|e| RenderError::Save {
                path: output.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

impl RasterRenderer {
    /// Draw the plot into an image of the size in `spec`.
    pub fn draw(&self, spec: &PlotSpec) -> Result<RgbImage, RenderError> {
        if spec.values.is_empty() || spec.levels.len() < 2 {
            return Err(RenderError::EmptyPlot);
        }

        let layout = Layout::new(spec)?;
        let mut img = RgbImage::from_pixel(spec.width, spec.height, Rgb(self.background));

        self.fill_contours(&mut img, spec, &layout);
        self.draw_axes(&mut img, spec, &layout);
        self.draw_colorbar(&mut img, spec, &layout);

        let fg = Rgb(self.foreground);
        let px = layout.px;
        let title_x = spec.width.saturating_sub(font::text_width(&spec.title, px)) / 2;
        draw_text(&mut img, &spec.title, title_x as i64, layout.pad as i64, px, fg, Direction::Horizontal);

        Ok(img)
    }

    fn fill_contours(&self, img: &mut RgbImage, spec: &PlotSpec, layout: &Layout) {
        let cmap = Colormap::named(spec.colormap);
        let nbands = spec.levels.len() - 1;
        let nrows = spec.n_rows();
        let ncols = spec.n_cols();

        for j in 0..layout.plot_h {
            // Row 0 (the lowest height) is at the bottom of the plot
            let r = (layout.plot_h - j) as f64 - 0.5;
            let r = r / layout.plot_h as f64 * nrows.saturating_sub(1) as f64;
            for i in 0..layout.plot_w {
                let c = (i as f64 + 0.5) / layout.plot_w as f64 * ncols.saturating_sub(1) as f64;
                let value = sample_bilinear(&spec.values, r, c);
                let color = match level_index(&spec.levels, value) {
                    Some(band) => cmap.band_color(band, nbands),
                    None => self.missing,
                };
                img.put_pixel(layout.left + i, layout.top + j, Rgb(color));
            }
        }
    }

    fn draw_axes(&self, img: &mut RgbImage, spec: &PlotSpec, layout: &Layout) {
        let fg = Rgb(self.foreground);
        let px = layout.px;
        let ch = layout.char_height();
        let bottom = layout.top + layout.plot_h;

        draw_hollow_rect_mut(
            img,
            Rect::at(layout.left as i32 - 1, layout.top as i32 - 1).of_size(layout.plot_w + 2, layout.plot_h + 2),
            fg,
        );

        for (col, label) in spec.x_ticks.iter() {
            let x = layout.left as f32 + axis_fraction(*col, spec.n_cols()) * layout.plot_w as f32;
            draw_line_segment_mut(img, (x, bottom as f32), (x, (bottom + TICK_LENGTH) as f32), fg);
            // Labels read upwards and end just below the tick
            let text_bottom = bottom + TICK_LENGTH + layout.pad + font::text_width(label, px);
            draw_text(img, label, x as i64 - (ch / 2) as i64, text_bottom as i64, px, fg, Direction::Up);
        }

        for (row, label) in spec.y_ticks.iter() {
            let y = bottom as f32 - axis_fraction(*row, spec.n_rows()) * layout.plot_h as f32;
            let x0 = layout.left - 1;
            draw_line_segment_mut(img, ((x0 - TICK_LENGTH) as f32, y), (x0 as f32, y), fg);
            let text_x = x0 as i64 - (TICK_LENGTH + layout.pad + font::text_width(label, px)) as i64;
            draw_text(img, label, text_x, y as i64 - (ch / 2) as i64, px, fg, Direction::Horizontal);
        }

        let x_label_x = layout.left as i64 + (layout.plot_w as i64 - font::text_width(&spec.x_label, px) as i64) / 2;
        let x_label_y = (spec.height - layout.pad - ch) as i64;
        draw_text(img, &spec.x_label, x_label_x, x_label_y, px, fg, Direction::Horizontal);

        let y_label_bottom = layout.top as i64 + (layout.plot_h as i64 + font::text_width(&spec.y_label, px) as i64) / 2;
        draw_text(img, &spec.y_label, layout.pad as i64, y_label_bottom, px, fg, Direction::Up);
    }

    fn draw_colorbar(&self, img: &mut RgbImage, spec: &PlotSpec, layout: &Layout) {
        let fg = Rgb(self.foreground);
        let px = layout.px;
        let ch = layout.char_height();
        let cmap = Colormap::named(spec.colormap);
        let nbands = spec.levels.len() - 1;
        let x0 = layout.colorbar_x();
        let bar_w = layout.colorbar_width();
        let bottom = layout.top + layout.plot_h;
        let level_y = |i: usize| bottom as f32 - i as f32 / nbands as f32 * layout.plot_h as f32;

        for band in 0..nbands {
            let y_top = level_y(band + 1).round() as i32;
            let y_bot = level_y(band).round() as i32;
            let h = (y_bot - y_top).max(1) as u32;
            let color = cmap.band_color(band, nbands);
            draw_filled_rect_mut(img, Rect::at(x0 as i32, y_top).of_size(bar_w, h), Rgb(color));
        }
        draw_hollow_rect_mut(img, Rect::at(x0 as i32, layout.top as i32).of_size(bar_w, layout.plot_h), fg);

        // Only label as many levels as fit without the text overlapping
        let band_h = (layout.plot_h as f32 / nbands as f32).max(1.0);
        let stride = ((ch + layout.pad) as f32 / band_h).ceil().max(1.0) as usize;
        let labelled = downsample(spec.levels.len(), stride).unwrap_or_default();
        for i in labelled {
            let y = level_y(i);
            let x_end = (x0 + bar_w) as f32;
            draw_line_segment_mut(img, (x_end, y), (x_end + TICK_LENGTH as f32, y), fg);
            let text = format_level(spec.levels[i]);
            let text_x = (x0 + bar_w + TICK_LENGTH + layout.pad) as i64;
            draw_text(img, &text, text_x, y as i64 - (ch / 2) as i64, px, fg, Direction::Horizontal);
        }

        let label_y = layout.top as i64 - (ch + layout.pad) as i64;
        draw_text(img, &spec.colorbar_label, x0 as i64, label_y, px, fg, Direction::Horizontal);
    }
}

/// Where the parts of the figure go, in image pixels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Layout {
    /// Size of one font pixel
    pub(crate) px: u32,
    pub(crate) pad: u32,
    pub(crate) left: u32,
    pub(crate) top: u32,
    pub(crate) plot_w: u32,
    pub(crate) plot_h: u32,
}

impl Layout {
    pub(crate) fn new(spec: &PlotSpec) -> Result<Self, RenderError> {
        let px = 2 * spec.font_scale.max(1);
        let ch = font::GLYPH_HEIGHT * px;
        let pad = 3 * px;

        let x_tick_w = widest(spec.x_ticks.iter().map(|(_, l)| l.as_str()), px);
        let y_tick_w = widest(spec.y_ticks.iter().map(|(_, l)| l.as_str()), px);
        let level_w = spec
            .levels
            .iter()
            .map(|&l| font::text_width(&format_level(l), px))
            .max()
            .unwrap_or(0);

        let top = pad + ch + 2 * pad + ch + pad;
        let left = pad + ch + pad + y_tick_w + pad + TICK_LENGTH;
        let bottom = TICK_LENGTH + pad + x_tick_w + pad + ch + pad;
        let right = 3 * pad + 2 * ch + TICK_LENGTH + pad + level_w + pad;

        let min_width = left + right + MIN_PLOT_SIZE;
        let min_height = top + bottom + MIN_PLOT_SIZE;
        if spec.width < min_width || spec.height < min_height {
            return Err(RenderError::TooSmall {
                width: spec.width,
                height: spec.height,
                min_width,
                min_height,
            });
        }

        Ok(Self {
            px,
            pad,
            left,
            top,
            plot_w: spec.width - left - right,
            plot_h: spec.height - top - bottom,
        })
    }

    fn char_height(&self) -> u32 {
        font::GLYPH_HEIGHT * self.px
    }

    fn colorbar_x(&self) -> u32 {
        self.left + self.plot_w + 3 * self.pad
    }

    fn colorbar_width(&self) -> u32 {
        2 * self.char_height()
    }
}

fn widest<'a>(labels: impl Iterator<Item = &'a str>, px: u32) -> u32 {
    labels.map(|l| font::text_width(l, px)).max().unwrap_or(0)
}

/// Position of sample `i` of `n` along an axis, from 0 to 1
fn axis_fraction(i: usize, n: usize) -> f32 {
    if n < 2 {
        0.5
    } else {
        i as f32 / (n - 1) as f32
    }
}

/// Sample `values` at fractional (row, column), NaN if any of the
/// surrounding points is NaN.
fn sample_bilinear(values: &Array2<f64>, r: f64, c: f64) -> f64 {
    let (nrows, ncols) = values.dim();
    let r = r.clamp(0.0, nrows.saturating_sub(1) as f64);
    let c = c.clamp(0.0, ncols.saturating_sub(1) as f64);
    let r1 = r.floor() as usize;
    let c1 = c.floor() as usize;
    let dr = r - r1 as f64;
    let dc = c - c1 as f64;
    // Points with no weight must not turn the result into NaN
    let r2 = if dr > 0.0 { (r1 + 1).min(nrows - 1) } else { r1 };
    let c2 = if dc > 0.0 { (c1 + 1).min(ncols - 1) } else { c1 };

    let v11 = values[[r1, c1]];
    let v12 = values[[r1, c2]];
    let v21 = values[[r2, c1]];
    let v22 = values[[r2, c2]];
    if v11.is_nan() || v12.is_nan() || v21.is_nan() || v22.is_nan() {
        return f64::NAN;
    }

    let lower = v11 * (1.0 - dc) + v12 * dc;
    let upper = v21 * (1.0 - dc) + v22 * dc;
    lower * (1.0 - dr) + upper * dr
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Left to right, (x, y) is the top left corner
    Horizontal,
    /// Bottom to top, (x, y) is the bottom left corner
    Up,
}

fn draw_text(img: &mut RgbImage, text: &str, x: i64, y: i64, px: u32, color: Rgb<u8>, direction: Direction) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let px = px as i64;
    for (ichar, c) in text.chars().enumerate() {
        let char_offset = ichar as i64 * font::ADVANCE as i64 * px;
        for (col, row) in font::lit_pixels(font::glyph(c)) {
            for dx in 0..px {
                for dy in 0..px {
                    // position along and across the line of text
                    let along = char_offset + col as i64 * px + dx;
                    let across = row as i64 * px + dy;
                    let (ix, iy) = match direction {
                        Direction::Horizontal => (x + along, y + across),
                        Direction::Up => (x + across, y - along),
                    };
                    if ix >= 0 && ix < w && iy >= 0 && iy < h {
                        img.put_pixel(ix as u32, iy as u32, color);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::ColormapName;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn make_spec(value: f64) -> PlotSpec {
        let mut values = Array2::from_elem((100, 40), value);
        // no data near the ground, like terrain in a real section
        values.row_mut(0).fill(f64::NAN);
        PlotSpec {
            values,
            levels: vec![0.0, 10.0, 20.0, 30.0],
            colormap: ColormapName::Jet,
            title: "Cross-Section of Wind Speed (kt)".to_string(),
            x_label: "Latitude, Longitude".to_string(),
            y_label: "Height (m)".to_string(),
            colorbar_label: "kt".to_string(),
            x_ticks: vec![(0, "36.9946, -82.3799".to_string()), (20, "36.2000, -81.7000".to_string())],
            y_ticks: vec![(0, "0".to_string()), (50, "7500".to_string())],
            width: 800,
            height: 600,
            font_scale: 1,
        }
    }

    #[test]
    fn test_draw_fills_plot_area() {
        let spec = make_spec(15.0);
        let renderer = RasterRenderer::default();
        let img = renderer.draw(&spec).unwrap();
        assert_eq!(img.dimensions(), (800, 600));

        let layout = Layout::new(&spec).unwrap();
        let center = img.get_pixel(layout.left + layout.plot_w / 2, layout.top + layout.plot_h / 2);
        let expected = Colormap::named(ColormapName::Jet).band_color(1, 3);
        assert_eq!(center.0, expected);

        // The lowest row of pixels samples the missing data
        let ground = img.get_pixel(layout.left + layout.plot_w / 2, layout.top + layout.plot_h - 1);
        assert_eq!(ground.0, renderer.missing);
    }

    #[test]
    fn test_values_outside_levels_are_blank() {
        let spec = make_spec(99.0);
        let renderer = RasterRenderer::default();
        let img = renderer.draw(&spec).unwrap();
        let layout = Layout::new(&spec).unwrap();
        let center = img.get_pixel(layout.left + layout.plot_w / 2, layout.top + layout.plot_h / 2);
        assert_eq!(center.0, renderer.missing);
    }

    #[test]
    fn test_render_writes_png() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("plot.png");
        RasterRenderer::default().render(&make_spec(5.0), &out).unwrap();
        let img = image::open(&out).unwrap();
        assert_eq!((img.width(), img.height()), (800, 600));
    }

    #[test]
    fn test_render_bad_path() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("no_such_dir").join("plot.png");
        let err = RasterRenderer::default().render(&make_spec(5.0), &out).unwrap_err();
        assert!(matches!(err, RenderError::Save { .. }));
    }

    #[test]
    fn test_too_small() {
        let mut spec = make_spec(5.0);
        spec.width = 100;
        spec.height = 80;
        let err = RasterRenderer::default().draw(&spec).unwrap_err();
        assert!(matches!(err, RenderError::TooSmall { .. }));
    }

    #[test]
    fn test_empty_plot() {
        let mut spec = make_spec(5.0);
        spec.levels = vec![1.0];
        assert!(matches!(RasterRenderer::default().draw(&spec), Err(RenderError::EmptyPlot)));
    }

    #[test]
    fn test_sample_bilinear() {
        let values = array![[0.0, 1.0], [2.0, f64::NAN]];
        assert_abs_diff_eq!(sample_bilinear(&values, 0.0, 0.5), 0.5);
        assert!(sample_bilinear(&values, 0.5, 0.5).is_nan());
        // Clamped to the grid edge
        assert_abs_diff_eq!(sample_bilinear(&values, -1.0, 0.0), 0.0);
    }
}
