//! CPU raster renderer.
//!
//! Draws strokes into an RGBA buffer with integer line stepping and no
//! anti-aliasing, so identical tables always produce identical pixels.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};
use kurbo::{Line, Rect, Size};
use peniko::Color;

use crate::renderer::{RenderContext, RenderResult, Renderer, RendererError};

/// Largest surface edge the renderer will allocate.
const MAX_DIMENSION: u32 = 16_384;

/// Widest brush the renderer will stamp; wider requests are clamped.
pub const MAX_LINE_WIDTH: f64 = 256.0;

/// Raster renderer backed by an in-memory RGBA frame.
pub struct RasterRenderer {
    frame: RgbaImage,
}

impl RasterRenderer {
    /// Create a renderer with a blank frame of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frame: RgbaImage::new(width, height),
        }
    }

    /// The last rendered frame.
    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    pub fn into_frame(self) -> RgbaImage {
        self.frame
    }

    /// Encode the current frame as PNG bytes.
    pub fn encode_png(&self) -> RenderResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.frame
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| RendererError::Export(e.to_string()))?;
        Ok(bytes)
    }

    /// Write the current frame to `path` as PNG.
    pub fn save_png(&self, path: &Path) -> RenderResult<()> {
        self.frame
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| RendererError::Export(format!("{}: {}", path.display(), e)))
    }

    /// Reallocate the frame if the viewport size changed.
    fn ensure_size(&mut self, size: Size) -> RenderResult<()> {
        let (width, height) = (size.width.round(), size.height.round());
        let valid = |v: f64| v >= 1.0 && v <= MAX_DIMENSION as f64;
        if !(valid(width) && valid(height)) {
            return Err(RendererError::Surface(format!(
                "unsupported viewport size {}x{}",
                size.width, size.height
            )));
        }
        let (width, height) = (width as u32, height as u32);
        if self.frame.dimensions() != (width, height) {
            log::debug!("Resizing raster surface to {}x{}", width, height);
            self.frame = RgbaImage::new(width, height);
        }
        Ok(())
    }

    fn draw_line(&mut self, line: Line, pixel: Rgba<u8>, brush: &[(i64, i64)], pad: f64) {
        let (width, height) = self.frame.dimensions();
        let bounds = Rect::new(-pad, -pad, f64::from(width) + pad, f64::from(height) + pad);
        let Some(line) = clip_line(line, bounds) else {
            return;
        };

        let (mut x, mut y) = (line.p0.x.round() as i64, line.p0.y.round() as i64);
        let (x1, y1) = (line.p1.x.round() as i64, line.p1.y.round() as i64);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.stamp(x, y, pixel, brush);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn stamp(&mut self, x: i64, y: i64, pixel: Rgba<u8>, brush: &[(i64, i64)]) {
        let (width, height) = self.frame.dimensions();
        for (ox, oy) in brush {
            let (px, py) = (x + ox, y + oy);
            if (0..i64::from(width)).contains(&px) && (0..i64::from(height)).contains(&py) {
                self.frame.put_pixel(px as u32, py as u32, pixel);
            }
        }
    }
}

impl Renderer for RasterRenderer {
    fn render(&mut self, ctx: &RenderContext) -> RenderResult<()> {
        self.ensure_size(ctx.viewport_size)?;

        let background = to_pixel(self.background_color(ctx));
        for pixel in self.frame.pixels_mut() {
            *pixel = background;
        }

        let width = clamp_line_width(ctx.line_width);
        let brush = brush_offsets(width);
        let pad = width.max(1.0);
        let mut segments = 0usize;
        for stroke in ctx.table.all_strokes().filter(|s| s.is_drawable()) {
            let pixel = to_pixel(stroke.color().into());
            for line in stroke.geometry().segments() {
                self.draw_line(line, pixel, &brush, pad);
                segments += 1;
            }
        }
        log::trace!("Rendered {} strokes, {} segments", ctx.table.len(), segments);
        Ok(())
    }
}

fn to_pixel(color: Color) -> Rgba<u8> {
    let rgba = color.to_rgba8();
    Rgba([rgba.r, rgba.g, rgba.b, rgba.a])
}

fn clamp_line_width(width: f64) -> f64 {
    if width.is_finite() {
        width.clamp(0.0, MAX_LINE_WIDTH)
    } else {
        1.0
    }
}

/// Pixel offsets covered by a round brush of the given width.
fn brush_offsets(width: f64) -> Vec<(i64, i64)> {
    let radius = clamp_line_width(width) / 2.0;
    if radius <= 0.5 {
        return vec![(0, 0)];
    }
    let reach = radius.ceil() as i64;
    let mut offsets = Vec::new();
    for oy in -reach..=reach {
        for ox in -reach..=reach {
            if ((ox * ox + oy * oy) as f64) <= radius * radius {
                offsets.push((ox, oy));
            }
        }
    }
    offsets
}

/// Liang-Barsky clip of `line` against `rect`; `None` if fully outside.
fn clip_line(line: Line, rect: Rect) -> Option<Line> {
    let d = line.p1 - line.p0;
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    let edges = [
        (-d.x, line.p0.x - rect.x0),
        (d.x, rect.x1 - line.p0.x),
        (-d.y, line.p0.y - rect.y0),
        (d.y, rect.y1 - line.p0.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
    }
    let p0 = if t0 > 0.0 { line.p0 + d * t0 } else { line.p0 };
    let p1 = if t1 < 1.0 { line.p0 + d * t1 } else { line.p1 };
    Some(Line::new(p0, p1))
}
