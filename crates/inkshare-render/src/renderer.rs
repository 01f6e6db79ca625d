//! Backend-independent rendering interface.

use inkshare_core::StrokeTable;
use kurbo::Size;
use peniko::Color;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("cannot prepare drawing surface: {0}")]
    Surface(String),
    #[error("frame export failed: {0}")]
    Export(String),
}

pub type RenderResult<T> = Result<T, RendererError>;

/// Everything a backend needs to draw one frame.
pub struct RenderContext<'a> {
    /// Read-only view of the strokes to draw.
    pub table: &'a StrokeTable,
    /// Surface size in pixels.
    pub viewport_size: Size,
    pub background_color: Color,
    /// Stroke width in pixels.
    pub line_width: f64,
}

impl<'a> RenderContext<'a> {
    /// A frame on a white background with one-pixel lines.
    pub fn new(table: &'a StrokeTable, viewport_size: Size) -> Self {
        Self {
            table,
            viewport_size,
            background_color: Color::from_rgba8(255, 255, 255, 255),
            line_width: 1.0,
        }
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

/// A drawing backend.
///
/// A render is a pure projection of the table: the surface is cleared and
/// every stroke redrawn, so rendering twice without a table change yields the
/// same output.
pub trait Renderer: Send + Sync {
    /// Clear the surface and draw every stroke in table order.
    fn render(&mut self, ctx: &RenderContext) -> RenderResult<()>;

    /// Color the surface is cleared to before drawing.
    fn background_color(&self, ctx: &RenderContext) -> Color {
        ctx.background_color
    }
}
