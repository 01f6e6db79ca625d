//! inkshare Render Library
//!
//! Renderer abstraction and implementations for inkshare.
//! The default implementation rasterizes on the CPU into an RGBA buffer.

mod raster;
mod renderer;

pub use raster::{MAX_LINE_WIDTH, RasterRenderer};
pub use renderer::{RenderContext, RenderResult, Renderer, RendererError};
