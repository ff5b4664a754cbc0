//! wgpu backend for the plot node tree.
//!
//! - `context` owns instance/device/surface wiring and hands out the
//!   [`RenderContext`] every GPU resource operation takes explicitly.
//! - `pipeline` builds the fill, line and marker pipelines over one shared
//!   uniform bind group layout plus the glyph texture layout.
//! - `uniforms` mirrors the std140 blocks the GLSL programs declare.
//! - `renderer` syncs a [`PlotNode`](crate::PlotNode) into buffers and records
//!   draw calls.

mod context;
mod pipeline;
mod renderer;
mod uniforms;

pub use context::{RenderContext, SurfaceContext, SurfaceOptions};
pub use renderer::PlotRenderer;
pub use uniforms::{pixel_to_clip, LayerUniforms, ViewUniforms};
pub use wgpu::SurfaceError;
