//! Rendering core for live x/y plots.
//!
//! A [`DataSource`] owns an interleaved `[x0, y0, x1, y1, ...]` buffer. Once
//! per repaint the host hands it to [`XyPlot::update_paint_node`], which keeps
//! a [`PlotNode`] tree of three layers (fill, line, marker) in step with the
//! data and the plot's styling. [`gpu::PlotRenderer`] then uploads what the
//! tree marked dirty and records the draw calls:
//!
//! ```text
//!   DataSource ──▶ XyPlot::update_paint_node ──▶ PlotNode { fill, line, marker }
//!                        │                              │
//!                        └─ geometry builders (CPU)     ▼
//!                              PlotRenderer::prepare ──▶ vertex buffers, uniforms, glyph
//!                              PlotRenderer::draw    ──▶ render pass
//! ```
//!
//! Everything up to the node tree is plain CPU state and runs without a GPU.

mod compile;
pub mod geometry;
pub mod glyph;
pub mod gpu;
pub mod material;
pub mod node;
pub mod plot;
pub mod source;
pub mod texture;
pub mod types;

pub use geometry::{DrawingMode, Geometry};
pub use glyph::GlyphKey;
pub use node::{DirtyState, LayerNode, LayerNodes, PlotNode};
pub use plot::{FillStyle, LineStyle, MarkerStyle, PlotEvent, XyPlot};
pub use source::{DataSource, DataSourceError, SourceId};
pub use texture::{ByteTexture, DataTexture, FloatTexture, TexelScalar};
pub use types::{Color, ItemSize, Point2D, ViewRect};
