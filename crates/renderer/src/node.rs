//! Render node tree produced by [`XyPlot::update_paint_node`](crate::XyPlot::update_paint_node).
//!
//! A [`PlotNode`] root owns either nothing or exactly three layer nodes
//! (fill, line, marker) which are created and destroyed together.

use std::ops::{BitOr, BitOrAssign};

use crate::geometry::{DrawingMode, Geometry};
use crate::material::{FillMaterial, LineMaterial, MarkerMaterial};
use crate::texture::ByteTexture;

/// Reasons a node must be re-synchronized with the GPU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyState {
    pub geometry: bool,
    pub material: bool,
    pub subtree_blocked: bool,
}

impl DirtyState {
    pub const NONE: DirtyState = DirtyState {
        geometry: false,
        material: false,
        subtree_blocked: false,
    };
    pub const GEOMETRY: DirtyState = DirtyState {
        geometry: true,
        ..DirtyState::NONE
    };
    pub const MATERIAL: DirtyState = DirtyState {
        material: true,
        ..DirtyState::NONE
    };
    pub const SUBTREE_BLOCKED: DirtyState = DirtyState {
        subtree_blocked: true,
        ..DirtyState::NONE
    };

    pub fn is_empty(&self) -> bool {
        *self == DirtyState::NONE
    }
}

impl BitOr for DirtyState {
    type Output = DirtyState;

    fn bitor(self, rhs: DirtyState) -> DirtyState {
        DirtyState {
            geometry: self.geometry || rhs.geometry,
            material: self.material || rhs.material,
            subtree_blocked: self.subtree_blocked || rhs.subtree_blocked,
        }
    }
}

impl BitOrAssign for DirtyState {
    fn bitor_assign(&mut self, rhs: DirtyState) {
        *self = *self | rhs;
    }
}

/// One layer: its vertices, its material, and cached validity flags.
pub struct LayerNode<M> {
    pub geometry: Geometry,
    pub material: M,
    blocked: bool,
    data_valid: bool,
    dirty: DirtyState,
}

impl<M> LayerNode<M> {
    pub fn new(mode: DrawingMode, material: M) -> Self {
        Self {
            geometry: Geometry::new(mode),
            material,
            blocked: false,
            data_valid: false,
            dirty: DirtyState::NONE,
        }
    }

    /// Blocked nodes are skipped when drawing.
    pub fn is_subtree_blocked(&self) -> bool {
        self.blocked
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    /// Whether the vertex contents reflect the current sample buffer.
    pub fn is_data_valid(&self) -> bool {
        self.data_valid
    }

    pub fn set_data_valid(&mut self, valid: bool) {
        self.data_valid = valid;
    }

    pub fn mark_dirty(&mut self, state: DirtyState) {
        self.dirty |= state;
    }

    pub fn dirty(&self) -> DirtyState {
        self.dirty
    }

    /// Returns the accumulated dirty state and clears it.
    pub fn take_dirty(&mut self) -> DirtyState {
        std::mem::take(&mut self.dirty)
    }
}

pub type FillNode = LayerNode<FillMaterial>;
pub type LineNode = LayerNode<LineMaterial>;
pub type MarkerNode = LayerNode<MarkerMaterial>;

pub struct LayerNodes {
    pub fill: FillNode,
    pub line: LineNode,
    pub marker: MarkerNode,
}

impl LayerNodes {
    pub fn new() -> Self {
        Self {
            fill: LayerNode::new(DrawingMode::TriangleStrip, FillMaterial::default()),
            line: LayerNode::new(DrawingMode::LineStrip, LineMaterial::default()),
            marker: LayerNode::new(DrawingMode::Points, MarkerMaterial::new()),
        }
    }

    pub fn mark_dirty(&mut self, state: DirtyState) {
        self.fill.mark_dirty(state);
        self.line.mark_dirty(state);
        self.marker.mark_dirty(state);
    }

    pub fn invalidate_data(&mut self) {
        self.fill.set_data_valid(false);
        self.line.set_data_valid(false);
        self.marker.set_data_valid(false);
    }
}

impl Default for LayerNodes {
    fn default() -> Self {
        Self::new()
    }
}

/// Root of a plot's render tree.
pub struct PlotNode {
    layers: Option<LayerNodes>,
    dirty: DirtyState,
    opacity: f32,
    retired: Vec<ByteTexture>,
}

impl PlotNode {
    pub fn new() -> Self {
        Self {
            layers: None,
            dirty: DirtyState::NONE,
            opacity: 1.0,
            retired: Vec::new(),
        }
    }

    /// Zero without a data source, otherwise three.
    pub fn child_count(&self) -> usize {
        if self.layers.is_some() {
            3
        } else {
            0
        }
    }

    pub fn layers(&self) -> Option<&LayerNodes> {
        self.layers.as_ref()
    }

    pub fn layers_mut(&mut self) -> Option<&mut LayerNodes> {
        self.layers.as_mut()
    }

    /// Returns the layer nodes, creating them first if absent.
    pub fn ensure_layers(&mut self) -> &mut LayerNodes {
        self.layers.get_or_insert_with(LayerNodes::new)
    }

    /// Destroys the layer nodes. GPU resources they owned are queued for
    /// [`take_retired`](Self::take_retired).
    pub fn remove_layers(&mut self) -> bool {
        match self.layers.take() {
            Some(mut layers) => {
                let glyph = layers.marker.material.take_glyph();
                if glyph.is_resident() {
                    self.retired.push(glyph);
                }
                true
            }
            None => false,
        }
    }

    /// Textures that lost their node and still hold GPU memory.
    pub fn take_retired(&mut self) -> Vec<ByteTexture> {
        std::mem::take(&mut self.retired)
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity;
    }

    pub fn mark_dirty(&mut self, state: DirtyState) {
        self.dirty |= state;
    }

    pub fn dirty(&self) -> DirtyState {
        self.dirty
    }

    pub fn take_dirty(&mut self) -> DirtyState {
        std::mem::take(&mut self.dirty)
    }
}

impl Default for PlotNode {
    fn default() -> Self {
        Self::new()
    }
}
