//! The x/y plot item.
//!
//! [`XyPlot`] holds the view rectangle and per-layer styling. Setters are
//! idempotent; an effective change queues a [`PlotEvent`] and requests a
//! repaint. Once per repaint the host calls
//! [`update_paint_node`](XyPlot::update_paint_node), which brings the render
//! tree in line with the current state and data source.

use crate::geometry::{
    build_fill, build_line, build_markers, fill_vertex_count, line_vertex_count,
    marker_vertex_count,
};
use crate::glyph::GlyphKey;
use crate::material::ViewTransform;
use crate::node::{DirtyState, PlotNode};
use crate::source::{DataSource, SourceId};
use crate::types::{Color, ItemSize, ViewRect};

/// Property change notifications, one per effective setter call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlotEvent {
    ViewRectChanged(ViewRect),
    FillEnabledChanged(bool),
    FillColorChanged(Color),
    LineEnabledChanged(bool),
    LineWidthChanged(f64),
    LineColorChanged(Color),
    MarkerEnabledChanged(bool),
    MarkerSizeChanged(f64),
    MarkerSegmentsChanged(u32),
    MarkerBorderChanged(bool),
    MarkerColorChanged(Color),
    LogYChanged(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillStyle {
    pub enabled: bool,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    pub enabled: bool,
    pub width: f64,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
    pub enabled: bool,
    pub size: f64,
    pub segments: u32,
    pub border: bool,
    pub color: Color,
}

impl MarkerStyle {
    fn glyph_key(&self) -> GlyphKey {
        GlyphKey {
            size: self.size,
            segments: self.segments,
            border: self.border,
        }
    }
}

impl Default for FillStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            color: Color::new(0.0, 0.0, 0.0, 0.25),
        }
    }
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 1.0,
            color: Color::BLACK,
        }
    }
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            enabled: false,
            size: 5.0,
            segments: 0,
            border: false,
            color: Color::BLACK,
        }
    }
}

/// Tracks which data source the plot last rendered and at which revision.
#[derive(Debug, Default)]
struct DataClient {
    seen: Option<(SourceId, u64)>,
    new_source: bool,
    new_data: bool,
}

impl DataClient {
    fn observe(&mut self, source: Option<&DataSource>) {
        match source {
            Some(source) => {
                let current = (source.id(), source.revision());
                match self.seen {
                    Some((id, _)) if id != current.0 => self.new_source = true,
                    Some((_, revision)) if revision != current.1 => self.new_data = true,
                    Some(_) => {}
                    None => self.new_source = true,
                }
                self.seen = Some(current);
            }
            None => {
                if self.seen.take().is_some() {
                    self.new_source = true;
                }
            }
        }
    }

    /// Consumes the new-source and new-data flags.
    fn take_pending(&mut self) -> bool {
        let pending = self.new_source || self.new_data;
        self.new_source = false;
        self.new_data = false;
        pending
    }
}

#[derive(Debug)]
pub struct XyPlot {
    view_rect: ViewRect,
    size: ItemSize,
    opacity: f32,
    log_y: bool,
    fill: FillStyle,
    line: LineStyle,
    marker: MarkerStyle,
    client: DataClient,
    events: Vec<PlotEvent>,
    update_requested: bool,
}

impl Default for XyPlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Setter equality: like `==`, except NaN matches NaN so repeating a NaN
/// value is still a no-op.
trait SameValue {
    fn same_value(&self, other: &Self) -> bool;
}

impl SameValue for bool {
    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

impl SameValue for u32 {
    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

impl SameValue for f64 {
    fn same_value(&self, other: &Self) -> bool {
        self == other || (self.is_nan() && other.is_nan())
    }
}

impl SameValue for f32 {
    fn same_value(&self, other: &Self) -> bool {
        self == other || (self.is_nan() && other.is_nan())
    }
}

impl SameValue for Color {
    fn same_value(&self, other: &Self) -> bool {
        self.r.same_value(&other.r)
            && self.g.same_value(&other.g)
            && self.b.same_value(&other.b)
            && self.a.same_value(&other.a)
    }
}

impl SameValue for ViewRect {
    fn same_value(&self, other: &Self) -> bool {
        self.x.same_value(&other.x)
            && self.y.same_value(&other.y)
            && self.width.same_value(&other.width)
            && self.height.same_value(&other.height)
    }
}

impl SameValue for ItemSize {
    fn same_value(&self, other: &Self) -> bool {
        self.width.same_value(&other.width) && self.height.same_value(&other.height)
    }
}

macro_rules! setter {
    ($(#[$meta:meta])* $name:ident, $($field:ident).+, $ty:ty, $event:ident) => {
        $(#[$meta])*
        pub fn $name(&mut self, value: $ty) -> bool {
            if self.$($field).+.same_value(&value) {
                return false;
            }
            self.$($field).+ = value;
            self.notify(PlotEvent::$event(value));
            true
        }
    };
}

impl XyPlot {
    pub fn new() -> Self {
        Self {
            view_rect: ViewRect::default(),
            size: ItemSize::default(),
            opacity: 1.0,
            log_y: false,
            fill: FillStyle::default(),
            line: LineStyle::default(),
            marker: MarkerStyle::default(),
            client: DataClient::default(),
            events: Vec::new(),
            update_requested: false,
        }
    }

    setter!(set_view_rect, view_rect, ViewRect, ViewRectChanged);
    setter!(set_fill_enabled, fill.enabled, bool, FillEnabledChanged);
    setter!(set_fill_color, fill.color, Color, FillColorChanged);
    setter!(set_line_enabled, line.enabled, bool, LineEnabledChanged);
    setter!(set_line_width, line.width, f64, LineWidthChanged);
    setter!(set_line_color, line.color, Color, LineColorChanged);
    setter!(set_marker_enabled, marker.enabled, bool, MarkerEnabledChanged);
    setter!(
        /// Marker side length in pixels.
        set_marker_size,
        marker.size,
        f64,
        MarkerSizeChanged
    );
    setter!(
        /// `0` draws circles, `k >= 3` regular `k`-gons.
        set_marker_segments,
        marker.segments,
        u32,
        MarkerSegmentsChanged
    );
    setter!(set_marker_border, marker.border, bool, MarkerBorderChanged);
    setter!(set_marker_color, marker.color, Color, MarkerColorChanged);

    /// Switches line and marker ordinates to `log10(y)`. Forces a rebuild.
    pub fn set_log_y(&mut self, enabled: bool) -> bool {
        if self.log_y == enabled {
            return false;
        }
        self.log_y = enabled;
        self.client.new_data = true;
        self.notify(PlotEvent::LogYChanged(enabled));
        true
    }

    /// Item size in pixels, as laid out by the host.
    pub fn set_size(&mut self, size: ItemSize) -> bool {
        if self.size.same_value(&size) {
            return false;
        }
        self.size = size;
        self.update_requested = true;
        true
    }

    pub fn set_opacity(&mut self, opacity: f32) -> bool {
        if self.opacity.same_value(&opacity) {
            return false;
        }
        self.opacity = opacity;
        self.update_requested = true;
        true
    }

    pub fn view_rect(&self) -> ViewRect {
        self.view_rect
    }

    pub fn size(&self) -> ItemSize {
        self.size
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn log_y(&self) -> bool {
        self.log_y
    }

    pub fn fill(&self) -> &FillStyle {
        &self.fill
    }

    pub fn line(&self) -> &LineStyle {
        &self.line
    }

    pub fn marker(&self) -> &MarkerStyle {
        &self.marker
    }

    /// Change notifications queued since the last call.
    pub fn drain_events(&mut self) -> Vec<PlotEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether a repaint was requested since the last call.
    pub fn take_update_request(&mut self) -> bool {
        std::mem::take(&mut self.update_requested)
    }

    /// Call when the host's data source signals new contents. Revisions are
    /// also picked up automatically on the next frame.
    pub fn notify_new_data(&mut self) {
        self.client.new_data = true;
        self.update_requested = true;
    }

    fn notify(&mut self, event: PlotEvent) {
        tracing::trace!(?event, "plot property changed");
        self.events.push(event);
        self.update_requested = true;
    }

    /// Synchronizes the render tree with the plot state. Runs once per
    /// repaint and returns the (possibly newly created) root.
    pub fn update_paint_node(
        &mut self,
        node: Option<PlotNode>,
        source: Option<&DataSource>,
    ) -> PlotNode {
        let mut root = node.unwrap_or_default();
        root.set_opacity(self.opacity);
        self.client.observe(source);

        let Some(source) = source else {
            if root.remove_layers() {
                tracing::debug!("data source gone; removed plot layers");
            }
            return root;
        };

        let mut dirty = DirtyState::MATERIAL;
        let created = root.layers().is_none();
        let layers = root.ensure_layers();
        if created {
            tracing::debug!("created plot layers");
        }

        if layers.fill.is_subtree_blocked() == self.fill.enabled
            || layers.line.is_subtree_blocked() == self.line.enabled
            || layers.marker.is_subtree_blocked() == self.marker.enabled
        {
            layers.fill.set_blocked(!self.fill.enabled);
            layers.line.set_blocked(!self.line.enabled);
            layers.marker.set_blocked(!self.marker.enabled);
            dirty |= DirtyState::SUBTREE_BLOCKED;
        }

        let samples = source.sample_count();
        let view = ViewTransform::new(self.size, self.view_rect);
        let mut resized = false;

        if self.fill.enabled {
            let fill = &mut layers.fill;
            fill.material.update(view, self.fill.color);
            if fill.geometry.vertex_count() != fill_vertex_count(samples) {
                fill.geometry.allocate(fill_vertex_count(samples));
                resized = true;
            }
        }

        if self.line.enabled {
            let line = &mut layers.line;
            line.material.update(view, self.line.color);
            line.geometry.set_line_width(self.line.width as f32);
            if line.geometry.vertex_count() != line_vertex_count(samples) {
                line.geometry.allocate(line_vertex_count(samples));
                resized = true;
            }
        }

        if self.marker.enabled {
            let marker = &mut layers.marker;
            marker.material.update_glyph(self.marker.glyph_key());
            marker.material.update(view, self.marker.color);
            if marker.geometry.vertex_count() != marker_vertex_count(samples) {
                marker.geometry.allocate(marker_vertex_count(samples));
                resized = true;
            }
        }

        if self.client.take_pending() || resized {
            layers.invalidate_data();
        }

        let data = &source.data()[..samples * 2];

        if self.fill.enabled && !layers.fill.is_data_valid() {
            build_fill(&mut layers.fill.geometry, data);
            layers.fill.set_data_valid(true);
            dirty |= DirtyState::GEOMETRY;
        }

        if self.line.enabled && !layers.line.is_data_valid() {
            build_line(&mut layers.line.geometry, data, self.log_y);
            layers.line.set_data_valid(true);
            dirty |= DirtyState::GEOMETRY;
        }

        if self.marker.enabled && !layers.marker.is_data_valid() {
            build_markers(&mut layers.marker.geometry, data, self.log_y);
            layers.marker.set_data_valid(true);
            dirty |= DirtyState::GEOMETRY;
        }

        if dirty.geometry {
            tracing::trace!(samples, log_y = self.log_y, "rebuilt plot geometry");
        }

        layers.mark_dirty(dirty);
        root.mark_dirty(dirty);
        root
    }
}
