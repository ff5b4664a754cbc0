//! CPU-side vertex builders for the three plot layers.
//!
//! Every builder reads the interleaved `[x0, y0, x1, y1, ...]` buffer of a
//! data source and writes data-space positions; the view transform happens
//! on the GPU.

use crate::types::Point2D;

/// Primitive topology a geometry is meant to be drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawingMode {
    /// Two vertices per sample, drawn as a triangle strip.
    TriangleStrip,
    /// Polyline through the samples in index order.
    LineStrip,
    /// Independent points, one sprite per sample.
    Points,
}

/// Vertex storage of one layer.
///
/// Storage is only resized through [`allocate`](Self::allocate); contents are
/// rewritten by the builders, which bump [`revision`](Self::revision) so the
/// renderer knows when to re-upload.
#[derive(Debug, Clone)]
pub struct Geometry {
    mode: DrawingMode,
    vertices: Vec<Point2D>,
    line_width: f32,
    revision: u64,
}

impl Geometry {
    pub fn new(mode: DrawingMode) -> Self {
        Self {
            mode,
            vertices: Vec::new(),
            line_width: 1.0,
            revision: 0,
        }
    }

    pub fn drawing_mode(&self) -> DrawingMode {
        self.mode
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertices(&self) -> &[Point2D] {
        &self.vertices
    }

    pub fn vertices_mut(&mut self) -> &mut [Point2D] {
        &mut self.vertices
    }

    /// Resizes the vertex storage. Contents are zeroed and must be rebuilt.
    pub fn allocate(&mut self, count: usize) {
        self.vertices.clear();
        self.vertices.resize(count, Point2D::default());
        self.mark_rewritten();
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.line_width = width;
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn mark_rewritten(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

/// Number of vertices each layer needs for `samples` x/y pairs.
pub fn fill_vertex_count(samples: usize) -> usize {
    samples * 2
}

pub fn line_vertex_count(samples: usize) -> usize {
    samples
}

pub fn marker_vertex_count(samples: usize) -> usize {
    samples
}

/// Zero-baseline silhouette: `(x, 0), (x, y)` per sample.
///
/// The ordinate is taken as is; the fill does not follow logarithmic y.
pub fn build_fill(geometry: &mut Geometry, data: &[f64]) {
    for (pair, quad) in data
        .chunks_exact(2)
        .zip(geometry.vertices_mut().chunks_exact_mut(2))
    {
        let x = pair[0] as f32;
        quad[0] = Point2D::new(x, 0.0);
        quad[1] = Point2D::new(x, pair[1] as f32);
    }
    geometry.mark_rewritten();
}

pub fn build_line(geometry: &mut Geometry, data: &[f64], log_y: bool) {
    build_points(geometry, data, log_y);
}

pub fn build_markers(geometry: &mut Geometry, data: &[f64], log_y: bool) {
    build_points(geometry, data, log_y);
}

fn build_points(geometry: &mut Geometry, data: &[f64], log_y: bool) {
    for (pair, vertex) in data.chunks_exact(2).zip(geometry.vertices_mut()) {
        let y = if log_y { pair[1].log10() } else { pair[1] };
        *vertex = Point2D::new(pair[0] as f32, y as f32);
    }
    geometry.mark_rewritten();
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [f64; 6] = [0.0, 1.0, 1.0, 10.0, 2.0, 100.0];

    fn allocated(mode: DrawingMode, count: usize) -> Geometry {
        let mut geometry = Geometry::new(mode);
        geometry.allocate(count);
        geometry
    }

    #[test]
    fn fill_pairs_baseline_with_sample() {
        let mut geometry = allocated(DrawingMode::TriangleStrip, fill_vertex_count(3));
        build_fill(&mut geometry, &SAMPLES);
        assert_eq!(
            geometry.vertices(),
            &[
                Point2D::new(0.0, 0.0),
                Point2D::new(0.0, 1.0),
                Point2D::new(1.0, 0.0),
                Point2D::new(1.0, 10.0),
                Point2D::new(2.0, 0.0),
                Point2D::new(2.0, 100.0),
            ]
        );
    }

    #[test]
    fn line_applies_log_y() {
        let mut geometry = allocated(DrawingMode::LineStrip, 3);
        build_line(&mut geometry, &SAMPLES, true);
        assert_eq!(
            geometry.vertices(),
            &[
                Point2D::new(0.0, 0.0),
                Point2D::new(1.0, 1.0),
                Point2D::new(2.0, 2.0)
            ]
        );
    }

    #[test]
    fn markers_match_line_mapping() {
        let mut line = allocated(DrawingMode::LineStrip, 3);
        let mut markers = allocated(DrawingMode::Points, 3);
        build_line(&mut line, &SAMPLES, false);
        build_markers(&mut markers, &SAMPLES, false);
        assert_eq!(line.vertices(), markers.vertices());
        assert_eq!(markers.vertices()[2], Point2D::new(2.0, 100.0));
    }

    #[test]
    fn log_of_non_positive_is_not_finite() {
        let mut geometry = allocated(DrawingMode::Points, 2);
        build_markers(&mut geometry, &[0.0, 0.0, 1.0, -1.0], true);
        assert_eq!(geometry.vertices()[0].y, f32::NEG_INFINITY);
        assert!(geometry.vertices()[1].y.is_nan());
    }

    #[test]
    fn vertex_counts_follow_sample_count() {
        for n in [0usize, 1, 7, 256] {
            assert_eq!(fill_vertex_count(n), 2 * n);
            assert_eq!(line_vertex_count(n), n);
            assert_eq!(marker_vertex_count(n), n);
        }
    }

    #[test]
    fn builders_bump_revision() {
        let mut geometry = allocated(DrawingMode::LineStrip, 3);
        let allocated_at = geometry.revision();
        build_line(&mut geometry, &SAMPLES, false);
        assert_eq!(geometry.revision(), allocated_at + 1);
    }

    #[test]
    fn empty_buffer_builds_nothing() {
        let mut geometry = allocated(DrawingMode::TriangleStrip, 0);
        build_fill(&mut geometry, &[]);
        assert_eq!(geometry.vertex_count(), 0);
    }
}
