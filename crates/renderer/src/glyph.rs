//! Procedural marker glyphs.
//!
//! Markers are drawn as screen-aligned sprites sampling a small RGBA8 mask: a regular
//! polygon or a circle, white on a transparent background. The marker color
//! is multiplied in on the GPU, so one raster serves every color.

use std::f64::consts::PI;

/// Samples per pixel along each axis.
const SUPERSAMPLE: usize = 4;
/// Half the outline thickness in pixels.
const BORDER_HALF_WIDTH: f64 = 0.5;
/// Largest raster side; bigger markers are stretched from this.
pub const MAX_GLYPH_SIDE: u32 = 512;
/// Grid vertex coordinates snap to, so mirrored edges compute identical distances.
const VERTEX_SNAP: f64 = 1e9;
/// Samples this close to an edge count as inside.
const EDGE_TOLERANCE: f64 = 1e-9;

const BACKGROUND: [u8; 4] = [255, 255, 255, 0];

/// Shape parameters that determine the glyph raster. Color is not part of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphKey {
    pub size: f64,
    pub segments: u32,
    pub border: bool,
}

impl GlyphKey {
    /// Side length of the square raster in pixels.
    pub fn raster_side(&self) -> u32 {
        raster_side(self.size)
    }
}

pub fn raster_side(size: f64) -> u32 {
    if size.is_finite() && size > 0.0 {
        size.ceil().min(f64::from(MAX_GLYPH_SIDE)) as u32
    } else {
        0
    }
}

enum Shape {
    Circle { center: (f64, f64), radius: f64 },
    Polygon { vertices: Vec<(f64, f64)>, center: (f64, f64) },
}

impl Shape {
    fn new(side: u32, segments: u32) -> Self {
        let size = f64::from(side);
        let center = (size * 0.5, size * 0.5);
        if segments == 0 {
            // inscribed with a one pixel margin
            return Shape::Circle {
                center,
                radius: (size - 2.0) * 0.5,
            };
        }
        Shape::Polygon {
            vertices: polygon_vertices(side, segments),
            center,
        }
    }

    /// Distance to the outline, positive inside.
    fn signed_distance(&self, p: (f64, f64)) -> f64 {
        match self {
            Shape::Circle { center, radius } => {
                radius - (p.0 - center.0).hypot(p.1 - center.1)
            }
            Shape::Polygon { vertices, center } if vertices.len() >= 3 => {
                let mut inside = f64::INFINITY;
                for (index, a) in vertices.iter().enumerate() {
                    let b = vertices[(index + 1) % vertices.len()];
                    let edge = edge_distance(*a, b, p);
                    let orientation = edge_distance(*a, b, *center).signum();
                    inside = inside.min(edge * orientation);
                }
                inside
            }
            Shape::Polygon { vertices, .. } => {
                // fewer than three vertices enclose nothing; only the outline remains
                let mut nearest = f64::INFINITY;
                for (index, a) in vertices.iter().enumerate() {
                    let b = vertices[(index + 1) % vertices.len()];
                    nearest = nearest.min(segment_distance(*a, b, p));
                }
                -nearest
            }
        }
    }
}

/// Vertices of a regular `segments`-gon with circumradius `side / 2`, starting
/// at the top and advancing by `2π / segments`.
pub fn polygon_vertices(side: u32, segments: u32) -> Vec<(f64, f64)> {
    let size = f64::from(side);
    let r = size * 0.5;
    let dphi = 2.0 * PI / f64::from(segments.max(1));
    (0..segments)
        .map(|i| {
            let phi = f64::from(i) * dphi;
            (
                snap(size * 0.5 - r * phi.sin()),
                snap(size * 0.5 - r * phi.cos()),
            )
        })
        .collect()
}

fn snap(value: f64) -> f64 {
    (value * VERTEX_SNAP).round() / VERTEX_SNAP
}

fn edge_distance(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return 0.0;
    }
    (dx * (p.1 - a.1) - dy * (p.0 - a.0)) / len
}

fn segment_distance(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    (p.0 - (a.0 + t * dx)).hypot(p.1 - (a.1 + t * dy))
}

/// Rasterizes a marker mask into `pixels`, a `side * side` RGBA8 image.
///
/// `segments == 0` draws a circle, otherwise a regular polygon. With `border`
/// the shape also gets a one pixel black outline.
pub fn paint_marker(pixels: &mut [u8], side: u32, segments: u32, border: bool) {
    let side_px = side as usize;
    for texel in pixels.chunks_exact_mut(4) {
        texel.copy_from_slice(&BACKGROUND);
    }
    if side_px == 0 {
        return;
    }

    let shape = Shape::new(side, segments);
    let samples = (SUPERSAMPLE * SUPERSAMPLE) as f64;
    let step = 1.0 / SUPERSAMPLE as f64;

    for (row, line) in pixels
        .chunks_exact_mut(side_px * 4)
        .take(side_px)
        .enumerate()
    {
        for (column, texel) in line.chunks_exact_mut(4).enumerate() {
            let mut fill = 0usize;
            let mut stroke = 0usize;
            for sy in 0..SUPERSAMPLE {
                for sx in 0..SUPERSAMPLE {
                    let p = (
                        column as f64 + (sx as f64 + 0.5) * step,
                        row as f64 + (sy as f64 + 0.5) * step,
                    );
                    let distance = shape.signed_distance(p);
                    if border && distance.abs() <= BORDER_HALF_WIDTH {
                        stroke += 1;
                    } else if distance >= -EDGE_TOLERANCE {
                        fill += 1;
                    }
                }
            }
            let covered = fill + stroke;
            if covered == 0 {
                continue;
            }
            let white = (255.0 * fill as f64 / covered as f64).round() as u8;
            let alpha = (255.0 * covered as f64 / samples).round() as u8;
            texel.copy_from_slice(&[white, white, white, alpha]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(side: u32, segments: u32, border: bool) -> Vec<u8> {
        let mut pixels = vec![0u8; (side * side * 4) as usize];
        paint_marker(&mut pixels, side, segments, border);
        pixels
    }

    fn alpha(pixels: &[u8], side: u32, x: u32, y: u32) -> u8 {
        pixels[((y * side + x) * 4 + 3) as usize]
    }

    /// Fraction of pixels whose alpha differs by more than half after
    /// rotating the raster by `angle` around its center (nearest neighbour).
    fn rotation_mismatch(pixels: &[u8], side: u32, angle: f64) -> f64 {
        let c = f64::from(side) * 0.5;
        let (sin, cos) = angle.sin_cos();
        let mut compared = 0usize;
        let mut mismatched = 0usize;
        for y in 0..side {
            for x in 0..side {
                let px = f64::from(x) + 0.5 - c;
                let py = f64::from(y) + 0.5 - c;
                let sx = (cos * px - sin * py + c).floor();
                let sy = (sin * px + cos * py + c).floor();
                if sx < 0.0 || sy < 0.0 || sx >= f64::from(side) || sy >= f64::from(side) {
                    continue;
                }
                compared += 1;
                let a = alpha(pixels, side, x, y) as i32;
                let b = alpha(pixels, side, sx as u32, sy as u32) as i32;
                if (a - b).abs() > 128 {
                    mismatched += 1;
                }
            }
        }
        mismatched as f64 / compared as f64
    }

    #[test]
    fn raster_side_is_ceiling_of_marker_size() {
        assert_eq!(raster_side(7.2), 8);
        assert_eq!(raster_side(8.0), 8);
        assert_eq!(raster_side(0.0), 0);
        assert_eq!(raster_side(-3.0), 0);
        assert_eq!(raster_side(f64::NAN), 0);
        assert_eq!(raster_side(1e6), MAX_GLYPH_SIDE);
        assert_eq!(raster_side(f64::INFINITY), 0);
    }

    #[test]
    fn first_vertex_points_up() {
        let vertices = polygon_vertices(10, 4);
        assert_eq!(vertices.len(), 4);
        assert!((vertices[0].0 - 5.0).abs() < 1e-12);
        assert!((vertices[0].1 - 0.0).abs() < 1e-12);
        // second vertex sits left of center: clockwise from the top with x mirrored
        assert!((vertices[1].0 - 0.0).abs() < 1e-12);
        assert!((vertices[1].1 - 5.0).abs() < 1e-12);
    }

    #[test]
    fn circle_is_white_on_transparent() {
        let side = 16;
        let pixels = raster(side, 0, false);
        let center = ((side / 2 * side + side / 2) * 4) as usize;
        assert_eq!(&pixels[center..center + 4], &[255, 255, 255, 255]);
        assert_eq!(&pixels[0..4], &BACKGROUND);
    }

    #[test]
    fn circle_keeps_a_one_pixel_margin() {
        let side = 20;
        let pixels = raster(side, 0, false);
        for i in 0..side {
            assert_eq!(alpha(&pixels, side, i, 0), 0);
            assert_eq!(alpha(&pixels, side, 0, i), 0);
            assert_eq!(alpha(&pixels, side, i, side - 1), 0);
            assert_eq!(alpha(&pixels, side, side - 1, i), 0);
        }
    }

    #[test]
    fn circle_is_rotation_symmetric() {
        let side = 64;
        let pixels = raster(side, 0, false);
        for y in 0..side {
            for x in 0..side {
                let quarter = alpha(&pixels, side, side - 1 - y, x);
                assert_eq!(alpha(&pixels, side, x, y), quarter);
            }
        }
        for angle in [0.3, 1.0, 2.2] {
            assert!(rotation_mismatch(&pixels, side, angle) < 0.1);
        }
    }

    #[test]
    fn square_matches_its_quarter_turn_exactly() {
        for side in [7, 8, 9, 16, 32] {
            let pixels = raster(side, 4, false);
            for y in 0..side {
                for x in 0..side {
                    let rotated = alpha(&pixels, side, side - 1 - y, x);
                    assert_eq!(
                        alpha(&pixels, side, x, y),
                        rotated,
                        "side {side} differs at ({x}, {y})"
                    );
                }
            }
        }
    }

    #[test]
    fn polygon_vertices_land_on_exact_axes() {
        let vertices = polygon_vertices(8, 4);
        assert_eq!(vertices, vec![(4.0, 0.0), (0.0, 4.0), (4.0, 8.0), (8.0, 4.0)]);
    }

    #[test]
    fn polygons_are_symmetric_under_their_own_rotation() {
        let side = 64;
        for segments in [3u32, 5, 6, 8] {
            let pixels = raster(side, segments, false);
            let angle = 2.0 * PI / f64::from(segments);
            assert!(
                rotation_mismatch(&pixels, side, angle) < 0.1,
                "{segments}-gon not symmetric"
            );
        }
    }

    #[test]
    fn triangle_is_not_symmetric_under_quarter_turn() {
        let side = 64;
        let pixels = raster(side, 3, false);
        assert!(rotation_mismatch(&pixels, side, PI / 2.0) > 0.05);
    }

    #[test]
    fn border_darkens_the_outline_only() {
        let side = 24;
        let plain = raster(side, 6, false);
        let bordered = raster(side, 6, true);
        let center = ((side / 2 * side + side / 2) * 4) as usize;
        assert_eq!(&bordered[center..center + 4], &[255, 255, 255, 255]);
        // top vertex row sits on the outline
        let top = ((side / 2) * 4) as usize;
        assert!(bordered[top] < 255);
        assert!(bordered[top + 3] > 0);
        assert_ne!(plain, bordered);
    }

    #[test]
    fn degenerate_segment_counts_fill_nothing() {
        let side = 12;
        let pixels = raster(side, 2, false);
        assert!(pixels.chunks_exact(4).all(|texel| texel[3] == 0));
        let outlined = raster(side, 2, true);
        assert!(outlined.chunks_exact(4).any(|texel| texel[3] > 0));
    }

    #[test]
    fn zero_side_is_a_no_op() {
        let mut pixels: Vec<u8> = Vec::new();
        paint_marker(&mut pixels, 0, 0, true);
        assert!(pixels.is_empty());
    }
}
