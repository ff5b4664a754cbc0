//! Per-layer material parameters.
//!
//! Materials hold everything the GPU programs read besides the vertices: the
//! shared data-to-pixel transform, the layer color, and for markers the glyph
//! raster. The GPU side lives in [`crate::gpu`].

use crate::glyph::{paint_marker, GlyphKey};
use crate::texture::ByteTexture;
use crate::types::{Color, ItemSize, ViewRect};

/// Size, scale and offset shared by every plot program.
///
/// A data-space point `p` lands on pixel `(p - offset) * scale * size`, with
/// y flipped so larger values are drawn higher up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub size: [f64; 2],
    pub scale: [f64; 2],
    pub offset: [f64; 2],
}

impl ViewTransform {
    /// Zero-width or zero-height views yield infinite or NaN scale.
    pub fn new(size: ItemSize, view: ViewRect) -> Self {
        Self {
            size: [size.width, size.height],
            scale: [1.0 / view.width, 1.0 / view.height],
            offset: [view.left(), view.top()],
        }
    }

    /// Pixel position of a data-space point, origin at the top left.
    pub fn map(&self, x: f64, y: f64) -> (f64, f64) {
        let px = (x - self.offset[0]) * self.scale[0] * self.size[0];
        let py = (y - self.offset[1]) * self.scale[1] * self.size[1];
        (px, self.size[1] - py)
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new(ItemSize::default(), ViewRect::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillMaterial {
    pub view: ViewTransform,
    pub color: Color,
    pub blending: bool,
}

impl FillMaterial {
    pub fn update(&mut self, view: ViewTransform, color: Color) {
        self.view = view;
        self.color = color;
        self.blending = !color.is_opaque();
    }
}

impl Default for FillMaterial {
    fn default() -> Self {
        Self {
            view: ViewTransform::default(),
            color: Color::BLACK,
            blending: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMaterial {
    pub view: ViewTransform,
    pub color: Color,
    pub blending: bool,
}

impl LineMaterial {
    pub fn update(&mut self, view: ViewTransform, color: Color) {
        self.view = view;
        self.color = color;
        self.blending = !color.is_opaque();
    }
}

impl Default for LineMaterial {
    fn default() -> Self {
        Self {
            view: ViewTransform::default(),
            color: Color::BLACK,
            blending: false,
        }
    }
}

/// Marker sprite parameters plus the cached glyph raster.
///
/// Markers always blend since the glyph carries its own alpha.
pub struct MarkerMaterial {
    pub view: ViewTransform,
    pub color: Color,
    glyph: ByteTexture,
    glyph_key: Option<GlyphKey>,
}

impl MarkerMaterial {
    pub fn new() -> Self {
        Self {
            view: ViewTransform::default(),
            color: Color::BLACK,
            glyph: ByteTexture::new("marker glyph"),
            glyph_key: None,
        }
    }

    pub fn update(&mut self, view: ViewTransform, color: Color) {
        self.view = view;
        self.color = color;
    }

    /// Re-rasterizes the glyph when size, segment count or border changed.
    ///
    /// Returns whether a new raster was staged.
    pub fn update_glyph(&mut self, key: GlyphKey) -> bool {
        if self.glyph_key == Some(key) {
            return false;
        }
        let side = key.raster_side();
        let pixels = self.glyph.allocate_data_2d(side, side, 4);
        paint_marker(pixels, side, key.segments, key.border);
        self.glyph.commit_data();
        self.glyph_key = Some(key);
        tracing::debug!(
            size = key.size,
            segments = key.segments,
            border = key.border,
            "rasterized marker glyph"
        );
        true
    }

    pub fn glyph_key(&self) -> Option<GlyphKey> {
        self.glyph_key
    }

    /// Marker size in pixels, zero before the first glyph.
    pub fn size(&self) -> f64 {
        self.glyph_key.map_or(0.0, |key| key.size)
    }

    pub fn glyph(&self) -> &ByteTexture {
        &self.glyph
    }

    pub fn glyph_mut(&mut self) -> &mut ByteTexture {
        &mut self.glyph
    }

    /// Moves the glyph texture out, leaving an empty one behind.
    pub fn take_glyph(&mut self) -> ByteTexture {
        self.glyph_key = None;
        std::mem::replace(&mut self.glyph, ByteTexture::new("marker glyph"))
    }
}

impl Default for MarkerMaterial {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_corners_map_to_item_corners() {
        let view = ViewTransform::new(
            ItemSize::new(640.0, 480.0),
            ViewRect::from_corners((-2.0, 10.0), (6.0, 110.0)),
        );
        let origin = view.map(-2.0, 10.0);
        assert!((origin.0 - 0.0).abs() < 1e-9);
        assert!((origin.1 - 480.0).abs() < 1e-9);
        let far = view.map(6.0, 110.0);
        assert!((far.0 - 640.0).abs() < 1e-9);
        assert!(far.1.abs() < 1e-9);
    }

    #[test]
    fn degenerate_view_is_not_clamped() {
        let view = ViewTransform::new(ItemSize::new(10.0, 10.0), ViewRect::new(0.0, 0.0, 0.0, 1.0));
        assert!(view.scale[0].is_infinite());
        assert!(view.map(0.0, 0.0).0.is_nan());
    }

    #[test]
    fn translucent_colors_enable_blending() {
        let mut fill = FillMaterial::default();
        fill.update(ViewTransform::default(), Color::new(1.0, 0.0, 0.0, 0.5));
        assert!(fill.blending);
        let mut line = LineMaterial::default();
        line.update(ViewTransform::default(), Color::WHITE);
        assert!(!line.blending);
    }

    #[test]
    fn glyph_is_cached_across_color_changes() {
        let mut marker = MarkerMaterial::new();
        let key = GlyphKey {
            size: 7.5,
            segments: 0,
            border: false,
        };
        assert!(marker.update_glyph(key));
        assert_eq!(marker.glyph().texture_size(), Some((8, 8)));
        assert!(marker.glyph().needs_upload());

        marker.update(ViewTransform::default(), Color::WHITE);
        assert!(!marker.update_glyph(key));
        assert!(marker.update_glyph(GlyphKey { border: true, ..key }));
        assert!(marker.update_glyph(GlyphKey { segments: 5, border: true, ..key }));
        assert_eq!(marker.size(), 7.5);
    }

    #[test]
    fn taking_the_glyph_forces_a_new_raster() {
        let mut marker = MarkerMaterial::new();
        let key = GlyphKey {
            size: 4.0,
            segments: 4,
            border: false,
        };
        marker.update_glyph(key);
        let taken = marker.take_glyph();
        assert_eq!(taken.texture_size(), Some((4, 4)));
        assert_eq!(marker.glyph_key(), None);
        assert!(marker.update_glyph(key));
    }

    #[test]
    fn huge_markers_raster_at_the_side_limit() {
        let mut marker = MarkerMaterial::new();
        let key = GlyphKey {
            size: 1e6,
            segments: 0,
            border: true,
        };
        assert!(marker.update_glyph(key));
        let side = crate::glyph::MAX_GLYPH_SIDE;
        assert_eq!(marker.glyph().texture_size(), Some((side, side)));
        assert_eq!(marker.size(), 1e6);
    }
}
