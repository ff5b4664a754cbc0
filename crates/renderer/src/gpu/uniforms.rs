use bytemuck::{Pod, Zeroable};

use crate::material::ViewTransform;
use crate::types::Color;

/// Binding 0 of set 0, shared by every plot program. Mirrors the std140
/// `View` block in the GLSL sources.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ViewUniforms {
    pub matrix: [[f32; 4]; 4],
    pub size: [f32; 2],
    pub scale: [f32; 2],
    pub offset: [f32; 2],
    pub opacity: f32,
    pub _padding: f32,
}

impl ViewUniforms {
    pub fn new(matrix: [[f32; 4]; 4], view: &ViewTransform, opacity: f32) -> Self {
        Self {
            matrix,
            size: to_f32(view.size),
            scale: to_f32(view.scale),
            offset: to_f32(view.offset),
            opacity,
            _padding: 0.0,
        }
    }

    /// Same transform the vertex stage applies, computed on the CPU.
    pub fn project(&self, vertex: [f32; 2]) -> [f32; 2] {
        let px = (vertex[0] - self.offset[0]) * self.scale[0] * self.size[0];
        let py = (vertex[1] - self.offset[1]) * self.scale[1] * self.size[1];
        let pixel = [px, self.size[1] - py, 0.0, 1.0];
        let mut clip = [0.0f32; 4];
        for (column, value) in self.matrix.iter().zip(pixel) {
            for (out, m) in clip.iter_mut().zip(column) {
                *out += m * value;
            }
        }
        [clip[0] / clip[3], clip[1] / clip[3]]
    }
}

/// Binding 1 of set 0: layer color plus line width or marker size.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LayerUniforms {
    pub color: [f32; 4],
    pub extent: f32,
    pub _padding: [f32; 3],
}

impl LayerUniforms {
    pub fn new(color: Color, extent: f32) -> Self {
        Self {
            color: color.to_array(),
            extent,
            _padding: [0.0; 3],
        }
    }
}

/// Column-major matrix mapping item pixels (origin top left, y down) to
/// clip space.
pub fn pixel_to_clip(width: u32, height: u32) -> [[f32; 4]; 4] {
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;
    [
        [2.0 / w, 0.0, 0.0, 0.0],
        [0.0, -2.0 / h, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [-1.0, 1.0, 0.0, 1.0],
    ]
}

fn to_f32(value: [f64; 2]) -> [f32; 2] {
    [value[0] as f32, value[1] as f32]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemSize, ViewRect};

    #[test]
    fn layouts_match_std140_blocks() {
        assert_eq!(std::mem::size_of::<ViewUniforms>(), 96);
        assert_eq!(std::mem::size_of::<LayerUniforms>(), 32);
        assert_eq!(std::mem::offset_of!(ViewUniforms, size), 64);
        assert_eq!(std::mem::offset_of!(ViewUniforms, opacity), 88);
        assert_eq!(std::mem::offset_of!(LayerUniforms, extent), 16);
    }

    #[test]
    fn view_corners_land_on_clip_corners() {
        let view = ViewTransform::new(
            ItemSize::new(800.0, 600.0),
            ViewRect::from_corners((0.0, 0.0), (2.0, 100.0)),
        );
        let uniforms = ViewUniforms::new(pixel_to_clip(800, 600), &view, 1.0);
        let origin = uniforms.project([0.0, 0.0]);
        assert!((origin[0] + 1.0).abs() < 1e-6);
        assert!((origin[1] + 1.0).abs() < 1e-6);
        let far = uniforms.project([2.0, 100.0]);
        assert!((far[0] - 1.0).abs() < 1e-6);
        assert!((far[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn item_can_be_smaller_than_viewport() {
        let view = ViewTransform::new(ItemSize::new(100.0, 100.0), ViewRect::default());
        let uniforms = ViewUniforms::new(pixel_to_clip(200, 200), &view, 0.5);
        let top_right = uniforms.project([1.0, 1.0]);
        assert!(top_right[0].abs() < 1e-6);
        assert!((top_right[1] - 1.0).abs() < 1e-6);
        assert_eq!(uniforms.opacity, 0.5);
    }

    #[test]
    fn layer_uniforms_carry_straight_color() {
        let uniforms = LayerUniforms::new(Color::new(1.0, 0.5, 0.0, 0.5), 3.0);
        assert_eq!(uniforms.color, [1.0, 0.5, 0.0, 0.5]);
        assert_eq!(uniforms.extent, 3.0);
    }
}
