use std::borrow::Cow;

use anyhow::{bail, Result};
use wgpu::naga::ShaderStage;

/// Vertex and fragment modules of one plot program.
pub(crate) struct Program {
    pub vertex: wgpu::ShaderModule,
    pub fragment: wgpu::ShaderModule,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ProgramKind {
    Fill,
    Line,
    Marker,
}

impl ProgramKind {
    pub fn label(self) -> &'static str {
        match self {
            ProgramKind::Fill => "xy fill",
            ProgramKind::Line => "xy line",
            ProgramKind::Marker => "xy marker",
        }
    }

    pub fn vertex_source(self) -> String {
        let body = match self {
            ProgramKind::Fill => FILL_VERTEX,
            ProgramKind::Line => LINE_VERTEX,
            ProgramKind::Marker => MARKER_VERTEX,
        };
        format!("{HEADER}{TO_PIXELS}{body}")
    }

    pub fn fragment_source(self) -> String {
        let body = match self {
            ProgramKind::Fill | ProgramKind::Line => FLAT_FRAGMENT,
            ProgramKind::Marker => MARKER_FRAGMENT,
        };
        format!("{HEADER}{body}")
    }
}

/// Compiles both stages of a program, surfacing validation failures as errors.
pub(crate) fn compile_program(device: &wgpu::Device, kind: ProgramKind) -> Result<Program> {
    let vertex = compile_stage(device, kind.label(), kind.vertex_source(), ShaderStage::Vertex)?;
    let fragment = compile_stage(
        device,
        kind.label(),
        kind.fragment_source(),
        ShaderStage::Fragment,
    )?;
    Ok(Program { vertex, fragment })
}

fn compile_stage(
    device: &wgpu::Device,
    label: &str,
    source: String,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source),
            stage,
            defines: &[],
        },
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        bail!("failed to compile {label} {stage:?} shader: {err}");
    }
    Ok(module)
}

/// Uniform blocks shared by every stage. Layouts must match
/// [`ViewUniforms`](crate::gpu::ViewUniforms) and
/// [`LayerUniforms`](crate::gpu::LayerUniforms).
const HEADER: &str = r"#version 450

layout(std140, set = 0, binding = 0) uniform View {
    mat4 matrix;
    vec2 size;
    vec2 scale;
    vec2 offset;
    float opacity;
} view;

layout(std140, set = 0, binding = 1) uniform Layer {
    vec4 color;
    float extent;
} layer;
";

const TO_PIXELS: &str = r"
vec2 to_pixels(vec2 v) {
    vec2 p = (v - view.offset) * view.scale * view.size;
    return vec2(p.x, view.size.y - p.y);
}

vec4 to_clip(vec2 pixel) {
    return view.matrix * vec4(pixel, 0.0, 1.0);
}
";

const FILL_VERTEX: &str = r"
layout(location = 0) in vec2 vertex;

void main() {
    gl_Position = to_clip(to_pixels(vertex));
}
";

// One instance per segment, six vertices spanning a quad of `layer.extent`
// pixels around it.
const LINE_VERTEX: &str = r"
layout(location = 0) in vec2 start;
layout(location = 1) in vec2 end;

void main() {
    int i = int(gl_VertexIndex);
    float along = (i == 1 || i == 4 || i == 5) ? 1.0 : 0.0;
    float side = (i == 2 || i == 3 || i == 5) ? 1.0 : -1.0;

    vec2 a = to_pixels(start);
    vec2 b = to_pixels(end);
    vec2 d = b - a;
    float len = length(d);
    vec2 dir = len > 0.0 ? d / len : vec2(1.0, 0.0);
    vec2 normal = vec2(-dir.y, dir.x);
    float half_width = max(layer.extent, 1.0) * 0.5;

    gl_Position = to_clip(mix(a, b, along) + normal * side * half_width);
}
";

// One instance per sample, six vertices spanning a `layer.extent` square.
const MARKER_VERTEX: &str = r"
layout(location = 0) in vec2 vertex;
layout(location = 0) out vec2 v_uv;

void main() {
    int i = int(gl_VertexIndex);
    float u = (i == 1 || i == 4 || i == 5) ? 1.0 : 0.0;
    float v = (i == 2 || i == 3 || i == 5) ? 1.0 : 0.0;
    v_uv = vec2(u, v);

    vec2 corner = (v_uv - vec2(0.5)) * layer.extent;
    gl_Position = to_clip(to_pixels(vertex) + corner);
}
";

const FLAT_FRAGMENT: &str = r"
layout(location = 0) out vec4 frag_color;

void main() {
    frag_color = vec4(layer.color.rgb * layer.color.a, layer.color.a) * view.opacity;
}
";

const MARKER_FRAGMENT: &str = r"
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 frag_color;

layout(set = 1, binding = 0) uniform texture2D glyph_texture;
layout(set = 1, binding = 1) uniform sampler glyph_sampler;

void main() {
    vec4 color = layer.color * texture(sampler2D(glyph_texture, glyph_sampler), v_uv);
    float o = view.opacity * color.a;
    frag_color = vec4(color.rgb * o, o);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::naga::front::glsl::{Frontend, Options};
    use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

    const ALL: [ProgramKind; 3] = [ProgramKind::Fill, ProgramKind::Line, ProgramKind::Marker];

    fn parse(source: &str, stage: ShaderStage) -> wgpu::naga::Module {
        let mut frontend = Frontend::default();
        let module = frontend
            .parse(&Options::from(stage), source)
            .unwrap_or_else(|err| panic!("failed to parse:\n{source}\n{err:?}"));
        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .unwrap_or_else(|err| panic!("failed to validate:\n{source}\n{err:?}"));
        module
    }

    #[test]
    fn every_program_parses_and_validates() {
        for kind in ALL {
            parse(&kind.vertex_source(), ShaderStage::Vertex);
            parse(&kind.fragment_source(), ShaderStage::Fragment);
        }
    }

    #[test]
    fn sources_start_with_version_directive() {
        for kind in ALL {
            assert!(kind.vertex_source().starts_with("#version 450"));
            assert!(kind.fragment_source().starts_with("#version 450"));
        }
    }

    #[test]
    fn flat_layers_premultiply_and_apply_opacity() {
        let fill = ProgramKind::Fill.fragment_source();
        assert_eq!(fill, ProgramKind::Line.fragment_source());
        assert!(
            fill.contains("vec4(layer.color.rgb * layer.color.a, layer.color.a) * view.opacity")
        );
    }

    #[test]
    fn marker_samples_glyph_in_set_one() {
        let source = ProgramKind::Marker.fragment_source();
        assert!(source.contains("set = 1, binding = 0) uniform texture2D"));
        assert!(source.contains("frag_color = vec4(color.rgb * o, o)"));
    }

    #[test]
    fn instanced_quads_index_corners_as_int() {
        for kind in [ProgramKind::Line, ProgramKind::Marker] {
            let source = kind.vertex_source();
            assert!(source.contains("int i = int(gl_VertexIndex);"));
            parse(&source, ShaderStage::Vertex);
        }
    }

    #[test]
    fn vertex_stage_flips_y() {
        for kind in ALL {
            assert!(kind.vertex_source().contains("vec2(p.x, view.size.y - p.y)"));
        }
    }
}
