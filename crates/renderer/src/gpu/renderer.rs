use anyhow::Result;
use wgpu::util::DeviceExt;

use crate::geometry::Geometry;
use crate::material::ViewTransform;
use crate::node::{DirtyState, LayerNode, PlotNode};
use crate::types::Color;

use super::context::RenderContext;
use super::pipeline::PlotPipelines;
use super::uniforms::{pixel_to_clip, LayerUniforms, ViewUniforms};

const VERTEX_SIZE: u64 = std::mem::size_of::<[f32; 2]>() as u64;
/// Vertices per instanced quad (line segment or marker sprite).
const QUAD_VERTICES: u32 = 6;

/// GPU side of one layer: uniform buffers and the uploaded vertices.
struct LayerResources {
    view_buffer: wgpu::Buffer,
    layer_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    vertices: Option<wgpu::Buffer>,
    vertex_count: u32,
    uploaded_revision: Option<u64>,
    uniforms: Option<(ViewUniforms, LayerUniforms)>,
    blended: bool,
    visible: bool,
}

impl LayerResources {
    fn new(ctx: &RenderContext, layout: &wgpu::BindGroupLayout, label: &str) -> Self {
        let device = ctx.device();
        let view_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<ViewUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let layer_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<LayerUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: view_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: layer_buffer.as_entire_binding(),
                },
            ],
        });
        Self {
            view_buffer,
            layer_buffer,
            bind_group,
            vertices: None,
            vertex_count: 0,
            uploaded_revision: None,
            uniforms: None,
            blended: false,
            visible: false,
        }
    }

    fn sync<M>(&mut self, ctx: &RenderContext, node: &mut LayerNode<M>, frame: LayerFrame) {
        let dirty = node.take_dirty();
        self.visible = !node.is_subtree_blocked();
        if !self.visible {
            return;
        }
        self.blended = frame.blended;

        let uniforms = (
            ViewUniforms::new(frame.matrix, &frame.view, frame.opacity),
            LayerUniforms::new(frame.color, frame.extent),
        );
        if dirty.material || self.uniforms != Some(uniforms) {
            let queue = ctx.queue();
            queue.write_buffer(&self.view_buffer, 0, bytemuck::bytes_of(&uniforms.0));
            queue.write_buffer(&self.layer_buffer, 0, bytemuck::bytes_of(&uniforms.1));
            self.uniforms = Some(uniforms);
        }

        // blocked layers may have been rebuilt without being uploaded
        self.upload(ctx, &node.geometry);
    }

    fn upload(&mut self, ctx: &RenderContext, geometry: &Geometry) {
        if self.uploaded_revision == Some(geometry.revision()) {
            return;
        }
        let vertices: &[u8] = bytemuck::cast_slice(geometry.vertices());
        let needed = vertices.len() as u64;
        let fits = self
            .vertices
            .as_ref()
            .is_some_and(|buffer| buffer.size() >= needed);
        if fits {
            if let Some(buffer) = self.vertices.as_ref() {
                ctx.queue().write_buffer(buffer, 0, vertices);
            }
        } else if needed > 0 {
            if let Some(old) = self.vertices.take() {
                old.destroy();
            }
            self.vertices = Some(ctx.device().create_buffer_init(
                &wgpu::util::BufferInitDescriptor {
                    label: Some("xy vertices"),
                    contents: vertices,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                },
            ));
        }
        self.vertex_count = u32::try_from(geometry.vertex_count()).unwrap_or(u32::MAX);
        self.uploaded_revision = Some(geometry.revision());
        tracing::trace!(
            vertices = self.vertex_count,
            revision = geometry.revision(),
            "uploaded layer vertices"
        );
    }

    fn vertex_slice(&self, skip: u32) -> Option<wgpu::BufferSlice<'_>> {
        let buffer = self.vertices.as_ref()?;
        let end = u64::from(self.vertex_count) * VERTEX_SIZE;
        let start = u64::from(skip) * VERTEX_SIZE;
        (start < end).then(|| buffer.slice(start..end))
    }

    fn clear(&mut self) {
        if let Some(buffer) = self.vertices.take() {
            buffer.destroy();
        }
        self.vertex_count = 0;
        self.uploaded_revision = None;
        self.uniforms = None;
        self.visible = false;
    }
}

/// Per-frame inputs for [`LayerResources::sync`].
#[derive(Clone, Copy)]
struct LayerFrame {
    matrix: [[f32; 4]; 4],
    view: ViewTransform,
    opacity: f32,
    color: Color,
    extent: f32,
    blended: bool,
}

/// Draws a [`PlotNode`] tree with wgpu.
///
/// [`prepare`](Self::prepare) runs before the render pass and uploads
/// whatever the node tree marked dirty; [`draw`](Self::draw) records the
/// visible layers into the pass.
pub struct PlotRenderer {
    pipelines: PlotPipelines,
    fill: LayerResources,
    line: LayerResources,
    marker: LayerResources,
    glyph_bind_group: Option<(u64, wgpu::BindGroup)>,
}

impl PlotRenderer {
    pub fn new(ctx: &RenderContext) -> Result<Self> {
        let pipelines = PlotPipelines::new(ctx)?;
        let fill = LayerResources::new(ctx, &pipelines.uniform_layout, "xy fill uniforms");
        let line = LayerResources::new(ctx, &pipelines.uniform_layout, "xy line uniforms");
        let marker = LayerResources::new(ctx, &pipelines.uniform_layout, "xy marker uniforms");
        Ok(Self {
            pipelines,
            fill,
            line,
            marker,
            glyph_bind_group: None,
        })
    }

    /// Synchronizes GPU resources with `root`. `viewport` is the size of the
    /// color target in pixels; the plot item is placed at its top left.
    pub fn prepare(&mut self, ctx: &RenderContext, root: &mut PlotNode, viewport: (u32, u32)) {
        for mut texture in root.take_retired() {
            texture.release(Some(ctx));
        }
        root.take_dirty();
        let opacity = root.opacity();

        let Some(layers) = root.layers_mut() else {
            self.fill.clear();
            self.line.clear();
            self.marker.clear();
            self.glyph_bind_group = None;
            return;
        };

        let matrix = pixel_to_clip(viewport.0, viewport.1);
        let translucent = opacity < 1.0;

        let fill = LayerFrame {
            matrix,
            view: layers.fill.material.view,
            opacity,
            color: layers.fill.material.color,
            extent: 0.0,
            blended: layers.fill.material.blending || translucent,
        };
        self.fill.sync(ctx, &mut layers.fill, fill);

        let line = LayerFrame {
            matrix,
            view: layers.line.material.view,
            opacity,
            color: layers.line.material.color,
            extent: layers.line.geometry.line_width(),
            blended: layers.line.material.blending || translucent,
        };
        self.line.sync(ctx, &mut layers.line, line);

        let marker = LayerFrame {
            matrix,
            view: layers.marker.material.view,
            opacity,
            color: layers.marker.material.color,
            extent: layers.marker.material.size() as f32,
            blended: true,
        };
        self.marker.sync(ctx, &mut layers.marker, marker);

        if self.marker.visible {
            let cached = self.glyph_bind_group.as_ref().map(|(generation, _)| *generation);
            match layers.marker.material.glyph_mut().bind(ctx) {
                Some(binding) if cached != Some(binding.generation) => {
                    let group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("xy glyph bind group"),
                        layout: &self.pipelines.glyph_layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: wgpu::BindingResource::TextureView(binding.view),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: wgpu::BindingResource::Sampler(binding.sampler),
                            },
                        ],
                    });
                    self.glyph_bind_group = Some((binding.generation, group));
                }
                Some(_) => {}
                None => self.glyph_bind_group = None,
            }
        }
    }

    /// Records draw calls for every visible layer, back to front.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, root: &PlotNode) {
        if root.layers().is_none() {
            return;
        }

        if self.fill.visible && self.fill.vertex_count >= 3 {
            if let Some(vertices) = self.fill.vertex_slice(0) {
                pass.set_pipeline(self.pipelines.fill(self.fill.blended));
                pass.set_bind_group(0, &self.fill.bind_group, &[]);
                pass.set_vertex_buffer(0, vertices);
                pass.draw(0..self.fill.vertex_count, 0..1);
            }
        }

        if self.line.visible && self.line.vertex_count >= 2 {
            let segments = self.line.vertex_count - 1;
            if let (Some(start), Some(end)) = (
                self.line.vertex_slice(0),
                self.line.vertex_slice(1),
            ) {
                pass.set_pipeline(self.pipelines.line(self.line.blended));
                pass.set_bind_group(0, &self.line.bind_group, &[]);
                pass.set_vertex_buffer(0, start);
                pass.set_vertex_buffer(1, end);
                pass.draw(0..QUAD_VERTICES, 0..segments);
            }
        }

        if self.marker.visible && self.marker.vertex_count >= 1 {
            if let (Some(vertices), Some((_, glyph))) =
                (self.marker.vertex_slice(0), self.glyph_bind_group.as_ref())
            {
                pass.set_pipeline(&self.pipelines.marker);
                pass.set_bind_group(0, &self.marker.bind_group, &[]);
                pass.set_bind_group(1, glyph, &[]);
                pass.set_vertex_buffer(0, vertices);
                pass.draw(0..QUAD_VERTICES, 0..self.marker.vertex_count);
            }
        }
    }

    /// Releases GPU resources held by `root` while the context is current.
    pub fn release(&mut self, ctx: &RenderContext, root: &mut PlotNode) {
        for mut texture in root.take_retired() {
            texture.release(Some(ctx));
        }
        if let Some(layers) = root.layers_mut() {
            layers.marker.material.glyph_mut().release(Some(ctx));
            layers.mark_dirty(DirtyState::GEOMETRY | DirtyState::MATERIAL);
        }
        self.fill.clear();
        self.line.clear();
        self.marker.clear();
        self.glyph_bind_group = None;
    }
}
