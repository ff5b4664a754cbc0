use anyhow::{Context, Result};

use crate::compile::{compile_program, Program, ProgramKind};

use super::context::RenderContext;
use super::uniforms::{LayerUniforms, ViewUniforms};

const VERTEX_STRIDE: wgpu::BufferAddress = std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress;

const START_ATTRIBUTE: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x2,
    offset: 0,
    shader_location: 0,
}];

const END_ATTRIBUTE: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x2,
    offset: 0,
    shader_location: 1,
}];

/// Premultiplied alpha, matching what the fragment stages emit.
const PREMULTIPLIED: wgpu::BlendState = wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING;

pub(crate) struct PlotPipelines {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub glyph_layout: wgpu::BindGroupLayout,
    fill_opaque: wgpu::RenderPipeline,
    fill_blended: wgpu::RenderPipeline,
    line_opaque: wgpu::RenderPipeline,
    line_blended: wgpu::RenderPipeline,
    pub marker: wgpu::RenderPipeline,
}

impl PlotPipelines {
    pub fn new(ctx: &RenderContext) -> Result<Self> {
        let device = ctx.device();
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("xy uniform layout"),
            entries: &[
                uniform_entry(0, std::mem::size_of::<ViewUniforms>()),
                uniform_entry(1, std::mem::size_of::<LayerUniforms>()),
            ],
        });
        let glyph_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("xy glyph layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let flat_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("xy flat pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });
        let marker_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("xy marker pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &glyph_layout],
            push_constant_ranges: &[],
        });

        let fill = compile_program(device, ProgramKind::Fill).context("fill program")?;
        let line = compile_program(device, ProgramKind::Line).context("line program")?;
        let marker = compile_program(device, ProgramKind::Marker).context("marker program")?;

        let fill_buffers = [wgpu::VertexBufferLayout {
            array_stride: VERTEX_STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &START_ATTRIBUTE,
        }];
        let line_buffers = [
            wgpu::VertexBufferLayout {
                array_stride: VERTEX_STRIDE,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &START_ATTRIBUTE,
            },
            wgpu::VertexBufferLayout {
                array_stride: VERTEX_STRIDE,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &END_ATTRIBUTE,
            },
        ];
        let marker_buffers = [wgpu::VertexBufferLayout {
            array_stride: VERTEX_STRIDE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &START_ATTRIBUTE,
        }];

        let strip = wgpu::PrimitiveTopology::TriangleStrip;
        let list = wgpu::PrimitiveTopology::TriangleList;
        Ok(Self {
            fill_opaque: create_pipeline(
                ctx,
                &fill,
                &flat_layout,
                &fill_buffers,
                strip,
                None,
                "xy fill",
            ),
            fill_blended: create_pipeline(
                ctx,
                &fill,
                &flat_layout,
                &fill_buffers,
                strip,
                Some(PREMULTIPLIED),
                "xy fill blended",
            ),
            line_opaque: create_pipeline(
                ctx,
                &line,
                &flat_layout,
                &line_buffers,
                list,
                None,
                "xy line",
            ),
            line_blended: create_pipeline(
                ctx,
                &line,
                &flat_layout,
                &line_buffers,
                list,
                Some(PREMULTIPLIED),
                "xy line blended",
            ),
            marker: create_pipeline(
                ctx,
                &marker,
                &marker_layout,
                &marker_buffers,
                list,
                Some(PREMULTIPLIED),
                "xy marker",
            ),
            uniform_layout,
            glyph_layout,
        })
    }

    pub fn fill(&self, blended: bool) -> &wgpu::RenderPipeline {
        if blended {
            &self.fill_blended
        } else {
            &self.fill_opaque
        }
    }

    pub fn line(&self, blended: bool) -> &wgpu::RenderPipeline {
        if blended {
            &self.line_blended
        } else {
            &self.line_opaque
        }
    }
}

fn uniform_entry(binding: u32, size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size as u64),
        },
        count: None,
    }
}

fn create_pipeline(
    ctx: &RenderContext,
    program: &Program,
    layout: &wgpu::PipelineLayout,
    buffers: &[wgpu::VertexBufferLayout<'_>],
    topology: wgpu::PrimitiveTopology,
    blend: Option<wgpu::BlendState>,
    label: &str,
) -> wgpu::RenderPipeline {
    ctx.device()
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: &program.vertex,
                entry_point: Some("main"),
                buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: ctx.sample_count(),
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.fragment,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.format(),
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        })
}
