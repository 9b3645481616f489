use std::path::Path;

use anyhow::{Context, Result};

use crate::catalog::{EffectDescriptor, ResourceKind, VertexStage};
use crate::compile::{compile_fragment_shader, compile_vertex_shader, reflect_fragment, FragmentReflection};

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// A render pipeline specialized to one effect: its vertex stage, its
/// reflected parameter layout, and the optional seed bind group layout.
pub(crate) struct EffectPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub effect_layout: wgpu::BindGroupLayout,
    pub seed_layout: Option<wgpu::BindGroupLayout>,
    pub reflection: FragmentReflection,
    /// Vertices per instance: 3 for the full-screen triangle, 6 per cell quad.
    pub vertex_count: u32,
    uses_depth: bool,
}

impl EffectPipeline {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        fragment_path: &Path,
        descriptor: &EffectDescriptor,
    ) -> Result<Self> {
        let shader_code = std::fs::read_to_string(fragment_path).with_context(|| {
            format!("failed to read shader at {}", fragment_path.display())
        })?;
        let reflection = reflect_fragment(&shader_code).with_context(|| {
            format!("failed to compile shader at {}", fragment_path.display())
        })?;

        let fragment_module = compile_fragment_shader(device, &shader_code);
        let vertex_module = compile_vertex_shader(device, descriptor.vertex_stage);

        let effect_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("effect layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let seed_layout = match descriptor.resource_kind {
            ResourceKind::SeededUniformBlock => {
                Some(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("seed layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                }))
            }
            _ => None,
        };

        let mut bind_group_layouts = vec![&effect_layout];
        if let Some(layout) = &seed_layout {
            bind_group_layouts.push(layout);
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("effect pipeline layout"),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let instance_attributes = [wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: 0,
        }];
        let vertex_buffers = match descriptor.vertex_stage {
            VertexStage::Standard => Vec::new(),
            VertexStage::Instanced => vec![wgpu::VertexBufferLayout {
                array_stride: 8,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &instance_attributes,
            }],
        };

        // The instanced stage resolves cell ownership through the depth
        // test: each fragment writes its distance to the owning seed.
        let depth_stencil = match descriptor.vertex_stage {
            VertexStage::Standard => None,
            VertexStage::Instanced => Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(descriptor.name),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        let (vertex_count, uses_depth) = match descriptor.vertex_stage {
            VertexStage::Standard => (3, false),
            VertexStage::Instanced => (6, true),
        };

        Ok(Self {
            pipeline,
            effect_layout,
            seed_layout,
            reflection,
            vertex_count,
            uses_depth,
        })
    }

    pub fn needs_depth(&self) -> bool {
        self.uses_depth
    }
}
