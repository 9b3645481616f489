//! Per-window GPU state and the render tick.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use media::Decoder;

use crate::catalog;
use crate::params::KernelController;
use crate::player::{FrameLoop, FrameStreamPlayer, VideoFile};
use crate::texture::{self, TextureMetadata};
use crate::types::{RenderError, ViewerConfig, ViewerSource};

use super::context::GpuContext;
use super::pipeline::{EffectPipeline, DEPTH_FORMAT};
use super::provision::{self, EffectResources};
use super::uniforms::UniformStore;

pub(crate) struct GpuState {
    context: GpuContext,
    pipeline: EffectPipeline,
    resources: EffectResources,
    uniforms: UniformStore,
    uniform_buffer: wgpu::Buffer,
    effect_bind_group: wgpu::BindGroup,
    source_texture: wgpu::Texture,
    depth_view: Option<wgpu::TextureView>,
    kernel: KernelController,
    player: Option<FrameStreamPlayer>,
}

impl GpuState {
    pub(crate) fn new<T>(target: &T, config: &ViewerConfig) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(
            target,
            PhysicalSize::new(config.surface_size.0, config.surface_size.1),
        )?;

        let descriptor = catalog::descriptor_for(&config.fragment);
        tracing::info!(
            effect = descriptor.name,
            fragment = %config.fragment.display(),
            "provisioning effect"
        );

        // Still images carry their pixels up front; video sources hand over
        // an open decoder and stream pixels per tick.
        let (metadata, initial_pixels, decoder) = match &config.source {
            ViewerSource::Image(path) => {
                let probed = texture::probe_image(path)?;
                (probed.metadata, Some(probed.pixels), None)
            }
            ViewerSource::Video(path) => {
                let decoder = Decoder::open(path)?;
                let (width, height) = decoder.geometry();
                (TextureMetadata::new(width, height)?, None, Some(decoder))
            }
        };

        let pipeline = EffectPipeline::new(
            &context.device,
            context.surface_format,
            &config.fragment,
            &descriptor,
        )?;

        let mut uniforms = UniformStore::new(
            pipeline.reflection.params.clone(),
            pipeline.reflection.params_block_size,
        );
        let mut rng = StdRng::from_entropy();
        let plan = provision::plan(
            &descriptor,
            &metadata,
            config.kernel_size,
            &mut uniforms,
            &mut rng,
        );
        let resources =
            provision::realize(&context.device, plan, descriptor.resource_kind, &pipeline)?;

        let source_texture = create_source_texture(&context, &metadata, initial_pixels.as_deref());
        let source_view = source_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("source sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("effect parameters"),
            size: uniforms.buffer_len(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let effect_bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("effect bind group"),
            layout: &pipeline.effect_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&source_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let depth_view = pipeline
            .needs_depth()
            .then(|| create_depth_view(&context.device, context.size));

        let player = decoder.map(|decoder| {
            let path = match &config.source {
                ViewerSource::Video(path) => path.clone(),
                ViewerSource::Image(_) => unreachable!("decoder only exists for video sources"),
            };
            FrameStreamPlayer::new(
                FrameLoop::resume(VideoFile::new(path), decoder),
                metadata.width,
                metadata.height,
            )
        });

        uniforms.flush(&context.queue, &uniform_buffer);

        Ok(Self {
            context,
            pipeline,
            resources,
            uniforms,
            uniform_buffer,
            effect_bind_group,
            source_texture,
            depth_view,
            kernel: KernelController::new(config.kernel_size),
            player,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
        if self.pipeline.needs_depth() {
            self.depth_view = Some(create_depth_view(&self.context.device, self.context.size));
        }
    }

    /// Bumps the kernel size and pushes the change before the next tick.
    pub(crate) fn increment_kernel(&mut self) {
        if self.kernel.increment(&mut self.uniforms) {
            self.uniforms.flush(&self.context.queue, &self.uniform_buffer);
        }
    }

    pub(crate) fn decrement_kernel(&mut self) {
        if self.kernel.decrement(&mut self.uniforms) {
            self.uniforms.flush(&self.context.queue, &self.uniform_buffer);
        }
    }

    /// One render tick: advance video if playing, then a single draw over a
    /// black-cleared frame.
    pub(crate) fn render(&mut self) -> Result<(), RenderError> {
        if let Some(player) = self.player.as_mut() {
            player.upload_next(&self.context.queue, &self.source_texture)?;
        }
        self.uniforms.flush(&self.context.queue, &self.uniform_buffer);

        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("effect encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("effect pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: self.depth_view.as_ref().map(|depth_view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view: depth_view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.pipeline.pipeline);
            pass.set_bind_group(0, &self.effect_bind_group, &[]);
            if let Some(seed_bind_group) = &self.resources.seed_bind_group {
                pass.set_bind_group(1, seed_bind_group, &[]);
            }
            if let Some(instance_buffer) = &self.resources.instance_buffer {
                pass.set_vertex_buffer(0, instance_buffer.slice(..));
            }
            pass.draw(0..self.pipeline.vertex_count, 0..self.resources.instance_count);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

fn create_source_texture(
    context: &GpuContext,
    metadata: &TextureMetadata,
    pixels: Option<&[u8]>,
) -> wgpu::Texture {
    let extent = wgpu::Extent3d {
        width: metadata.width,
        height: metadata.height,
        depth_or_array_layers: 1,
    };
    let texture = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("source texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    if let Some(pixels) = pixels {
        context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(metadata.width * 4),
                rows_per_image: Some(metadata.height),
            },
            extent,
        );
    }

    texture
}

fn create_depth_view(device: &wgpu::Device, size: PhysicalSize<u32>) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth target"),
        size: wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
