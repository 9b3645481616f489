//! Effect resource provisioning.
//!
//! Split in two halves: [`plan`] is pure and decides what an effect needs
//! (seed data, instance count, initial uniform pushes) from its catalog
//! descriptor, while [`realize`] turns a plan into GPU buffers and bind
//! groups. Keeping the decision side free of device handles lets the
//! per-effect provisioning rules be tested headless.

use anyhow::{Context, Result};
use rand::Rng;
use wgpu::util::DeviceExt;

use crate::catalog::{EffectDescriptor, ResourceKind};
use crate::params::{clamp_kernel, KERNEL_UNIFORM};
use crate::texture::TextureMetadata;

use super::pipeline::EffectPipeline;
use super::uniforms::UniformStore;

/// Random seed positions in UV space, in [0, 1) on both axes.
pub struct SeedSet {
    points: Vec<[f32; 2]>,
}

impl SeedSet {
    pub fn generate<R: Rng>(rng: &mut R, count: u32) -> Self {
        let points = (0..count)
            .map(|_| [rng.gen::<f32>(), rng.gen::<f32>()])
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[[f32; 2]] {
        &self.points
    }

    /// Seed data at the 16-byte stride std140 gives a `vec2` array.
    pub fn std140_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.points.len() * 16);
        for point in &self.points {
            bytes.extend_from_slice(bytemuck::bytes_of(&[point[0], point[1], 0.0f32, 0.0f32]));
        }
        bytes
    }

    /// Tightly packed seed data for a per-instance vertex buffer.
    pub fn packed_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.points)
    }
}

/// What an effect needs, decided before any GPU resource exists.
pub struct ProvisionPlan {
    pub instance_count: u32,
    pub seeds: Option<SeedSet>,
}

/// Decides the effect's resources and pushes its initial parameters.
///
/// The full parameter set is always offered; shaders that do not declare a
/// given name simply drop the push.
pub fn plan<R: Rng>(
    descriptor: &EffectDescriptor,
    metadata: &TextureMetadata,
    kernel_size: i32,
    uniforms: &mut UniformStore,
    rng: &mut R,
) -> ProvisionPlan {
    uniforms.push_f32("inv_tex_width", metadata.inverse_width);
    uniforms.push_f32("inv_tex_height", metadata.inverse_height);
    uniforms.push_f32("tex_width", metadata.width as f32);
    uniforms.push_f32("tex_height", metadata.height as f32);
    uniforms.push_f32("tex_size", metadata.pixel_count as f32);
    uniforms.push_f32("r", metadata.instancing_radius());

    if descriptor.resource_kind == ResourceKind::KernelUniform {
        uniforms.push_i32(KERNEL_UNIFORM, clamp_kernel(kernel_size));
    }

    let seeds = match descriptor.resource_kind {
        ResourceKind::SeededUniformBlock | ResourceKind::SeededInstanceBuffer => {
            Some(SeedSet::generate(rng, descriptor.seed_count))
        }
        ResourceKind::None | ResourceKind::KernelUniform => None,
    };

    let instance_count = match descriptor.resource_kind {
        ResourceKind::SeededInstanceBuffer => descriptor.seed_count,
        _ => 1,
    };

    tracing::debug!(
        effect = descriptor.name,
        resource_kind = ?descriptor.resource_kind,
        instance_count,
        seeds = seeds.as_ref().map_or(0, SeedSet::len),
        "planned effect resources"
    );

    ProvisionPlan {
        instance_count,
        seeds,
    }
}

/// GPU resources realized for one effect.
pub(crate) struct EffectResources {
    pub instance_count: u32,
    pub seed_bind_group: Option<wgpu::BindGroup>,
    pub instance_buffer: Option<wgpu::Buffer>,
    /// Keeps the seed uniform buffer alive for the bind group above.
    _seed_buffer: Option<wgpu::Buffer>,
}

pub(crate) fn realize(
    device: &wgpu::Device,
    plan: ProvisionPlan,
    kind: ResourceKind,
    pipeline: &EffectPipeline,
) -> Result<EffectResources> {
    let mut seed_bind_group = None;
    let mut seed_buffer = None;
    let mut instance_buffer = None;

    match kind {
        ResourceKind::None | ResourceKind::KernelUniform => {}
        ResourceKind::SeededUniformBlock => {
            let seeds = plan.seeds.as_ref().context("seeded effect planned without seeds")?;
            let declared = pipeline
                .reflection
                .seed_block_size
                .context("fragment shader does not declare a seed uniform block")?;

            // The buffer matches the shader's declared block size exactly;
            // generated data is truncated or zero-padded to fit.
            let mut bytes = seeds.std140_bytes();
            bytes.resize(declared as usize, 0);

            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("seed uniform block"),
                contents: &bytes,
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let layout = pipeline
                .seed_layout
                .as_ref()
                .context("pipeline lacks a seed bind group layout")?;
            seed_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("seed bind group"),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            }));
            seed_buffer = Some(buffer);
        }
        ResourceKind::SeededInstanceBuffer => {
            let seeds = plan.seeds.as_ref().context("seeded effect planned without seeds")?;
            instance_buffer = Some(device.create_buffer_init(
                &wgpu::util::BufferInitDescriptor {
                    label: Some("seed instance buffer"),
                    contents: seeds.packed_bytes(),
                    usage: wgpu::BufferUsages::VERTEX,
                },
            ));
        }
    }

    Ok(EffectResources {
        instance_count: plan.instance_count,
        seed_bind_group,
        instance_buffer,
        _seed_buffer: seed_buffer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::gpu::uniforms::UniformField;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn metadata() -> TextureMetadata {
        TextureMetadata::new(512, 256).unwrap()
    }

    fn full_store() -> UniformStore {
        let names = [
            "inv_tex_width",
            "inv_tex_height",
            "tex_width",
            "tex_height",
            "tex_size",
            "r",
            "kernel_size",
        ];
        let fields = names
            .iter()
            .enumerate()
            .map(|(index, name)| UniformField {
                name: (*name).into(),
                offset: index as u32 * 4,
                size: 4,
            })
            .collect();
        UniformStore::new(fields, names.len() as u32 * 4)
    }

    #[test]
    fn unseeded_effects_get_no_buffers_and_one_instance() {
        let descriptor = catalog::lookup("default");
        let mut store = full_store();
        let mut rng = StdRng::seed_from_u64(1);

        let plan = plan(&descriptor, &metadata(), 5, &mut store, &mut rng);
        assert_eq!(plan.instance_count, 1);
        assert!(plan.seeds.is_none());
    }

    #[test]
    fn kuwahara_plan_pushes_the_clamped_kernel() {
        let descriptor = catalog::lookup("kuwahara_circle");
        let mut store = full_store();
        let mut rng = StdRng::seed_from_u64(1);

        let plan = plan(&descriptor, &metadata(), 99, &mut store, &mut rng);
        assert_eq!(plan.instance_count, 1);
        assert!(plan.seeds.is_none());
        assert_eq!(store.read_i32("kernel_size"), Some(15));
    }

    #[test]
    fn voronoi_block_plan_generates_the_catalog_seed_count() {
        let descriptor = catalog::lookup("voronoi_euclidean");
        let mut store = full_store();
        let mut rng = StdRng::seed_from_u64(7);

        let plan = plan(&descriptor, &metadata(), 5, &mut store, &mut rng);
        assert_eq!(plan.instance_count, 1);
        let seeds = plan.seeds.unwrap();
        assert_eq!(seeds.len(), catalog::UNIFORM_BLOCK_SEED_COUNT as usize);
        assert!(seeds
            .points()
            .iter()
            .all(|point| (0.0..1.0).contains(&point[0]) && (0.0..1.0).contains(&point[1])));
    }

    #[test]
    fn instanced_plan_draws_one_instance_per_seed() {
        let descriptor = catalog::lookup("voronoi_instanced");
        let mut store = full_store();
        let mut rng = StdRng::seed_from_u64(7);

        let plan = plan(&descriptor, &metadata(), 5, &mut store, &mut rng);
        assert_eq!(plan.instance_count, catalog::INSTANCED_SEED_COUNT);
        assert_eq!(
            plan.seeds.unwrap().len(),
            catalog::INSTANCED_SEED_COUNT as usize
        );
    }

    #[test]
    fn plan_pushes_texture_metadata() {
        let descriptor = catalog::lookup("default");
        let mut store = full_store();
        let mut rng = StdRng::seed_from_u64(1);
        let metadata = metadata();

        plan(&descriptor, &metadata, 5, &mut store, &mut rng);
        assert_eq!(store.read_f32("inv_tex_width"), Some(1.0 / 512.0));
        assert_eq!(store.read_f32("tex_height"), Some(256.0));
        assert_eq!(store.read_f32("tex_size"), Some(131_072.0));
        assert_eq!(store.read_f32("r"), Some(metadata.instancing_radius()));
    }

    #[test]
    fn std140_bytes_carry_a_16_byte_stride() {
        let mut rng = StdRng::seed_from_u64(3);
        let seeds = SeedSet::generate(&mut rng, 5);
        assert_eq!(seeds.std140_bytes().len(), 80);
        assert_eq!(seeds.packed_bytes().len(), 40);
    }
}
