//! The effect catalog: which GPU resources each fragment shader expects.
//!
//! Effects are identified by the fragment file's stem, so dropping a new
//! shader next to the existing ones is enough to run it; unknown stems get
//! the standard no-extra-resources profile.

use std::path::Path;

/// Seeds carried in a uniform block for the brute-force Voronoi metrics.
pub const UNIFORM_BLOCK_SEED_COUNT: u32 = 4000;
/// Seeds carried as per-instance vertex data for the instanced renderer.
pub const INSTANCED_SEED_COUNT: u32 = 10_000;

/// Which vertex stage the effect pipeline is built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexStage {
    /// Full-screen triangle, one instance.
    Standard,
    /// One quad per seed, positioned from a per-instance attribute.
    Instanced,
}

/// The auxiliary resources an effect needs beyond the shared parameter block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    /// No extra resources.
    None,
    /// A `kernel_size` uniform driven by the live kernel controller.
    KernelUniform,
    /// A uniform block filled with random seed positions.
    SeededUniformBlock,
    /// A vertex buffer of random seed positions, stepped per instance.
    SeededInstanceBuffer,
}

#[derive(Clone, Copy, Debug)]
pub struct EffectDescriptor {
    pub name: &'static str,
    pub vertex_stage: VertexStage,
    pub resource_kind: ResourceKind,
    /// Number of random seeds to generate; zero for unseeded effects.
    pub seed_count: u32,
}

const STANDARD: EffectDescriptor = EffectDescriptor {
    name: "default",
    vertex_stage: VertexStage::Standard,
    resource_kind: ResourceKind::None,
    seed_count: 0,
};

const EFFECTS: &[EffectDescriptor] = &[
    STANDARD,
    EffectDescriptor {
        name: "kuwahara_square",
        vertex_stage: VertexStage::Standard,
        resource_kind: ResourceKind::KernelUniform,
        seed_count: 0,
    },
    EffectDescriptor {
        name: "kuwahara_circle",
        vertex_stage: VertexStage::Standard,
        resource_kind: ResourceKind::KernelUniform,
        seed_count: 0,
    },
    EffectDescriptor {
        name: "kuwahara_anisotropic",
        vertex_stage: VertexStage::Standard,
        resource_kind: ResourceKind::KernelUniform,
        seed_count: 0,
    },
    EffectDescriptor {
        name: "voronoi_euclidean",
        vertex_stage: VertexStage::Standard,
        resource_kind: ResourceKind::SeededUniformBlock,
        seed_count: UNIFORM_BLOCK_SEED_COUNT,
    },
    EffectDescriptor {
        name: "voronoi_manhattan",
        vertex_stage: VertexStage::Standard,
        resource_kind: ResourceKind::SeededUniformBlock,
        seed_count: UNIFORM_BLOCK_SEED_COUNT,
    },
    EffectDescriptor {
        name: "voronoi_chebyshev",
        vertex_stage: VertexStage::Standard,
        resource_kind: ResourceKind::SeededUniformBlock,
        seed_count: UNIFORM_BLOCK_SEED_COUNT,
    },
    EffectDescriptor {
        name: "voronoi_instanced",
        vertex_stage: VertexStage::Instanced,
        resource_kind: ResourceKind::SeededInstanceBuffer,
        seed_count: INSTANCED_SEED_COUNT,
    },
];

/// Looks up an effect by name, falling back to the standard profile.
pub fn lookup(name: &str) -> EffectDescriptor {
    match EFFECTS.iter().find(|effect| effect.name == name) {
        Some(effect) => *effect,
        None => {
            tracing::debug!(name, "effect not in catalog; using standard profile");
            STANDARD
        }
    }
}

/// Resolves the effect for a fragment shader path via its file stem.
pub fn descriptor_for(fragment: &Path) -> EffectDescriptor {
    let stem = fragment.file_stem().and_then(|stem| stem.to_str());
    match stem {
        Some(stem) => lookup(stem),
        None => STANDARD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn kuwahara_effects_carry_a_kernel_uniform() {
        for name in ["kuwahara_square", "kuwahara_circle", "kuwahara_anisotropic"] {
            let effect = lookup(name);
            assert_eq!(effect.resource_kind, ResourceKind::KernelUniform);
            assert_eq!(effect.vertex_stage, VertexStage::Standard);
            assert_eq!(effect.seed_count, 0);
        }
    }

    #[test]
    fn voronoi_metrics_share_the_uniform_block_profile() {
        for name in ["voronoi_euclidean", "voronoi_manhattan", "voronoi_chebyshev"] {
            let effect = lookup(name);
            assert_eq!(effect.resource_kind, ResourceKind::SeededUniformBlock);
            assert_eq!(effect.seed_count, UNIFORM_BLOCK_SEED_COUNT);
        }
    }

    #[test]
    fn instanced_voronoi_uses_per_instance_seeds() {
        let effect = lookup("voronoi_instanced");
        assert_eq!(effect.vertex_stage, VertexStage::Instanced);
        assert_eq!(effect.resource_kind, ResourceKind::SeededInstanceBuffer);
        assert_eq!(effect.seed_count, INSTANCED_SEED_COUNT);
    }

    #[test]
    fn unknown_effects_fall_back_to_the_standard_profile() {
        let effect = lookup("glitch_wave");
        assert_eq!(effect.name, "default");
        assert_eq!(effect.resource_kind, ResourceKind::None);
        assert_eq!(effect.seed_count, 0);
    }

    #[test]
    fn descriptor_resolves_from_the_file_stem() {
        let effect = descriptor_for(&PathBuf::from("shaders/voronoi_manhattan.frag"));
        assert_eq!(effect.name, "voronoi_manhattan");

        let fallback = descriptor_for(&PathBuf::from("shaders/custom_effect.frag"));
        assert_eq!(fallback.name, "default");
    }
}
