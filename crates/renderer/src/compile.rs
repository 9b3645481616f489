//! GLSL compilation and uniform-block reflection.
//!
//! Fragment shaders are plain GLSL 450 files. Before handing a shader to the
//! GPU we parse it with naga ourselves: the parse doubles as the compile
//! check (bad GLSL fails here with a real diagnostic instead of deep inside
//! pipeline creation) and yields the std140 layout of the shader's parameter
//! block, which drives the name-routed uniform pushes.

use std::borrow::Cow;

use anyhow::{anyhow, Result};
use wgpu::naga::front::glsl::{Frontend, Options};
use wgpu::naga::{AddressSpace, ShaderStage, TypeInner};

use crate::catalog::VertexStage;
use crate::gpu::uniforms::UniformField;

/// Layout facts reflected from a fragment shader.
pub(crate) struct FragmentReflection {
    /// Members of the parameter block at group 0 binding 0, if declared.
    pub params: Vec<UniformField>,
    /// Declared size of that block in bytes; 0 when absent.
    pub params_block_size: u32,
    /// Declared size of the seed block at group 1 binding 0, if declared.
    pub seed_block_size: Option<u64>,
}

pub(crate) fn compile_vertex_shader(
    device: &wgpu::Device,
    stage: VertexStage,
) -> wgpu::ShaderModule {
    let (label, source) = match stage {
        VertexStage::Standard => ("fullscreen triangle vertex", FULLSCREEN_VERTEX_GLSL),
        VertexStage::Instanced => ("instanced cell vertex", INSTANCED_VERTEX_GLSL),
    };
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(source),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    source: &str,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("effect fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_owned()),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Parses `source` as a GLSL fragment shader and extracts its uniform-block
/// layouts. Parse failures are compile failures and abort startup.
pub(crate) fn reflect_fragment(source: &str) -> Result<FragmentReflection> {
    let mut frontend = Frontend::default();
    let module = frontend
        .parse(&Options::from(ShaderStage::Fragment), source)
        .map_err(|errors| anyhow!("fragment shader failed to parse: {errors:?}"))?;

    let mut params = Vec::new();
    let mut params_block_size = 0u32;
    let mut seed_block_size = None;

    let gctx = module.to_ctx();
    for (_, var) in module.global_variables.iter() {
        if var.space != AddressSpace::Uniform {
            continue;
        }
        let Some(binding) = &var.binding else { continue };
        let ty = &module.types[var.ty];

        match (binding.group, binding.binding) {
            (0, 0) => {
                if let TypeInner::Struct { members, span } = &ty.inner {
                    params_block_size = *span;
                    for member in members {
                        let Some(name) = &member.name else { continue };
                        params.push(UniformField {
                            name: name.clone(),
                            offset: member.offset,
                            size: module.types[member.ty].inner.size(gctx),
                        });
                    }
                }
            }
            (1, 0) => {
                seed_block_size = Some(u64::from(ty.inner.size(gctx)));
            }
            _ => {}
        }
    }

    Ok(FragmentReflection {
        params,
        params_block_size,
        seed_block_size,
    })
}

/// Covers the viewport with a single oversized triangle; UVs put the texture
/// origin at the top left to match decoded image and video rows.
const FULLSCREEN_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

/// One quad per seed, centered on the per-instance seed position with a
/// half-extent of `r` in UV units. The parameter block must match the
/// declaration in `voronoi_instanced.frag`.
const INSTANCED_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) in vec2 in_seed;
layout(location = 0) out vec2 v_uv;
layout(location = 1) out vec2 v_seed;

layout(std140, set = 0, binding = 0) uniform EffectParams {
    float inv_tex_width;
    float inv_tex_height;
    float tex_width;
    float tex_height;
    float tex_size;
    float r;
} params;

const vec2 corners[6] = vec2[6](
    vec2(-1.0, -1.0),
    vec2(1.0, -1.0),
    vec2(1.0, 1.0),
    vec2(-1.0, -1.0),
    vec2(1.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 uv = in_seed + corners[vertex_index] * params.r;
    v_uv = uv;
    v_seed = in_seed;
    gl_Position = vec4(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflects_std140_member_offsets() {
        let reflection = reflect_fragment(
            r"#version 450
            layout(location = 0) in vec2 v_uv;
            layout(location = 0) out vec4 out_color;
            layout(std140, set = 0, binding = 0) uniform EffectParams {
                float inv_tex_width;
                vec2 scale;
                int kernel_size;
            } params;
            void main() {
                out_color = vec4(params.scale * params.inv_tex_width, float(params.kernel_size), 1.0);
            }",
        )
        .unwrap();

        let offsets: Vec<(&str, u32)> = reflection
            .params
            .iter()
            .map(|field| (field.name.as_str(), field.offset))
            .collect();
        assert_eq!(
            offsets,
            vec![("inv_tex_width", 0), ("scale", 8), ("kernel_size", 16)]
        );
        assert!(reflection.params_block_size >= 20);
        assert_eq!(reflection.seed_block_size, None);
    }

    #[test]
    fn reflects_seed_block_span() {
        let reflection = reflect_fragment(
            r"#version 450
            layout(location = 0) in vec2 v_uv;
            layout(location = 0) out vec4 out_color;
            layout(std140, set = 1, binding = 0) uniform SeedBlock {
                vec2 seeds[4000];
            } seed_block;
            void main() {
                out_color = vec4(seed_block.seeds[0], 0.0, 1.0);
            }",
        )
        .unwrap();

        // std140 gives vec2 array elements a 16-byte stride.
        assert_eq!(reflection.seed_block_size, Some(64_000));
        assert!(reflection.params.is_empty());
    }

    #[test]
    fn shaders_without_a_parameter_block_reflect_empty() {
        let reflection = reflect_fragment(
            r"#version 450
            layout(location = 0) in vec2 v_uv;
            layout(location = 0) out vec4 out_color;
            void main() {
                out_color = vec4(v_uv, 0.0, 1.0);
            }",
        )
        .unwrap();
        assert!(reflection.params.is_empty());
        assert_eq!(reflection.params_block_size, 0);
    }

    #[test]
    fn parse_errors_are_compile_errors() {
        assert!(reflect_fragment("#version 450\nvoid main( {").is_err());
    }
}
