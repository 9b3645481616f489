//! GPU fragment-effect rendering for still images and looping video.
//!
//! The renderer shows one source texture through one fragment shader and
//! provisions GPU resources from the shader's identity alone: the fragment
//! file's stem is looked up in the [effect catalog](catalog), which names the
//! vertex stage, the auxiliary resources (a live kernel uniform, a seed
//! uniform block, or a per-instance seed buffer), and the seed count. Shader
//! parameters are routed by name through a [`UniformStore`] reflected from
//! the fragment's `std140` parameter block, so effects declare only what
//! they read and the host can offer the full parameter set to all of them.
//!
//! Video sources run through the same path as images; the only difference is
//! a [`FrameLoop`] uploading decoded frames into the source texture every
//! render tick, reopening the stream endlessly on exhaustion.

mod catalog;
mod compile;
mod gpu;
mod params;
mod player;
mod texture;
mod types;
mod window;

pub use catalog::{
    descriptor_for, lookup, EffectDescriptor, ResourceKind, VertexStage, INSTANCED_SEED_COUNT,
    UNIFORM_BLOCK_SEED_COUNT,
};
pub use gpu::provision::{plan, ProvisionPlan, SeedSet};
pub use gpu::uniforms::{UniformField, UniformStore};
pub use params::{clamp_kernel, KernelController, MAX_KERNEL_SIZE, MIN_KERNEL_SIZE};
pub use player::{FrameLoop, FrameSource, MediaSource, VideoFile};
pub use texture::{probe_dimensions, probe_image, ProbedImage, TextureMetadata};
pub use types::{ViewerConfig, ViewerSource};

use anyhow::Result;

/// Opens a window and runs the viewer until it is closed.
pub fn run_windowed(config: ViewerConfig) -> Result<()> {
    window::run(config)
}
