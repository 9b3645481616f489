use std::path::PathBuf;

use media::MediaError;

/// What the viewer shows: a still image or a looping video stream.
#[derive(Debug, Clone)]
pub enum ViewerSource {
    Image(PathBuf),
    Video(PathBuf),
}

/// Everything the windowed renderer needs to come up.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub source: ViewerSource,
    /// Fragment shader implementing the effect; its file stem selects the
    /// resource profile from the effect catalog.
    pub fragment: PathBuf,
    /// Initial Kuwahara kernel size, clamped into the controller's range.
    pub kernel_size: i32,
    /// Window surface size in physical pixels.
    pub surface_size: (u32, u32),
    /// Redraw rate cap; uncapped when `None`.
    pub target_fps: Option<f32>,
    pub window_title: String,
}

/// Per-frame failures the event loop has to tell apart: surface losses are
/// recoverable by reconfiguring, decode failures are not.
#[derive(Debug, thiserror::Error)]
pub(crate) enum RenderError {
    #[error(transparent)]
    Surface(#[from] wgpu::SurfaceError),
    #[error(transparent)]
    Media(#[from] MediaError),
}
