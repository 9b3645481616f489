use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use renderer::{ViewerConfig, ViewerSource};

use crate::cli::Args;

/// Longest window side; larger sources are scaled down to fit.
const MAX_WINDOW_DIMENSION: u32 = 800;

/// Fragment applied to video sources.
const VIDEO_FRAGMENT: &str = "shaders/kuwahara_square.frag";

pub fn run(args: Args) -> Result<()> {
    init_tracing();

    let (source, fragment) = match args.video {
        Some(path) => {
            if args.fragment != std::path::PathBuf::from("shaders/default.frag") {
                tracing::warn!(
                    fragment = %args.fragment.display(),
                    "video playback always uses the square Kuwahara effect; ignoring --fragment"
                );
            }
            (ViewerSource::Video(path), VIDEO_FRAGMENT.into())
        }
        None => (ViewerSource::Image(args.texture), args.fragment),
    };

    // Videos default to their native frame rate; images run uncapped.
    let mut target_fps = args.fps;
    let source_size = match &source {
        ViewerSource::Image(path) => renderer::probe_dimensions(path)?,
        ViewerSource::Video(path) => {
            let info = media::probe_stream(path)
                .with_context(|| format!("failed to probe video at {}", path.display()))?;
            if target_fps.is_none() {
                let rate = info.average_rate_f64();
                if rate > 0.0 {
                    target_fps = Some(rate as f32);
                }
            }
            (info.width, info.height)
        }
    };

    let surface_size = match args.size {
        Some(size) => size,
        None => fit_window(source_size.0, source_size.1),
    };
    tracing::debug!(
        width = surface_size.0,
        height = surface_size.1,
        fps = ?target_fps,
        "resolved window geometry"
    );

    renderer::run_windowed(ViewerConfig {
        source,
        fragment,
        kernel_size: args.kernel_size,
        surface_size,
        target_fps,
        window_title: "cellshade".to_owned(),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Scales `width`x`height` down so the longest side fits
/// [`MAX_WINDOW_DIMENSION`], preserving aspect ratio. Smaller sources keep
/// their native size.
fn fit_window(width: u32, height: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= MAX_WINDOW_DIMENSION {
        return (width.max(1), height.max(1));
    }
    let scale = |side: u32| {
        ((u64::from(side) * u64::from(MAX_WINDOW_DIMENSION)) / u64::from(longest)).max(1) as u32
    };
    (scale(width), scale(height))
}
