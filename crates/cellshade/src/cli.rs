use std::path::PathBuf;

use clap::Parser;

/// GPU image effects: Kuwahara smoothing and Voronoi partitioning.
#[derive(Parser, Debug)]
#[command(name = "cellshade", version, about)]
pub struct Args {
    /// Image to display.
    #[arg(short = 't', long = "texture", default_value = "textures/coco.png")]
    pub texture: PathBuf,

    /// Fragment shader implementing the effect; the file stem selects the
    /// effect's resource profile.
    #[arg(short = 'f', long = "fragment", default_value = "shaders/default.frag")]
    pub fragment: PathBuf,

    /// Initial Kuwahara kernel size (adjust live with '=' and '-').
    #[arg(
        short = 'k',
        long = "ksize",
        default_value_t = 5,
        value_parser = clap::value_parser!(i32).range(
            renderer::MIN_KERNEL_SIZE as i64..=renderer::MAX_KERNEL_SIZE as i64
        )
    )]
    pub kernel_size: i32,

    /// Play this video on loop instead of showing an image. Video playback
    /// always uses the square Kuwahara effect.
    #[arg(long, value_name = "PATH")]
    pub video: Option<PathBuf>,

    /// Window size as WIDTHxHEIGHT; derived from the source when omitted.
    #[arg(long, value_parser = parse_surface_size, value_name = "WxH")]
    pub size: Option<(u32, u32)>,

    /// Cap the render rate; video defaults to the stream's frame rate.
    #[arg(long, value_parser = parse_fps)]
    pub fps: Option<f32>,
}

pub fn parse_surface_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{width}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{height}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("window size must be non-zero, got {width}x{height}"));
    }
    Ok((width, height))
}

pub fn parse_fps(value: &str) -> Result<f32, String> {
    let fps: f32 = value
        .parse()
        .map_err(|_| format!("invalid frame rate '{value}'"))?;
    if !fps.is_finite() || fps <= 0.0 {
        return Err(format!("frame rate must be positive, got {value}"));
    }
    Ok(fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_window_sizes() {
        assert_eq!(parse_surface_size("800x600"), Ok((800, 600)));
        assert_eq!(parse_surface_size("1920X1080"), Ok((1920, 1080)));
        assert_eq!(parse_surface_size(" 640 x 480 "), Ok((640, 480)));
    }

    #[test]
    fn rejects_malformed_window_sizes() {
        assert!(parse_surface_size("800").is_err());
        assert!(parse_surface_size("800x").is_err());
        assert!(parse_surface_size("0x600").is_err());
        assert!(parse_surface_size("wide x tall").is_err());
    }

    #[test]
    fn rejects_non_positive_frame_rates() {
        assert!(parse_fps("0").is_err());
        assert!(parse_fps("-24").is_err());
        assert!(parse_fps("nan").is_err());
        assert_eq!(parse_fps("29.97"), Ok(29.97));
    }

    #[test]
    fn defaults_point_at_the_bundled_assets() {
        let args = Args::parse_from(["cellshade"]);
        assert_eq!(args.texture, PathBuf::from("textures/coco.png"));
        assert_eq!(args.fragment, PathBuf::from("shaders/default.frag"));
        assert_eq!(args.kernel_size, 5);
        assert!(args.video.is_none());
        assert!(args.size.is_none());
    }

    #[test]
    fn kernel_size_is_validated_at_the_boundaries() {
        assert!(Args::try_parse_from(["cellshade", "-k", "1"]).is_err());
        assert!(Args::try_parse_from(["cellshade", "-k", "16"]).is_err());
        assert!(Args::try_parse_from(["cellshade", "-k", "2"]).is_ok());
        assert!(Args::try_parse_from(["cellshade", "-k", "15"]).is_ok());
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
