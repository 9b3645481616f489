//! ffprobe-backed container metadata.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use crate::MediaError;

/// A reduced fraction as reported by ffprobe (`"30000/1001"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: i64,
    pub den: i64,
}

impl Rational {
    pub fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    /// Collapses the fraction to a scalar; zero denominators yield 0.0.
    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    fn parse(value: &str) -> Option<Self> {
        let (num, den) = value.split_once('/')?;
        Some(Self {
            num: num.trim().parse().ok()?,
            den: den.trim().parse().ok()?,
        })
    }
}

/// Metadata for the first video stream of a container.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Average frame rate of the stream.
    pub average_rate: Rational,
    /// Presentation timestamp unit, seconds per tick.
    pub time_base: Rational,
    /// Duration in seconds, `None` when the container does not report one.
    pub duration: Option<f64>,
    /// Frame count when the container declares it.
    pub frames: Option<u64>,
}

impl StreamInfo {
    /// The average frame rate reduced to a scalar (frames per second).
    pub fn average_rate_f64(&self) -> f64 {
        self.average_rate.as_f64()
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    time_base: Option<String>,
    duration: Option<String>,
    nb_frames: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Runs ffprobe against `path` and extracts the first video stream's metadata.
///
/// Fatal when the file cannot be probed or carries no video stream; a missing
/// or zero duration is reported as `None` rather than a misleading 0.
pub fn probe_stream(path: &Path) -> Result<StreamInfo, MediaError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_streams",
            "-show_format",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|source| MediaError::Launch {
            tool: "ffprobe",
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::error!(path = %path.display(), %stderr, "ffprobe failed");
        return Err(MediaError::NoVideoStream {
            path: path.display().to_string(),
        });
    }

    parse_probe_json(&output.stdout, path)
}

fn parse_probe_json(raw: &[u8], path: &Path) -> Result<StreamInfo, MediaError> {
    let parsed: ProbeOutput = serde_json::from_slice(raw)?;
    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| MediaError::NoVideoStream {
            path: path.display().to_string(),
        })?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(MediaError::InvalidGeometry { width, height });
    }

    let average_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(Rational::parse)
        .unwrap_or(Rational::new(0, 1));
    let time_base = stream
        .time_base
        .as_deref()
        .and_then(Rational::parse)
        .unwrap_or(Rational::new(1, 1));

    // Some containers only report a duration at the format level, and some
    // report 0 when the real value is unknown. Both cases collapse to None.
    let duration = stream
        .duration
        .or(parsed.format.and_then(|f| f.duration))
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|seconds| *seconds > 0.0);

    let frames = stream.nb_frames.and_then(|raw| raw.parse().ok());

    Ok(StreamInfo {
        width,
        height,
        average_rate,
        time_base,
        duration,
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(stream_extra: &str, format: &str) -> String {
        format!(
            r#"{{
                "streams": [{{
                    "width": 1280,
                    "height": 720,
                    "avg_frame_rate": "30000/1001",
                    "time_base": "1/12800"
                    {stream_extra}
                }}],
                "format": {{ {format} }}
            }}"#
        )
    }

    #[test]
    fn parses_rational_strings() {
        assert_eq!(Rational::parse("30000/1001"), Some(Rational::new(30000, 1001)));
        assert_eq!(Rational::parse("1/12800"), Some(Rational::new(1, 12800)));
        assert_eq!(Rational::parse("not-a-rate"), None);
    }

    #[test]
    fn reduces_average_rate_to_scalar() {
        let info =
            parse_probe_json(fixture("", r#""duration": "10.0""#).as_bytes(), &PathBuf::new())
                .unwrap();
        assert!((info.average_rate_f64() - 29.97).abs() < 0.01);
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
    }

    #[test]
    fn stream_duration_takes_precedence() {
        let info = parse_probe_json(
            fixture(r#", "duration": "4.5""#, r#""duration": "9.0""#).as_bytes(),
            &PathBuf::new(),
        )
        .unwrap();
        assert_eq!(info.duration, Some(4.5));
    }

    #[test]
    fn missing_duration_is_unknown_not_zero() {
        let info = parse_probe_json(fixture("", "").as_bytes(), &PathBuf::new()).unwrap();
        assert_eq!(info.duration, None);
    }

    #[test]
    fn zero_duration_is_unknown_not_zero() {
        let info =
            parse_probe_json(fixture("", r#""duration": "0""#).as_bytes(), &PathBuf::new())
                .unwrap();
        assert_eq!(info.duration, None);
    }

    #[test]
    fn rejects_containers_without_video() {
        let raw = br#"{"streams": [], "format": {"duration": "3.0"}}"#;
        assert!(matches!(
            parse_probe_json(raw, &PathBuf::from("x.mp4")),
            Err(MediaError::NoVideoStream { .. })
        ));
    }

    #[test]
    fn rejects_zero_geometry() {
        let raw = br#"{"streams": [{"width": 0, "height": 720}], "format": {}}"#;
        assert!(matches!(
            parse_probe_json(raw, &PathBuf::new()),
            Err(MediaError::InvalidGeometry { .. })
        ));
    }
}
