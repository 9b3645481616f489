//! Video container probing and frame decoding for CellShade.
//!
//! The crate shells out to the ffmpeg tool family rather than linking a
//! decoder: `ffprobe` answers the metadata questions (geometry, duration,
//! frame rate, time base) and `ffmpeg` demuxes and decodes the container into
//! a raw RGBA pipe that [`Decoder`] pulls frames from, one blocking read at a
//! time. The caller sees an in-order sequence of [`FrameBuffer`]s and a clean
//! end-of-stream signal; everything about threading inside the decoder is
//! ffmpeg's business.

mod decoder;
mod probe;

pub use decoder::{Decoder, FrameBuffer};
pub use probe::{probe_stream, Rational, StreamInfo};

/// Errors surfaced while probing or decoding a video source.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: &'static str,
        source: std::io::Error,
    },

    #[error("ffprobe reported no usable video stream in '{path}'")]
    NoVideoStream { path: String },

    #[error("ffprobe output was not valid JSON: {0}")]
    ProbeParse(#[from] serde_json::Error),

    #[error("video stream reports invalid geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    #[error("stream ended mid-frame: expected {expected} bytes, got {got}")]
    TruncatedFrame { expected: usize, got: usize },

    #[error("video stream contains no frames")]
    EmptyStream,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
