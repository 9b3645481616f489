//! Looping video playback.
//!
//! [`FrameLoop`] turns a finite stream into an endless one: when the open
//! stream signals exhaustion, a fresh stream is opened from the start and
//! its first frame is returned in the same call, so the consumer never sees
//! the seam. The stream side is behind small traits so the looping rule can
//! be tested without ffmpeg.

use std::path::PathBuf;

use media::{Decoder, FrameBuffer, MediaError};

/// A finite, in-order frame stream.
pub trait FrameSource {
    /// `Ok(None)` signals clean exhaustion.
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, MediaError>;
}

/// Something a fresh [`FrameSource`] can be opened from, repeatedly.
pub trait MediaSource {
    type Stream: FrameSource;

    fn open_stream(&self) -> Result<Self::Stream, MediaError>;
}

impl FrameSource for Decoder {
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, MediaError> {
        Decoder::next_frame(self)
    }
}

/// A video file on disk; each open starts decoding from the beginning.
pub struct VideoFile {
    path: PathBuf,
}

impl VideoFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl MediaSource for VideoFile {
    type Stream = Decoder;

    fn open_stream(&self) -> Result<Decoder, MediaError> {
        Decoder::open(&self.path)
    }
}

/// Replays a finite source forever by reopening it on exhaustion.
pub struct FrameLoop<M: MediaSource> {
    source: M,
    stream: M::Stream,
    restarts: u64,
}

impl<M: MediaSource> FrameLoop<M> {
    pub fn open(source: M) -> Result<Self, MediaError> {
        let stream = source.open_stream()?;
        Ok(Self::resume(source, stream))
    }

    /// Adopts an already-open stream, for callers that probed it first.
    pub fn resume(source: M, stream: M::Stream) -> Self {
        Self {
            source,
            stream,
            restarts: 0,
        }
    }

    /// Returns the next frame, restarting the source transparently.
    ///
    /// The exhausted stream stays open until its replacement has produced a
    /// frame, and is discarded only at the moment of replacement.
    pub fn advance(&mut self) -> Result<FrameBuffer, MediaError> {
        if let Some(frame) = self.stream.next_frame()? {
            return Ok(frame);
        }

        let mut fresh = self.source.open_stream()?;
        let frame = fresh.next_frame()?.ok_or(MediaError::EmptyStream)?;
        self.stream = fresh;
        self.restarts += 1;
        tracing::info!(restarts = self.restarts, "stream exhausted; restarted from the beginning");
        Ok(frame)
    }

    /// How many times the source has been reopened.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }
}

/// Feeds looping video frames into the effect's source texture.
pub(crate) struct FrameStreamPlayer {
    frames: FrameLoop<VideoFile>,
    extent: wgpu::Extent3d,
    bytes_per_row: u32,
}

impl FrameStreamPlayer {
    pub fn new(frames: FrameLoop<VideoFile>, width: u32, height: u32) -> Self {
        Self {
            frames,
            extent: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            bytes_per_row: width * 4,
        }
    }

    /// Pulls one frame and uploads it; called once per render tick.
    pub fn upload_next(
        &mut self,
        queue: &wgpu::Queue,
        texture: &wgpu::Texture,
    ) -> Result<(), MediaError> {
        let frame = self.frames.advance()?;
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.bytes_per_row),
                rows_per_image: Some(self.extent.height),
            },
            self.extent,
        );
        Ok(())
    }
}
