//! The ffmpeg-piped frame decoder.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;

use crate::probe::{probe_stream, Rational, StreamInfo};
use crate::MediaError;

const BYTES_PER_PIXEL: usize = 4; // tightly packed RGBA

/// One decoded frame at the stream's native resolution.
///
/// Produced transiently; the caller is expected to upload or consume the
/// pixels immediately, the decoder keeps no history.
pub struct FrameBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Owns an open container exclusively: the ffmpeg child process plus the
/// stream metadata captured at open time. Dropping the decoder terminates and
/// reaps the child.
pub struct Decoder {
    path: PathBuf,
    info: StreamInfo,
    child: Child,
    stdout: ChildStdout,
    frame_len: usize,
    /// Frame-duration step in time-base ticks.
    position_step: i64,
    /// Position of the most recently produced frame; 0 until the first one.
    position: i64,
    /// Starting position of the current pipe (non-zero after a seek).
    position_base: i64,
    frames_produced: u64,
}

impl Decoder {
    /// Probes `path` and opens a raw RGBA decode pipe positioned at the start.
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        Self::open_at(path, 0.0)
    }

    fn open_at(path: &Path, start_seconds: f64) -> Result<Self, MediaError> {
        let info = probe_stream(path)?;
        let (child, stdout) = spawn_pipe(path, start_seconds)?;
        let frame_len = info.width as usize * info.height as usize * BYTES_PER_PIXEL;
        let position_step = frame_step(info.time_base, info.average_rate_f64());

        tracing::debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.average_rate_f64(),
            duration = ?info.duration,
            "opened video decode pipe"
        );

        Ok(Self {
            path: path.to_path_buf(),
            info,
            child,
            stdout,
            frame_len,
            position_step,
            position: 0,
            position_base: 0,
            frames_produced: 0,
        })
    }

    /// Video width and height in pixels.
    pub fn geometry(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    /// Stream duration in seconds; `None` when the container does not say.
    pub fn duration(&self) -> Option<f64> {
        self.info.duration
    }

    /// The average frame rate reduced to a scalar.
    pub fn average_rate(&self) -> f64 {
        self.info.average_rate_f64()
    }

    /// Declared frame count, when the container reports one.
    pub fn frames(&self) -> Option<u64> {
        self.info.frames
    }

    /// Position step for each frame, in time-base ticks.
    pub fn frame_step(&self) -> i64 {
        self.position_step
    }

    /// Presentation position of the most recently produced frame.
    pub fn current_position(&self) -> i64 {
        self.position
    }

    /// Converts a timestamp in seconds into a stream position.
    pub fn time_to_position(&self, seconds: f64) -> i64 {
        seconds_to_position(self.info.time_base, seconds)
    }

    /// Repositions the demultiplexer by reopening the pipe at `position`.
    pub fn seek(&mut self, position: i64) -> Result<(), MediaError> {
        let seconds = position as f64 * self.info.time_base.as_f64();
        let (child, stdout) = spawn_pipe(&self.path, seconds)?;
        terminate(&mut self.child);
        self.child = child;
        self.stdout = stdout;
        self.position = position;
        self.position_base = position;
        self.frames_produced = 0;
        Ok(())
    }

    /// Pulls the next frame in presentation order, blocking until it has been
    /// decoded. Returns `Ok(None)` on a clean end of stream; a short read in
    /// the middle of a frame is a decode error, not an exhaustion signal.
    pub fn next_frame(&mut self) -> Result<Option<FrameBuffer>, MediaError> {
        let mut data = vec![0u8; self.frame_len];
        let mut filled = 0;
        while filled < self.frame_len {
            match self.stdout.read(&mut data[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(MediaError::TruncatedFrame {
                        expected: self.frame_len,
                        got: filled,
                    })
                }
                Ok(read) => filled += read,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }

        self.position = self.position_base + self.frames_produced as i64 * self.position_step;
        self.frames_produced += 1;

        Ok(Some(FrameBuffer {
            data,
            width: self.info.width,
            height: self.info.height,
        }))
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        terminate(&mut self.child);
    }
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_pipe(path: &Path, start_seconds: f64) -> Result<(Child, ChildStdout), MediaError> {
    let mut command = Command::new("ffmpeg");
    command.args(["-v", "error", "-nostdin"]);
    if start_seconds > 0.0 {
        command.args(["-ss", &format!("{start_seconds}")]);
    }
    command
        .arg("-i")
        .arg(path)
        .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|source| MediaError::Launch {
        tool: "ffmpeg",
        source,
    })?;
    let stdout = child.stdout.take().expect("piped stdout");
    if let Some(stderr) = child.stderr.take() {
        forward_stderr(stderr);
    }
    Ok((child, stdout))
}

/// Drains ffmpeg's stderr on a helper thread so diagnostics land in our logs
/// and the child never blocks on a full pipe.
fn forward_stderr(stderr: std::process::ChildStderr) {
    thread::Builder::new()
        .name("ffmpeg-stderr".into())
        .spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                tracing::warn!(target: "media::ffmpeg", "{line}");
            }
        })
        .ok();
}

fn frame_step(time_base: Rational, fps: f64) -> i64 {
    if fps <= 0.0 || time_base.num == 0 {
        return 1;
    }
    let ticks_per_second = time_base.den as f64 / time_base.num as f64;
    (ticks_per_second / fps).round().max(1.0) as i64
}

fn seconds_to_position(time_base: Rational, seconds: f64) -> i64 {
    if time_base.num == 0 {
        return 0;
    }
    (seconds * time_base.den as f64 / time_base.num as f64).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_step_matches_time_base_and_rate() {
        // 25 fps in a 1/12800 time base: 512 ticks per frame.
        assert_eq!(frame_step(Rational::new(1, 12800), 25.0), 512);
        // NTSC rate rounds to the nearest tick.
        assert_eq!(frame_step(Rational::new(1, 30000), 30000.0 / 1001.0), 1001);
    }

    #[test]
    fn frame_step_degrades_to_unit_for_bad_metadata() {
        assert_eq!(frame_step(Rational::new(1, 12800), 0.0), 1);
        assert_eq!(frame_step(Rational::new(0, 1), 25.0), 1);
    }

    #[test]
    fn converts_seconds_to_stream_ticks() {
        assert_eq!(seconds_to_position(Rational::new(1, 12800), 2.0), 25600);
        assert_eq!(seconds_to_position(Rational::new(1, 1000), 0.5), 500);
        assert_eq!(seconds_to_position(Rational::new(0, 1), 3.0), 0);
    }
}
