use std::io::{BufReader, Read as _};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::media::frame::Frame;
use crate::media::probe::VideoInfo;

/// Seekable, forward-reading source of BGR24 frames. Indices are 0-based.
pub trait FrameSource {
    fn frames(&self) -> u64;
    fn duration_ms(&self) -> f64;
    fn rate(&self) -> f64;
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Index of the frame the next [`FrameSource::read`] returns.
    fn position(&self) -> u64;

    /// Move to frame `idx`; fails with [`ButterflowError::OutOfRange`] outside `[0, frames)`.
    fn seek_to(&mut self, idx: u64) -> ButterflowResult<()>;

    /// Return the frame at the current index and advance, or `None` past the last frame.
    fn read(&mut self) -> ButterflowResult<Option<Frame>>;

    /// Release the decoder. Closing twice is a no-op.
    fn close(&mut self);
}

fn check_seek(idx: u64, frames: u64) -> ButterflowResult<()> {
    if idx >= frames {
        return Err(ButterflowError::out_of_range(format!(
            "frame index {idx} outside [0, {frames})"
        )));
    }
    Ok(())
}

/// Frames seeked forward by fewer than this many frames are skipped by reading instead of
/// restarting the decoder.
const FORWARD_SKIP_LIMIT: u64 = 120;

struct Decoder {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    /// Index of the next frame on the pipe.
    next: u64,
}

/// Decodes with an `ffmpeg` child process writing raw BGR24 frames to a pipe.
///
/// A seek restarts the decoder at the requested index with a `select` filter, so every
/// frame index maps to exactly one decoded frame regardless of keyframe placement.
pub struct FfmpegFrameSource {
    info: VideoInfo,
    av_tool: String,
    loglevel: String,
    decoder: Option<Decoder>,
    pos: u64,
    closed: bool,
}

impl FfmpegFrameSource {
    pub fn open(info: VideoInfo, av_tool: &str, loglevel: &str) -> ButterflowResult<Self> {
        if info.frames == 0 {
            return Err(ButterflowError::source_open(format!(
                "'{}' has no frames",
                info.path.display()
            )));
        }
        let mut src = Self {
            info,
            av_tool: av_tool.to_string(),
            loglevel: loglevel.to_string(),
            decoder: None,
            pos: 0,
            closed: false,
        };
        src.spawn_at(0)?;
        Ok(src)
    }

    pub fn path(&self) -> &Path {
        &self.info.path
    }

    fn frame_len(&self) -> usize {
        self.info.dims().bgr_len()
    }

    fn spawn_at(&mut self, idx: u64) -> ButterflowResult<()> {
        self.kill_decoder();
        let mut cmd = Command::new(&self.av_tool);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.args(["-v", &self.loglevel, "-nostdin", "-i"])
            .arg(&self.info.path);
        if idx > 0 {
            cmd.args(["-vf", &format!("select=gte(n\\,{idx})")]);
        }
        cmd.args([
            "-fps_mode",
            "passthrough",
            "-an",
            "-sn",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "bgr24",
            "pipe:1",
        ]);
        tracing::debug!(idx, path = %self.info.path.display(), "starting decoder");

        let mut child = cmd.spawn().map_err(|e| {
            ButterflowError::source_open(format!(
                "failed to spawn '{}' (is it installed and on PATH?): {e}",
                self.av_tool
            ))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ButterflowError::source_open("failed to open decoder stdout"))?;
        let stderr = child.stderr.take().map(|mut err| {
            std::thread::spawn(move || {
                let mut s = String::new();
                let _ = err.read_to_string(&mut s);
                s
            })
        });
        self.decoder = Some(Decoder {
            child,
            stdout: BufReader::with_capacity(self.frame_len(), stdout),
            stderr,
            next: idx,
        });
        Ok(())
    }

    fn kill_decoder(&mut self) {
        if let Some(mut dec) = self.decoder.take() {
            let _ = dec.child.kill();
            let _ = dec.child.wait();
            if let Some(h) = dec.stderr.take() {
                let _ = h.join();
            }
        }
    }

    /// Read the next frame off the pipe, or `None` when the decoder has finished cleanly.
    fn pull(&mut self) -> ButterflowResult<Option<Frame>> {
        let len = self.frame_len();
        let (w, h) = (self.info.width, self.info.height);
        let Some(dec) = self.decoder.as_mut() else {
            return Err(ButterflowError::decode("decoder is not running"));
        };
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match dec.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ButterflowError::decode(format!("reading decoder output: {e}"))),
            }
        }
        if filled == len {
            dec.next += 1;
            return Frame::new(w, h, buf).map(Some);
        }

        let status = dec
            .child
            .wait()
            .map_err(|e| ButterflowError::decode(format!("waiting for decoder: {e}")))?;
        let stderr = dec
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(ButterflowError::decode(format!(
                "decoder exited with status {status} at frame {}: {}",
                dec.next,
                stderr.trim()
            )));
        }
        if filled > 0 {
            return Err(ButterflowError::decode(format!(
                "truncated frame {} ({filled} of {len} bytes)",
                dec.next
            )));
        }
        Ok(None)
    }
}

impl FrameSource for FfmpegFrameSource {
    fn frames(&self) -> u64 {
        self.info.frames
    }

    fn duration_ms(&self) -> f64 {
        self.info.duration_ms
    }

    fn rate(&self) -> f64 {
        self.info.rate()
    }

    fn width(&self) -> u32 {
        self.info.width
    }

    fn height(&self) -> u32 {
        self.info.height
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek_to(&mut self, idx: u64) -> ButterflowResult<()> {
        check_seek(idx, self.info.frames)?;
        self.pos = idx;
        Ok(())
    }

    fn read(&mut self) -> ButterflowResult<Option<Frame>> {
        if self.closed {
            return Err(ButterflowError::decode("source is closed"));
        }
        if self.pos >= self.info.frames {
            return Ok(None);
        }
        let next = self.decoder.as_ref().map(|d| d.next);
        match next {
            Some(n) if n == self.pos => {}
            Some(n) if n < self.pos && self.pos - n <= FORWARD_SKIP_LIMIT => {
                for _ in n..self.pos {
                    if self.pull()?.is_none() {
                        return Ok(None);
                    }
                }
            }
            _ => self.spawn_at(self.pos)?,
        }
        let frame = self.pull()?;
        if frame.is_some() {
            self.pos += 1;
        }
        Ok(frame)
    }

    fn close(&mut self) {
        if !self.closed {
            self.kill_decoder();
            self.closed = true;
        }
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Frames held in memory, used by tests and for already-decoded clips.
#[derive(Clone, Debug)]
pub struct InMemoryFrameSource {
    frames: Vec<Frame>,
    rate: f64,
    pos: u64,
    fail_at: Option<u64>,
    closed: bool,
}

impl InMemoryFrameSource {
    pub fn new(frames: Vec<Frame>, rate: f64) -> ButterflowResult<Self> {
        let Some(first) = frames.first() else {
            return Err(ButterflowError::source_open("in-memory source has no frames"));
        };
        if !(rate.is_finite() && rate > 0.0) {
            return Err(ButterflowError::invalid_input(format!(
                "source rate must be positive, got {rate}"
            )));
        }
        let dims = first.dims();
        if frames.iter().any(|f| f.dims() != dims) {
            return Err(ButterflowError::source_open(
                "in-memory frames must share one size",
            ));
        }
        Ok(Self {
            frames,
            rate,
            pos: 0,
            fail_at: None,
            closed: false,
        })
    }

    /// Make reads of frame `idx` fail with [`ButterflowError::Decode`].
    pub fn with_decode_failure(mut self, idx: u64) -> Self {
        self.fail_at = Some(idx);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FrameSource for InMemoryFrameSource {
    fn frames(&self) -> u64 {
        self.frames.len() as u64
    }

    fn duration_ms(&self) -> f64 {
        self.frames.len() as f64 * 1000.0 / self.rate
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn width(&self) -> u32 {
        self.frames[0].width
    }

    fn height(&self) -> u32 {
        self.frames[0].height
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek_to(&mut self, idx: u64) -> ButterflowResult<()> {
        check_seek(idx, self.frames())?;
        self.pos = idx;
        Ok(())
    }

    fn read(&mut self) -> ButterflowResult<Option<Frame>> {
        if self.closed {
            return Err(ButterflowError::decode("source is closed"));
        }
        if self.fail_at == Some(self.pos) {
            return Err(ButterflowError::decode(format!(
                "injected failure at frame {}",
                self.pos
            )));
        }
        let Some(frame) = self.frames.get(self.pos as usize) else {
            return Ok(None);
        };
        self.pos += 1;
        Ok(Some(frame.clone()))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/source.rs"]
mod tests;
