use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::config::settings::{Codec, Settings};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::media::frame::Frame;

/// Encoder options for [`FfmpegSink`].
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderOpts {
    /// Encoded video file to write (normally a temp file in the cache).
    pub out_path: PathBuf,
    pub av_tool: String,
    pub av_loglevel: String,
    pub enc_loglevel: String,
    pub codec: Codec,
    pub preset: String,
    pub crf: u32,
    pub lossless: bool,
    /// Display aspect ratio to tag the stream with.
    pub dar: Option<(u32, u32)>,
}

impl EncoderOpts {
    pub fn from_settings(settings: &Settings, out_path: impl Into<PathBuf>, lossless: bool) -> Self {
        Self {
            out_path: out_path.into(),
            av_tool: settings.av_tool.clone(),
            av_loglevel: settings.av_loglevel.clone(),
            enc_loglevel: settings.enc_loglevel.clone(),
            codec: settings.codec,
            preset: settings.preset.clone(),
            crf: settings.crf,
            lossless,
            dar: None,
        }
    }
}

/// Full argument list (after the program name) for encoding raw BGR24 frames from stdin.
pub fn encoder_args(opts: &EncoderOpts, cfg: &SinkConfig) -> Vec<String> {
    let mut vf = String::from("format=yuv420p");
    if let Some((n, d)) = opts.dar {
        vf.push_str(&format!(",setdar={n}:{d}"));
    }
    let mut args: Vec<String> = [
        "-loglevel",
        &opts.av_loglevel,
        "-y",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "bgr24",
        "-s",
        &format!("{}x{}", cfg.width, cfg.height),
        "-r",
        &format!("{}", cfg.rate),
        "-i",
        "-",
        "-map_metadata",
        "-1",
        "-map_chapters",
        "-1",
        "-an",
        "-sn",
        "-vf",
        &vf,
        "-c:v",
        opts.codec.ffmpeg_name(),
        "-preset",
        &opts.preset,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    match opts.codec {
        Codec::X264 => {
            if opts.lossless {
                args.extend(["-qp".into(), "0".into()]);
            } else {
                args.extend(["-crf".into(), opts.crf.to_string()]);
            }
            args.extend(["-level".into(), "4.2".into()]);
        }
        Codec::X265 => {
            let quality = if opts.lossless {
                "lossless=1".to_string()
            } else {
                format!("crf={}", opts.crf)
            };
            args.extend([
                "-x265-params".into(),
                format!("log-level={}:{quality}", opts.enc_loglevel),
            ]);
        }
    }
    args.push(opts.out_path.display().to_string());
    args
}

/// Sink that spawns the av tool and streams raw BGR24 frames to its stdin.
pub struct FfmpegSink {
    opts: EncoderOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    cfg: Option<SinkConfig>,
    frames_written: u64,
}

impl FfmpegSink {
    pub fn new(opts: EncoderOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            cfg: None,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Collect the child's exit status and stderr once stdin has been closed.
    fn reap(&mut self) -> ButterflowResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| ButterflowError::encode(format!("failed to wait for encoder: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ButterflowError::encode("encoder stderr drain thread panicked"))?
                .map_err(|e| ButterflowError::encode(format!("encoder stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(ButterflowError::encode(format!(
                "{} exited with status {status}: {}",
                self.opts.av_tool,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> ButterflowResult<()> {
        cfg.validate()?;
        if !cfg.dims().is_even() {
            return Err(ButterflowError::invalid_input(format!(
                "encoder width/height must be even (required for yuv420p output), got {}",
                cfg.dims()
            )));
        }
        ensure_parent_dir(&self.opts.out_path)?;
        if !is_tool_on_path(&self.opts.av_tool) {
            return Err(ButterflowError::encode(format!(
                "'{}' is required for encoding, but was not found on PATH",
                self.opts.av_tool
            )));
        }

        let args = encoder_args(&self.opts, &cfg);
        tracing::debug!(tool = %self.opts.av_tool, args = ?args, "spawning encoder");
        let mut child = Command::new(&self.opts.av_tool)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ButterflowError::encode(format!(
                    "failed to spawn '{}' (is it installed and on PATH?): {e}",
                    self.opts.av_tool
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ButterflowError::encode("failed to open encoder stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ButterflowError::encode("failed to open encoder stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.frames_written = 0;
        Ok(())
    }

    fn push_frame(&mut self, frame: &Frame) -> ButterflowResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| ButterflowError::encode("encoder sink not started"))?;
        if frame.dims() != cfg.dims() {
            return Err(ButterflowError::encode(format!(
                "frame size mismatch: got {}, expected {}",
                frame.dims(),
                cfg.dims()
            )));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ButterflowError::encode("encoder sink is already finalized"));
        };

        use std::io::Write as _;
        if let Err(e) = stdin.write_all(&frame.data) {
            // A broken pipe means the encoder died; its stderr says why.
            drop(self.stdin.take());
            self.reap()?;
            return Err(ButterflowError::encode(format!(
                "failed to write frame to encoder stdin: {e}"
            )));
        }
        self.frames_written += 1;
        Ok(())
    }

    fn end(&mut self) -> ButterflowResult<()> {
        if self.child.is_none() {
            return Err(ButterflowError::encode("encoder sink not started"));
        }
        drop(self.stdin.take());
        self.reap()?;
        tracing::debug!(frames = self.frames_written, out = %self.opts.out_path.display(), "encoder finished");
        self.cfg = None;
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> ButterflowResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `tool -version` runs successfully from `PATH`.
pub fn is_tool_on_path(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
