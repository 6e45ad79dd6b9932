use std::io::Write as _;
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::media::frame::Frame;

/// Arguments for a player window reading raw BGR24 frames from stdin.
pub fn preview_args(cfg: &SinkConfig, loglevel: &str) -> Vec<String> {
    [
        "-loglevel",
        loglevel,
        "-autoexit",
        "-window_title",
        "butterflow",
        "-f",
        "rawvideo",
        "-pixel_format",
        "bgr24",
        "-video_size",
        &format!("{}x{}", cfg.width, cfg.height),
        "-framerate",
        &format!("{}", cfg.rate),
        "-i",
        "-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Live preview in an `ffplay` window.
///
/// Closing the window disables the preview (with one warning) but never fails the render.
pub struct PreviewSink {
    tool: String,
    loglevel: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    disabled: bool,
}

impl PreviewSink {
    pub fn new(tool: &str, loglevel: &str) -> Self {
        Self {
            tool: tool.to_string(),
            loglevel: loglevel.to_string(),
            child: None,
            stdin: None,
            disabled: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.disabled && self.stdin.is_some()
    }

    fn disable(&mut self, why: &str) {
        if !self.disabled {
            tracing::warn!("preview disabled: {why}");
        }
        self.disabled = true;
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl FrameSink for PreviewSink {
    fn begin(&mut self, cfg: SinkConfig) -> ButterflowResult<()> {
        cfg.validate()?;
        let spawned = Command::new(&self.tool)
            .args(preview_args(&cfg, &self.loglevel))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(mut child) => {
                self.stdin = child.stdin.take();
                self.child = Some(child);
                self.disabled = false;
            }
            Err(e) => self.disable(&format!("failed to start '{}': {e}", self.tool)),
        }
        Ok(())
    }

    fn push_frame(&mut self, frame: &Frame) -> ButterflowResult<()> {
        if self.disabled {
            return Ok(());
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ButterflowError::encode("preview sink not started"));
        };
        if let Err(e) = stdin.write_all(&frame.data) {
            self.disable(&format!("window closed ({e})"));
        }
        Ok(())
    }

    fn end(&mut self) -> ButterflowResult<()> {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
        Ok(())
    }
}

impl Drop for PreviewSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/preview.rs"]
mod tests;
