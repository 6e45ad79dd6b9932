use crate::foundation::core::Dimensions;
use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::media::frame::Frame;

/// Stream geometry handed to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    /// Playback rate in frames per second.
    pub rate: f64,
}

impl SinkConfig {
    pub fn dims(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    pub fn validate(&self) -> ButterflowResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ButterflowError::invalid_input(
                "sink width/height must be non-zero",
            ));
        }
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(ButterflowError::invalid_input(format!(
                "sink rate must be positive, got {}",
                self.rate
            )));
        }
        Ok(())
    }
}

/// Consumer of rendered frames in playback order.
pub trait FrameSink {
    fn begin(&mut self, cfg: SinkConfig) -> ButterflowResult<()>;
    fn push_frame(&mut self, frame: &Frame) -> ButterflowResult<()>;
    fn end(&mut self) -> ButterflowResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    ended: bool,
    /// Frames in playback order.
    pub frames: Vec<Frame>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> ButterflowResult<()> {
        cfg.validate()?;
        self.cfg = Some(cfg);
        self.ended = false;
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, frame: &Frame) -> ButterflowResult<()> {
        let cfg = self
            .cfg
            .ok_or_else(|| ButterflowError::encode("in-memory sink not started"))?;
        if frame.dims() != cfg.dims() {
            return Err(ButterflowError::encode(format!(
                "frame size mismatch: got {}, expected {}",
                frame.dims(),
                cfg.dims()
            )));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn end(&mut self) -> ButterflowResult<()> {
        self.ended = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
