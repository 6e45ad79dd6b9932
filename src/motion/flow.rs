use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::media::frame::GrayFrame;

/// `poly_sigma` used by smooth-motion tuning.
pub const SMOOTH_MOTION_POLY_SIGMA: f64 = 0.01;

/// Accepted polynomial neighbourhood sizes.
pub const POLY_N_CHOICES: [u32; 2] = [5, 7];

/// Dense displacement field between two frames, row-major planes of `width * height`.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowField {
    pub width: u32,
    pub height: u32,
    /// Horizontal displacement in pixels.
    pub u: Vec<f32>,
    /// Vertical displacement in pixels.
    pub v: Vec<f32>,
}

impl FlowField {
    pub fn zeros(width: u32, height: u32) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            u: vec![0.0; n],
            v: vec![0.0; n],
        }
    }

    /// Build from the two planes, checking that both match `width * height`.
    pub fn from_planes(width: u32, height: u32, u: Vec<f32>, v: Vec<f32>) -> ButterflowResult<Self> {
        let n = width as usize * height as usize;
        if u.len() != n || v.len() != n {
            return Err(ButterflowError::invalid_input(format!(
                "flow planes must hold {n} values, got u={} v={}",
                u.len(),
                v.len()
            )));
        }
        Ok(Self {
            width,
            height,
            u,
            v,
        })
    }

    pub fn len(&self) -> usize {
        self.u.len()
    }

    pub fn is_empty(&self) -> bool {
        self.u.is_empty()
    }

    /// Displacement at `(x, y)`.
    pub fn at(&self, x: u32, y: u32) -> (f32, f32) {
        let i = y as usize * self.width as usize + x as usize;
        (self.u[i], self.v[i])
    }

    /// Mean `(u, v)` over the whole field.
    pub fn mean(&self) -> (f32, f32) {
        if self.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.len() as f64;
        let su: f64 = self.u.iter().map(|&x| f64::from(x)).sum();
        let sv: f64 = self.v.iter().map(|&x| f64::from(x)).sum();
        ((su / n) as f32, (sv / n) as f32)
    }
}

/// Window filter used to average the flow update matrices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowFilter {
    Box,
    Gaussian,
}

impl FlowFilter {
    pub fn parse(s: &str) -> ButterflowResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "box" => Ok(Self::Box),
            "gaussian" => Ok(Self::Gaussian),
            other => Err(ButterflowError::invalid_input(format!(
                "unknown flow filter '{other}' (expected box or gaussian)"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Gaussian => "gaussian",
        }
    }
}

/// Farnebäck dense-flow parameters.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FlowParams {
    /// Ratio between successive pyramid levels, in `(0, 1)`.
    pub pyr_scale: f64,
    /// Number of pyramid levels including the full-resolution one.
    pub levels: u32,
    /// Averaging window size in pixels.
    pub winsize: u32,
    /// Refinement iterations per level.
    pub iters: u32,
    /// Polynomial expansion neighbourhood (5 or 7).
    pub poly_n: u32,
    /// Gaussian sigma of the polynomial expansion weights.
    pub poly_sigma: f64,
    /// Build each pyramid level from the previous one instead of from full resolution.
    pub fast_pyramids: bool,
    pub filter: FlowFilter,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            pyr_scale: 0.5,
            levels: 3,
            winsize: 25,
            iters: 3,
            poly_n: 5,
            poly_sigma: 1.1,
            fast_pyramids: false,
            filter: FlowFilter::Box,
        }
    }
}

impl FlowParams {
    pub fn validate(&self) -> ButterflowResult<()> {
        if !(self.pyr_scale > 0.0 && self.pyr_scale < 1.0) {
            return Err(ButterflowError::invalid_input(format!(
                "pyr_scale must be in (0, 1), got {}",
                self.pyr_scale
            )));
        }
        if self.levels == 0 {
            return Err(ButterflowError::invalid_input("levels must be >= 1"));
        }
        if self.winsize == 0 {
            return Err(ButterflowError::invalid_input("winsize must be >= 1"));
        }
        if self.iters == 0 {
            return Err(ButterflowError::invalid_input("iters must be >= 1"));
        }
        if !POLY_N_CHOICES.contains(&self.poly_n) {
            return Err(ButterflowError::invalid_input(format!(
                "poly_n must be one of {POLY_N_CHOICES:?}, got {}",
                self.poly_n
            )));
        }
        if !(self.poly_sigma.is_finite() && self.poly_sigma > 0.0) {
            return Err(ButterflowError::invalid_input(format!(
                "poly_sigma must be positive, got {}",
                self.poly_sigma
            )));
        }
        Ok(())
    }

    /// Smooth-motion tuning: near-zero polynomial sigma.
    pub fn smooth_motion(self) -> Self {
        Self {
            poly_sigma: SMOOTH_MOTION_POLY_SIGMA,
            ..self
        }
    }

    /// One-line summary used by the debug HUD.
    pub fn summary(&self) -> String {
        format!(
            "P: {:.2}, L: {}, W: {}, I: {}, N: {}, S: {:.2}, F: {}, Ff: {}",
            self.pyr_scale,
            self.levels,
            self.winsize,
            self.iters,
            self.poly_n,
            self.poly_sigma,
            u8::from(self.fast_pyramids),
            self.filter.as_str()
        )
    }
}

/// Dense optical flow between two grayscale frames of identical size.
///
/// Implementations are pure functions of their inputs and parameters.
pub trait OpticalFlow: Send + Sync {
    fn params(&self) -> &FlowParams;

    /// Displacement field `d` such that `a(x) ≈ b(x + d(x))`.
    fn calc(&self, a: &GrayFrame, b: &GrayFrame) -> ButterflowResult<FlowField>;
}

#[cfg(test)]
#[path = "../../tests/unit/motion/flow.rs"]
mod tests;
