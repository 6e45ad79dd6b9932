use rayon::prelude::*;

use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::foundation::math::unit_to_u8;
use crate::media::frame::{Frame, FrameF32};
use crate::motion::flow::FlowField;

/// Synthesizes intermediate frames between two source frames from their flow fields.
pub trait Interpolator: Send + Sync {
    /// Return `n` frames at `t = i / (n + 1)` for `i` in `1..=n`, in order.
    ///
    /// `fwd` is the flow from `fr1` to `fr2`, `bwd` the flow from `fr2` to `fr1`.
    fn interpolate(
        &self,
        fr1: &FrameF32,
        fr2: &FrameF32,
        fwd: &FlowField,
        bwd: &FlowField,
        n: usize,
    ) -> ButterflowResult<Vec<Frame>>;
}

/// Normalized time of each of `n` evenly spaced intermediates.
pub fn time_steps(n: usize) -> Vec<f32> {
    (1..=n).map(|i| i as f32 / (n + 1) as f32).collect()
}

fn build_thread_pool(threads: Option<usize>) -> ButterflowResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(ButterflowError::invalid_input(
            "interpolation 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("butterflow-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build rayon thread pool: {e}").into())
}

/// Evaluates time steps in parallel on a dedicated rayon pool.
///
/// Every step checks the cancel token before it starts, so an interrupt surfaces as
/// [`ButterflowError::Cancelled`] once the in-flight steps drain.
pub struct CpuInterpolator {
    pool: rayon::ThreadPool,
    cancel: CancelToken,
}

impl CpuInterpolator {
    pub fn new(threads: Option<usize>, cancel: CancelToken) -> ButterflowResult<Self> {
        Ok(Self {
            pool: build_thread_pool(threads)?,
            cancel,
        })
    }

    /// The worker pool, so callers can run flow on the same threads.
    pub fn pool(&self) -> &rayon::ThreadPool {
        &self.pool
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Interpolator for CpuInterpolator {
    fn interpolate(
        &self,
        fr1: &FrameF32,
        fr2: &FrameF32,
        fwd: &FlowField,
        bwd: &FlowField,
        n: usize,
    ) -> ButterflowResult<Vec<Frame>> {
        if n == 0 {
            return Err(ButterflowError::bad_time_step(
                "interpolate needs at least one time step",
            ));
        }
        check_shapes(fr1, fr2, fwd, bwd)?;
        let steps = time_steps(n);
        self.pool.install(|| {
            steps
                .par_iter()
                .map(|&t| {
                    self.cancel.check()?;
                    Ok(blend_at(fr1, fr2, fwd, bwd, t))
                })
                .collect()
        })
    }
}

fn check_shapes(fr1: &FrameF32, fr2: &FrameF32, fwd: &FlowField, bwd: &FlowField) -> ButterflowResult<()> {
    let d = fr1.dims();
    let flows_match = [fwd, bwd]
        .iter()
        .all(|f| f.width == d.width && f.height == d.height);
    if fr2.dims() != d || !flows_match {
        return Err(ButterflowError::invalid_input(format!(
            "interpolation inputs differ in size: fr1={d} fr2={} fwd={}x{} bwd={}x{}",
            fr2.dims(),
            fwd.width,
            fwd.height,
            bwd.width,
            bwd.height
        )));
    }
    Ok(())
}

/// `(1 - t) * fr1(x + t * bwd) + t * fr2(x + (1 - t) * fwd)`, sampled at the nearest pixel.
fn blend_at(fr1: &FrameF32, fr2: &FrameF32, fwd: &FlowField, bwd: &FlowField, t: f32) -> Frame {
    let (w, h) = (fr1.width as usize, fr1.height as usize);
    let sample = |x: usize, y: usize, dx: f32, dy: f32| -> usize {
        let sx = (x as f32 + dx).round().clamp(0.0, (w - 1) as f32) as usize;
        let sy = (y as f32 + dy).round().clamp(0.0, (h - 1) as f32) as usize;
        (sy * w + sx) * 3
    };
    let mut data = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let a = sample(x, y, bwd.u[i] * t, bwd.v[i] * t);
            let b = sample(x, y, fwd.u[i] * (1.0 - t), fwd.v[i] * (1.0 - t));
            for c in 0..3 {
                let v = (1.0 - t) * fr1.data[a + c] + t * fr2.data[b + c];
                data.push(unit_to_u8(v));
            }
        }
    }
    Frame {
        width: fr1.width,
        height: fr1.height,
        data,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/motion/interpolate.rs"]
mod tests;
