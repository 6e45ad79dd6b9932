//! Dense optical flow after Farnebäck, "Two-Frame Motion Estimation Based on Polynomial
//! Expansion" (2003), evaluated on the CPU over a coarse-to-fine pyramid.

use rayon::prelude::*;

use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::media::frame::GrayFrame;
use crate::motion::flow::{FlowField, FlowFilter, FlowParams, OpticalFlow};
use crate::motion::kernel_cache::{KernelCache, PolyExpKernel};

/// Pyramid levels stop before either side would fall below this many pixels.
const MIN_PYRAMID_SIDE: f64 = 32.0;

/// Rows and columns this close to the border get attenuated update matrices.
const BORDER: usize = 5;
const BORDER_WEIGHTS: [f32; BORDER] = [0.14, 0.14, 0.4472, 0.4472, 0.4472];

/// Per-pixel polynomial coefficients `[ry, rx, ryy, rxx, rxy]`.
type Coeffs = [f32; 5];

/// Per-pixel `[g11, g12, g22, h1, h2]` of the normal equations.
type Normal = [f32; 5];

#[derive(Clone, Debug)]
struct Plane {
    w: usize,
    h: usize,
    data: Vec<f32>,
}

impl Plane {
    fn from_gray(g: &GrayFrame) -> Self {
        Self {
            w: g.width as usize,
            h: g.height as usize,
            data: g.data.iter().map(|&b| f32::from(b)).collect(),
        }
    }

    /// Bilinear resample with pixel-centre alignment and replicated borders.
    fn resized(&self, w: usize, h: usize) -> Self {
        if w == self.w && h == self.h {
            return self.clone();
        }
        let sx = self.w as f32 / w as f32;
        let sy = self.h as f32 / h as f32;
        let mut data = vec![0.0f32; w * h];
        data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            let fy = ((y as f32 + 0.5) * sy - 0.5).max(0.0);
            let y0 = (fy.floor() as usize).min(self.h - 1);
            let y1 = (y0 + 1).min(self.h - 1);
            let ay = fy - y0 as f32;
            for (x, out) in row.iter_mut().enumerate() {
                let fx = ((x as f32 + 0.5) * sx - 0.5).max(0.0);
                let x0 = (fx.floor() as usize).min(self.w - 1);
                let x1 = (x0 + 1).min(self.w - 1);
                let ax = fx - x0 as f32;
                let top = self.data[y0 * self.w + x0] * (1.0 - ax) + self.data[y0 * self.w + x1] * ax;
                let bot = self.data[y1 * self.w + x0] * (1.0 - ax) + self.data[y1 * self.w + x1] * ax;
                *out = top * (1.0 - ay) + bot * ay;
            }
        });
        Self { w, h, data }
    }

    /// Separable Gaussian blur; `sigma <= 0` returns a copy.
    fn gaussian_blurred(&self, sigma: f64) -> Self {
        if sigma <= 0.0 {
            return self.clone();
        }
        let taps = gaussian_taps(sigma, ((sigma * 5.0).round() as usize | 1).max(3) / 2);
        let (w, h) = (self.w, self.h);
        let r = taps.len() - 1;

        let mut tmp = vec![0.0f32; w * h];
        tmp.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let mut acc = taps[0] * self.data[y * w + x];
                for k in 1..=r {
                    let up = y.saturating_sub(k);
                    let dn = (y + k).min(h - 1);
                    acc += taps[k] * (self.data[up * w + x] + self.data[dn * w + x]);
                }
                *out = acc;
            }
        });
        let mut data = vec![0.0f32; w * h];
        data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            let src = &tmp[y * w..(y + 1) * w];
            for (x, out) in row.iter_mut().enumerate() {
                let mut acc = taps[0] * src[x];
                for k in 1..=r {
                    acc += taps[k] * (src[x.saturating_sub(k)] + src[(x + k).min(w - 1)]);
                }
                *out = acc;
            }
        });
        Self { w, h, data }
    }
}

/// Normalized non-negative half of a Gaussian with `radius` taps on each side.
fn gaussian_taps(sigma: f64, radius: usize) -> Vec<f32> {
    let full: Vec<f64> = (0..=radius)
        .map(|k| (-((k * k) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum = full[0] + 2.0 * full[1..].iter().sum::<f64>();
    full.into_iter().map(|v| (v / sum) as f32).collect()
}

/// Expand every pixel of `img` into quadratic polynomial coefficients.
fn poly_exp(img: &Plane, k: &PolyExpKernel) -> Vec<Coeffs> {
    let (w, h) = (img.w, img.h);
    let n = k.n as usize;
    let (ig11, ig03, ig33, ig55) = (k.ig11, k.ig03, k.ig33, k.ig55);
    let mut out = vec![[0.0f32; 5]; w * h];
    out.par_chunks_mut(w).enumerate().for_each(|(y, drow)| {
        // Vertical pass: weights 1, y, y² per column.
        let mut col = vec![[0.0f32; 3]; w];
        let s = &img.data[y * w..(y + 1) * w];
        for (x, c) in col.iter_mut().enumerate() {
            c[0] = s[x] * k.g[0];
        }
        for t in 1..=n {
            let s0 = &img.data[y.saturating_sub(t) * w..][..w];
            let s1 = &img.data[(y + t).min(h - 1) * w..][..w];
            for (x, c) in col.iter_mut().enumerate() {
                let p = s0[x] + s1[x];
                c[0] += k.g[t] * p;
                c[1] += k.xg[t] * (s1[x] - s0[x]);
                c[2] += k.xxg[t] * p;
            }
        }

        // Horizontal pass.
        for (x, d) in drow.iter_mut().enumerate() {
            let c = col[x];
            let g0 = f64::from(k.g[0]);
            let (mut b1, mut b2, mut b3) = (f64::from(c[0]) * g0, 0.0f64, f64::from(c[1]) * g0);
            let (mut b4, mut b5, mut b6) = (0.0f64, f64::from(c[2]) * g0, 0.0f64);
            for t in 1..=n {
                let l = col[x.saturating_sub(t)];
                let r = col[(x + t).min(w - 1)];
                let (g, xg, xxg) = (f64::from(k.g[t]), f64::from(k.xg[t]), f64::from(k.xxg[t]));
                let tg = f64::from(r[0] + l[0]);
                b1 += tg * g;
                b4 += tg * xxg;
                b2 += f64::from(r[0] - l[0]) * xg;
                b3 += f64::from(r[1] + l[1]) * g;
                b6 += f64::from(r[1] - l[1]) * xg;
                b5 += f64::from(r[2] + l[2]) * g;
            }
            *d = [
                (b3 * ig11) as f32,
                (b2 * ig11) as f32,
                (b1 * ig03 + b5 * ig33) as f32,
                (b1 * ig03 + b4 * ig33) as f32,
                (b6 * ig55) as f32,
            ];
        }
    });
    out
}

fn border_scale(i: usize, len: usize) -> f32 {
    let mut s = 1.0;
    if i < BORDER {
        s *= BORDER_WEIGHTS[i];
    }
    if i + BORDER >= len {
        s *= BORDER_WEIGHTS[len - 1 - i];
    }
    s
}

/// Build the normal equations for the current displacement estimate.
fn update_matrices(r0: &[Coeffs], r1: &[Coeffs], flow: &FlowField, w: usize, h: usize) -> Vec<Normal> {
    let mut m = vec![[0.0f32; 5]; w * h];
    m.par_chunks_mut(w).enumerate().for_each(|(y, mrow)| {
        for (x, out) in mrow.iter_mut().enumerate() {
            let i = y * w + x;
            let (dx, dy) = (flow.u[i], flow.v[i]);
            // Samples that land outside the frame are clamped to the nearest edge pixel.
            let fx = (x as f32 + dx).clamp(0.0, (w - 1) as f32);
            let fy = (y as f32 + dy).clamp(0.0, (h - 1) as f32);
            let (x0, y0) = (fx.floor() as usize, fy.floor() as usize);
            let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
            let (ax, ay) = (fx - x0 as f32, fy - y0 as f32);
            let (p00, p01) = (&r1[y0 * w + x0], &r1[y0 * w + x1]);
            let (p10, p11) = (&r1[y1 * w + x0], &r1[y1 * w + x1]);
            let (a00, a01) = ((1.0 - ax) * (1.0 - ay), ax * (1.0 - ay));
            let (a10, a11) = ((1.0 - ax) * ay, ax * ay);
            let lerp = |c: usize| a00 * p00[c] + a01 * p01[c] + a10 * p10[c] + a11 * p11[c];

            let r = &r0[i];
            let r4 = (r[2] + lerp(2)) * 0.5;
            let r5 = (r[3] + lerp(3)) * 0.5;
            let r6 = (r[4] + lerp(4)) * 0.25;
            let r2 = (r[0] - lerp(0)) * 0.5 + r4 * dy + r6 * dx;
            let r3 = (r[1] - lerp(1)) * 0.5 + r6 * dy + r5 * dx;

            let mut v = [r2, r3, r4, r5, r6];
            let scale = border_scale(x, w) * border_scale(y, h);
            if scale != 1.0 {
                for c in &mut v {
                    *c *= scale;
                }
            }
            let [r2, r3, r4, r5, r6] = v;
            *out = [
                r4 * r4 + r6 * r6,
                (r4 + r5) * r6,
                r5 * r5 + r6 * r6,
                r4 * r2 + r6 * r3,
                r6 * r2 + r5 * r3,
            ];
        }
    });
    m
}

/// Average the normal equations over a `winsize` window.
fn window_average(m: &[Normal], w: usize, h: usize, winsize: u32, filter: FlowFilter) -> Vec<Normal> {
    let radius = (winsize / 2) as usize;
    let taps: Vec<f32> = match filter {
        FlowFilter::Box => vec![1.0 / (2 * radius + 1) as f32; radius + 1],
        FlowFilter::Gaussian => gaussian_taps((radius as f64 * 0.3).max(0.3), radius),
    };
    let mut tmp = vec![[0.0f32; 5]; w * h];
    tmp.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut acc = m[y * w + x].map(|c| c * taps[0]);
            for k in 1..=radius {
                let up = &m[y.saturating_sub(k) * w + x];
                let dn = &m[(y + k).min(h - 1) * w + x];
                for c in 0..5 {
                    acc[c] += taps[k] * (up[c] + dn[c]);
                }
            }
            *out = acc;
        }
    });
    let mut out = vec![[0.0f32; 5]; w * h];
    out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        let src = &tmp[y * w..(y + 1) * w];
        for (x, o) in row.iter_mut().enumerate() {
            let mut acc = src[x].map(|c| c * taps[0]);
            for k in 1..=radius {
                let l = &src[x.saturating_sub(k)];
                let r = &src[(x + k).min(w - 1)];
                for c in 0..5 {
                    acc[c] += taps[k] * (l[c] + r[c]);
                }
            }
            *o = acc;
        }
    });
    out
}

/// Solve the averaged 2x2 systems into a new displacement estimate.
fn solve_flow(avg: &[Normal], flow: &mut FlowField) {
    flow.u
        .par_iter_mut()
        .zip(flow.v.par_iter_mut())
        .zip(avg.par_iter())
        .for_each(|((u, v), m)| {
            let [g11, g12, g22, h1, h2] = m.map(f64::from);
            let idet = 1.0 / (g11 * g22 - g12 * g12 + 1e-3);
            *u = ((g11 * h2 - g12 * h1) * idet) as f32;
            *v = ((g22 * h1 - g12 * h2) * idet) as f32;
        });
}

/// CPU Farnebäck flow. Rows are processed in parallel on the current rayon pool.
#[derive(Clone, Debug)]
pub struct FarnebackFlow {
    params: FlowParams,
    kernel: PolyExpKernel,
}

impl FarnebackFlow {
    pub fn new(params: FlowParams) -> ButterflowResult<Self> {
        params.validate()?;
        let kernel = PolyExpKernel::compute(params.poly_n, params.poly_sigma)?;
        Ok(Self { params, kernel })
    }

    /// Like [`FarnebackFlow::new`], reading the expansion kernel through `cache`.
    pub fn with_kernel_cache(params: FlowParams, cache: &KernelCache) -> ButterflowResult<Self> {
        params.validate()?;
        let kernel = cache.polynomial_kernel(params.poly_n, params.poly_sigma)?;
        Ok(Self { params, kernel })
    }

    /// Number of pyramid levels actually used for a `w x h` frame.
    fn effective_levels(&self, w: usize, h: usize) -> u32 {
        let mut scale = 1.0;
        for k in 0..self.params.levels {
            scale *= self.params.pyr_scale;
            if w as f64 * scale < MIN_PYRAMID_SIDE || h as f64 * scale < MIN_PYRAMID_SIDE {
                return k;
            }
        }
        self.params.levels
    }

    fn pyramid(&self, img: &Plane, levels: u32) -> Vec<Plane> {
        let p = &self.params;
        let mut out = Vec::with_capacity(levels as usize + 1);
        out.push(img.clone());
        let mut scale = 1.0;
        for _ in 0..levels {
            scale *= p.pyr_scale;
            let w = ((img.w as f64 * scale).round() as usize).max(1);
            let h = ((img.h as f64 * scale).round() as usize).max(1);
            let level = if p.fast_pyramids {
                let prev = out.last().unwrap_or(img);
                prev.gaussian_blurred((1.0 / p.pyr_scale - 1.0) * 0.5)
                    .resized(w, h)
            } else {
                img.gaussian_blurred((1.0 / scale - 1.0) * 0.5).resized(w, h)
            };
            out.push(level);
        }
        out
    }
}

impl OpticalFlow for FarnebackFlow {
    fn params(&self) -> &FlowParams {
        &self.params
    }

    fn calc(&self, a: &GrayFrame, b: &GrayFrame) -> ButterflowResult<FlowField> {
        if a.dims() != b.dims() {
            return Err(ButterflowError::invalid_input(format!(
                "flow inputs differ in size: {} vs {}",
                a.dims(),
                b.dims()
            )));
        }
        let (w0, h0) = (a.width as usize, a.height as usize);
        if w0 == 0 || h0 == 0 {
            return Err(ButterflowError::invalid_input("flow inputs are empty"));
        }

        let levels = self.effective_levels(w0, h0);
        let pa = self.pyramid(&Plane::from_gray(a), levels);
        let pb = self.pyramid(&Plane::from_gray(b), levels);

        let mut flow: Option<FlowField> = None;
        for k in (0..=levels as usize).rev() {
            let (ia, ib) = (&pa[k], &pb[k]);
            let (w, h) = (ia.w, ia.h);
            let mut cur = match flow.take() {
                None => FlowField::zeros(w as u32, h as u32),
                Some(prev) => {
                    let up = 1.0 / self.params.pyr_scale as f32;
                    let (pw, ph) = (prev.width as usize, prev.height as usize);
                    let mut pu = Plane { w: pw, h: ph, data: prev.u }.resized(w, h);
                    let mut pv = Plane { w: pw, h: ph, data: prev.v }.resized(w, h);
                    pu.data.iter_mut().for_each(|d| *d *= up);
                    pv.data.iter_mut().for_each(|d| *d *= up);
                    FlowField::from_planes(w as u32, h as u32, pu.data, pv.data)?
                }
            };

            let r0 = poly_exp(ia, &self.kernel);
            let r1 = poly_exp(ib, &self.kernel);
            let mut m = update_matrices(&r0, &r1, &cur, w, h);
            for it in 0..self.params.iters {
                let avg = window_average(&m, w, h, self.params.winsize, self.params.filter);
                solve_flow(&avg, &mut cur);
                if it + 1 < self.params.iters {
                    m = update_matrices(&r0, &r1, &cur, w, h);
                }
            }
            tracing::trace!(level = k, w, h, "flow level done");
            flow = Some(cur);
        }
        flow.ok_or_else(|| ButterflowError::Other(anyhow::anyhow!("flow pyramid produced no levels")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/motion/farneback.rs"]
mod tests;
