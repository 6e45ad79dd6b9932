//! Precomputed polynomial-expansion kernels, persisted under the cache directory.
//!
//! [`flow_init`] is called once at startup; every flow instance created afterwards reads its
//! kernel through the returned [`KernelCache`].

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::config::file::write_atomic;
use crate::foundation::error::{ButterflowError, ButterflowResult};

/// Narrower Gaussians leave the quadratic terms without support.
const MIN_BASIS_SIGMA: f64 = 0.5;

/// Separable Gaussian basis for quadratic polynomial expansion over a `2n+1` window.
///
/// Only the non-negative half of each tap array is stored; `g` and `xxg` are even, `xg` is odd.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PolyExpKernel {
    pub n: u32,
    /// Requested sigma.
    pub sigma: f64,
    /// Sigma the taps were built with, after the lower bound is applied.
    pub basis_sigma: f64,
    pub g: Vec<f32>,
    pub xg: Vec<f32>,
    pub xxg: Vec<f32>,
    /// Entries of the inverse metric of the basis `{1, x, y, x², y², xy}`.
    pub ig11: f64,
    pub ig03: f64,
    pub ig33: f64,
    pub ig55: f64,
}

impl PolyExpKernel {
    pub fn compute(n: u32, sigma: f64) -> ButterflowResult<Self> {
        if n == 0 {
            return Err(ButterflowError::invalid_input("poly_n must be positive"));
        }
        let requested = sigma;
        let sigma = if sigma < f64::from(f32::EPSILON) {
            f64::from(n) * 0.3
        } else {
            sigma.max(MIN_BASIS_SIGMA)
        };
        let n_i = n as i64;
        let mut full: Vec<f64> = (-n_i..=n_i)
            .map(|x| (-((x * x) as f64) / (2.0 * sigma * sigma)).exp())
            .collect();
        let sum: f64 = full.iter().sum();
        for v in &mut full {
            *v /= sum;
        }
        let tap = |x: i64| full[(x + n_i) as usize];

        let (mut g00, mut g11, mut g33, mut g55) = (0.0, 0.0, 0.0, 0.0);
        for y in -n_i..=n_i {
            for x in -n_i..=n_i {
                let w = tap(y) * tap(x);
                let (xf, yf) = (x as f64, y as f64);
                g00 += w;
                g11 += w * xf * xf;
                g33 += w * xf.powi(4);
                g55 += w * xf * xf * yf * yf;
            }
        }
        // The {1, x², y²} block is [[g00, g11, g11], [g11, g33, g55], [g11, g55, g33]];
        // the remaining basis functions are orthogonal to everything else.
        let det = g00 * (g33 + g55) - 2.0 * g11 * g11;
        if det.abs() < f64::EPSILON || (g33 - g55).abs() < f64::EPSILON || g11 == 0.0 || g55 == 0.0 {
            return Err(ButterflowError::invalid_input(format!(
                "polynomial expansion basis is singular for n={n}, sigma={sigma}"
            )));
        }

        let half = |f: &dyn Fn(i64) -> f64| (0..=n_i).map(|x| f(x) as f32).collect::<Vec<_>>();
        Ok(Self {
            n,
            sigma: requested,
            basis_sigma: sigma,
            g: half(&tap),
            xg: half(&|x| x as f64 * tap(x)),
            xxg: half(&|x| (x * x) as f64 * tap(x)),
            ig11: 1.0 / g11,
            ig03: -g11 / det,
            ig33: 0.5 * (g00 / det + 1.0 / (g33 - g55)),
            ig55: 1.0 / g55,
        })
    }

    /// File name used for this kernel inside the cache.
    pub fn file_name(n: u32, sigma: f64) -> String {
        format!("polyexp-{n}-{sigma:.4}.json")
    }
}

/// Directory of persisted [`PolyExpKernel`]s. Readers never mutate existing files.
#[derive(Clone, Debug)]
pub struct KernelCache {
    dir: PathBuf,
}

/// Prepare the kernel cache under `cache_dir/kernels`. Safe to call repeatedly.
pub fn flow_init(cache_dir: &Path) -> ButterflowResult<KernelCache> {
    let dir = cache_dir.join("kernels");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create kernel cache '{}'", dir.display()))?;
    tracing::debug!(dir = %dir.display(), "flow kernel cache ready");
    Ok(KernelCache { dir })
}

impl KernelCache {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the kernel for `(n, sigma)`, computing and storing it on a miss.
    ///
    /// A cached file that fails to parse or describes different parameters is rebuilt.
    pub fn polynomial_kernel(&self, n: u32, sigma: f64) -> ButterflowResult<PolyExpKernel> {
        let path = self.dir.join(PolyExpKernel::file_name(n, sigma));
        if let Ok(bytes) = std::fs::read(&path) {
            match serde_json::from_slice::<PolyExpKernel>(&bytes) {
                Ok(k) if k.n == n && (k.sigma - sigma).abs() < 1e-9 => {
                    tracing::trace!(path = %path.display(), "kernel cache hit");
                    return Ok(k);
                }
                Ok(_) => tracing::warn!(path = %path.display(), "kernel cache entry mismatched, rebuilding"),
                Err(e) => tracing::warn!(path = %path.display(), "kernel cache entry unreadable ({e}), rebuilding"),
            }
        }

        let kernel = PolyExpKernel::compute(n, sigma)?;
        let json = serde_json::to_vec_pretty(&kernel)
            .map_err(|e| anyhow::anyhow!("failed to serialize kernel: {e}"))?;
        write_atomic(&path, &json)?;
        tracing::debug!(path = %path.display(), "kernel cached");
        Ok(kernel)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/motion/kernel_cache.rs"]
mod tests;
