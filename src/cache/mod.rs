//! Cache directory: temp render outputs, audio slices and the flow kernel store.
//!
//! Temp files of a failed render stay here until the cache is cleared explicitly.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::ButterflowResult;

/// Subdirectory holding persisted flow kernels.
pub const KERNEL_DIR: &str = "kernels";

/// File count and total size of the cache, kernels excluded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheUsage {
    pub files: u64,
    pub bytes: u64,
}

impl CacheUsage {
    /// Size in human units, e.g. `12.50 MB`.
    pub fn human_size(&self) -> String {
        const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
        let mut v = self.bytes as f64;
        let mut unit = 0;
        while v >= 1024.0 && unit + 1 < UNITS.len() {
            v /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{} B", self.bytes)
        } else {
            format!("{v:.2} {}", UNITS[unit])
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$HOME/.butterflow/cache`, or the system temp dir when there is no home.
    pub fn default_root() -> PathBuf {
        match dirs::home_dir() {
            Some(home) => home.join(".butterflow").join("cache"),
            None => std::env::temp_dir().join("butterflow-cache"),
        }
    }

    /// `configured` when set, else [`CacheDir::default_root`].
    pub fn resolve(configured: Option<&Path>) -> Self {
        Self::new(
            configured
                .map(Path::to_path_buf)
                .unwrap_or_else(Self::default_root),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kernel_dir(&self) -> PathBuf {
        self.root.join(KERNEL_DIR)
    }

    pub fn ensure(&self) -> ButterflowResult<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create cache dir '{}'", self.root.display()))?;
        Ok(())
    }

    /// `~<stem>.<pid>.<ext>` inside the cache, lowercased.
    pub fn temp_path(&self, stem: &str, ext: &str) -> PathBuf {
        let name = format!("~{stem}.{}.{}", std::process::id(), ext.trim_start_matches('.'));
        self.root.join(name.to_lowercase())
    }

    /// Walk the cache, skipping the kernel store. A missing cache counts as empty.
    pub fn usage(&self) -> ButterflowResult<CacheUsage> {
        let mut usage = CacheUsage::default();
        if !self.root.exists() {
            return Ok(usage);
        }
        let kernels = self.kernel_dir();
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let entries = std::fs::read_dir(&dir)
                .with_context(|| format!("failed to list '{}'", dir.display()))?;
            for entry in entries {
                let entry = entry.with_context(|| format!("failed to list '{}'", dir.display()))?;
                let path = entry.path();
                let meta = entry
                    .metadata()
                    .with_context(|| format!("failed to stat '{}'", path.display()))?;
                if meta.is_dir() {
                    if path != kernels {
                        stack.push(path);
                    }
                } else {
                    usage.files += 1;
                    usage.bytes += meta.len();
                }
            }
        }
        Ok(usage)
    }

    /// Delete the whole cache, kernels included. Returns `false` when there was nothing to remove.
    pub fn clear(&self) -> ButterflowResult<bool> {
        if !self.root.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&self.root)
            .with_context(|| format!("failed to remove cache dir '{}'", self.root.display()))?;
        tracing::info!(dir = %self.root.display(), "cache cleared");
        Ok(true)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/mod.rs"]
mod tests;
