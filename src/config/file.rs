use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::{ButterflowError, ButterflowResult};

/// Plain `key=value` config file.
///
/// Keys are case-insensitive (stored lowercased). `#` starts a comment, blank lines are ignored.
/// Entries keep their sorted key order when written back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigFile {
    entries: BTreeMap<String, String>,
}

impl ConfigFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config text. Lines without `=` are rejected with their line number.
    pub fn parse(text: &str) -> ButterflowResult<Self> {
        let mut entries = BTreeMap::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = match raw.find('#') {
                Some(i) => &raw[..i],
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            let Some((k, v)) = line.split_once('=') else {
                return Err(ButterflowError::invalid_input(format!(
                    "config line {}: expected key=value, got '{}'",
                    lineno + 1,
                    raw.trim()
                )));
            };
            let key = k.trim().to_ascii_lowercase();
            if key.is_empty() {
                return Err(ButterflowError::invalid_input(format!(
                    "config line {}: empty key",
                    lineno + 1
                )));
            }
            entries.insert(key, v.trim().to_string());
        }
        Ok(Self { entries })
    }

    /// Load from `path`. A missing file yields an empty config.
    pub fn load(path: &Path) -> ButterflowResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::parse(&text)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_ascii_lowercase(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(&key.to_ascii_lowercase())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.entries {
            out.push_str(k);
            out.push('=');
            out.push_str(v);
            out.push('\n');
        }
        out
    }

    /// Write `header` (as `#` comments) followed by all entries, replacing `path` atomically.
    pub fn save(&self, path: &Path, header: &str) -> ButterflowResult<()> {
        let mut text = String::new();
        for line in header.lines() {
            text.push_str("# ");
            text.push_str(line);
            text.push('\n');
        }
        text.push_str(&self.to_text());
        write_atomic(path, text.as_bytes())
    }
}

/// Default config location, `$HOME/.butterflow/config`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".butterflow"))
        .unwrap_or_else(|| PathBuf::from(".butterflow"))
        .join("config")
}

/// Replace `path` with `bytes` via a temp file in the same directory and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> ButterflowResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create directory '{}'", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in '{}'", dir.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("write temp file for '{}'", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync temp file for '{}'", path.display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replace '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/config/file.rs"]
mod tests;
