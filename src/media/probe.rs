use std::path::{Path, PathBuf};
use std::process::Command;

use crate::foundation::core::{Dimensions, format_timestamp_ms};
use crate::foundation::error::{ButterflowError, ButterflowResult};

/// Properties of the input video as reported by the probe tool.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub rate_num: u32,
    pub rate_den: u32,
    pub duration_ms: f64,
    pub frames: u64,
    pub codec: Option<String>,
    /// Display aspect ratio, when it differs from the storage aspect.
    pub dar: Option<(u32, u32)>,
    pub has_audio: bool,
    pub has_subtitles: bool,
}

impl VideoInfo {
    pub fn rate(&self) -> f64 {
        if self.rate_den == 0 {
            0.0
        } else {
            f64::from(self.rate_num) / f64::from(self.rate_den)
        }
    }

    pub fn dims(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Human-readable summary printed by `--probe`.
    pub fn report(&self) -> String {
        let mut out = format!(
            "Video information:\n  Path: {}\n  Codec: {}\n  Resolution: {}x{}",
            self.path.display(),
            self.codec.as_deref().unwrap_or("unknown"),
            self.width,
            self.height,
        );
        if let Some((n, d)) = self.dar {
            out.push_str(&format!("\n  Display aspect: {n}:{d}"));
        }
        out.push_str(&format!(
            "\n  Rate: {}/{} ({:.3} fps)\n  Duration: {} ({:.2}s)\n  Frames: {}\n  Audio: {}\n  Subtitles: {}",
            self.rate_num,
            self.rate_den,
            self.rate(),
            format_timestamp_ms(self.duration_ms),
            self.duration_ms / 1000.0,
            self.frames,
            if self.has_audio { "yes" } else { "no" },
            if self.has_subtitles { "yes" } else { "no" },
        ));
        out
    }
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    nb_frames: Option<String>,
    nb_read_frames: Option<String>,
    display_aspect_ratio: Option<String>,
    sample_aspect_ratio: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Probe `path` with `probe_tool` (normally `ffprobe`).
///
/// When the container does not record a frame count, the video stream is decoded once
/// with `-count_frames` to obtain it.
#[tracing::instrument(skip(probe_tool))]
pub fn probe_video(path: &Path, probe_tool: &str) -> ButterflowResult<VideoInfo> {
    if !path.is_file() {
        return Err(ButterflowError::source_open(format!(
            "'{}' does not exist or is not a file",
            path.display()
        )));
    }
    let json = run_probe(path, probe_tool, false)?;
    match parse_probe_json(path, &json) {
        Ok(info) => Ok(info),
        Err(ButterflowError::SourceOpen(msg)) if msg.contains("frame count") => {
            tracing::debug!("container has no frame count, counting frames");
            let json = run_probe(path, probe_tool, true)?;
            parse_probe_json(path, &json)
        }
        Err(e) => Err(e),
    }
}

fn run_probe(path: &Path, probe_tool: &str, count_frames: bool) -> ButterflowResult<Vec<u8>> {
    let mut cmd = Command::new(probe_tool);
    cmd.args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"]);
    if count_frames {
        cmd.args(["-count_frames", "-select_streams", "v:0"]);
    }
    let out = cmd.arg(path).output().map_err(|e| {
        ButterflowError::source_open(format!(
            "failed to run '{probe_tool}' (is it installed and on PATH?): {e}"
        ))
    })?;
    if !out.status.success() {
        return Err(ButterflowError::source_open(format!(
            "{probe_tool} failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    Ok(out.stdout)
}

/// Build a [`VideoInfo`] from probe JSON output.
pub fn parse_probe_json(path: &Path, json: &[u8]) -> ButterflowResult<VideoInfo> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| ButterflowError::source_open(format!("probe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            ButterflowError::source_open(format!("no video stream in '{}'", path.display()))
        })?;
    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(ButterflowError::source_open(
                "video stream reports no resolution",
            ));
        }
    };

    let (rate_num, rate_den) = [&video.r_frame_rate, &video.avg_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|s| parse_ff_ratio(s, '/'))
        .ok_or_else(|| ButterflowError::source_open("video stream reports no frame rate"))?;

    let duration_s = video
        .duration
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| {
            parsed
                .format
                .as_ref()
                .and_then(|f| f.duration.as_deref())
                .and_then(|s| s.parse::<f64>().ok())
        })
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| ButterflowError::source_open("video reports no duration"))?;

    let frames = [&video.nb_frames, &video.nb_read_frames]
        .into_iter()
        .flatten()
        .find_map(|s| s.parse::<u64>().ok().filter(|n| *n > 0))
        .ok_or_else(|| ButterflowError::source_open("video stream reports no frame count"))?;

    // Only keep a display aspect when the pixels are not square.
    let dar = video
        .display_aspect_ratio
        .as_deref()
        .and_then(|s| parse_ff_ratio(s, ':'))
        .filter(|_| {
            video
                .sample_aspect_ratio
                .as_deref()
                .and_then(|s| parse_ff_ratio(s, ':'))
                .is_some_and(|(n, d)| n != d)
        });

    let has = |kind: &str| {
        parsed
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some(kind))
    };

    Ok(VideoInfo {
        path: path.to_path_buf(),
        width,
        height,
        rate_num,
        rate_den,
        duration_ms: duration_s * 1000.0,
        frames,
        codec: video.codec_name.clone(),
        dar,
        has_audio: has("audio"),
        has_subtitles: has("subtitle"),
    })
}

fn parse_ff_ratio(s: &str, sep: char) -> Option<(u32, u32)> {
    let (a, b) = s.split_once(sep)?;
    let a = a.trim().parse::<u32>().ok()?;
    let b = b.trim().parse::<u32>().ok()?;
    if a == 0 || b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(test)]
#[path = "../../tests/unit/media/probe.rs"]
mod tests;
