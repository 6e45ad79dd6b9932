//! Audio resynchronisation: per-region slices retimed with an `atempo` chain, joined with the
//! concat demuxer and muxed onto the rendered video by stream copy.
//!
//! Adjacent regions are assumed contiguous; gaps between rendered regions are not filled.

use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context as _;

use crate::audio::tempo::{atempo_filter, describe_chain, tempo_chain};
use crate::cache::CacheDir;
use crate::config::settings::Settings;
use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::sequence::subregion::Subregion;

/// Tool and codec options for the audio steps.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioOpts {
    pub av_tool: String,
    pub av_loglevel: String,
    pub codec: String,
    pub bitrate: String,
    pub container: String,
}

impl AudioOpts {
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            av_tool: s.av_tool.clone(),
            av_loglevel: s.av_loglevel.clone(),
            codec: s.audio_codec.clone(),
            bitrate: s.audio_bitrate.clone(),
            container: s.audio_container.clone(),
        }
    }
}

/// One region's audio: the source span and the tempo chain that matches its video speed.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSlice {
    pub ta: f64,
    pub tb: f64,
    pub speed: f64,
    pub chain: Vec<f64>,
    pub path: PathBuf,
}

/// Slices for `regions`, in order, named `~<stem>.<i>.<pid>.<container>` in the cache.
pub fn slice_plan(
    regions: &[&Subregion],
    cache: &CacheDir,
    stem: &str,
    container: &str,
) -> ButterflowResult<Vec<AudioSlice>> {
    regions
        .iter()
        .enumerate()
        .map(|(i, sub)| {
            let speed = sub.audio_speed();
            Ok(AudioSlice {
                ta: sub.ta,
                tb: sub.tb,
                speed,
                chain: tempo_chain(speed)?,
                path: cache.temp_path(&format!("{stem}.{i}"), container),
            })
        })
        .collect()
}

/// Extract `[ta, tb]` of `src`'s audio and retime it in one pass.
pub fn extract_args(opts: &AudioOpts, src: &Path, slice: &AudioSlice) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-loglevel".into(),
        opts.av_loglevel.clone(),
        "-y".into(),
        "-i".into(),
        src.display().to_string(),
        "-ss".into(),
        format!("{}", slice.ta / 1000.0),
        "-to".into(),
        format!("{}", slice.tb / 1000.0),
        "-map_metadata".into(),
        "-1".into(),
        "-map_chapters".into(),
        "-1".into(),
        "-vn".into(),
        "-sn".into(),
    ];
    if slice.chain != [1.0] {
        args.extend(["-filter:a".into(), atempo_filter(&slice.chain)]);
    }
    args.extend([
        "-c:a".into(),
        opts.codec.clone(),
        "-b:a".into(),
        opts.bitrate.clone(),
        slice.path.display().to_string(),
    ]);
    args
}

/// Body of a concat demuxer list file.
pub fn concat_list(files: &[PathBuf]) -> String {
    let mut out = String::new();
    for f in files {
        let p = f.display().to_string();
        let p = if cfg!(windows) { p.replace('\\', "/") } else { p };
        out.push_str(&format!("file '{}'\n", p.replace('\'', "'\\''")));
    }
    out
}

pub fn concat_args(opts: &AudioOpts, list: &Path, dest: &Path) -> Vec<String> {
    [
        "-loglevel",
        &opts.av_loglevel,
        "-y",
        "-f",
        "concat",
        "-safe",
        "0",
        "-i",
        &list.display().to_string(),
        "-c",
        "copy",
        &dest.display().to_string(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn mux_args(opts: &AudioOpts, video: &Path, audio: &Path, dest: &Path) -> Vec<String> {
    [
        "-loglevel",
        &opts.av_loglevel,
        "-y",
        "-i",
        &video.display().to_string(),
        "-i",
        &audio.display().to_string(),
        "-map",
        "0:v:0",
        "-map",
        "1:a:0",
        "-c",
        "copy",
        &dest.display().to_string(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Run `tool args`, turning a non-zero exit into an encode error carrying its stderr.
pub fn run_tool(tool: &str, args: &[String], what: &str) -> ButterflowResult<()> {
    tracing::debug!(tool, ?args, "{what}");
    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            ButterflowError::encode(format!(
                "failed to spawn '{tool}' for {what} (is it installed and on PATH?): {e}"
            ))
        })?;
    let mut stderr = String::new();
    if let Some(mut err) = child.stderr.take() {
        err.read_to_string(&mut stderr)
            .with_context(|| format!("failed to read '{tool}' stderr"))?;
    }
    let status = child
        .wait()
        .with_context(|| format!("failed to wait for '{tool}'"))?;
    if !status.success() {
        return Err(ButterflowError::encode(format!(
            "{what} failed ({tool} exited with {status}): {}",
            stderr.trim()
        )));
    }
    Ok(())
}

/// Retime the audio of `regions` from `src` and mux it with `video` into `dest`.
///
/// Intermediate slices and the list file are removed on success.
#[tracing::instrument(skip_all, fields(src = %src.display(), dest = %dest.display()))]
pub fn mux_retimed_audio(
    opts: &AudioOpts,
    cache: &CacheDir,
    src: &Path,
    regions: &[&Subregion],
    video: &Path,
    dest: &Path,
) -> ButterflowResult<()> {
    let stem = src
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    let slices = slice_plan(regions, cache, &stem, &opts.container)?;

    for slice in &slices {
        tracing::info!(
            ta = slice.ta,
            tb = slice.tb,
            chain = %describe_chain(&slice.chain),
            "extracting audio slice"
        );
        run_tool(&opts.av_tool, &extract_args(opts, src, slice), "audio extraction")?;
    }

    let files: Vec<PathBuf> = slices.iter().map(|s| s.path.clone()).collect();
    let list = cache.temp_path(&format!("{stem}.list"), "txt");
    std::fs::write(&list, concat_list(&files))
        .with_context(|| format!("failed to write concat list '{}'", list.display()))?;
    let merged = cache.temp_path(&format!("{stem}.merged"), &opts.container);
    run_tool(&opts.av_tool, &concat_args(opts, &list, &merged), "audio concat")?;
    run_tool(&opts.av_tool, &mux_args(opts, video, &merged, dest), "mux")?;

    for f in files.iter().chain([&list, &merged]) {
        if let Err(e) = std::fs::remove_file(f) {
            tracing::debug!(path = %f.display(), "could not remove temp file: {e}");
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/audio/mux.rs"]
mod tests;
