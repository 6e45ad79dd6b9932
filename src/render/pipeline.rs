use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::audio::mux::{AudioOpts, mux_retimed_audio};
use crate::cache::CacheDir;
use crate::config::settings::Settings;
use crate::encode::ffmpeg::{EncoderOpts, FfmpegSink, ensure_parent_dir};
use crate::encode::preview::PreviewSink;
use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::media::probe::VideoInfo;
use crate::media::source::FfmpegFrameSource;
use crate::motion::farneback::FarnebackFlow;
use crate::motion::interpolate::CpuInterpolator;
use crate::motion::kernel_cache::KernelCache;
use crate::render::hud::Hud;
use crate::render::renderer::{RenderOpts, RenderReport, Renderer, renderable_regions};
use crate::sequence::sequence::VideoSequence;

/// Everything needed to turn one probed source into an output file.
#[derive(Clone, Debug)]
pub struct RenderJob {
    pub info: VideoInfo,
    pub dest: PathBuf,
    pub sequence: VideoSequence,
    pub opts: RenderOpts,
    pub lossless: bool,
    /// Retime the source audio and mux it with the output.
    pub mux: bool,
    pub preview: bool,
    /// Stamp the debug HUD onto output frames.
    pub hud: bool,
}

/// Output paths must be `.mp4`.
pub fn check_output_path(path: &Path) -> ButterflowResult<()> {
    let ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mp4"));
    if !ok {
        return Err(ButterflowError::invalid_input(format!(
            "output '{}' must have an .mp4 extension",
            path.display()
        )));
    }
    Ok(())
}

/// `<input stem>_out.mp4` next to the input.
pub fn default_output_path(src: &Path) -> PathBuf {
    let stem = src
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "butterflow".to_string());
    src.with_file_name(format!("{stem}_out.mp4"))
}

/// Move `from` to `to`, copying when a rename cannot cross filesystems.
pub fn move_file(from: &Path, to: &Path) -> ButterflowResult<()> {
    ensure_parent_dir(to)?;
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).with_context(|| {
        format!("failed to copy '{}' to '{}'", from.display(), to.display())
    })?;
    std::fs::remove_file(from)
        .with_context(|| format!("failed to remove '{}'", from.display()))?;
    Ok(())
}

/// Render `job` to a temp file in the cache, then move it (optionally muxed with retimed
/// audio) to `job.dest`.
///
/// On failure the temp output is left in the cache.
#[tracing::instrument(skip_all, fields(src = %job.info.path.display(), dest = %job.dest.display()))]
pub fn render_video(
    job: &RenderJob,
    settings: &Settings,
    cache: &CacheDir,
    kernels: &KernelCache,
    cancel: &CancelToken,
    progress: impl FnMut(u64, u64),
) -> ButterflowResult<RenderReport> {
    check_output_path(&job.dest)?;
    cache.ensure()?;
    let stem = job
        .info
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "render".to_string());
    let tmp_video = cache.temp_path(&stem, "mp4");
    tracing::debug!(tmp = %tmp_video.display(), "temp output");

    let mut source =
        FfmpegFrameSource::open(job.info.clone(), &settings.av_tool, &settings.av_loglevel)?;
    let flow = FarnebackFlow::with_kernel_cache(settings.flow, kernels)?;
    let interp = CpuInterpolator::new(settings.threads, cancel.clone())?;
    tracing::debug!(threads = interp.threads(), "interpolation pool ready");

    let mut enc = EncoderOpts::from_settings(settings, &tmp_video, job.lossless);
    enc.dar = job.info.dar;
    let mut sink = FfmpegSink::new(enc);
    let mut preview = job
        .preview
        .then(|| PreviewSink::new(&settings.preview_tool, "error"));

    let report = {
        let mut renderer = Renderer::new(job.opts.clone(), &flow, &interp, &mut sink)
            .with_cancel(cancel.clone())
            .on_progress(progress);
        if let Some(p) = preview.as_mut() {
            renderer = renderer.with_preview(p);
        }
        if job.hud {
            renderer = renderer.with_hud(Hud::new(settings.text_type, settings.hud_font.as_deref()));
        }
        renderer.render(&mut source, &job.sequence)?
    };

    if job.mux && !job.info.has_audio {
        tracing::warn!("source has no audio stream; writing video only");
    }
    if job.mux && job.info.has_audio {
        let regions = renderable_regions(&job.sequence, job.opts.keep_subregions);
        let muxed = cache.temp_path(&format!("{stem}.muxed"), "mp4");
        mux_retimed_audio(
            &AudioOpts::from_settings(settings),
            cache,
            &job.info.path,
            &regions,
            &tmp_video,
            &muxed,
        )?;
        move_file(&muxed, &job.dest)?;
        std::fs::remove_file(&tmp_video)
            .with_context(|| format!("failed to remove '{}'", tmp_video.display()))?;
    } else {
        move_file(&tmp_video, &job.dest)?;
    }
    tracing::info!(dest = %job.dest.display(), written = report.frs_written, "output ready");
    Ok(report)
}

#[cfg(test)]
#[path = "../../tests/unit/render/pipeline.rs"]
mod tests;
