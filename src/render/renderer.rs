use std::borrow::Cow;

use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::cancel::CancelToken;
use crate::foundation::core::{Dimensions, ScaleFilter};
use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::foundation::math::cadence_fires;
use crate::media::frame::Frame;
use crate::media::source::FrameSource;
use crate::motion::flow::OpticalFlow;
use crate::motion::interpolate::Interpolator;
use crate::render::hud::{FrameKind, Hud, HudInfo, draw_marker, draw_progress_bar};
use crate::render::plan::{RegionPlan, total_to_render};
use crate::sequence::sequence::VideoSequence;
use crate::sequence::subregion::Subregion;

/// Options for one render pass.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderOpts {
    /// Playback rate of the output, frames per second.
    pub rate: f64,
    /// Output frame size.
    pub out_dims: Dimensions,
    pub scaler_up: ScaleFilter,
    pub scaler_dn: ScaleFilter,
    /// Also render the autogenerated regions between user regions.
    pub keep_subregions: bool,
    /// Mark interpolated frames with a red dot in the corner.
    pub marker: bool,
}

impl RenderOpts {
    pub fn validate(&self) -> ButterflowResult<()> {
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(ButterflowError::invalid_input(format!(
                "playback rate must be positive, got {}",
                self.rate
            )));
        }
        if self.out_dims.width == 0 || self.out_dims.height == 0 {
            return Err(ButterflowError::invalid_input(format!(
                "output size must be non-zero, got {}",
                self.out_dims
            )));
        }
        Ok(())
    }
}

/// Lifecycle of one subregion inside the render walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionState {
    Init,
    /// First source frame read.
    Primed,
    Iterating,
    /// Writing the last source frame and flushing whatever the region still owes.
    Final,
    Done,
}

/// Per-region counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegionStats {
    pub src_seen: u64,
    pub source: u64,
    pub interpolated: u64,
    pub duped: u64,
    pub dropped: u64,
    pub written: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegionReport {
    pub subregion: Subregion,
    pub plan: RegionPlan,
    pub stats: RegionStats,
}

/// Counters of a finished render.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderReport {
    pub source_frs: u64,
    pub frs_interpolated: u64,
    pub frs_duped: u64,
    pub frs_dropped: u64,
    pub frs_written: u64,
    pub frs_to_render: u64,
    pub regions: Vec<RegionReport>,
}

impl RenderReport {
    pub fn write_ratio(&self) -> f64 {
        if self.frs_to_render == 0 {
            return 0.0;
        }
        self.frs_written as f64 / self.frs_to_render as f64
    }

    /// Seconds of output at `rate`.
    pub fn duration_s(&self, rate: f64) -> f64 {
        self.frs_written as f64 / rate
    }

    fn absorb(&mut self, s: &RegionStats) {
        self.source_frs += s.source;
        self.frs_interpolated += s.interpolated;
        self.frs_duped += s.duped;
        self.frs_dropped += s.dropped;
        self.frs_written += s.written;
    }
}

/// Regions rendered for `seq`: user regions, plus the autogenerated ones when `keep` is set.
pub fn renderable_regions(seq: &VideoSequence, keep: bool) -> Vec<&Subregion> {
    seq.subregions()
        .iter()
        .filter(|s| keep || !s.skip)
        .collect()
}

/// Where frames are resized: shrinking happens right after decode so flow runs on the small
/// frame; growing waits until just before the frame is written.
#[derive(Clone, Copy, Debug)]
struct Scaling {
    work: Dimensions,
    out: Dimensions,
    dn: Option<ScaleFilter>,
    up: Option<ScaleFilter>,
}

impl Scaling {
    fn new(src: Dimensions, opts: &RenderOpts) -> Self {
        let out = opts.out_dims;
        if out == src {
            Self {
                work: src,
                out,
                dn: None,
                up: None,
            }
        } else if out.is_downscale_of(src) {
            Self {
                work: out,
                out,
                dn: Some(opts.scaler_dn),
                up: None,
            }
        } else {
            Self {
                work: src,
                out,
                dn: None,
                up: Some(opts.scaler_up),
            }
        }
    }

    fn on_read(&self, frame: Frame) -> ButterflowResult<Frame> {
        match self.dn {
            Some(f) => frame.resized(self.work, f),
            None => Ok(frame),
        }
    }

    fn for_output<'f>(&self, frame: &'f Frame) -> ButterflowResult<Cow<'f, Frame>> {
        match self.up {
            Some(f) => Ok(Cow::Owned(frame.resized(self.out, f)?)),
            None => Ok(Cow::Borrowed(frame)),
        }
    }
}

/// One region's walk state.
struct Walk<'s> {
    sub: &'s Subregion,
    /// 1-based among rendered regions.
    idx: usize,
    plan: RegionPlan,
    state: RegionState,
    work_idx: u64,
    stats: RegionStats,
}

impl Walk<'_> {
    fn transition(&mut self, to: RegionState) {
        tracing::trace!(region = self.idx, from = ?self.state, ?to, "region state");
        self.state = to;
    }

    fn remaining(&self) -> u64 {
        self.plan.to_render.saturating_sub(self.stats.written)
    }
}

/// A write-queue entry's identity, used for accounting and the HUD.
#[derive(Clone, Copy, Debug)]
struct Item {
    kind: FrameKind,
    pair_a: u64,
    pair_b: u64,
    btw_idx: usize,
}

/// Drives decode, flow, interpolation and dup/drop correction over a sequence and streams
/// the result to a [`FrameSink`].
pub struct Renderer<'a> {
    opts: RenderOpts,
    flow: &'a dyn OpticalFlow,
    interp: &'a dyn Interpolator,
    sink: &'a mut dyn FrameSink,
    preview: Option<&'a mut dyn FrameSink>,
    hud: Option<Hud>,
    cancel: CancelToken,
    progress: Option<Box<dyn FnMut(u64, u64) + 'a>>,
    flow_summary: String,
    regions_to_render: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(
        opts: RenderOpts,
        flow: &'a dyn OpticalFlow,
        interp: &'a dyn Interpolator,
        sink: &'a mut dyn FrameSink,
    ) -> Self {
        let flow_summary = flow.params().summary();
        Self {
            opts,
            flow,
            interp,
            sink,
            preview: None,
            hud: None,
            cancel: CancelToken::new(),
            progress: None,
            flow_summary,
            regions_to_render: 0,
        }
    }

    /// Mirror every written frame, with a progress bar, to `preview`.
    pub fn with_preview(mut self, preview: &'a mut dyn FrameSink) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Stamp the debug HUD onto written frames.
    pub fn with_hud(mut self, hud: Hud) -> Self {
        self.hud = Some(hud);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Called with `(written, to_render)` after every written frame.
    pub fn on_progress(mut self, f: impl FnMut(u64, u64) + 'a) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Render `seq` from `source`. The sink is begun and ended here; the source is closed
    /// once every region has been walked.
    #[tracing::instrument(skip_all, fields(rate = self.opts.rate, out = %self.opts.out_dims))]
    pub fn render(
        &mut self,
        source: &mut dyn FrameSource,
        seq: &VideoSequence,
    ) -> ButterflowResult<RenderReport> {
        self.opts.validate()?;
        let regions = renderable_regions(seq, self.opts.keep_subregions);
        if regions.is_empty() {
            return Err(ButterflowError::invalid_input(
                "nothing to render: no subregions selected",
            ));
        }
        self.regions_to_render = regions.len();

        let src_dims = Dimensions {
            width: source.width(),
            height: source.height(),
        };
        let scaling = Scaling::new(src_dims, &self.opts);
        let mut report = RenderReport {
            frs_to_render: total_to_render(regions.iter().copied(), self.opts.rate),
            ..RenderReport::default()
        };
        tracing::info!(
            regions = regions.len(),
            to_render = report.frs_to_render,
            src = %src_dims,
            work = %scaling.work,
            "render start"
        );

        let cfg = SinkConfig {
            width: self.opts.out_dims.width,
            height: self.opts.out_dims.height,
            rate: self.opts.rate,
        };
        self.sink.begin(cfg)?;
        if let Some(preview) = self.preview.as_deref_mut() {
            preview.begin(cfg)?;
        }

        for (i, sub) in regions.into_iter().enumerate() {
            self.cancel.check()?;
            let region = self.render_region(source, sub, i + 1, &scaling, &report)?;
            report.absorb(&region.stats);
            report.regions.push(region);
        }

        if let Some(preview) = self.preview.as_deref_mut() {
            preview.end()?;
        }
        self.sink.end()?;
        source.close();

        if report.frs_written != report.frs_to_render {
            tracing::warn!(
                written = report.frs_written,
                to_render = report.frs_to_render,
                "frame count differs from target"
            );
        }
        tracing::info!(
            written = report.frs_written,
            source = report.source_frs,
            interpolated = report.frs_interpolated,
            duped = report.frs_duped,
            dropped = report.frs_dropped,
            "render finished"
        );
        Ok(report)
    }

    fn render_region(
        &mut self,
        source: &mut dyn FrameSource,
        sub: &Subregion,
        idx: usize,
        scaling: &Scaling,
        totals: &RenderReport,
    ) -> ButterflowResult<RegionReport> {
        let plan = RegionPlan::new(sub, self.opts.rate);
        tracing::debug!(
            region = idx,
            %sub,
            reg_len = plan.reg_len,
            to_render = plan.to_render,
            int_each_go = plan.int_each_go,
            will_make = plan.will_make,
            extra = plan.extra,
            drp_every = plan.drp_every,
            dup_every = plan.dup_every,
            "region plan"
        );
        let mut walk = Walk {
            sub,
            idx,
            plan,
            state: RegionState::Init,
            work_idx: 0,
            stats: RegionStats::default(),
        };

        source.seek_to(sub.fa - 1)?;
        let first = source.read()?.ok_or_else(|| {
            ButterflowError::decode(format!("region {idx}: first frame {} is missing", sub.fa))
        })?;
        let mut fr2 = scaling.on_read(first)?;
        walk.stats.src_seen += 1;
        walk.transition(RegionState::Primed);

        if plan.single_frame {
            walk.transition(RegionState::Final);
            self.final_run(&mut walk, &fr2, sub.fa, scaling, totals)?;
        } else {
            walk.transition(RegionState::Iterating);
            for run in 0..plan.reg_len {
                self.cancel.check()?;
                let pair_a = sub.fa + run;
                let next = if run + 1 < plan.reg_len {
                    self.read_next(source, &walk, pair_a + 1)?
                } else {
                    None
                };
                match next {
                    Some(frame) => {
                        let fr1 = std::mem::replace(&mut fr2, scaling.on_read(frame)?);
                        walk.stats.src_seen += 1;
                        self.pair_run(&mut walk, &fr1, &fr2, pair_a, scaling, totals)?;
                    }
                    None => {
                        walk.transition(RegionState::Final);
                        self.final_run(&mut walk, &fr2, pair_a, scaling, totals)?;
                        break;
                    }
                }
            }
        }

        if walk.stats.written != plan.to_render {
            tracing::warn!(
                region = idx,
                written = walk.stats.written,
                to_render = plan.to_render,
                "region frame count differs from target"
            );
        }
        tracing::debug!(region = idx, stats = ?walk.stats, "region done");
        Ok(RegionReport {
            subregion: sub.clone(),
            plan,
            stats: walk.stats,
        })
    }

    /// Next source frame, or `None` when the region has to end early.
    fn read_next(
        &self,
        source: &mut dyn FrameSource,
        walk: &Walk<'_>,
        frame_no: u64,
    ) -> ButterflowResult<Option<Frame>> {
        match source.read() {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => {
                tracing::warn!(region = walk.idx, frame = frame_no, "source ended early");
                Ok(None)
            }
            Err(ButterflowError::Decode(msg)) => {
                tracing::warn!(region = walk.idx, frame = frame_no, "could not read frame: {msg}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// One source pair: predict drops, interpolate what survives and write the queue.
    fn pair_run(
        &mut self,
        walk: &mut Walk<'_>,
        fr1: &Frame,
        fr2: &Frame,
        pair_a: u64,
        scaling: &Scaling,
        totals: &RenderReport,
    ) -> ButterflowResult<()> {
        let ieg = walk.plan.int_each_go;
        let n_drop = (0..=ieg)
            .filter(|x| cadence_fires(walk.work_idx + x, walk.plan.drp_every))
            .count() as u64;

        if n_drop > ieg {
            tracing::trace!(region = walk.idx, pair_a, "whole pair dropped");
            walk.work_idx += n_drop;
            walk.stats.dropped += n_drop;
            return Ok(());
        }

        let n = (ieg - n_drop) as usize;
        let interpolated = if n > 0 {
            let (g1, g2) = (fr1.to_gray(), fr2.to_gray());
            let fwd = self.flow.calc(&g1, &g2)?;
            let bwd = self.flow.calc(&g2, &g1)?;
            let frames = self
                .interp
                .interpolate(&fr1.to_unit(), &fr2.to_unit(), &fwd, &bwd, n)?;
            if frames.len() != n {
                tracing::warn!(got = frames.len(), expected = n, "unexpected interpolated count");
            }
            frames
        } else {
            Vec::new()
        };
        tracing::trace!(region = walk.idx, pair_a, interpolated = n, dropped = n_drop, "pair");
        walk.stats.dropped += n_drop;

        let pair_b = pair_a + 1;
        self.write_item(
            walk,
            fr1,
            Item {
                kind: FrameKind::Source,
                pair_a,
                pair_b,
                btw_idx: 1,
            },
            scaling,
            totals,
        )?;
        for (i, frame) in interpolated.iter().enumerate() {
            self.write_item(
                walk,
                frame,
                Item {
                    kind: FrameKind::Interpolated,
                    pair_a,
                    pair_b,
                    btw_idx: i + 2,
                },
                scaling,
                totals,
            )?;
        }
        walk.work_idx += n_drop;
        Ok(())
    }

    /// Write one work item, twice when the dup cadence fires.
    ///
    /// Writes are capped at the frames the region still needs; the cap wins over the
    /// cadence, so an item arriving after the target is met is counted as dropped.
    fn write_item(
        &mut self,
        walk: &mut Walk<'_>,
        frame: &Frame,
        item: Item,
        scaling: &Scaling,
        totals: &RenderReport,
    ) -> ButterflowResult<()> {
        walk.work_idx += 1;
        let needed = if cadence_fires(walk.work_idx, walk.plan.dup_every) {
            2
        } else {
            1
        };
        let writes = needed.min(walk.remaining());
        if writes == 0 {
            walk.stats.dropped += 1;
            return Ok(());
        }
        self.write_copies(walk, frame, item, writes, scaling, totals)
    }

    /// Write the last frame of the region as often as needed to reach its target.
    ///
    /// The drop cadence is not consulted here. The frame is written whenever the region is
    /// short and dropped only when the target is already met, so the cap decides alone.
    fn final_run(
        &mut self,
        walk: &mut Walk<'_>,
        frame: &Frame,
        pair_a: u64,
        scaling: &Scaling,
        totals: &RenderReport,
    ) -> ButterflowResult<()> {
        walk.work_idx += 1;
        let remaining = walk.remaining();
        if remaining == 0 {
            walk.stats.dropped += 1;
        } else {
            let item = Item {
                kind: FrameKind::Source,
                pair_a,
                pair_b: pair_a,
                btw_idx: 1,
            };
            self.write_copies(walk, frame, item, remaining, scaling, totals)?;
        }
        walk.transition(RegionState::Done);
        Ok(())
    }

    fn write_copies(
        &mut self,
        walk: &mut Walk<'_>,
        frame: &Frame,
        item: Item,
        count: u64,
        scaling: &Scaling,
        totals: &RenderReport,
    ) -> ButterflowResult<()> {
        for i in 0..count {
            let is_dupe = i > 0;
            if is_dupe {
                walk.stats.duped += 1;
            } else if item.kind == FrameKind::Source {
                walk.stats.source += 1;
            } else {
                walk.stats.interpolated += 1;
            }
            walk.stats.written += 1;
            let written_total = totals.frs_written + walk.stats.written;

            let mut out = scaling.for_output(frame)?;
            if let Some(hud) = self.hud.as_mut() {
                let info = HudInfo {
                    rate: self.opts.rate,
                    flow_summary: &self.flow_summary,
                    frame_number: written_total,
                    pair_a: item.pair_a,
                    pair_b: item.pair_b,
                    btw_idx: item.btw_idx,
                    kind: item.kind,
                    is_dupe,
                    region: walk.sub,
                    region_idx: walk.idx,
                    regions_to_render: self.regions_to_render,
                    to_render: walk.plan.to_render,
                    written: walk.stats.written,
                    drp_every: walk.plan.drp_every,
                    dup_every: walk.plan.dup_every,
                    src_seen: walk.stats.src_seen,
                    interpolated: walk.stats.interpolated,
                    dropped: walk.stats.dropped,
                    duped: walk.stats.duped,
                };
                hud.draw_info(out.to_mut(), &info);
            }
            if self.opts.marker {
                draw_marker(out.to_mut(), item.kind);
            }
            self.sink.push_frame(&out)?;

            if let Some(preview) = self.preview.as_deref_mut() {
                let mut shown = out.into_owned();
                draw_progress_bar(
                    &mut shown,
                    written_total as f64 / totals.frs_to_render.max(1) as f64,
                );
                if let Err(e) = preview.push_frame(&shown) {
                    tracing::warn!("preview stopped: {e}");
                    self.preview = None;
                }
            }
            if let Some(progress) = self.progress.as_mut() {
                progress(written_total, totals.frs_to_render);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/renderer.rs"]
mod tests;
