use super::*;
use crate::encode::sink::InMemorySink;
use crate::media::source::InMemoryFrameSource;
use crate::motion::flow::{FlowField, FlowParams};
use crate::motion::interpolate::CpuInterpolator;
use crate::media::frame::GrayFrame;
use crate::sequence::subregion::Target;
use std::sync::atomic::{AtomicUsize, Ordering};

const NTSC: f64 = 30000.0 / 1001.0;

struct StillFlow(FlowParams);

impl OpticalFlow for StillFlow {
    fn params(&self) -> &FlowParams {
        &self.0
    }

    fn calc(&self, a: &GrayFrame, _b: &GrayFrame) -> ButterflowResult<FlowField> {
        Ok(FlowField::zeros(a.width, a.height))
    }
}

struct CountingFlow {
    params: FlowParams,
    calls: AtomicUsize,
}

impl OpticalFlow for CountingFlow {
    fn params(&self) -> &FlowParams {
        &self.params
    }

    fn calc(&self, a: &GrayFrame, _b: &GrayFrame) -> ButterflowResult<FlowField> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FlowField::zeros(a.width, a.height))
    }
}

fn clip(n: u8) -> Vec<Frame> {
    (0..n).map(|i| Frame::filled(8, 8, [i, i, i])).collect()
}

fn source(n: u8, rate: f64) -> InMemoryFrameSource {
    InMemoryFrameSource::new(clip(n), rate).unwrap()
}

fn opts(rate: f64, w: u32, h: u32) -> RenderOpts {
    RenderOpts {
        rate,
        out_dims: Dimensions { width: w, height: h },
        scaler_up: ScaleFilter::Triangle,
        scaler_dn: ScaleFilter::CatmullRom,
        keep_subregions: false,
        marker: false,
    }
}

fn run(
    src: &mut InMemoryFrameSource,
    seq: &VideoSequence,
    opts: RenderOpts,
) -> (ButterflowResult<RenderReport>, InMemorySink) {
    let flow = StillFlow(FlowParams::default());
    let interp = CpuInterpolator::new(Some(2), CancelToken::new()).unwrap();
    let mut sink = InMemorySink::new();
    let res = Renderer::new(opts, &flow, &interp, &mut sink).render(src, seq);
    (res, sink)
}

#[test]
fn unchanged_speed_passes_every_source_frame_through() {
    let mut src = source(90, NTSC);
    let seq = VideoSequence::whole(src.duration_ms(), 90, Target::Spd(1.0)).unwrap();
    let (res, sink) = run(&mut src, &seq, opts(NTSC, 8, 8));
    let report = res.unwrap();
    assert_eq!(report.frs_to_render, 90);
    assert_eq!(report.frs_written, 90);
    assert_eq!(report.source_frs, 90);
    assert_eq!(report.frs_interpolated, 0);
    assert_eq!(sink.frames, clip(90));
    assert!(sink.is_ended());
    assert!(src.is_closed());
}

#[test]
fn doubling_the_rate_drops_surplus_intermediates() {
    let mut src = source(90, NTSC);
    let seq = VideoSequence::whole(src.duration_ms(), 90, Target::Fps(60.0)).unwrap();
    let (res, sink) = run(&mut src, &seq, opts(NTSC, 8, 8));
    let report = res.unwrap();
    assert_eq!(report.frs_to_render, 180);
    assert_eq!(report.frs_written, 180);
    assert_eq!(report.source_frs, 89);
    assert_eq!(report.frs_interpolated, 91);
    assert_eq!(report.frs_dropped, 88);
    assert_eq!(report.frs_duped, 0);
    assert_eq!(sink.frames.len(), 180);
    // output starts with the first source frame and never runs backwards
    assert_eq!(sink.frames[0].pixel(0, 0), [0, 0, 0]);
    let lumas: Vec<u8> = sink.frames.iter().map(|f| f.pixel(0, 0)[0]).collect();
    assert!(lumas.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn decode_failure_ends_region_and_flushes_duplicates() {
    let mut src = source(90, NTSC).with_decode_failure(40);
    let seq = VideoSequence::whole(src.duration_ms(), 90, Target::Fps(60.0)).unwrap();
    let (res, sink) = run(&mut src, &seq, opts(NTSC, 8, 8));
    let report = res.unwrap();
    assert_eq!(report.frs_written, 180);
    assert_eq!(report.source_frs, 40);
    assert_eq!(report.frs_interpolated, 40);
    assert_eq!(report.frs_duped, 100);
    assert_eq!(sink.frames.len(), 180);
    assert_eq!(sink.frames[179].pixel(0, 0), [39, 39, 39]);
}

#[test]
fn single_frame_region_is_repeated_to_target() {
    let mut src = source(1, 10.0);
    let seq = VideoSequence::whole(src.duration_ms(), 1, Target::Dur(500.0)).unwrap();
    let (res, sink) = run(&mut src, &seq, opts(10.0, 8, 8));
    let report = res.unwrap();
    assert_eq!(report.frs_written, 5);
    assert_eq!(report.source_frs, 1);
    assert_eq!(report.frs_duped, 4);
    assert!(report.regions[0].plan.single_frame);
    assert_eq!(sink.frames.len(), 5);
}

#[test]
fn extreme_speedup_writes_a_single_source_frame() {
    let mut src = source(90, NTSC);
    let seq = VideoSequence::whole(src.duration_ms(), 90, Target::Spd(1000.0)).unwrap();
    let flow = CountingFlow {
        params: FlowParams::default(),
        calls: AtomicUsize::new(0),
    };
    let interp = CpuInterpolator::new(Some(1), CancelToken::new()).unwrap();
    let mut sink = InMemorySink::new();
    let report = Renderer::new(opts(NTSC, 8, 8), &flow, &interp, &mut sink)
        .render(&mut src, &seq)
        .unwrap();
    assert_eq!(report.frs_to_render, 1);
    assert_eq!(report.frs_written, 1);
    assert_eq!(report.source_frs, 1);
    assert_eq!(report.frs_interpolated, 0);
    assert_eq!(report.frs_duped, 0);
    assert!(report.regions[0].plan.single_frame);
    assert_eq!(flow.calls.load(Ordering::SeqCst), 0);
    assert_eq!(sink.frames, clip(1));
}

#[test]
fn gap_regions_render_only_when_kept() {
    let mut seq = VideoSequence::new(3000.0, 90).unwrap();
    seq.add_subregion(Subregion::new(1000.0, 2000.0, Target::Spd(0.5)).unwrap())
        .unwrap();

    let mut src = source(90, 30.0);
    let (res, _) = run(&mut src, &seq, opts(30.0, 8, 8));
    let report = res.unwrap();
    assert_eq!(report.regions.len(), 1);
    assert_eq!(report.frs_written, 60);

    let mut kept = opts(30.0, 8, 8);
    kept.keep_subregions = true;
    let mut src = source(90, 30.0);
    let (res, sink) = run(&mut src, &seq, kept);
    let report = res.unwrap();
    assert_eq!(report.regions.len(), 3);
    assert_eq!(report.frs_written, report.frs_to_render);
    assert_eq!(sink.frames.len() as u64, report.frs_written);
}

#[test]
fn frames_are_scaled_to_output_size() {
    let seq = VideoSequence::whole(1000.0, 10, Target::Spd(0.5)).unwrap();

    let mut src = source(10, 10.0);
    let (res, sink) = run(&mut src, &seq, opts(10.0, 4, 4));
    res.unwrap();
    assert!(sink.frames.iter().all(|f| f.width == 4 && f.height == 4));

    let mut src = source(10, 10.0);
    let (res, sink) = run(&mut src, &seq, opts(10.0, 16, 16));
    res.unwrap();
    assert!(sink.frames.iter().all(|f| f.width == 16 && f.height == 16));
}

#[test]
fn preview_and_progress_see_every_frame() {
    let mut src = source(30, 30.0);
    let seq = VideoSequence::whole(src.duration_ms(), 30, Target::Spd(0.5)).unwrap();
    let flow = StillFlow(FlowParams::default());
    let interp = CpuInterpolator::new(Some(1), CancelToken::new()).unwrap();
    let mut sink = InMemorySink::new();
    let mut preview = InMemorySink::new();
    let mut seen = Vec::new();
    let report = Renderer::new(opts(30.0, 8, 8), &flow, &interp, &mut sink)
        .with_preview(&mut preview)
        .on_progress(|w, t| seen.push((w, t)))
        .render(&mut src, &seq)
        .unwrap();
    assert_eq!(preview.frames.len() as u64, report.frs_written);
    assert_eq!(seen.len() as u64, report.frs_written);
    assert_eq!(seen.last(), Some(&(report.frs_written, report.frs_to_render)));
}

#[test]
fn cancelled_render_stops_before_writing() {
    let mut src = source(30, 30.0);
    let seq = VideoSequence::whole(src.duration_ms(), 30, Target::Spd(0.5)).unwrap();
    let flow = StillFlow(FlowParams::default());
    let cancel = CancelToken::new();
    let interp = CpuInterpolator::new(Some(1), cancel.clone()).unwrap();
    let mut sink = InMemorySink::new();
    cancel.cancel();
    let res = Renderer::new(opts(30.0, 8, 8), &flow, &interp, &mut sink)
        .with_cancel(cancel)
        .render(&mut src, &seq);
    assert!(matches!(res, Err(ButterflowError::Cancelled)));
    assert!(sink.frames.is_empty());
    assert!(!sink.is_ended());
}

#[test]
fn bad_rate_is_rejected() {
    let mut src = source(3, 30.0);
    let seq = VideoSequence::whole(src.duration_ms(), 3, Target::Spd(1.0)).unwrap();
    let (res, _) = run(&mut src, &seq, opts(0.0, 8, 8));
    assert!(matches!(res, Err(ButterflowError::InvalidInput(_))));
}
