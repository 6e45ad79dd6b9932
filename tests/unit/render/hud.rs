use super::*;
use crate::sequence::subregion::Target;

#[test]
fn overlays_need_room() {
    let d = |w, h| Dimensions { width: w, height: h };
    assert!(fit_scale(d(768, 216), TXT_W_FITS, TXT_H_FITS, TXT_MIN_SCALE).is_some());
    assert!(fit_scale(d(320, 180), TXT_W_FITS, TXT_H_FITS, TXT_MIN_SCALE).is_none());
    assert!(fit_scale(d(420, 142), BAR_W_FITS, BAR_H_FITS, 1.0).is_some());
    assert!(fit_scale(d(419, 480), BAR_W_FITS, BAR_H_FITS, 1.0).is_none());
}

#[test]
fn marker_color_follows_frame_kind() {
    let mut src = Frame::filled(640, 360, [40, 40, 40]);
    let mut int = src.clone();
    draw_marker(&mut src, FrameKind::Source);
    draw_marker(&mut int, FrameKind::Interpolated);
    assert_eq!(src.pixel(614, 334), WHITE);
    assert_eq!(int.pixel(614, 334), RED);
    assert_eq!(int.pixel(10, 10), [40, 40, 40]);
}

#[test]
fn marker_skips_small_frames() {
    let mut f = Frame::filled(320, 180, [40, 40, 40]);
    let before = f.clone();
    draw_marker(&mut f, FrameKind::Interpolated);
    assert_eq!(f, before);
}

#[test]
fn progress_bar_fills_proportionally() {
    let mut f = Frame::filled(640, 360, [40, 40, 40]);
    draw_progress_bar(&mut f, 0.5);
    assert_eq!(f.pixel(100, 265), WHITE);
    assert_eq!(f.pixel(400, 265), BLACK);
    assert_eq!(f.pixel(320, 100), [40, 40, 40]);
}

#[test]
fn hud_without_font_leaves_frame_alone() {
    let mut sub = Subregion::new(0.0, 1000.0, Target::Spd(0.5)).unwrap();
    sub.fa = 1;
    sub.fb = 30;
    let info = HudInfo {
        rate: 30.0,
        flow_summary: "P: 0.5, L: 3",
        frame_number: 1,
        pair_a: 1,
        pair_b: 2,
        btw_idx: 1,
        kind: FrameKind::Source,
        is_dupe: false,
        region: &sub,
        region_idx: 1,
        regions_to_render: 1,
        to_render: 60,
        written: 1,
        drp_every: 0.0,
        dup_every: 0.0,
        src_seen: 1,
        interpolated: 0,
        dropped: 0,
        duped: 0,
    };
    let right = info.right_lines();
    assert!(right[2].contains("Spd: 0.50"));
    assert!(right[2].contains("Dur: ?"));

    let mut hud = Hud::with_painter(TextType::Light, None);
    assert!(!hud.has_font());
    let mut f = Frame::filled(1280, 720, [40, 40, 40]);
    let before = f.clone();
    hud.draw_info(&mut f, &info);
    assert_eq!(f, before);
}
