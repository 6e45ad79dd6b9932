use super::*;

fn spd(ta: f64, tb: f64) -> Subregion {
    Subregion::new(ta, tb, Target::Spd(0.5)).unwrap()
}

fn counts(seq: &VideoSequence) -> (usize, usize) {
    let skip = seq.subregions().iter().filter(|s| s.skip).count();
    (seq.subregions().len() - skip, skip)
}

#[test]
fn relative_position_clamps() {
    let seq = VideoSequence::new(5.0, 5).unwrap();
    assert_eq!(seq.relative_position(0.0), 0.0);
    assert_eq!(seq.relative_position(2.5), 0.5);
    assert_eq!(seq.relative_position(2.6), 0.52);
    assert_eq!(seq.relative_position(5.0), 1.0);
    assert_eq!(seq.relative_position(7.0), 1.0);
    assert_eq!(seq.relative_position(-1.0), 0.0);
}

#[test]
fn nearest_frame_is_one_indexed_and_clamped() {
    let seq = VideoSequence::new(1000.0, 4).unwrap();
    assert_eq!(seq.nearest_frame(0.0), 1);
    assert_eq!(seq.nearest_frame(100.0), 1);
    assert_eq!(seq.nearest_frame(250.0), 1);
    assert_eq!(seq.nearest_frame(380.0), 2);
    assert_eq!(seq.nearest_frame(500.0), 2);
    assert_eq!(seq.nearest_frame(1000.0), 4);
    assert_eq!(seq.nearest_frame(5000.0), 4);
}

#[test]
fn nearest_frame_is_monotonic_and_idempotent() {
    let seq = VideoSequence::new(3003.0, 90).unwrap();
    let mut prev = 0;
    for i in 0..=3003 {
        let t = i as f64;
        let f = seq.nearest_frame(t);
        assert!(f >= prev, "t={t}");
        assert_eq!(f, seq.nearest_frame(t));
        prev = f;
    }
}

#[test]
fn new_sequence_is_one_gap() {
    let seq = VideoSequence::new(3003.0, 90).unwrap();
    assert_eq!(counts(&seq), (0, 1));
    let g = &seq.subregions()[0];
    assert_eq!((g.fa, g.fb), (1, 90));
    assert_eq!(g.target, Target::Spd(1.0));
    assert!(seq.validate().is_ok());
}

#[test]
fn whole_region_replaces_gap() {
    let seq = VideoSequence::whole(3003.0, 90, Target::Fps(60.0)).unwrap();
    assert_eq!(counts(&seq), (1, 0));
    let s = &seq.subregions()[0];
    assert_eq!((s.fa, s.fb, s.ra, s.rb), (1, 90, 0.0, 1.0));
}

#[test]
fn gaps_fill_around_user_regions() {
    let mut seq = VideoSequence::new(1000.0, 3).unwrap();
    seq.add_subregion(spd(0.0, 100.0)).unwrap();
    assert_eq!(counts(&seq), (1, 1));
    seq.add_subregion(spd(900.0, 1000.0)).unwrap();
    assert_eq!(counts(&seq), (2, 1));
    seq.add_subregion(spd(660.0, 660.0)).unwrap();
    assert_eq!(counts(&seq), (3, 2));
    assert!(seq.validate().is_ok());

    let mut seq = VideoSequence::new(1000.0, 5).unwrap();
    seq.add_subregion(spd(200.0, 400.0)).unwrap();
    seq.add_subregion(spd(600.0, 800.0)).unwrap();
    assert_eq!(counts(&seq), (2, 3));
    seq.add_subregion(spd(400.0, 600.0)).unwrap();
    assert_eq!(counts(&seq), (3, 2));
    seq.add_subregion(spd(800.0, 1000.0)).unwrap();
    assert_eq!(counts(&seq), (4, 1));
    seq.add_subregion(spd(0.0, 200.0)).unwrap();
    assert_eq!(counts(&seq), (5, 0));
    assert!(seq.validate().is_ok());
}

#[test]
fn regions_are_sorted_by_end_then_start() {
    let mut seq = VideoSequence::new(10_000.0, 300).unwrap();
    seq.add_subregion(spd(6000.0, 7000.0)).unwrap();
    seq.add_subregion(spd(1000.0, 2000.0)).unwrap();
    seq.add_subregion(spd(3000.0, 3000.0)).unwrap();
    let ends: Vec<f64> = seq.subregions().iter().map(|s| s.tb).collect();
    let mut sorted = ends.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(ends, sorted);
    assert_eq!(seq.subregions().first().unwrap().ta, 0.0);
    assert_eq!(seq.subregions().last().unwrap().tb, 10_000.0);
}

#[test]
fn overlapping_region_is_a_constraint_violation() {
    let mut seq = VideoSequence::new(1000.0, 100).unwrap();
    seq.add_subregion(spd(100.0, 200.0)).unwrap();
    let err = seq.add_subregion(spd(150.0, 250.0)).unwrap_err();
    assert!(matches!(err, ButterflowError::ConstraintViolation(_)));
    assert!(seq.find_intersection(&spd(150.0, 250.0)).is_some());
    assert!(seq.find_intersection(&spd(200.0, 250.0)).is_none());
    assert_eq!(counts(&seq), (1, 2));
}

#[test]
fn out_of_bounds_region_is_rejected() {
    let mut seq = VideoSequence::new(1000.0, 100).unwrap();
    assert!(matches!(
        seq.add_subregion(spd(900.0, 1200.0)),
        Err(ButterflowError::ConstraintViolation(_))
    ));
}

#[test]
fn frame_collisions_are_intersections() {
    // Both regions land on frame 1 of a two-frame source.
    let mut seq = VideoSequence::new(1000.0, 2).unwrap();
    seq.add_subregion(spd(0.0, 100.0)).unwrap();
    assert!(seq.add_subregion(spd(150.0, 200.0)).is_err());
}

#[test]
fn rescale_round_trip_restores_endpoints() {
    let mut seq = VideoSequence::new(3003.0, 90).unwrap();
    seq.add_subregion(spd(500.0, 1200.0)).unwrap();
    seq.add_subregion(spd(2300.0, 3003.0)).unwrap();
    let before: Vec<(f64, f64, u64, u64)> = seq
        .subregions()
        .iter()
        .map(|s| (s.ta, s.tb, s.fa, s.fb))
        .collect();

    seq.recalculate(6006.0, 180).unwrap();
    let user: Vec<&Subregion> = seq.user_subregions().collect();
    assert!((user[0].ta - 1000.0).abs() < 1e-6);
    assert!((user[1].tb - 6006.0).abs() < 1e-6);

    seq.recalculate(3003.0, 90).unwrap();
    let after: Vec<(f64, f64, u64, u64)> = seq
        .subregions()
        .iter()
        .map(|s| (s.ta, s.tb, s.fa, s.fb))
        .collect();
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert!((b.0 - a.0).abs() < 1e-6 && (b.1 - a.1).abs() < 1e-6);
        assert!(b.2.abs_diff(a.2) <= 1 && b.3.abs_diff(a.3) <= 1);
    }
}

#[test]
fn failed_rescale_leaves_sequence_untouched() {
    let mut seq = VideoSequence::new(3000.0, 90).unwrap();
    seq.add_subregion(spd(0.0, 100.0)).unwrap();
    seq.add_subregion(spd(200.0, 300.0)).unwrap();
    let before = seq.clone();

    let err = seq.recalculate(3000.0, 3).unwrap_err();
    assert!(matches!(err, ButterflowError::ConstraintViolation(_)));
    assert_eq!(seq, before);
    assert_eq!(seq.frames(), 90);
    seq.validate().unwrap();
}

#[test]
fn display_lists_regions() {
    let seq = VideoSequence::new(1500.0, 45).unwrap();
    let s = seq.to_string();
    assert!(s.starts_with("Sequence: Duration=0:00:01.500 (1.50s), Frames=45"));
    assert!(s.contains("Subregion (0): Time=0:00:00.000-0:00:01.500"));
}

#[test]
fn construction_rejects_empty_sources() {
    assert!(VideoSequence::new(0.0, 10).is_err());
    assert!(VideoSequence::new(1000.0, 0).is_err());
}
