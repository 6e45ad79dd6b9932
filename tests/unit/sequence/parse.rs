use super::*;

#[test]
fn time_forms() {
    assert_eq!(parse_time_ms("00:00:00.5", 0.0).unwrap(), 500.0);
    assert_eq!(parse_time_ms("01:02:03.25", 0.0).unwrap(), 3_723_250.0);
    assert_eq!(parse_time_ms("1:30", 0.0).unwrap(), 90_000.0);
    assert_eq!(parse_time_ms("2.3", 0.0).unwrap(), 2_300.0);
    assert_eq!(parse_time_ms("75", 0.0).unwrap(), 75_000.0);
    assert_eq!(parse_time_ms("end", 3003.0).unwrap(), 3003.0);
}

#[test]
fn time_syntax_errors() {
    for s in [
        "", "abc", "1:2:3:4", "1.2.3", "00:61", "00:00:75.0", "01:75:00", "1:", "1.5:00",
        "9999999999999999999:00:00",
    ] {
        assert!(
            matches!(parse_time_ms(s, 1000.0), Err(ButterflowError::BadTimeSyntax(_))),
            "{s:?}"
        );
    }
}

#[test]
fn target_forms() {
    assert_eq!(parse_target("fps", "48").unwrap(), Target::Fps(48.0));
    assert_eq!(
        parse_target("fps", "24000/1001").unwrap(),
        Target::Fps(24000.0 / 1001.0)
    );
    assert_eq!(parse_target("dur", "6").unwrap(), Target::Dur(6000.0));
    assert_eq!(parse_target("spd", "0.25").unwrap(), Target::Spd(0.25));
}

#[test]
fn target_errors() {
    for (k, v) in [("fps", "0"), ("fps", "1/0"), ("spd", "-1"), ("dur", "x"), ("rate", "2")] {
        assert!(
            matches!(parse_target(k, v), Err(ButterflowError::BadTargetValue(_))),
            "{k}={v}"
        );
    }
}

#[test]
fn two_region_spec() {
    let seq = parse_sequence(
        "a=00:00:00.5,b=00:00:01.2,fps=48:a=00:00:02.3,b=00:00:03.3,fps=24000/1001",
        3500.0,
        105,
    )
    .unwrap();
    let user: Vec<&Subregion> = seq.user_subregions().collect();
    assert_eq!(user.len(), 2);
    assert_eq!((user[0].ta, user[0].tb), (500.0, 1200.0));
    assert_eq!(user[0].target, Target::Fps(48.0));
    assert_eq!((user[1].ta, user[1].tb), (2300.0, 3300.0));
    assert_eq!(user[1].target, Target::Fps(24000.0 / 1001.0));
}

#[test]
fn full_spec_covers_source() {
    let seq = parse_sequence("full,spd=0.5", 3003.0, 90).unwrap();
    assert_eq!(seq.subregions().len(), 1);
    let s = &seq.subregions()[0];
    assert!(!s.skip);
    assert_eq!((s.ta, s.tb, s.fa, s.fb), (0.0, 3003.0, 1, 90));
}

#[test]
fn end_resolves_to_duration() {
    let seq = parse_sequence("a=1,b=end,dur=4", 3003.0, 90).unwrap();
    let s = seq.user_subregions().next().unwrap();
    assert_eq!(s.tb, 3003.0);
    assert_eq!(s.target, Target::Dur(4000.0));
}

#[test]
fn spec_errors_are_classified() {
    assert!(matches!(
        parse_sequence("a=0,b=5,spd=0.5", 3003.0, 90),
        Err(ButterflowError::RegionOutOfBounds(_))
    ));
    assert!(matches!(
        parse_sequence("a=2,b=1,spd=0.5", 3003.0, 90),
        Err(ButterflowError::RegionOutOfBounds(_))
    ));
    assert!(matches!(
        parse_sequence("a=0,b=2,spd=0.5:a=1,b=3,spd=2", 3003.0, 90),
        Err(ButterflowError::RegionIntersects(_))
    ));
    assert!(matches!(
        parse_sequence("a=0,b=1,spd", 3003.0, 90),
        Err(ButterflowError::BadTargetValue(_))
    ));
    assert!(matches!(
        parse_sequence("a=0,b=1:00:00:00,spd=1", 3003.0, 90),
        Err(ButterflowError::BadTimeSyntax(_))
    ));
    assert!(matches!(
        parse_sequence("a=9999999999999999999:00:00,b=end,spd=1", 3003.0, 90),
        Err(ButterflowError::BadTimeSyntax(_))
    ));
    assert!(matches!(
        parse_sequence("b=1,a=0,spd=1", 3003.0, 90),
        Err(ButterflowError::InvalidInput(_))
    ));
}

#[test]
fn playback_rates() {
    assert_eq!(parse_playback_rate("60", 29.97).unwrap(), 60.0);
    assert_eq!(parse_playback_rate("59.94", 29.97).unwrap(), 59.94);
    assert_eq!(parse_playback_rate("30000/1001", 0.0).unwrap(), 30000.0 / 1001.0);
    assert_eq!(parse_playback_rate("2x", 30.0).unwrap(), 60.0);
    assert_eq!(parse_playback_rate("0.5x", 30.0).unwrap(), 15.0);
    assert!(parse_playback_rate("0", 30.0).is_err());
    assert!(parse_playback_rate("fast", 30.0).is_err());
    assert!(parse_playback_rate("-2x", 30.0).is_err());
}

#[test]
fn video_scales() {
    let src = Dimensions::new(640, 360).unwrap();
    let d = |w, h| Dimensions::new(w, h).unwrap();
    assert_eq!(parse_video_scale("1280x720", src).unwrap(), d(1280, 720));
    assert_eq!(parse_video_scale("1280:-1", src).unwrap(), d(1280, 720));
    assert_eq!(parse_video_scale("-1:720", src).unwrap(), d(1280, 720));
    assert_eq!(parse_video_scale("0.5", src).unwrap(), d(320, 180));
    assert_eq!(parse_video_scale("641x359", src).unwrap(), d(642, 360));
    assert!(parse_video_scale("-1:-1", src).is_err());
    assert!(parse_video_scale("0x10", src).is_err());
    assert!(parse_video_scale("big", src).is_err());
}
