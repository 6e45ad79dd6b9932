use super::*;

#[test]
fn defaults_validate() {
    let p = FlowParams::default();
    assert!(p.validate().is_ok());
    assert_eq!(p.poly_n, 5);
    assert_eq!(p.winsize, 25);
    assert_eq!(p.filter, FlowFilter::Box);
}

#[test]
fn validate_rejects_bad_values() {
    let bad = [
        FlowParams {
            pyr_scale: 1.0,
            ..FlowParams::default()
        },
        FlowParams {
            poly_n: 6,
            ..FlowParams::default()
        },
        FlowParams {
            levels: 0,
            ..FlowParams::default()
        },
        FlowParams {
            poly_sigma: 0.0,
            ..FlowParams::default()
        },
    ];
    for p in bad {
        assert!(p.validate().is_err(), "{p:?}");
    }
}

#[test]
fn smooth_motion_only_touches_sigma() {
    let p = FlowParams::default().smooth_motion();
    assert_eq!(p.poly_sigma, SMOOTH_MOTION_POLY_SIGMA);
    assert_eq!(p.winsize, FlowParams::default().winsize);
}

#[test]
fn summary_lists_every_parameter() {
    let s = FlowParams::default().summary();
    assert_eq!(s, "P: 0.50, L: 3, W: 25, I: 3, N: 5, S: 1.10, F: 0, Ff: box");
}

#[test]
fn field_shape_checks() {
    assert!(FlowField::from_planes(2, 2, vec![0.0; 4], vec![0.0; 3]).is_err());
    let f = FlowField::from_planes(2, 1, vec![1.0, 3.0], vec![0.0, -2.0]).unwrap();
    assert_eq!(f.at(1, 0), (3.0, -2.0));
    assert_eq!(f.mean(), (2.0, -1.0));
}

#[test]
fn filter_parse() {
    assert_eq!(FlowFilter::parse("Gaussian").unwrap(), FlowFilter::Gaussian);
    assert!(FlowFilter::parse("median").is_err());
}
