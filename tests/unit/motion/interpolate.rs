use super::*;

fn flat(w: u32, h: u32, v: f32) -> FrameF32 {
    FrameF32 {
        width: w,
        height: h,
        data: vec![v; (w * h * 3) as usize],
    }
}

fn uniform_flow(w: u32, h: u32, u: f32) -> FlowField {
    let n = (w * h) as usize;
    FlowField::from_planes(w, h, vec![u; n], vec![0.0; n]).unwrap()
}

#[test]
fn time_steps_are_evenly_spaced() {
    assert_eq!(time_steps(1), vec![0.5]);
    assert_eq!(time_steps(3), vec![0.25, 0.5, 0.75]);
    assert!(time_steps(0).is_empty());
}

#[test]
fn returns_exactly_n_frames() {
    let interp = CpuInterpolator::new(Some(2), CancelToken::new()).unwrap();
    let (a, b) = (flat(6, 4, 0.0), flat(6, 4, 1.0));
    let z = FlowField::zeros(6, 4);
    for n in 1..=5 {
        let out = interp.interpolate(&a, &b, &z, &z, n).unwrap();
        assert_eq!(out.len(), n);
        assert!(out.iter().all(|f| f.width == 6 && f.height == 4));
    }
}

#[test]
fn zero_flow_cross_fades_in_step_order() {
    let interp = CpuInterpolator::new(None, CancelToken::new()).unwrap();
    let z = FlowField::zeros(2, 2);
    let out = interp
        .interpolate(&flat(2, 2, 0.0), &flat(2, 2, 1.0), &z, &z, 3)
        .unwrap();
    let firsts: Vec<u8> = out.iter().map(|f| f.data[0]).collect();
    assert_eq!(firsts, vec![64, 128, 191]);
}

#[test]
fn moving_dot_lands_halfway() {
    let (w, h) = (8u32, 1u32);
    let mut a = flat(w, h, 0.0);
    let mut b = flat(w, h, 0.0);
    a.data[2 * 3..2 * 3 + 3].copy_from_slice(&[1.0; 3]);
    b.data[4 * 3..4 * 3 + 3].copy_from_slice(&[1.0; 3]);
    let interp = CpuInterpolator::new(Some(1), CancelToken::new()).unwrap();
    let out = interp
        .interpolate(&a, &b, &uniform_flow(w, h, 2.0), &uniform_flow(w, h, -2.0), 1)
        .unwrap();
    assert_eq!(out[0].pixel(3, 0), [255, 255, 255]);
    assert_eq!(out[0].pixel(0, 0), [0, 0, 0]);
}

#[test]
fn zero_steps_is_a_bad_time_step() {
    let interp = CpuInterpolator::new(Some(1), CancelToken::new()).unwrap();
    let z = FlowField::zeros(2, 2);
    let err = interp
        .interpolate(&flat(2, 2, 0.0), &flat(2, 2, 0.0), &z, &z, 0)
        .unwrap_err();
    assert!(matches!(err, ButterflowError::BadTimeStep(_)));
}

#[test]
fn cancelled_token_stops_interpolation() {
    let cancel = CancelToken::new();
    let interp = CpuInterpolator::new(Some(2), cancel.clone()).unwrap();
    cancel.cancel();
    let z = FlowField::zeros(2, 2);
    let err = interp
        .interpolate(&flat(2, 2, 0.0), &flat(2, 2, 1.0), &z, &z, 4)
        .unwrap_err();
    assert!(matches!(err, ButterflowError::Cancelled));
}

#[test]
fn mismatched_shapes_are_rejected() {
    let interp = CpuInterpolator::new(Some(1), CancelToken::new()).unwrap();
    let err = interp
        .interpolate(
            &flat(2, 2, 0.0),
            &flat(2, 2, 0.0),
            &FlowField::zeros(3, 2),
            &FlowField::zeros(2, 2),
            1,
        )
        .unwrap_err();
    assert!(matches!(err, ButterflowError::InvalidInput(_)));
}

#[test]
fn zero_threads_is_rejected() {
    assert!(CpuInterpolator::new(Some(0), CancelToken::new()).is_err());
    assert_eq!(CpuInterpolator::new(Some(3), CancelToken::new()).unwrap().threads(), 3);
}
