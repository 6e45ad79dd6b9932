use super::*;

fn clip(n: u8) -> Vec<Frame> {
    (0..n).map(|i| Frame::filled(4, 2, [i, i, i])).collect()
}

#[test]
fn reads_in_order_then_none() {
    let mut src = InMemoryFrameSource::new(clip(3), 30.0).unwrap();
    assert_eq!(src.frames(), 3);
    assert_eq!((src.width(), src.height()), (4, 2));
    assert!((src.duration_ms() - 100.0).abs() < 1e-9);
    for i in 0..3 {
        assert_eq!(src.read().unwrap().unwrap().pixel(0, 0), [i, i, i]);
    }
    assert!(src.read().unwrap().is_none());
    assert!(src.read().unwrap().is_none());
}

#[test]
fn seeks_both_directions() {
    let mut src = InMemoryFrameSource::new(clip(5), 25.0).unwrap();
    src.seek_to(3).unwrap();
    assert_eq!(src.read().unwrap().unwrap().pixel(0, 0), [3, 3, 3]);
    src.seek_to(1).unwrap();
    assert_eq!(src.position(), 1);
    assert_eq!(src.read().unwrap().unwrap().pixel(0, 0), [1, 1, 1]);
}

#[test]
fn seek_past_end_is_out_of_range() {
    let mut src = InMemoryFrameSource::new(clip(2), 25.0).unwrap();
    assert!(matches!(src.seek_to(2), Err(ButterflowError::OutOfRange(_))));
    assert!(src.seek_to(1).is_ok());
}

#[test]
fn injected_failure_is_a_decode_error() {
    let mut src = InMemoryFrameSource::new(clip(3), 25.0)
        .unwrap()
        .with_decode_failure(1);
    assert!(src.read().unwrap().is_some());
    assert!(matches!(src.read(), Err(ButterflowError::Decode(_))));
}

#[test]
fn close_is_idempotent() {
    let mut src = InMemoryFrameSource::new(clip(2), 25.0).unwrap();
    src.close();
    src.close();
    assert!(src.is_closed());
    assert!(src.read().is_err());
}

#[test]
fn rejects_empty_and_mixed_sizes() {
    assert!(InMemoryFrameSource::new(Vec::new(), 25.0).is_err());
    let mixed = vec![Frame::filled(2, 2, [0; 3]), Frame::filled(4, 2, [0; 3])];
    assert!(InMemoryFrameSource::new(mixed, 25.0).is_err());
    assert!(InMemoryFrameSource::new(clip(1), 0.0).is_err());
}
