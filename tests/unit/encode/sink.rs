use super::*;

#[test]
fn collects_frames_in_order() {
    let mut sink = InMemorySink::new();
    sink.begin(SinkConfig {
        width: 2,
        height: 2,
        rate: 30.0,
    })
    .unwrap();
    for v in [1u8, 2, 3] {
        sink.push_frame(&Frame::filled(2, 2, [v; 3])).unwrap();
    }
    sink.end().unwrap();
    assert!(sink.is_ended());
    let firsts: Vec<u8> = sink.frames.iter().map(|f| f.data[0]).collect();
    assert_eq!(firsts, vec![1, 2, 3]);
}

#[test]
fn rejects_unstarted_and_mismatched_frames() {
    let mut sink = InMemorySink::new();
    assert!(sink.push_frame(&Frame::filled(2, 2, [0; 3])).is_err());
    sink.begin(SinkConfig {
        width: 2,
        height: 2,
        rate: 24.0,
    })
    .unwrap();
    assert!(matches!(
        sink.push_frame(&Frame::filled(4, 2, [0; 3])),
        Err(ButterflowError::Encode(_))
    ));
}

#[test]
fn config_validation() {
    let bad_rate = SinkConfig {
        width: 2,
        height: 2,
        rate: 0.0,
    };
    assert!(bad_rate.validate().is_err());
    let empty = SinkConfig {
        width: 0,
        height: 2,
        rate: 30.0,
    };
    assert!(InMemorySink::new().begin(empty).is_err());
}
