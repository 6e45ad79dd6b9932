use super::*;

#[test]
fn new_checks_length() {
    assert!(Frame::new(2, 2, vec![0; 12]).is_ok());
    assert!(Frame::new(2, 2, vec![0; 11]).is_err());
    assert!(GrayFrame::new(3, 1, vec![0; 2]).is_err());
}

#[test]
fn gray_uses_bgr_order() {
    let red = Frame::filled(1, 1, [0, 0, 255]);
    let blue = Frame::filled(1, 1, [255, 0, 0]);
    assert_eq!(red.to_gray().data, vec![76]);
    assert_eq!(blue.to_gray().data, vec![29]);
    assert_eq!(Frame::filled(1, 1, [255, 255, 255]).to_gray().data, vec![255]);
}

#[test]
fn unit_round_trip_is_lossless() {
    let data: Vec<u8> = (0..=255).flat_map(|v| [v, 255 - v, v / 2]).collect();
    let f = Frame::new(256, 1, data).unwrap();
    let unit = f.to_unit();
    assert!(unit.data.iter().all(|v| (0.0..=1.0).contains(v)));
    assert_eq!(unit.to_frame(), f);
}

#[test]
fn pixel_accessors() {
    let mut f = Frame::filled(3, 2, [1, 2, 3]);
    f.set_pixel(2, 1, [9, 8, 7]);
    assert_eq!(f.pixel(2, 1), [9, 8, 7]);
    assert_eq!(f.pixel(0, 0), [1, 2, 3]);
}

#[test]
fn resize_changes_dimensions_and_keeps_flat_color() {
    let f = Frame::filled(8, 6, [10, 120, 240]);
    let target = Dimensions::new(4, 2).unwrap();
    let small = f.resized(target, ScaleFilter::CatmullRom).unwrap();
    assert_eq!(small.dims(), target);
    assert_eq!(small.data.len(), 4 * 2 * 3);
    assert_eq!(small.pixel(1, 1), [10, 120, 240]);

    let same = f.resized(f.dims(), ScaleFilter::Triangle).unwrap();
    assert_eq!(same, f);
}
