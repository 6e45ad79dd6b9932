/// Slack applied before flooring frame counts so that values such as `29.97 * 6.006`
/// (which lands a hair under an integer in binary floating point) floor to the intended count.
const FRAME_FLOOR_EPS: f64 = 1e-9;

/// `true` when a correction cadence of period `every` fires at work item `idx`.
///
/// A period of zero (or less) never fires.
pub fn cadence_fires(idx: u64, every: f64) -> bool {
    every > 0.0 && (idx as f64) % every < 1.0
}

/// Floor a non-negative frame count, clamping negatives and NaN to zero.
pub fn floor_frames(x: f64) -> u64 {
    if !x.is_finite() || x <= 0.0 {
        return 0;
    }
    (x + FRAME_FLOOR_EPS).floor() as u64
}

/// Convert a normalized channel value to 8 bits: `clamp(round(v * 255), 0, 255)`.
pub fn unit_to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Integer alpha blend of `src` over `dst` with coverage `a` in `0..=255`.
pub(crate) fn blend_u8(dst: u8, src: u8, a: u8) -> u8 {
    let a = u32::from(a);
    let v = u32::from(src) * a + u32::from(dst) * (255 - a);
    ((v + 127) / 255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
