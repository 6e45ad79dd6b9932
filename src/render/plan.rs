use crate::foundation::math::floor_frames;
use crate::sequence::subregion::{Subregion, Target};

/// Frame budget for one subregion: how many frames it must produce at the playback rate and
/// how the interpolated output is trimmed or padded to hit that count.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionPlan {
    /// Source frames in the region, inclusive.
    pub reg_len: u64,
    pub pairs: u64,
    pub to_render: u64,
    /// Intermediates synthesized per source pair.
    pub int_each_go: u64,
    /// Source plus interpolated frames the walk produces before correction.
    pub will_make: u64,
    pub extra: i64,
    /// Drop one work item every `drp_every` items; zero disables.
    pub drp_every: f64,
    /// Duplicate one work item every `dup_every` items; zero disables.
    pub dup_every: f64,
    /// Only the first source frame is read; it is written `to_render` times.
    pub single_frame: bool,
}

/// Frames a region must produce at playback `rate`. Never below one.
pub fn frames_to_render(sub: &Subregion, rate: f64) -> u64 {
    let reg_dur_s = sub.duration_ms() / 1000.0;
    let n = match sub.target {
        Target::Dur(ms) => floor_frames(rate * ms / 1000.0),
        Target::Fps(fps) => floor_frames(fps * reg_dur_s),
        Target::Spd(spd) => floor_frames(rate * reg_dur_s / spd),
    };
    n.max(1)
}

impl RegionPlan {
    pub fn new(sub: &Subregion, rate: f64) -> Self {
        let reg_len = sub.len_frames();
        let pairs = reg_len - 1;
        let to_render = frames_to_render(sub, rate);
        let single_frame = sub.fa == sub.fb || to_render == 1;

        if single_frame || to_render == reg_len {
            return Self {
                reg_len,
                pairs,
                to_render,
                int_each_go: 0,
                will_make: if single_frame { 1 } else { reg_len },
                extra: if single_frame { 1 - to_render as i64 } else { 0 },
                drp_every: 0.0,
                dup_every: 0.0,
                single_frame,
            };
        }

        let int_each_go = to_render / pairs.max(1);
        let will_make = if pairs >= 1 {
            int_each_go * pairs + pairs
        } else {
            1
        };
        let extra = will_make as i64 - to_render as i64;
        let cadence = will_make as f64 / extra.unsigned_abs().max(1) as f64;
        Self {
            reg_len,
            pairs,
            to_render,
            int_each_go,
            will_make,
            extra,
            drp_every: if extra > 0 { cadence } else { 0.0 },
            dup_every: if extra < 0 { cadence } else { 0.0 },
            single_frame,
        }
    }

    /// Output duration in seconds at `rate`.
    pub fn est_duration_s(&self, rate: f64) -> f64 {
        self.to_render as f64 / rate
    }

    /// Audio drift, in seconds, if no correction were applied.
    pub fn potential_drift_s(&self, rate: f64) -> f64 {
        self.extra as f64 / rate
    }
}

/// Sum of `to_render` over the regions that will be rendered.
pub fn total_to_render<'a>(subs: impl IntoIterator<Item = &'a Subregion>, rate: f64) -> u64 {
    subs.into_iter().map(|s| RegionPlan::new(s, rate).to_render).sum()
}

#[cfg(test)]
#[path = "../../tests/unit/render/plan.rs"]
mod tests;
