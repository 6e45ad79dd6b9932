use crate::foundation::core::format_timestamp_ms;
use crate::foundation::error::{ButterflowError, ButterflowResult};

/// Retiming target of a subregion. Exactly one is set per region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Target {
    /// Desired output frame rate within the region.
    Fps(f64),
    /// Desired output duration of the region, in milliseconds.
    Dur(f64),
    /// Speed multiplier; below 1 is slow motion.
    Spd(f64),
}

impl Target {
    pub fn validate(&self) -> ButterflowResult<()> {
        let (name, v) = match *self {
            Self::Fps(v) => ("fps", v),
            Self::Dur(v) => ("dur", v),
            Self::Spd(v) => ("spd", v),
        };
        if !v.is_finite() || v <= 0.0 {
            return Err(ButterflowError::bad_target_value(format!(
                "{name} must be a positive number, got {v}"
            )));
        }
        Ok(())
    }

    pub fn fps(&self) -> Option<f64> {
        match *self {
            Self::Fps(v) => Some(v),
            _ => None,
        }
    }

    pub fn dur_ms(&self) -> Option<f64> {
        match *self {
            Self::Dur(v) => Some(v),
            _ => None,
        }
    }

    pub fn spd(&self) -> Option<f64> {
        match *self {
            Self::Spd(v) => Some(v),
            _ => None,
        }
    }
}

/// A time- and frame-bounded slice of the source with its own retiming target.
///
/// Times are milliseconds, frames are 1-indexed and inclusive. The sequence that owns a
/// subregion keeps `fa/fb/ra/rb` in sync with `ta/tb`.
#[derive(Clone, Debug, PartialEq)]
pub struct Subregion {
    pub ta: f64,
    pub tb: f64,
    pub fa: u64,
    pub fb: u64,
    pub ra: f64,
    pub rb: f64,
    pub target: Target,
    /// Autogenerated gap region, rendered only when subregions are kept.
    pub skip: bool,
}

impl Subregion {
    /// A user region spanning `[ta, tb]` milliseconds.
    pub fn new(ta: f64, tb: f64, target: Target) -> ButterflowResult<Self> {
        if !ta.is_finite() || !tb.is_finite() {
            return Err(ButterflowError::constraint("subregion times must be finite"));
        }
        if ta < 0.0 || tb < 0.0 {
            return Err(ButterflowError::constraint(format!(
                "subregion times must be >= 0, got [{ta}, {tb}]"
            )));
        }
        if ta > tb {
            return Err(ButterflowError::constraint(format!(
                "subregion start {ta} is after its end {tb}"
            )));
        }
        target.validate()?;
        Ok(Self {
            ta,
            tb,
            fa: 0,
            fb: 0,
            ra: 0.0,
            rb: 0.0,
            target,
            skip: false,
        })
    }

    /// An autogenerated gap region, played back at normal speed.
    pub fn gap(ta: f64, tb: f64) -> ButterflowResult<Self> {
        let mut s = Self::new(ta, tb, Target::Spd(1.0))?;
        s.skip = true;
        Ok(s)
    }

    /// Inclusive frame count.
    pub fn len_frames(&self) -> u64 {
        self.fb.saturating_sub(self.fa) + 1
    }

    pub fn duration_ms(&self) -> f64 {
        self.tb - self.ta
    }

    /// Speed factor applied to this region's audio.
    pub fn audio_speed(&self) -> f64 {
        match self.target {
            Target::Dur(d) => self.duration_ms() / d,
            Target::Spd(s) => s,
            Target::Fps(_) => 1.0,
        }
    }

    /// Time extents overlap: equal, an endpoint strictly inside the other extent, or one
    /// enveloping the other. Touching endpoints do not count.
    pub fn time_intersects(&self, o: &Self) -> bool {
        extents_overlap((self.ta, self.tb), (o.ta, o.tb))
    }

    /// Same rules as [`Subregion::time_intersects`], applied to frame extents.
    pub fn frame_intersects(&self, o: &Self) -> bool {
        extents_overlap((self.fa, self.fb), (o.fa, o.fb))
    }

    pub fn intersects(&self, o: &Self) -> bool {
        self.time_intersects(o) || self.frame_intersects(o)
    }
}

fn extents_overlap<T: PartialOrd + Copy>(a: (T, T), b: (T, T)) -> bool {
    fn one_way<T: PartialOrd + Copy>(x: (T, T), y: (T, T)) -> bool {
        (x.0 > y.0 && x.0 < y.1) || (x.1 > y.0 && x.1 < y.1) || (x.0 < y.0 && x.1 > y.1)
    }
    (a.0 == b.0 && a.1 == b.1) || one_way(a, b) || one_way(b, a)
}

impl std::fmt::Display for Subregion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn or_placeholder(v: Option<f64>) -> String {
            v.map(|v| format!("{v}")).unwrap_or_else(|| "?".to_string())
        }
        write!(
            f,
            "Time={}-{} Frames={}-{} Speed={},Duration={},Fps={}",
            format_timestamp_ms(self.ta),
            format_timestamp_ms(self.tb),
            self.fa,
            self.fb,
            or_placeholder(self.target.spd()),
            or_placeholder(self.target.dur_ms()),
            or_placeholder(self.target.fps()),
        )?;
        if self.skip {
            write!(f, " (autogenerated subregion)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sequence/subregion.rs"]
mod tests;
