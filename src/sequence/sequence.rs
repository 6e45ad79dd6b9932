use crate::foundation::core::format_timestamp_ms;
use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::sequence::subregion::{Subregion, Target};

/// Source duration and frame count plus an ordered, non-overlapping list of subregions.
///
/// User regions are kept sorted by `(rb, ra)`; the spans between them are covered by
/// autogenerated `skip` regions so that the sequence always describes the whole source.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoSequence {
    duration: f64,
    frames: u64,
    subregions: Vec<Subregion>,
}

impl VideoSequence {
    /// A sequence covered by one autogenerated region.
    pub fn new(duration_ms: f64, frames: u64) -> ButterflowResult<Self> {
        if !duration_ms.is_finite() || duration_ms <= 0.0 {
            return Err(ButterflowError::constraint(format!(
                "sequence duration must be positive, got {duration_ms}"
            )));
        }
        if frames == 0 {
            return Err(ButterflowError::constraint("sequence must have at least one frame"));
        }
        let mut seq = Self {
            duration: duration_ms,
            frames,
            subregions: Vec::new(),
        };
        seq.rebuild(Vec::new())?;
        Ok(seq)
    }

    /// A sequence with a single renderable region spanning the whole source.
    pub fn whole(duration_ms: f64, frames: u64, target: Target) -> ButterflowResult<Self> {
        let mut seq = Self::new(duration_ms, frames)?;
        seq.add_subregion(Subregion::new(0.0, duration_ms, target)?)?;
        Ok(seq)
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// All regions in playback order, autogenerated ones included.
    pub fn subregions(&self) -> &[Subregion] {
        &self.subregions
    }

    pub fn user_subregions(&self) -> impl Iterator<Item = &Subregion> {
        self.subregions.iter().filter(|s| !s.skip)
    }

    /// `clamp(t / duration, 0, 1)`.
    pub fn relative_position(&self, t: f64) -> f64 {
        (t / self.duration).clamp(0.0, 1.0)
    }

    /// 1-indexed frame nearest to `t` milliseconds.
    pub fn nearest_frame(&self, t: f64) -> u64 {
        self.frame_at_relative(self.relative_position(t))
    }

    fn frame_at_relative(&self, r: f64) -> u64 {
        ((r * self.frames as f64).round() as u64).clamp(1, self.frames)
    }

    /// First existing user region that `sub` would intersect once placed in this sequence.
    pub fn find_intersection(&self, sub: &Subregion) -> Option<&Subregion> {
        let placed = self.placed(sub.clone());
        self.user_subregions().find(|s| s.intersects(&placed))
    }

    /// Insert a user region, then re-sort and regenerate the gap regions.
    ///
    /// Fails with [`ButterflowError::ConstraintViolation`] when the region lies outside
    /// `[0, duration]` or intersects an existing user region.
    pub fn add_subregion(&mut self, sub: Subregion) -> ButterflowResult<()> {
        if sub.ta < 0.0 || sub.tb > self.duration || sub.ta > sub.tb {
            return Err(ButterflowError::constraint(format!(
                "subregion [{}, {}] is outside [0, {}]",
                format_timestamp_ms(sub.ta),
                format_timestamp_ms(sub.tb),
                format_timestamp_ms(self.duration)
            )));
        }
        sub.target.validate()?;
        let mut placed = self.placed(sub);
        placed.skip = false;
        if let Some(existing) = self.user_subregions().find(|s| s.intersects(&placed)) {
            return Err(ButterflowError::constraint(format!(
                "subregion {placed} intersects existing subregion {existing}"
            )));
        }
        let mut users: Vec<Subregion> = self.user_subregions().cloned().collect();
        users.push(placed);
        self.rebuild(users)
    }

    /// Rescale every region to a new duration and frame count, keeping relative positions.
    ///
    /// On failure the sequence is left as it was.
    pub fn recalculate(&mut self, duration_ms: f64, frames: u64) -> ButterflowResult<()> {
        if !duration_ms.is_finite() || duration_ms <= 0.0 || frames == 0 {
            return Err(ButterflowError::constraint(format!(
                "cannot rescale sequence to duration={duration_ms} frames={frames}"
            )));
        }
        let frame_at = |r: f64| ((r * frames as f64).round() as u64).clamp(1, frames);
        let users: Vec<Subregion> = self
            .user_subregions()
            .cloned()
            .map(|mut s| {
                s.ta = s.ra * duration_ms;
                s.tb = s.rb * duration_ms;
                s.fa = frame_at(s.ra);
                s.fb = frame_at(s.rb);
                s
            })
            .collect();
        for (i, a) in users.iter().enumerate() {
            for b in &users[i + 1..] {
                if a.intersects(b) {
                    return Err(ButterflowError::constraint(format!(
                        "after rescale, subregion {a} intersects {b}"
                    )));
                }
            }
        }
        let mut rescaled = Self {
            duration: duration_ms,
            frames,
            subregions: Vec::new(),
        };
        rescaled.rebuild(users)?;
        rescaled.validate()?;
        *self = rescaled;
        Ok(())
    }

    /// Check every sequence invariant.
    pub fn validate(&self) -> ButterflowResult<()> {
        for s in &self.subregions {
            s.target.validate()?;
            let in_bounds = s.ta >= 0.0
                && s.tb <= self.duration
                && s.fa >= 1
                && s.fb <= self.frames
                && (0.0..=1.0).contains(&s.ra)
                && (0.0..=1.0).contains(&s.rb);
            let ordered = s.ta <= s.tb && s.fa <= s.fb && s.ra <= s.rb;
            if !in_bounds || !ordered {
                return Err(ButterflowError::constraint(format!(
                    "subregion {s} violates sequence bounds (duration={}, frames={})",
                    format_timestamp_ms(self.duration),
                    self.frames
                )));
            }
        }
        for (i, a) in self.subregions.iter().enumerate() {
            for b in &self.subregions[i + 1..] {
                if a.intersects(b) {
                    return Err(ButterflowError::constraint(format!(
                        "subregion {a} intersects {b}"
                    )));
                }
            }
        }
        let sorted = self
            .subregions
            .windows(2)
            .all(|w| (w[0].rb, w[0].ra) <= (w[1].rb, w[1].ra));
        if !sorted {
            return Err(ButterflowError::constraint("subregions are out of order"));
        }
        Ok(())
    }

    fn placed(&self, mut sub: Subregion) -> Subregion {
        sub.ra = self.relative_position(sub.ta);
        sub.rb = self.relative_position(sub.tb);
        sub.fa = self.nearest_frame(sub.ta);
        sub.fb = self.nearest_frame(sub.tb);
        sub
    }

    /// Sort user regions and fill the uncovered spans with gap regions.
    ///
    /// A gap whose frame extent would collide with a user region is left out.
    fn rebuild(&mut self, mut users: Vec<Subregion>) -> ButterflowResult<()> {
        users.sort_by(|a, b| {
            (a.rb, a.ra)
                .partial_cmp(&(b.rb, b.ra))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut spans = Vec::new();
        let mut cursor = 0.0;
        for u in &users {
            if u.ta > cursor {
                spans.push((cursor, u.ta));
            }
            cursor = cursor.max(u.tb);
        }
        if cursor < self.duration {
            spans.push((cursor, self.duration));
        }

        let mut all = users;
        for (ta, tb) in spans {
            let gap = self.placed(Subregion::gap(ta, tb)?);
            if all.iter().any(|u| !u.skip && u.intersects(&gap)) {
                tracing::debug!(%gap, "dropping gap region that collapses onto a neighbour");
                continue;
            }
            all.push(gap);
        }
        all.sort_by(|a, b| {
            (a.rb, a.ra)
                .partial_cmp(&(b.rb, b.ra))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.subregions = all;
        Ok(())
    }
}

impl std::fmt::Display for VideoSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Sequence: Duration={} ({:.2}s), Frames={}",
            format_timestamp_ms(self.duration),
            self.duration / 1000.0,
            self.frames
        )?;
        for (i, sub) in self.subregions.iter().enumerate() {
            write!(f, "\nSubregion ({i}): {sub}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sequence/sequence.rs"]
mod tests;
