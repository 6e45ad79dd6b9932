//! Parsers for the user-facing value syntaxes: region specs, times, playback rates and
//! output scales.

use crate::foundation::core::{Dimensions, round_to_even};
use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::sequence::sequence::VideoSequence;
use crate::sequence::subregion::{Subregion, Target};

/// Parse a time as `hh:mm:ss.xxx`, `mm:ss.xxx`, `ss.xxx` or `end`, returning milliseconds.
pub fn parse_time_ms(s: &str, duration_ms: f64) -> ButterflowResult<f64> {
    let s = s.trim();
    if s == "end" {
        return Ok(duration_ms);
    }
    let bad = || ButterflowError::bad_time_syntax(format!("'{s}'"));
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == ':' || c == '.') {
        return Err(bad());
    }

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() > 3 {
        return Err(bad());
    }
    let (secs_str, rest) = parts.split_last().ok_or_else(bad)?;
    if secs_str.is_empty() || secs_str.matches('.').count() > 1 || secs_str.ends_with('.') {
        return Err(bad());
    }
    let secs: f64 = secs_str.parse().map_err(|_| bad())?;

    let mut whole = [0u64; 2];
    for (slot, p) in whole.iter_mut().rev().zip(rest.iter().rev()) {
        if p.is_empty() || p.contains('.') {
            return Err(bad());
        }
        *slot = p.parse().map_err(|_| bad())?;
    }
    let [hours, mins] = whole;
    if !rest.is_empty() {
        if secs >= 60.0 {
            return Err(ButterflowError::bad_time_syntax(format!(
                "'{s}': seconds must be below 60"
            )));
        }
        if rest.len() == 2 && mins >= 60 {
            return Err(ButterflowError::bad_time_syntax(format!(
                "'{s}': minutes must be below 60"
            )));
        }
    }
    let whole_secs = hours
        .checked_mul(3600)
        .and_then(|h| mins.checked_mul(60).and_then(|m| h.checked_add(m)))
        .ok_or_else(|| ButterflowError::bad_time_syntax(format!("'{s}': time is too large")))?;
    Ok((whole_secs as f64 + secs) * 1000.0)
}

/// Parse a positive decimal or a `num/den` fraction.
pub fn parse_decimal_or_fraction(s: &str) -> Option<f64> {
    let s = s.trim();
    let v = match s.split_once('/') {
        Some((n, d)) => {
            let n: f64 = n.trim().parse().ok()?;
            let d: f64 = d.trim().parse().ok()?;
            if d == 0.0 {
                return None;
            }
            n / d
        }
        None => s.parse().ok()?,
    };
    (v.is_finite() && v > 0.0).then_some(v)
}

/// Parse `fps=<decimal|num/den>`, `dur=<seconds>` or `spd=<multiplier>`.
pub fn parse_target(key: &str, value: &str) -> ButterflowResult<Target> {
    let bad = |what: &str| {
        ButterflowError::bad_target_value(format!("{key}={value}: {what}"))
    };
    let target = match key.trim() {
        "fps" => Target::Fps(
            parse_decimal_or_fraction(value).ok_or_else(|| bad("expected a rate or num/den"))?,
        ),
        "dur" => {
            let secs: f64 = value
                .trim()
                .parse()
                .map_err(|_| bad("expected seconds"))?;
            Target::Dur(secs * 1000.0)
        }
        "spd" => Target::Spd(value.trim().parse().map_err(|_| bad("expected a multiplier"))?),
        _ => return Err(bad("target must be one of fps, dur, spd")),
    };
    target.validate()?;
    Ok(target)
}

/// Split a region spec on the `:` that separates regions, keeping colons inside times.
fn split_regions(spec: &str) -> ButterflowResult<Vec<String>> {
    let mut regions: Vec<String> = Vec::new();
    for token in spec.split(':') {
        let starts_region = token.starts_with("a=") || token == "full" || token.starts_with("full,");
        if starts_region {
            regions.push(token.to_string());
        } else if let Some(cur) = regions.last_mut() {
            cur.push(':');
            cur.push_str(token);
        } else {
            return Err(ButterflowError::invalid_input(format!(
                "region spec must start with 'a=' or 'full', got '{spec}'"
            )));
        }
    }
    Ok(regions)
}

fn parse_region(region: &str, duration_ms: f64) -> ButterflowResult<Subregion> {
    let parts: Vec<&str> = region.split(',').map(str::trim).collect();
    let (ta, tb, tgt) = match parts.as_slice() {
        ["full", tgt] => (0.0, duration_ms, *tgt),
        [a, b, tgt] => {
            let a = a.strip_prefix("a=").ok_or_else(|| {
                ButterflowError::invalid_input(format!("region '{region}' must start with a="))
            })?;
            let b = b.strip_prefix("b=").ok_or_else(|| {
                ButterflowError::invalid_input(format!("region '{region}' is missing b="))
            })?;
            (parse_time_ms(a, duration_ms)?, parse_time_ms(b, duration_ms)?, *tgt)
        }
        _ => {
            return Err(ButterflowError::invalid_input(format!(
                "region '{region}' must look like a=<time>,b=<time>,<target>=<value> or full,<target>=<value>"
            )));
        }
    };
    let (key, value) = tgt.split_once('=').ok_or_else(|| {
        ButterflowError::bad_target_value(format!("'{tgt}': expected <target>=<value>"))
    })?;
    let target = parse_target(key, value)?;

    if ta > duration_ms || tb > duration_ms {
        return Err(ButterflowError::region_out_of_bounds(format!(
            "'{region}' ends past the source duration of {duration_ms} ms"
        )));
    }
    if ta > tb {
        return Err(ButterflowError::region_out_of_bounds(format!(
            "'{region}' starts after it ends"
        )));
    }
    Subregion::new(ta, tb, target)
}

/// Build a sequence from a region spec such as
/// `a=00:00:00.5,b=00:00:01.2,fps=48:a=2.3,b=end,spd=0.25` or `full,dur=6`.
pub fn parse_sequence(spec: &str, duration_ms: f64, frames: u64) -> ButterflowResult<VideoSequence> {
    let mut seq = VideoSequence::new(duration_ms, frames)?;
    for region in split_regions(spec.trim())? {
        let sub = parse_region(&region, duration_ms)?;
        if let Some(existing) = seq.find_intersection(&sub) {
            return Err(ButterflowError::region_intersects(format!(
                "'{region}' overlaps {existing}"
            )));
        }
        seq.add_subregion(sub)?;
    }
    Ok(seq)
}

/// Parse a playback rate: integer, decimal, `num/den`, or `Nx` (multiple of the source rate).
pub fn parse_playback_rate(s: &str, source_rate: f64) -> ButterflowResult<f64> {
    let s = s.trim();
    let bad = || {
        ButterflowError::invalid_input(format!(
            "playback rate '{s}' must be a positive number, num/den, or Nx"
        ))
    };
    let rate = match s.strip_suffix('x') {
        Some(mult) => {
            let m: f64 = mult.trim().parse().map_err(|_| bad())?;
            m * source_rate
        }
        None => parse_decimal_or_fraction(s).ok_or_else(bad)?,
    };
    if !rate.is_finite() || rate <= 0.0 {
        return Err(bad());
    }
    Ok(rate)
}

/// Parse an output size: `WxH`, `W:-1`, `-1:H`, `W:H`, or a scale factor.
///
/// Both sides are rounded to the nearest even integer.
pub fn parse_video_scale(s: &str, source: Dimensions) -> ButterflowResult<Dimensions> {
    let s = s.trim();
    let bad = |why: &str| ButterflowError::invalid_input(format!("video scale '{s}': {why}"));
    let sep = if s.contains('x') {
        Some('x')
    } else if s.contains(':') {
        Some(':')
    } else {
        None
    };
    let Some(sep) = sep else {
        let factor: f64 = s.parse().map_err(|_| bad("expected WxH, W:H or a factor"))?;
        return source.scaled(factor);
    };

    let (w, h) = s.split_once(sep).ok_or_else(|| bad("expected two sides"))?;
    let w: i64 = w.trim().parse().map_err(|_| bad("width is not an integer"))?;
    let h: i64 = h.trim().parse().map_err(|_| bad("height is not an integer"))?;
    let src_w = f64::from(source.width);
    let src_h = f64::from(source.height);
    let (w, h) = match (w, h) {
        (-1, -1) => return Err(bad("only one side may be -1")),
        (-1, h) if h > 0 => (src_w * h as f64 / src_h, h as f64),
        (w, -1) if w > 0 => (w as f64, src_h * w as f64 / src_w),
        (w, h) if w > 0 && h > 0 => (w as f64, h as f64),
        _ => return Err(bad("sides must be positive or -1")),
    };
    Dimensions::new(round_to_even(w), round_to_even(h))
}

#[cfg(test)]
#[path = "../../tests/unit/sequence/parse.rs"]
mod tests;
