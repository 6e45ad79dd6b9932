use crate::foundation::error::{ButterflowError, ButterflowResult};

/// Slowest factor a single `atempo` stage accepts.
pub const TEMPO_MIN: f64 = 0.5;
/// Fastest factor a single `atempo` stage accepts.
pub const TEMPO_MAX: f64 = 2.0;

const RESIDUAL_EPS: f64 = 1e-9;

/// Split `speed` into stages within `[0.5, 2.0]` whose product is `speed`.
///
/// Out-of-range speeds become repeated limit stages followed by the residual; a residual
/// of 1 is left out, so `0.125` yields `[0.5, 0.5, 0.5]`.
pub fn tempo_chain(speed: f64) -> ButterflowResult<Vec<f64>> {
    if !(speed.is_finite() && speed > 0.0) {
        return Err(ButterflowError::invalid_input(format!(
            "audio speed must be positive, got {speed}"
        )));
    }
    if (TEMPO_MIN..=TEMPO_MAX).contains(&speed) {
        return Ok(vec![speed]);
    }
    let limit = if speed < TEMPO_MIN { TEMPO_MIN } else { TEMPO_MAX };
    let stages = (speed.ln() / limit.ln() + RESIDUAL_EPS).floor() as i32;
    let mut chain = vec![limit; stages as usize];
    let residual = speed / limit.powi(stages);
    if (residual - 1.0).abs() > RESIDUAL_EPS {
        chain.push(residual);
    }
    Ok(chain)
}

/// `atempo=a,atempo=b,...` for an ffmpeg audio filter graph.
pub fn atempo_filter(chain: &[f64]) -> String {
    chain
        .iter()
        .map(|k| format!("atempo={k}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Human-readable chain, e.g. `0.5*0.5*0.5`.
pub fn describe_chain(chain: &[f64]) -> String {
    chain
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join("*")
}

#[cfg(test)]
#[path = "../../tests/unit/audio/tempo.rs"]
mod tests;
