use crate::foundation::error::{ButterflowError, ButterflowResult};

/// Frame dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> ButterflowResult<Self> {
        if width == 0 || height == 0 {
            return Err(ButterflowError::invalid_input(format!(
                "dimensions must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Byte length of one BGR24 frame at these dimensions.
    pub fn bgr_len(self) -> usize {
        self.pixel_count() * 3
    }

    pub fn is_even(self) -> bool {
        self.width.is_multiple_of(2) && self.height.is_multiple_of(2)
    }

    /// Both sides rounded to the nearest even integer, never below 2.
    pub fn to_even(self) -> Self {
        Self {
            width: round_to_even(f64::from(self.width)),
            height: round_to_even(f64::from(self.height)),
        }
    }

    /// Uniformly scale by `factor`, rounding each side to the nearest even integer.
    pub fn scaled(self, factor: f64) -> ButterflowResult<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ButterflowError::invalid_input(format!(
                "scale factor must be positive, got {factor}"
            )));
        }
        Ok(Self {
            width: round_to_even(f64::from(self.width) * factor),
            height: round_to_even(f64::from(self.height) * factor),
        })
    }

    pub fn is_downscale_of(self, src: Self) -> bool {
        self.pixel_count() < src.pixel_count()
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Round a length to the nearest even integer (ties go up), minimum 2.
pub fn round_to_even(x: f64) -> u32 {
    let half = (x / 2.0).round().max(1.0);
    (half as u32).saturating_mul(2)
}

/// Resampling filter used when frames are resized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ScaleFilter {
    pub fn parse(s: &str) -> ButterflowResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "triangle" | "linear" | "bilinear" => Ok(Self::Triangle),
            "catmullrom" | "cubic" | "bicubic" => Ok(Self::CatmullRom),
            "gaussian" => Ok(Self::Gaussian),
            "lanczos3" | "lanczos" => Ok(Self::Lanczos3),
            other => Err(ButterflowError::invalid_input(format!(
                "unknown scaler '{other}' (expected nearest, triangle, catmullrom, gaussian, lanczos3)"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Triangle => "triangle",
            Self::CatmullRom => "catmullrom",
            Self::Gaussian => "gaussian",
            Self::Lanczos3 => "lanczos3",
        }
    }

    pub(crate) fn to_image_filter(self) -> image::imageops::FilterType {
        use image::imageops::FilterType;
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Format milliseconds as `h:mm:ss.mmm`.
pub fn format_timestamp_ms(ms: f64) -> String {
    let total = ms.max(0.0).round() as u64;
    let millis = total % 1000;
    let secs = (total / 1000) % 60;
    let mins = (total / 60_000) % 60;
    let hours = total / 3_600_000;
    format!("{hours}:{mins:02}:{secs:02}.{millis:03}")
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
