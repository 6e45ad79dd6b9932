/// Convenience result type used across butterflow.
pub type ButterflowResult<T> = Result<T, ButterflowError>;

/// Top-level error taxonomy used by the renderer and its collaborators.
#[derive(thiserror::Error, Debug)]
pub enum ButterflowError {
    /// Bad CLI value, bad config value or unsupported output path.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A region time that does not match any accepted time syntax.
    #[error("bad time syntax: {0}")]
    BadTimeSyntax(String),

    /// A retiming target that is unknown, malformed or not positive.
    #[error("bad target value: {0}")]
    BadTargetValue(String),

    /// A region endpoint outside `[0, duration]`, or a start after its end.
    #[error("region out of bounds: {0}")]
    RegionOutOfBounds(String),

    /// Two user regions overlap in time or frames.
    #[error("regions intersect: {0}")]
    RegionIntersects(String),

    /// The input video could not be opened or probed.
    #[error("cannot open source: {0}")]
    SourceOpen(String),

    /// Frame index or time outside the valid range.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Mid-stream decoder failure.
    #[error("decode error: {0}")]
    Decode(String),

    /// Encoder child-process failure.
    #[error("encode error: {0}")]
    Encode(String),

    /// Interpolation requested with an invalid number of time steps.
    #[error("bad time step: {0}")]
    BadTimeStep(String),

    /// The render was interrupted by the user.
    #[error("render cancelled")]
    Cancelled,

    /// A sequence invariant (overlap, bounds, ordering) would be broken.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ButterflowError {
    /// Build a [`ButterflowError::InvalidInput`] value.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Build a [`ButterflowError::BadTimeSyntax`] value.
    pub fn bad_time_syntax(msg: impl Into<String>) -> Self {
        Self::BadTimeSyntax(msg.into())
    }

    /// Build a [`ButterflowError::BadTargetValue`] value.
    pub fn bad_target_value(msg: impl Into<String>) -> Self {
        Self::BadTargetValue(msg.into())
    }

    /// Build a [`ButterflowError::RegionOutOfBounds`] value.
    pub fn region_out_of_bounds(msg: impl Into<String>) -> Self {
        Self::RegionOutOfBounds(msg.into())
    }

    /// Build a [`ButterflowError::RegionIntersects`] value.
    pub fn region_intersects(msg: impl Into<String>) -> Self {
        Self::RegionIntersects(msg.into())
    }

    /// Build a [`ButterflowError::SourceOpen`] value.
    pub fn source_open(msg: impl Into<String>) -> Self {
        Self::SourceOpen(msg.into())
    }

    /// Build a [`ButterflowError::OutOfRange`] value.
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }

    /// Build a [`ButterflowError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`ButterflowError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`ButterflowError::BadTimeStep`] value.
    pub fn bad_time_step(msg: impl Into<String>) -> Self {
        Self::BadTimeStep(msg.into())
    }

    /// Build a [`ButterflowError::ConstraintViolation`] value.
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }

    /// `true` for errors caused by what the user typed rather than by the environment.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::BadTimeSyntax(_)
                | Self::BadTargetValue(_)
                | Self::RegionOutOfBounds(_)
                | Self::RegionIntersects(_)
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
