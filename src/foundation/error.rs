/// Convenience result type used across halation.
pub type HalationResult<T> = Result<T, HalationError>;

/// Top-level error taxonomy used by renderer APIs.
///
/// Missing engine capabilities are reported here only by the construction helpers; the per-frame
/// entry point resolves them by falling back to direct rendering.
#[derive(thiserror::Error, Debug)]
pub enum HalationError {
    /// The engine cannot create render surfaces, shader programs, or bind render targets.
    #[error("capability missing: {0}")]
    CapabilityMissing(String),

    /// A GPU-side allocation (surface or program) failed mid-frame.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// Invalid caller-provided data (effect parameters, uniform values, sizes).
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while executing a frame (unknown handles, mismatched buffers).
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HalationError {
    /// Build a [`HalationError::CapabilityMissing`] value.
    pub fn capability(msg: impl Into<String>) -> Self {
        Self::CapabilityMissing(msg.into())
    }

    /// Build a [`HalationError::Allocation`] value.
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Build a [`HalationError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`HalationError::Evaluation`] value.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
