//! Animation error types

use crate::value::Shape;
use thiserror::Error;

/// Errors returned by animated values and controllers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// A value did not match the shape the animated value was created with
    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: Shape, found: Shape },

    /// The frame loop the value was registered with has been dropped
    #[error("frame loop dropped; the animation can never be advanced")]
    SchedulerDropped,

    /// A controller was asked for a key it was not created with
    #[error("unknown animation key: {0}")]
    UnknownKey(String),

    /// A completion's owning value was dropped before settling it
    #[error("animation dropped before its completion settled")]
    CompletionDropped,
}

/// Result type for animation operations
pub type Result<T> = std::result::Result<T, AnimationError>;
