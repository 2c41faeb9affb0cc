//! Error types for Glaze renderer operations

use thiserror::Error;

/// Errors surfaced synchronously by mutating renderer operations.
///
/// Failures are reported before any shadow-state mutation or driver call, so
/// the tracked state never diverges from what the caller believes was set.
#[derive(Error, Debug)]
pub enum RenderError {
    /// An argument was out of range or otherwise malformed
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The operation referenced a resource that has been destroyed
    #[error("cannot use a destroyed resource: {0}")]
    DestroyedResource(&'static str),

    /// The requested combination is unsupported by the variable or pipeline
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Result type for renderer operations
pub type Result<T> = std::result::Result<T, RenderError>;
