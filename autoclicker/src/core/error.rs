//! Typed failures raised at the game surface boundary.

use thiserror::Error;

/// Failure of a single surface operation.
///
/// Callers decide the recovery policy: the allocator and telemetry treat every
/// variant as "nothing this cycle", the input loop treats any variant as the end
/// of the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// A value could not be located or did not have the expected shape.
    #[error("unable to read `{target}`: {reason}")]
    ReadFailure { target: String, reason: String },
    /// The control went away between lookup and use.
    #[error("stale reference to `{0}`")]
    StaleReference(String),
    /// The surface refused or never offered the save import.
    #[error("import rejected: {0}")]
    ImportRejected(String),
    /// The surface is gone (window closed, driver session lost).
    #[error("surface disconnected: {0}")]
    Disconnected(String),
}

impl SurfaceError {
    pub fn read(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReadFailure {
            target: target.into(),
            reason: reason.into(),
        }
    }
}
