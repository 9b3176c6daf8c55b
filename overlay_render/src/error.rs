//! Error types for the render backend.

use thiserror::Error;

/// Errors that can occur while preparing or starting a render.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer process could not be started.
    #[error("failed to spawn renderer: {0}")]
    Spawn(#[source] std::io::Error),

    /// Filesystem work around the render failed.
    #[error("I/O error while {context}: {source}")]
    Io {
        /// What the backend was doing.
        context: &'static str,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A colour value could not be parsed.
    #[error("invalid color format: {0} (expected #rgb or #rrggbb)")]
    InvalidColor(String),
}

impl RenderError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        RenderError::Io { context, source }
    }
}

/// Result type for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;
