//! Error types for the overlay engine.
//!
//! Only construction and file I/O fail. Pattern mismatches, deleted
//! positions and render failures are ordinary events the engine absorbs.

use std::path::PathBuf;

use markup_overlay_render::RenderError;
use thiserror::Error;

/// Errors from configuration, validator setup and document I/O.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid TOML for `OverlayConfig`.
    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A validator pattern does not compile.
    #[error("invalid pattern for validator '{name}': {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    /// A validator reveals a capture group its pattern does not have.
    #[error("validator '{name}' reveals group {group}, but its pattern has {available} groups")]
    InvalidGroup {
        name: String,
        group: usize,
        available: usize,
    },

    #[error(transparent)]
    Render(#[from] RenderError),

    /// The document has never been saved and no path was given.
    #[error("document has no file path")]
    NoFilePath,
}

impl OverlayError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OverlayError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn pattern(name: impl Into<String>, source: regex::Error) -> Self {
        OverlayError::InvalidPattern {
            name: name.into(),
            source,
        }
    }
}

/// Result type for overlay operations.
pub type Result<T> = std::result::Result<T, OverlayError>;
