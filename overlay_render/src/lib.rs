//! Render backend - external renderer processes for markup overlay.
//!
//! A render turns one expression into an image by running an external
//! command (LaTeX and dvipng by default) inside a private temporary
//! directory. Each invocation is owned by a `RenderJob`, which is polled
//! for completion and kills its process and deletes its files when dropped.

pub mod config;
pub mod error;
pub mod job;
pub mod template;

pub use config::RenderConfig;
pub use error::{RenderError, Result};
pub use job::{JobStatus, RenderJob, RenderedImage};
pub use template::{expand, shell_quote, RenderRequest, Rgb};
