//! Markup Overlay Core - incremental region validation for plain text.
//!
//! The engine recognises markup regions (inline math, emphasis, metadata
//! tags) in a text buffer, keeps them correct while the buffer is edited,
//! and drives their presentation: hiding syntax, revealing it while the
//! cursor is inside, and swapping math for externally rendered images.
//!
//! The engine talks to its buffer only through `TextHost`. `TextBuffer`
//! is the bundled implementation and `Document` wires the two together.

pub mod buffer;
pub mod config;
pub mod cursor;
pub mod dirty;
pub mod document;
pub mod error;
pub mod host;
pub mod index;
pub mod perf;
pub mod region;
pub mod scheduler;
pub mod validation;
pub mod validator;

pub use buffer::TextBuffer;
pub use config::{discover_config, load_config, OverlayConfig, ValidatorSettings};
pub use cursor::Position;
pub use document::Document;
pub use error::{OverlayError, Result};
pub use host::{MarkId, TagId, TextHost};
pub use index::RegionIndex;
pub use perf::{RenderStats, ValidationStats};
pub use region::{Region, RegionId, RegionSnapshot, RenderState};
pub use validation::Validation;
pub use validator::Validator;

pub use markup_overlay_render::{RenderConfig, RenderedImage};
