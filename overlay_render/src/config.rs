//! Render backend configuration.

use serde::Deserialize;
use std::time::Duration;

/// Default poll interval for outstanding jobs (in milliseconds).
const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Default time a single render may run before it is killed (in milliseconds).
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default command: LaTeX to DVI, then DVI to a tightly cropped transparent PNG.
pub const DEFAULT_COMMAND: &str = "latex -halt-on-error -interaction=batchmode #input && dvipng -o #output -T tight -D #dpi -bg Transparent #stem.dvi";

/// Default source document handed to the command as `#input`.
pub const DEFAULT_DOCUMENT: &str = r"\documentclass[12pt]{article}
\usepackage{color}
\usepackage{amsmath}
\usepackage{amssymb}
\pagestyle{empty}
\begin{document}
\definecolor{fg}{rgb}{#color}
\color{fg}
$#expression$
\end{document}
";

/// Configuration for the external renderer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Whether math regions are rendered at all.
    pub enabled: bool,
    /// Shell command template. See `RenderRequest::command`.
    pub command: String,
    /// Source document template. See `RenderRequest::document`.
    pub document: String,
    /// Interval of the shared poll timer.
    pub poll_interval_ms: u64,
    /// Maximum run time of one job; 0 disables the limit.
    pub timeout_ms: u64,
    /// Editor font size in points, used to derive the output dpi.
    pub font_size: f32,
    /// Foreground colour as `#rgb` or `#rrggbb`.
    pub foreground: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: DEFAULT_COMMAND.to_string(),
            document: DEFAULT_DOCUMENT.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            font_size: 10.0,
            foreground: "#000000".to_string(),
        }
    }
}

impl RenderConfig {
    /// Returns the poll interval, never shorter than one millisecond.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Returns the job timeout, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Returns the output resolution matching the configured font size.
    ///
    /// Rendered math is scaled to 1.8x the text size, converted from
    /// TeX points at a 10pt base.
    pub fn dpi(&self) -> f32 {
        self.font_size * 1.8 * 72.27 / 10.0
    }
}
