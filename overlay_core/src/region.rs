//! Regions - live, position-tracked spans matched by a validator.

use markup_overlay_render::RenderedImage;
use serde::Serialize;

use crate::cursor::Position;
use crate::host::{MarkId, TextHost};

/// Stable handle to a region. Ids are never reused within an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RegionId(pub u64);

/// Index of a validator in the engine's validator list.
pub type ValidatorId = usize;

/// Progress of the external render for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderState {
    /// No render requested, or the last one was cancelled.
    #[default]
    Idle,
    /// A render process is running.
    Running,
    /// The last render produced an image.
    Succeeded,
    /// The last render failed or could not be started.
    Failed,
}

/// Validator-private state attached to a region.
#[derive(Debug, Clone, Default)]
pub struct RegionData {
    /// Render progress (math regions only).
    pub render: RenderState,
    /// The last successfully rendered image.
    pub image: Option<RenderedImage>,
    /// Whether `image` is currently shown in place of the text.
    pub image_shown: bool,
    /// Set while a save has temporarily taken the image down.
    pub restore_image: bool,
}

/// A contiguous span `[start, end)` owned by one validator.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: RegionId,
    pub validator: ValidatorId,
    /// Left-gravity mark at the first character.
    pub start: MarkId,
    /// Right-gravity mark just past the last character.
    pub end: MarkId,
    /// Whether the cursor is currently inside.
    pub active: bool,
    /// The text the validator's effect was last applied to.
    pub matched: String,
    pub data: RegionData,
}

impl Region {
    /// Returns the current span, or `None` if either mark was deleted.
    pub fn span<H: TextHost>(&self, host: &H) -> Option<(Position, Position)> {
        Some((host.mark_position(self.start)?, host.mark_position(self.end)?))
    }

    /// Returns the text under the region.
    pub fn text<H: TextHost>(&self, host: &H) -> Option<String> {
        let (start, end) = self.span(host)?;
        Some(host.slice(start, end))
    }

    /// Returns true if `pos` lies inside `[start, end)`.
    pub fn contains<H: TextHost>(&self, host: &H, pos: Position) -> bool {
        self.span(host)
            .is_some_and(|(start, end)| pos.in_range(start, end))
    }

    /// Returns true if the region spans exactly `[start, end)`.
    pub fn has_span<H: TextHost>(&self, host: &H, start: Position, end: Position) -> bool {
        self.span(host) == Some((start, end))
    }
}

/// A serialisable view of a region, for hosts and tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionSnapshot {
    pub id: RegionId,
    pub validator: String,
    pub line: usize,
    pub start: Position,
    pub end: Position,
    pub text: String,
    pub active: bool,
    pub render: RenderState,
    pub image_shown: bool,
}
