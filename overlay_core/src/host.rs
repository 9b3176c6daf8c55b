//! The interface the engine consumes from its host buffer.
//!
//! A host provides stable, auto-adjusting positions ("marks"), text
//! queries, the insert cursor, and a sink for presentation effects. The
//! engine never edits text itself.

use crate::cursor::Position;
use markup_overlay_render::RenderedImage;

/// Handle to a mark created by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkId(pub u64);

/// Handle to a presentation tag created by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(pub u64);

/// Text position service and presentation sink.
pub trait TextHost {
    /// Returns the number of lines in the document.
    fn line_count(&self) -> usize;

    /// Returns the text of a line without its line terminator.
    fn line_text(&self, line: usize) -> Option<String>;

    /// Returns the text between two positions.
    fn slice(&self, start: Position, end: Position) -> String;

    /// Returns the position `chars` characters after `pos`.
    fn advance(&self, pos: Position, chars: usize) -> Position;

    /// Creates a mark. A left-gravity mark stays put when text is inserted
    /// exactly at it; a right-gravity mark moves past the inserted text.
    fn create_mark(&mut self, pos: Position, left_gravity: bool) -> MarkId;

    /// Returns the current position of a mark, or `None` if it was deleted.
    fn mark_position(&self, mark: MarkId) -> Option<Position>;

    /// Releases a mark. Deleting an unknown mark is a no-op.
    fn delete_mark(&mut self, mark: MarkId);

    /// Returns the insert cursor position.
    fn cursor(&self) -> Position;

    /// Creates a tag. Tags created later take priority where they overlap.
    fn create_tag(&mut self, invisible: bool) -> TagId;

    /// Deletes a tag and all of its applications.
    fn delete_tag(&mut self, tag: TagId);

    /// Applies a tag to `[start, end)`. Applying twice is the same as once.
    fn apply_tag(&mut self, tag: TagId, start: Position, end: Position);

    /// Removes a tag from `[start, end)`.
    fn remove_tag(&mut self, tag: TagId, start: Position, end: Position);

    /// Shows an image anchored at a mark, replacing any image already there.
    fn show_image(&mut self, anchor: MarkId, image: RenderedImage);

    /// Removes the image anchored at a mark, if any.
    fn hide_image(&mut self, anchor: MarkId);

    /// Returns the host's text colour as `#rrggbb`, if it knows one.
    fn foreground_color(&self) -> Option<String> {
        None
    }
}
