//! Text buffer implementation using ropey.
//!
//! Besides the text itself the buffer keeps everything a `TextHost` needs:
//! marks that follow edits, the insert cursor, presentation tags and
//! image decorations.

use ropey::Rope;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::ops::Range;
use std::path::Path;

use markup_overlay_render::RenderedImage;

use crate::cursor::Position;
use crate::host::{MarkId, TagId, TextHost};

/// A position that follows edits.
#[derive(Debug, Clone, Copy)]
struct Mark {
    /// Character offset.
    offset: usize,
    /// Whether the mark stays before text inserted exactly at it.
    left_gravity: bool,
}

impl Mark {
    fn on_insert(&mut self, at: usize, len: usize) {
        if self.offset > at || (self.offset == at && !self.left_gravity) {
            self.offset += len;
        }
    }

    fn on_remove(&mut self, start: usize, end: usize) {
        self.offset = map_through_removal(self.offset, start, end);
    }
}

/// A presentation tag and the ranges it covers.
#[derive(Debug, Clone)]
struct Tag {
    invisible: bool,
    /// Sorted, disjoint, non-empty character ranges.
    spans: Vec<Range<usize>>,
}

impl Tag {
    fn covers(&self, idx: usize) -> bool {
        let i = self.spans.partition_point(|r| r.end <= idx);
        self.spans.get(i).is_some_and(|r| r.start <= idx)
    }

    fn add(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let mut merged = range;
        let mut kept = Vec::with_capacity(self.spans.len() + 1);
        for span in self.spans.drain(..) {
            if span.end < merged.start || span.start > merged.end {
                kept.push(span);
            } else {
                merged = merged.start.min(span.start)..merged.end.max(span.end);
            }
        }
        let at = kept.partition_point(|r| r.start < merged.start);
        kept.insert(at, merged);
        self.spans = kept;
    }

    fn subtract(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let mut kept = Vec::with_capacity(self.spans.len() + 1);
        for span in self.spans.drain(..) {
            if span.end <= range.start || span.start >= range.end {
                kept.push(span);
                continue;
            }
            if span.start < range.start {
                kept.push(span.start..range.start);
            }
            if span.end > range.end {
                kept.push(range.end..span.end);
            }
        }
        self.spans = kept;
    }

    fn on_insert(&mut self, at: usize, len: usize) {
        let mut shifted = Vec::with_capacity(self.spans.len() + 1);
        for span in self.spans.drain(..) {
            if span.end <= at {
                shifted.push(span);
            } else if span.start >= at {
                shifted.push(span.start + len..span.end + len);
            } else {
                // Inserted text splits the span and stays untagged
                shifted.push(span.start..at);
                shifted.push(at + len..span.end + len);
            }
        }
        self.spans = shifted;
    }

    fn on_remove(&mut self, start: usize, end: usize) {
        let mut clipped: Vec<Range<usize>> = Vec::with_capacity(self.spans.len());
        for span in self.spans.drain(..) {
            let s = map_through_removal(span.start, start, end);
            let e = map_through_removal(span.end, start, end);
            if s >= e {
                continue;
            }
            // Spans on both sides of the removal may now touch
            match clipped.last_mut() {
                Some(last) if last.end >= s => last.end = last.end.max(e),
                _ => clipped.push(s..e),
            }
        }
        self.spans = clipped;
    }
}

/// Maps a character offset through the removal of `[start, end)`.
fn map_through_removal(offset: usize, start: usize, end: usize) -> usize {
    if offset <= start {
        offset
    } else if offset >= end {
        offset - (end - start)
    } else {
        start
    }
}

/// A text buffer backed by a rope data structure.
/// Provides efficient text operations for large files.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    rope: Rope,
    /// Live marks by id.
    marks: HashMap<MarkId, Mark>,
    next_mark: u64,
    /// Tags by id; id order is priority order.
    tags: BTreeMap<TagId, Tag>,
    next_tag: u64,
    /// Image decorations by anchor mark.
    images: BTreeMap<MarkId, RenderedImage>,
    /// Insert cursor as a character offset.
    cursor: usize,
    /// Whether the text changed since the last load or save.
    modified: bool,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    /// Creates a new empty text buffer.
    pub fn new() -> Self {
        Self::with_rope(Rope::new())
    }

    fn with_rope(rope: Rope) -> Self {
        Self {
            rope,
            marks: HashMap::new(),
            next_mark: 0,
            tags: BTreeMap::new(),
            next_tag: 0,
            images: BTreeMap::new(),
            cursor: 0,
            modified: false,
        }
    }

    /// Creates a text buffer from a string.
    pub fn from_str(text: &str) -> Self {
        Self::with_rope(Rope::from_str(text))
    }

    /// Loads a text buffer from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = fs::File::open(path)?;
        let reader = BufReader::new(file);
        let rope = Rope::from_reader(reader)?;
        Ok(Self::with_rope(rope))
    }

    /// Saves the buffer to a file and clears the modified flag.
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> io::Result<()> {
        let file = fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.rope.write_to(&mut writer)?;
        self.modified = false;
        Ok(())
    }

    /// Returns the total number of characters in the buffer.
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// Returns the total number of lines in the buffer.
    pub fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Returns whether the text changed since it was loaded or saved.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Sets or clears the modified flag.
    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// Inserts a string at the given character index.
    pub fn insert(&mut self, char_idx: usize, text: &str) {
        let idx = char_idx.min(self.len_chars());
        let len = text.chars().count();
        if len == 0 {
            return;
        }
        self.rope.insert(idx, text);

        for mark in self.marks.values_mut() {
            mark.on_insert(idx, len);
        }
        for tag in self.tags.values_mut() {
            tag.on_insert(idx, len);
        }
        // The cursor behaves like a right-gravity mark
        if self.cursor >= idx {
            self.cursor += len;
        }
        self.modified = true;
    }

    /// Removes text in the given character range.
    pub fn remove(&mut self, start: usize, end: usize) {
        let start = start.min(self.len_chars());
        let end = end.min(self.len_chars());
        if start >= end {
            return;
        }
        self.rope.remove(start..end);

        for mark in self.marks.values_mut() {
            mark.on_remove(start, end);
        }
        for tag in self.tags.values_mut() {
            tag.on_remove(start, end);
        }
        self.cursor = map_through_removal(self.cursor, start, end);
        self.modified = true;
    }

    /// Converts a character index to a (line, column) position.
    /// Both line and column are 0-indexed.
    pub fn char_to_line_col(&self, char_idx: usize) -> (usize, usize) {
        let char_idx = char_idx.min(self.len_chars());
        let line = self.rope.char_to_line(char_idx);
        let line_start = self.rope.line_to_char(line);
        let col = char_idx - line_start;
        (line, col)
    }

    /// Converts a (line, column) position to a character index.
    /// Both line and column are 0-indexed.
    pub fn line_col_to_char(&self, line: usize, col: usize) -> usize {
        if line >= self.len_lines() {
            return self.len_chars();
        }
        let line_start = self.rope.line_to_char(line);
        let line_len = self.line_len_chars(line);
        line_start + col.min(line_len)
    }

    /// Converts a position to a character index.
    pub fn position_to_char(&self, pos: Position) -> usize {
        self.line_col_to_char(pos.line, pos.col)
    }

    /// Converts a character index to a position.
    pub fn char_to_position(&self, char_idx: usize) -> Position {
        let (line, col) = self.char_to_line_col(char_idx);
        Position::new(line, col)
    }

    /// Returns the length of a line in characters (excluding newline).
    pub fn line_len_chars(&self, line: usize) -> usize {
        if line >= self.len_lines() {
            return 0;
        }
        let line_slice = self.rope.line(line);
        let len = line_slice.len_chars();
        // Subtract newline character if present
        if len > 0 {
            let last_char = line_slice.char(len - 1);
            if last_char == '\n' {
                return len - 1;
            }
        }
        len
    }

    /// Returns the line at the given index as a string.
    pub fn line(&self, line: usize) -> Option<String> {
        if line >= self.len_lines() {
            None
        } else {
            let line_slice = self.rope.line(line);
            let mut s = line_slice.to_string();
            // Remove trailing newline for consistency
            if s.ends_with('\n') {
                s.pop();
            }
            Some(s)
        }
    }

    /// Returns the entire buffer as a string.
    pub fn to_string(&self) -> String {
        self.rope.to_string()
    }

    // ==================== Cursor ====================

    /// Returns the cursor as a character index.
    pub fn cursor_char(&self) -> usize {
        self.cursor
    }

    /// Moves the cursor, clamping to the buffer.
    pub fn set_cursor(&mut self, pos: Position) {
        self.cursor = self.position_to_char(pos);
    }

    // ==================== Presentation ====================

    /// Returns true if the character at `char_idx` is hidden.
    ///
    /// The highest-priority tag covering the character decides.
    pub fn is_hidden(&self, char_idx: usize) -> bool {
        self.tags
            .values()
            .rev()
            .find(|tag| tag.covers(char_idx))
            .is_some_and(|tag| tag.invisible)
    }

    /// Returns a line with hidden characters removed.
    pub fn visible_line(&self, line: usize) -> Option<String> {
        let text = self.line(line)?;
        let start = self.rope.line_to_char(line);
        Some(
            text.chars()
                .enumerate()
                .filter(|(i, _)| !self.is_hidden(start + i))
                .map(|(_, ch)| ch)
                .collect(),
        )
    }

    /// Returns the image anchored at a mark, if one is shown.
    pub fn image_at(&self, anchor: MarkId) -> Option<&RenderedImage> {
        self.images.get(&anchor)
    }

    /// Returns every shown image with its anchor position.
    pub fn images(&self) -> Vec<(Position, &RenderedImage)> {
        self.images
            .iter()
            .filter_map(|(mark, image)| Some((self.mark_position(*mark)?, image)))
            .collect()
    }

    /// Returns the number of live marks.
    pub fn mark_count(&self) -> usize {
        self.marks.len()
    }

    /// Returns the number of live tags.
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }
}

impl TextHost for TextBuffer {
    fn line_count(&self) -> usize {
        self.len_lines()
    }

    fn line_text(&self, line: usize) -> Option<String> {
        self.line(line)
    }

    fn slice(&self, start: Position, end: Position) -> String {
        let start = self.position_to_char(start);
        let end = self.position_to_char(end);
        if start >= end {
            String::new()
        } else {
            self.rope.slice(start..end).to_string()
        }
    }

    fn advance(&self, pos: Position, chars: usize) -> Position {
        let idx = (self.position_to_char(pos) + chars).min(self.len_chars());
        self.char_to_position(idx)
    }

    fn create_mark(&mut self, pos: Position, left_gravity: bool) -> MarkId {
        let id = MarkId(self.next_mark);
        self.next_mark += 1;
        let offset = self.position_to_char(pos);
        self.marks.insert(
            id,
            Mark {
                offset,
                left_gravity,
            },
        );
        id
    }

    fn mark_position(&self, mark: MarkId) -> Option<Position> {
        self.marks
            .get(&mark)
            .map(|m| self.char_to_position(m.offset))
    }

    fn delete_mark(&mut self, mark: MarkId) {
        self.marks.remove(&mark);
        self.images.remove(&mark);
    }

    fn cursor(&self) -> Position {
        self.char_to_position(self.cursor)
    }

    fn create_tag(&mut self, invisible: bool) -> TagId {
        let id = TagId(self.next_tag);
        self.next_tag += 1;
        self.tags.insert(
            id,
            Tag {
                invisible,
                spans: Vec::new(),
            },
        );
        id
    }

    fn delete_tag(&mut self, tag: TagId) {
        self.tags.remove(&tag);
    }

    fn apply_tag(&mut self, tag: TagId, start: Position, end: Position) {
        let range = self.position_to_char(start)..self.position_to_char(end);
        if let Some(tag) = self.tags.get_mut(&tag) {
            tag.add(range);
        }
    }

    fn remove_tag(&mut self, tag: TagId, start: Position, end: Position) {
        let range = self.position_to_char(start)..self.position_to_char(end);
        if let Some(tag) = self.tags.get_mut(&tag) {
            tag.subtract(range);
        }
    }

    fn show_image(&mut self, anchor: MarkId, image: RenderedImage) {
        if self.marks.contains_key(&anchor) {
            self.images.insert(anchor, image);
        }
    }

    fn hide_image(&mut self, anchor: MarkId) {
        self.images.remove(&anchor);
    }
}
