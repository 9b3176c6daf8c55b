//! Region index - regions ordered by line.
//!
//! Regions live in an arena keyed by stable `RegionId`s. A separate key
//! array, sorted by line, provides the ordering: all entries for one line
//! are contiguous, so a binary search finds the run for any line. Line
//! numbers are kept current by bulk shifts on edits rather than by reading
//! positions back from the buffer.

use std::collections::HashMap;

use crate::cursor::Position;
use crate::host::{MarkId, TextHost};
use crate::region::{Region, RegionData, RegionId, ValidatorId};

/// One key array entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    line: usize,
    id: RegionId,
}

/// Ordered collection of live regions.
#[derive(Debug, Default)]
pub struct RegionIndex {
    regions: HashMap<RegionId, Region>,
    /// Sorted by line; ties keep insertion order.
    entries: Vec<Entry>,
    next_id: u64,
}

impl RegionIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of regions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index holds no regions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a region keyed on `line` and returns its id.
    pub fn insert(
        &mut self,
        line: usize,
        validator: ValidatorId,
        start: MarkId,
        end: MarkId,
    ) -> RegionId {
        let id = RegionId(self.next_id);
        self.next_id += 1;

        self.regions.insert(
            id,
            Region {
                id,
                validator,
                start,
                end,
                active: false,
                matched: String::new(),
                data: RegionData::default(),
            },
        );
        self.insert_entry(Entry { line, id });
        id
    }

    fn insert_entry(&mut self, entry: Entry) {
        // After any existing entries for the same line
        let at = self.entries.partition_point(|e| e.line <= entry.line);
        self.entries.insert(at, entry);
    }

    /// Returns a region by id.
    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    /// Returns a mutable region by id.
    pub fn get_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        self.regions.get_mut(&id)
    }

    /// Returns the line a region is keyed on.
    pub fn line_of(&self, id: RegionId) -> Option<usize> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.line)
    }

    /// Returns the ids keyed on `line`, in insertion order.
    pub fn find_on_line(&self, line: usize) -> Vec<RegionId> {
        let first = self.entries.partition_point(|e| e.line < line);
        self.entries[first..]
            .iter()
            .take_while(|e| e.line == line)
            .map(|e| e.id)
            .collect()
    }

    /// Returns true if `validator` already owns a region spanning exactly
    /// `[start, end)`.
    pub fn contains_span<H: TextHost>(
        &self,
        host: &H,
        validator: ValidatorId,
        start: Position,
        end: Position,
    ) -> bool {
        self.find_on_line(start.line)
            .into_iter()
            .filter_map(|id| self.regions.get(&id))
            .any(|r| r.validator == validator && r.has_span(host, start, end))
    }

    /// Adds `delta` to the line of every entry at or after `from_line`.
    ///
    /// With a negative delta the lines `from_line + delta .. from_line`
    /// no longer exist; entries still keyed inside them collapse onto
    /// `from_line + delta`, where their text now starts.
    pub fn shift(&mut self, from_line: usize, delta: isize) {
        if delta > 0 {
            let first = self.entries.partition_point(|e| e.line < from_line);
            for entry in &mut self.entries[first..] {
                entry.line += delta as usize;
            }
        } else if delta < 0 {
            let removed = delta.unsigned_abs();
            debug_assert!(removed <= from_line, "shift below line 0");
            let floor = from_line.saturating_sub(removed);

            let first = self.entries.partition_point(|e| e.line <= floor);
            for entry in &mut self.entries[first..] {
                if entry.line >= from_line {
                    entry.line -= removed;
                } else {
                    entry.line = floor;
                }
            }
        }
        debug_assert!(self.is_sorted(), "region index out of order after shift");
    }

    /// Moves a single region to a new line key.
    pub fn rekey(&mut self, id: RegionId, line: usize) {
        if let Some(pos) = self.entries.iter().position(|e| e.id == id) {
            if self.entries[pos].line != line {
                self.entries.remove(pos);
                self.insert_entry(Entry { line, id });
            }
        }
    }

    /// Removes a region and releases its marks back to the host.
    pub fn remove<H: TextHost>(&mut self, host: &mut H, id: RegionId) -> Option<Region> {
        let region = self.regions.remove(&id)?;
        self.entries.retain(|e| e.id != id);
        host.delete_mark(region.start);
        host.delete_mark(region.end);
        Some(region)
    }

    /// Returns all ids in index order.
    pub fn ids(&self) -> Vec<RegionId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Returns all (line, id) pairs in index order.
    pub fn keys(&self) -> Vec<(usize, RegionId)> {
        self.entries.iter().map(|e| (e.line, e.id)).collect()
    }

    /// Iterates regions in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Region> + '_ {
        self.entries.iter().filter_map(|e| self.regions.get(&e.id))
    }

    fn is_sorted(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].line <= w[1].line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TextBuffer;

    fn add(
        index: &mut RegionIndex,
        buf: &mut TextBuffer,
        line: usize,
        cols: (usize, usize),
    ) -> RegionId {
        let start = buf.create_mark(Position::new(line, cols.0), true);
        let end = buf.create_mark(Position::new(line, cols.1), false);
        index.insert(line, 0, start, end)
    }

    fn lines(index: &RegionIndex) -> Vec<usize> {
        index.keys().into_iter().map(|(line, _)| line).collect()
    }

    #[test]
    fn test_insert_keeps_line_order() {
        let mut buf = TextBuffer::from_str("a\nb\nc\nd\n");
        let mut index = RegionIndex::new();
        add(&mut index, &mut buf, 3, (0, 1));
        add(&mut index, &mut buf, 1, (0, 1));
        add(&mut index, &mut buf, 2, (0, 1));
        add(&mut index, &mut buf, 1, (0, 1));
        assert_eq!(lines(&index), vec![1, 1, 2, 3]);
    }

    #[test]
    fn test_find_on_line() {
        let mut buf = TextBuffer::from_str("aaaa\nbbbb\ncccc\n");
        let mut index = RegionIndex::new();
        let a = add(&mut index, &mut buf, 1, (0, 1));
        add(&mut index, &mut buf, 2, (0, 1));
        let b = add(&mut index, &mut buf, 1, (2, 3));

        assert_eq!(index.find_on_line(1), vec![a, b]);
        assert!(index.find_on_line(0).is_empty());
        assert!(index.find_on_line(7).is_empty());
    }

    #[test]
    fn test_shift_forward() {
        let mut buf = TextBuffer::from_str("a\nb\nc\nd\n");
        let mut index = RegionIndex::new();
        for line in 0..4 {
            add(&mut index, &mut buf, line, (0, 1));
        }
        index.shift(2, 3);
        assert_eq!(lines(&index), vec![0, 1, 5, 6]);
    }

    #[test]
    fn test_shift_backward_collapses_removed_lines() {
        let mut buf = TextBuffer::from_str("a\nb\nc\nd\ne\nf\n");
        let mut index = RegionIndex::new();
        for line in 0..6 {
            add(&mut index, &mut buf, line, (0, 1));
        }
        // Lines 1..4 joined into line 1
        index.shift(4, -3);
        assert_eq!(lines(&index), vec![0, 1, 1, 1, 1, 2]);
    }

    #[test]
    fn test_rekey_moves_entry() {
        let mut buf = TextBuffer::from_str("a\nb\nc\n");
        let mut index = RegionIndex::new();
        let a = add(&mut index, &mut buf, 0, (0, 1));
        let b = add(&mut index, &mut buf, 1, (0, 1));
        index.rekey(a, 2);
        assert_eq!(index.keys(), vec![(1, b), (2, a)]);
        assert_eq!(index.line_of(a), Some(2));
    }

    #[test]
    fn test_contains_span_is_per_validator() {
        let mut buf = TextBuffer::from_str("$x$ $y$");
        let mut index = RegionIndex::new();
        add(&mut index, &mut buf, 0, (0, 3));

        assert!(index.contains_span(&buf, 0, Position::new(0, 0), Position::new(0, 3)));
        assert!(!index.contains_span(&buf, 1, Position::new(0, 0), Position::new(0, 3)));
        assert!(!index.contains_span(&buf, 0, Position::new(0, 4), Position::new(0, 7)));
    }

    #[test]
    fn test_remove_releases_marks() {
        let mut buf = TextBuffer::from_str("$x$");
        let mut index = RegionIndex::new();
        let id = add(&mut index, &mut buf, 0, (0, 3));
        assert_eq!(buf.mark_count(), 2);

        let region = index.remove(&mut buf, id).unwrap();
        assert_eq!(region.id, id);
        assert!(index.is_empty());
        assert_eq!(buf.mark_count(), 0);
        assert!(index.remove(&mut buf, id).is_none());
    }
}
