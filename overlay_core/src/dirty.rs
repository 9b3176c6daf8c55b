//! Dirty-line tracking between revalidation passes.

use std::collections::BTreeSet;

/// Deduplicated set of lines awaiting revalidation.
///
/// Lines accumulate between idle passes and are taken all at once when a
/// pass begins. Edits shift the set with exactly the same deltas as the
/// region index, so both always agree on line numbers.
#[derive(Debug, Clone, Default)]
pub struct DirtyLines {
    lines: BTreeSet<usize>,
}

impl DirtyLines {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the inclusive range between `a` and `b` dirty, in either order.
    pub fn invalidate(&mut self, a: usize, b: usize) {
        let (from, to) = if a <= b { (a, b) } else { (b, a) };
        self.lines.extend(from..=to);
    }

    /// Takes and clears the set, returning the lines in ascending order.
    pub fn take(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.lines).into_iter().collect()
    }

    /// Adds `delta` to every line at or after `from_line`.
    ///
    /// Matches `RegionIndex::shift`: with a negative delta, lines inside the
    /// removed range collapse onto `from_line + delta`.
    pub fn shift(&mut self, from_line: usize, delta: isize) {
        if delta == 0 {
            return;
        }
        let moved: Vec<usize> = if delta > 0 {
            self.lines.range(from_line..).copied().collect()
        } else {
            let floor = from_line.saturating_sub(delta.unsigned_abs());
            self.lines.range(floor + 1..).copied().collect()
        };

        for line in &moved {
            self.lines.remove(line);
        }
        for line in moved {
            let shifted = if delta > 0 {
                line + delta as usize
            } else if line >= from_line {
                line - delta.unsigned_abs()
            } else {
                from_line.saturating_sub(delta.unsigned_abs())
            };
            self.lines.insert(shifted);
        }
    }

    /// Returns the dirty lines in ascending order.
    pub fn lines(&self) -> Vec<usize> {
        self.lines.iter().copied().collect()
    }

    /// Returns true if nothing is dirty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Forgets all dirty lines.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
