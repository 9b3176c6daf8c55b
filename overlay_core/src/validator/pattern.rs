//! Regex matching with char-column results.

use regex::{Captures, Regex};

/// One pattern match within a piece of text.
///
/// `start` and `end` are char columns in the scanned text. Group spans are
/// char offsets relative to `start`, one entry per capture group (group 0
/// included), `None` where a group did not participate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    pub start: usize,
    pub end: usize,
    pub groups: Vec<Option<(usize, usize)>>,
}

impl LineMatch {
    /// Returns the relative span of capture group `idx`.
    pub fn group(&self, idx: usize) -> Option<(usize, usize)> {
        self.groups.get(idx).copied().flatten()
    }

    /// Returns the match length in chars.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true for a zero-width match.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A compiled validator pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// Compiles a pattern.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(source)?,
        })
    }

    /// Returns the pattern source.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Returns the number of capture groups, group 0 included.
    pub fn group_count(&self) -> usize {
        self.regex.captures_len()
    }

    /// Finds all non-overlapping, non-empty matches in `line`.
    pub fn find_all(&self, line: &str) -> Vec<LineMatch> {
        self.regex
            .captures_iter(line)
            .map(|caps| to_line_match(line, &caps))
            .filter(|m| !m.is_empty())
            .collect()
    }

    /// Matches `text` as a whole.
    ///
    /// Succeeds only if the leftmost match starts at the beginning of
    /// `text` and runs to its end.
    pub fn match_exact(&self, text: &str) -> Option<LineMatch> {
        let caps = self.regex.captures(text)?;
        let whole = caps.get(0)?;
        if text.is_empty() || whole.start() != 0 || whole.end() != text.len() {
            return None;
        }
        Some(to_line_match(text, &caps))
    }
}

fn to_line_match(text: &str, caps: &Captures<'_>) -> LineMatch {
    let col = |byte: usize| text[..byte].chars().count();

    // Group 0 always participates
    let (start_byte, end_byte) = caps.get(0).map_or((0, 0), |m| (m.start(), m.end()));
    let start = col(start_byte);

    let groups = caps
        .iter()
        .map(|group| group.map(|m| (col(m.start()) - start, col(m.end()) - start)))
        .collect();

    LineMatch {
        start,
        end: col(end_byte),
        groups,
    }
}
