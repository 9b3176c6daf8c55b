//! Syntax-hiding validators.
//!
//! A hiding validator hides the whole matched text and shows selected
//! capture groups again. It owns two tags: an invisible one laid over the
//! match and a visible one, created afterwards so it takes priority, laid
//! over the groups that stay readable.

use crate::host::{TagId, TextHost};
use crate::region::Region;

use super::pattern::{LineMatch, Pattern};

/// `{{ key : value }}` metadata, showing the value.
pub const META_PATTERN: &str = r"\{\{\s*([^#]*)\s*:\s*([^:]*[^\s][^:]*?)\s*\}\}";
/// `'''text'''` emphasis, showing the text.
pub const EMPHASIS_PATTERN: &str = r"'{3}([^']+)'{3}";
/// `__text__` strong text, showing the text.
pub const STRONG_PATTERN: &str = r"_{2}([^_]+)_{2}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TagPair {
    hidden: TagId,
    shown: TagId,
}

/// Hides matched markup, keeping the designated groups visible.
#[derive(Debug, Clone)]
pub struct HideValidator {
    name: String,
    pattern: Pattern,
    visible_groups: Vec<usize>,
    /// Present between `install` and `uninstall`.
    tags: Option<TagPair>,
}

impl HideValidator {
    /// Creates a hiding validator.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        visible_groups: Vec<usize>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Pattern::new(pattern)?,
            visible_groups,
            tags: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Returns true between `install` and `uninstall`.
    pub fn is_installed(&self) -> bool {
        self.tags.is_some()
    }

    /// Creates the validator's tags in the host.
    pub fn install<H: TextHost>(&mut self, host: &mut H) {
        if self.tags.is_none() {
            let hidden = host.create_tag(true);
            let shown = host.create_tag(false);
            self.tags = Some(TagPair { hidden, shown });
        }
    }

    /// Deletes the validator's tags, dropping every application of them.
    pub fn uninstall<H: TextHost>(&mut self, host: &mut H) {
        if let Some(tags) = self.tags.take() {
            host.delete_tag(tags.hidden);
            host.delete_tag(tags.shown);
        }
    }

    /// Hides the match and reveals the visible groups.
    pub fn apply<H: TextHost>(&self, host: &mut H, region: &Region, m: &LineMatch) {
        let (Some(tags), Some((start, end))) = (self.tags, region.span(host)) else {
            return;
        };

        host.apply_tag(tags.hidden, start, end);
        for &idx in &self.visible_groups {
            if let Some((from, to)) = m.group(idx) {
                let group_start = host.advance(start, from);
                let group_end = host.advance(start, to);
                host.apply_tag(tags.shown, group_start, group_end);
            }
        }
    }

    /// Hides the whole region, groups included.
    pub fn hide_all<H: TextHost>(&self, host: &mut H, region: &Region) {
        if let (Some(tags), Some((start, end))) = (self.tags, region.span(host)) {
            host.apply_tag(tags.hidden, start, end);
        }
    }

    /// Removes both tags from the region.
    pub fn revert<H: TextHost>(&self, host: &mut H, region: &Region) {
        if let (Some(tags), Some((start, end))) = (self.tags, region.span(host)) {
            host.remove_tag(tags.hidden, start, end);
            host.remove_tag(tags.shown, start, end);
        }
    }

    /// Re-matches the region's current text, returning the match if it
    /// still covers the text exactly.
    pub fn rematch<H: TextHost>(&self, host: &H, region: &Region) -> Option<LineMatch> {
        let text = region.text(host)?;
        self.pattern.match_exact(&text)
    }

    /// Reveals the raw text for editing.
    pub fn enter<H: TextHost>(&self, host: &mut H, region: &Region) {
        self.revert(host, region);
    }

    /// Hides the text again if it still matches.
    pub fn exit<H: TextHost>(&self, host: &mut H, region: &Region) {
        if let Some(m) = self.rematch(host, region) {
            self.apply(host, region, &m);
        }
    }
}
