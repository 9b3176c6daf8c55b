//! Validators - pattern matchers with presentation effects.
//!
//! The set of behaviours is closed: hiding validators (several instances
//! differing only in pattern) and the math validator, which additionally
//! renders its regions through an external process. `Validator` dispatches
//! the shared capability set over both.

pub mod hide;
pub mod math;
pub mod pattern;
pub mod render;

use std::time::Instant;

use markup_overlay_render::{JobStatus, RenderConfig};

use crate::host::TextHost;
use crate::perf::RenderStats;
use crate::region::{Region, RegionId};

pub use hide::{HideValidator, EMPHASIS_PATTERN, META_PATTERN, STRONG_PATTERN};
pub use math::{MathValidator, MATH_PATTERN};
pub use pattern::{LineMatch, Pattern};
pub use render::RenderManager;

/// A matcher plus the effects it has on its regions.
#[derive(Debug)]
pub enum Validator {
    Hide(HideValidator),
    Math(MathValidator),
}

impl Validator {
    /// Metadata tags `{{ key : value }}`, showing the value.
    pub fn meta() -> Result<Self, regex::Error> {
        HideValidator::new("meta", META_PATTERN, vec![2]).map(Validator::Hide)
    }

    /// Emphasis `'''text'''`, showing the text.
    pub fn emphasis() -> Result<Self, regex::Error> {
        HideValidator::new("emphasis", EMPHASIS_PATTERN, vec![1]).map(Validator::Hide)
    }

    /// Strong text `__text__`, showing the text.
    pub fn strong() -> Result<Self, regex::Error> {
        HideValidator::new("strong", STRONG_PATTERN, vec![1]).map(Validator::Hide)
    }

    /// Inline math `$expr$`, rendered with `config`.
    pub fn math(config: RenderConfig) -> Result<Self, regex::Error> {
        MathValidator::new(config).map(Validator::Math)
    }

    /// A hiding validator with a caller-supplied pattern.
    pub fn custom(
        name: impl Into<String>,
        pattern: &str,
        visible_groups: Vec<usize>,
    ) -> Result<Self, regex::Error> {
        HideValidator::new(name, pattern, visible_groups).map(Validator::Hide)
    }

    pub fn name(&self) -> &str {
        match self {
            Validator::Hide(v) => v.name(),
            Validator::Math(v) => v.name(),
        }
    }

    pub fn pattern(&self) -> &Pattern {
        match self {
            Validator::Hide(v) => v.pattern(),
            Validator::Math(v) => v.pattern(),
        }
    }

    /// Creates the validator's host resources.
    pub fn install<H: TextHost>(&mut self, host: &mut H) {
        match self {
            Validator::Hide(v) => v.install(host),
            Validator::Math(v) => v.install(host),
        }
    }

    /// Releases the validator's host resources and kills its renders.
    pub fn uninstall<H: TextHost>(&mut self, host: &mut H) {
        match self {
            Validator::Hide(v) => v.uninstall(host),
            Validator::Math(v) => v.uninstall(host),
        }
    }

    /// Returns all non-overlapping matches in a line.
    pub fn find_matches(&self, line: &str) -> Vec<LineMatch> {
        self.pattern().find_all(line)
    }

    /// Returns true if the pattern matches `text` exactly.
    pub fn match_exact(&self, text: &str) -> bool {
        self.pattern().match_exact(text).is_some()
    }

    /// Applies the validator's effect to a newly created region.
    pub fn apply<H: TextHost>(&mut self, host: &mut H, region: &mut Region, m: &LineMatch) {
        match self {
            Validator::Hide(v) => v.apply(host, region, m),
            Validator::Math(v) => v.apply(host, region, m),
        }
    }

    /// Removes every effect from a region about to be destroyed.
    pub fn revert<H: TextHost>(&mut self, host: &mut H, region: &mut Region) {
        match self {
            Validator::Hide(v) => v.revert(host, region),
            Validator::Math(v) => v.revert(host, region),
        }
    }

    /// The cursor moved into the region.
    pub fn enter<H: TextHost>(&mut self, host: &mut H, region: &mut Region) {
        match self {
            Validator::Hide(v) => v.enter(host, region),
            Validator::Math(v) => v.enter(host, region),
        }
    }

    /// The cursor left the region.
    pub fn exit<H: TextHost>(&mut self, host: &mut H, region: &mut Region) {
        match self {
            Validator::Hide(v) => v.exit(host, region),
            Validator::Math(v) => v.exit(host, region),
        }
    }

    /// Undoes any substitution that must not reach the saved file.
    pub fn store_for_save<H: TextHost>(&mut self, host: &mut H, region: &mut Region) {
        if let Validator::Math(v) = self {
            v.store_for_save(host, region);
        }
    }

    /// Reinstates what `store_for_save` undid.
    pub fn restore_after_save<H: TextHost>(&mut self, host: &mut H, region: &mut Region) {
        if let Validator::Math(v) = self {
            v.restore_after_save(host, region);
        }
    }

    /// Returns renders that finished by `now`.
    pub fn poll_renders(&mut self, now: Instant) -> Vec<(RegionId, JobStatus)> {
        match self {
            Validator::Hide(_) => Vec::new(),
            Validator::Math(v) => v.poll_renders(now),
        }
    }

    /// Hands a finished render back to the validator.
    pub fn complete_render<H: TextHost>(
        &mut self,
        host: &mut H,
        region: &mut Region,
        status: JobStatus,
    ) {
        if let Validator::Math(v) = self {
            v.complete_render(host, region, status);
        }
    }

    /// Returns when the validator's poll timer next fires.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self {
            Validator::Hide(_) => None,
            Validator::Math(v) => v.next_deadline(),
        }
    }

    pub fn running_renders(&self) -> usize {
        match self {
            Validator::Hide(_) => 0,
            Validator::Math(v) => v.running_renders(),
        }
    }

    pub fn render_stats(&self) -> RenderStats {
        match self {
            Validator::Hide(_) => RenderStats::default(),
            Validator::Math(v) => v.render_stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let names: Vec<String> = [
            Validator::meta(),
            Validator::emphasis(),
            Validator::strong(),
            Validator::math(RenderConfig::default()),
        ]
        .into_iter()
        .map(|v| v.unwrap().name().to_string())
        .collect();
        assert_eq!(names, vec!["meta", "emphasis", "strong", "math"]);
    }

    #[test]
    fn test_match_dispatch() {
        let strong = Validator::strong().unwrap();
        assert_eq!(strong.find_matches("a __b__ c __d__").len(), 2);
        assert!(strong.match_exact("__b__"));
        assert!(!strong.match_exact("__b__ "));

        let math = Validator::math(RenderConfig::default()).unwrap();
        assert!(math.match_exact("$x^2$"));
        assert_eq!(math.running_renders(), 0);
        assert!(math.next_deadline().is_none());
    }

    #[test]
    fn test_custom_validator() {
        let v = Validator::custom("code", r"`([^`]+)`", vec![1]).unwrap();
        assert_eq!(v.name(), "code");
        assert!(v.match_exact("`x`"));
        assert!(Validator::custom("broken", r"(", vec![]).is_err());
    }
}
