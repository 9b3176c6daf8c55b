//! Math validator - inline `$...$` expressions rendered to images.
//!
//! The raw expression is hidden as soon as the region exists. A render job
//! runs in the background; when it succeeds the image is shown at the
//! region's start mark. Entering the region cancels the render and puts
//! the raw text back, exiting renders again.

use std::time::Instant;

use markup_overlay_render::{JobStatus, RenderConfig, RenderRequest};

use crate::host::TextHost;
use crate::perf::RenderStats;
use crate::region::{Region, RegionId, RenderState};

use super::hide::HideValidator;
use super::pattern::{LineMatch, Pattern};
use super::render::RenderManager;

/// `$expression$`, rendered from group 1.
pub const MATH_PATTERN: &str = r"\$(.*?)\$";

/// Hides inline math and replaces it with a rendered image.
#[derive(Debug)]
pub struct MathValidator {
    hide: HideValidator,
    renders: RenderManager,
    config: RenderConfig,
}

impl MathValidator {
    pub fn new(config: RenderConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            hide: HideValidator::new("math", MATH_PATTERN, Vec::new())?,
            renders: RenderManager::new(&config),
            config,
        })
    }

    pub fn name(&self) -> &str {
        self.hide.name()
    }

    pub fn pattern(&self) -> &Pattern {
        self.hide.pattern()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn install<H: TextHost>(&mut self, host: &mut H) {
        self.hide.install(host);
    }

    /// Kills every render and deletes the validator's tags.
    pub fn uninstall<H: TextHost>(&mut self, host: &mut H) {
        self.renders.cancel_all();
        self.hide.uninstall(host);
    }

    /// Hides the expression and starts rendering it.
    pub fn apply<H: TextHost>(&mut self, host: &mut H, region: &mut Region, m: &LineMatch) {
        self.hide.hide_all(host, region);
        self.start_render(host, region, m);
    }

    fn start_render<H: TextHost>(&mut self, host: &mut H, region: &mut Region, m: &LineMatch) {
        self.remove_image(host, region);
        if !self.config.enabled {
            return;
        }
        let Some((start, _)) = region.span(host) else {
            return;
        };

        let expression = match m.group(1) {
            Some((from, to)) => host.slice(host.advance(start, from), host.advance(start, to)),
            None => String::new(),
        };
        let color = host.foreground_color();

        let started = RenderRequest::new(expression, &self.config, color.as_deref()).and_then(
            |request| {
                self.renders
                    .start(region.id, &request, &self.config, Instant::now())
            },
        );

        match started {
            Ok(()) => region.data.render = RenderState::Running,
            Err(e) => {
                // Not retried until the region is applied again
                log::warn!("Cannot render region {}: {}", region.id.0, e);
                region.data.render = RenderState::Failed;
            }
        }
    }

    /// Cancels any render and removes every effect from the region.
    pub fn revert<H: TextHost>(&mut self, host: &mut H, region: &mut Region) {
        self.cancel_render(region);
        self.remove_image(host, region);
        self.hide.revert(host, region);
    }

    /// Reveals the raw expression for editing.
    pub fn enter<H: TextHost>(&mut self, host: &mut H, region: &mut Region) {
        self.hide.revert(host, region);
        self.cancel_render(region);
        self.remove_image(host, region);
    }

    /// Hides and renders again if the text still matches.
    pub fn exit<H: TextHost>(&mut self, host: &mut H, region: &mut Region) {
        if let Some(m) = self.hide.rematch(host, region) {
            self.apply(host, region, &m);
        }
    }

    /// Takes a shown image down before the document is written.
    pub fn store_for_save<H: TextHost>(&mut self, host: &mut H, region: &mut Region) {
        if region.data.image_shown {
            self.remove_image(host, region);
            region.data.restore_image = true;
        }
    }

    /// Puts back an image taken down by `store_for_save`.
    pub fn restore_after_save<H: TextHost>(&mut self, host: &mut H, region: &mut Region) {
        if !std::mem::take(&mut region.data.restore_image) {
            return;
        }
        if self.hide.rematch(host, region).is_some() {
            self.show_image(host, region);
        } else {
            log::warn!(
                "Not restoring image for region {}: text changed during save",
                region.id.0
            );
        }
    }

    /// Returns finished renders if the poll timer is due.
    pub fn poll_renders(&mut self, now: Instant) -> Vec<(RegionId, JobStatus)> {
        self.renders.poll(now)
    }

    /// Records the outcome of a finished render.
    pub fn complete_render<H: TextHost>(
        &mut self,
        host: &mut H,
        region: &mut Region,
        status: JobStatus,
    ) {
        match status {
            JobStatus::Succeeded(image) => {
                log::debug!(
                    "Render for region {} succeeded ({} bytes)",
                    region.id.0,
                    image.len()
                );
                region.data.image = Some(image);
                region.data.render = RenderState::Succeeded;
                if !region.active {
                    self.show_image(host, region);
                }
            }
            JobStatus::Failed(reason) => {
                log::warn!("Render for region {} failed: {}", region.id.0, reason);
                region.data.image = None;
                region.data.render = RenderState::Failed;
            }
            JobStatus::Running => {}
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.renders.deadline()
    }

    pub fn running_renders(&self) -> usize {
        self.renders.running()
    }

    pub fn render_stats(&self) -> RenderStats {
        self.renders.stats()
    }

    fn cancel_render(&mut self, region: &mut Region) {
        if self.renders.cancel(region.id) {
            region.data.render = RenderState::Idle;
        }
    }

    fn show_image<H: TextHost>(&self, host: &mut H, region: &mut Region) {
        if let Some(image) = region.data.image.clone() {
            self.hide.hide_all(host, region);
            host.show_image(region.start, image);
            region.data.image_shown = true;
        }
    }

    fn remove_image<H: TextHost>(&self, host: &mut H, region: &mut Region) {
        if std::mem::take(&mut region.data.image_shown) {
            host.hide_image(region.start);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::buffer::TextBuffer;
    use crate::cursor::Position;
    use crate::index::RegionIndex;
    use markup_overlay_render::RenderedImage;
    use std::thread;
    use std::time::Duration;

    fn validator(command: &str) -> MathValidator {
        MathValidator::new(RenderConfig {
            command: command.to_string(),
            document: "#expression".to_string(),
            poll_interval_ms: 10,
            ..RenderConfig::default()
        })
        .unwrap()
    }

    fn setup(text: &str, v: &mut MathValidator) -> (TextBuffer, RegionIndex, RegionId, LineMatch) {
        let mut buf = TextBuffer::from_str(text);
        v.install(&mut buf);
        let m = v.pattern().find_all(&buf.line(0).unwrap()).remove(0);
        let start = buf.create_mark(Position::new(0, m.start), true);
        let end = buf.create_mark(Position::new(0, m.end), false);
        let mut index = RegionIndex::new();
        let id = index.insert(0, 0, start, end);
        (buf, index, id, m)
    }

    fn wait_for_render(v: &mut MathValidator) -> Vec<(RegionId, JobStatus)> {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
            let done = v.poll_renders(Instant::now());
            if !done.is_empty() {
                return done;
            }
        }
        Vec::new()
    }

    #[test]
    fn test_apply_hides_and_starts_render() {
        let mut v = validator("sleep 30");
        let (mut buf, mut index, id, m) = setup("a $x^2$ b", &mut v);
        let region = index.get_mut(id).unwrap();

        v.apply(&mut buf, region, &m);
        assert_eq!(region.data.render, RenderState::Running);
        assert_eq!(v.running_renders(), 1);
        assert_eq!(buf.visible_line(0).unwrap(), "a  b");
        assert!(buf.images().is_empty());

        v.revert(&mut buf, region);
        assert_eq!(v.running_renders(), 0);
        assert_eq!(buf.visible_line(0).unwrap(), "a $x^2$ b");
    }

    #[test]
    fn test_successful_render_shows_image() {
        let mut v = validator("cp #input #output");
        let (mut buf, mut index, id, m) = setup("$x^2$", &mut v);
        v.apply(&mut buf, index.get_mut(id).unwrap(), &m);

        let done = wait_for_render(&mut v);
        assert_eq!(done.len(), 1);
        let (done_id, status) = done.into_iter().next().unwrap();
        assert_eq!(done_id, id);

        let region = index.get_mut(id).unwrap();
        v.complete_render(&mut buf, region, status);
        assert_eq!(region.data.render, RenderState::Succeeded);
        assert!(region.data.image_shown);
        assert_eq!(buf.image_at(region.start).unwrap().bytes(), b"x^2");
        assert_eq!(buf.visible_line(0).unwrap(), "");
    }

    #[test]
    fn test_failed_render_keeps_text_hidden() {
        let mut v = validator("exit 1");
        let (mut buf, mut index, id, m) = setup("$y$", &mut v);
        v.apply(&mut buf, index.get_mut(id).unwrap(), &m);

        let (_, status) = wait_for_render(&mut v).remove(0);
        let region = index.get_mut(id).unwrap();
        v.complete_render(&mut buf, region, status);
        assert_eq!(region.data.render, RenderState::Failed);
        assert!(buf.images().is_empty());
        assert_eq!(buf.visible_line(0).unwrap(), "");
    }

    #[test]
    fn test_enter_cancels_and_reveals() {
        let mut v = validator("sleep 30");
        let (mut buf, mut index, id, m) = setup("$x$", &mut v);
        let region = index.get_mut(id).unwrap();
        v.apply(&mut buf, region, &m);

        region.data.image = Some(RenderedImage::new(b"png".to_vec()));
        v.show_image(&mut buf, region);
        v.enter(&mut buf, region);

        assert_eq!(v.running_renders(), 0);
        assert_eq!(region.data.render, RenderState::Idle);
        assert!(!region.data.image_shown);
        assert!(buf.images().is_empty());
        assert_eq!(buf.visible_line(0).unwrap(), "$x$");

        v.exit(&mut buf, region);
        assert_eq!(v.running_renders(), 1);
        assert_eq!(buf.visible_line(0).unwrap(), "");
        v.uninstall(&mut buf);
        assert_eq!(v.running_renders(), 0);
    }

    #[test]
    fn test_store_and_restore_image() {
        let mut v = validator("true");
        let (mut buf, mut index, id, _) = setup("$x$", &mut v);
        let region = index.get_mut(id).unwrap();
        region.data.image = Some(RenderedImage::new(b"png".to_vec()));
        v.show_image(&mut buf, region);

        v.store_for_save(&mut buf, region);
        assert!(buf.images().is_empty());
        assert!(region.data.restore_image);

        v.restore_after_save(&mut buf, region);
        assert!(region.data.image_shown);
        assert!(!region.data.restore_image);
        assert_eq!(buf.images().len(), 1);
    }

    #[test]
    fn test_restore_skipped_when_text_changed() {
        let mut v = validator("true");
        let (mut buf, mut index, id, _) = setup("$x$", &mut v);
        let region = index.get_mut(id).unwrap();
        region.data.image = Some(RenderedImage::new(b"png".to_vec()));
        v.show_image(&mut buf, region);

        v.store_for_save(&mut buf, region);
        buf.remove(2, 3);
        v.restore_after_save(&mut buf, region);
        assert!(!region.data.image_shown);
        assert!(buf.images().is_empty());
    }

    #[test]
    fn test_bad_color_fails_without_job() {
        let mut v = MathValidator::new(RenderConfig {
            foreground: "not-a-color".to_string(),
            ..RenderConfig::default()
        })
        .unwrap();
        let (mut buf, mut index, id, m) = setup("$x$", &mut v);
        let region = index.get_mut(id).unwrap();

        v.apply(&mut buf, region, &m);
        assert_eq!(region.data.render, RenderState::Failed);
        assert_eq!(v.running_renders(), 0);
    }

    #[test]
    fn test_disabled_rendering_only_hides() {
        let mut v = MathValidator::new(RenderConfig {
            enabled: false,
            ..RenderConfig::default()
        })
        .unwrap();
        let (mut buf, mut index, id, m) = setup("$x$", &mut v);
        let region = index.get_mut(id).unwrap();

        v.apply(&mut buf, region, &m);
        assert_eq!(region.data.render, RenderState::Idle);
        assert_eq!(v.running_renders(), 0);
        assert_eq!(buf.visible_line(0).unwrap(), "");
    }
}
