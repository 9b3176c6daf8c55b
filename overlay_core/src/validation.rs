//! The incremental validation engine.
//!
//! `Validation` binds a validator set to one host buffer. The host reports
//! edits, cursor moves and saves; the engine records which lines are dirty
//! and defers the actual work to idle slices the host hands it through
//! `run_idle`. Each idle slice runs at most one revalidation pass covering
//! every edit since the previous one. Render completion is observed by the
//! host calling `on_timer` once `next_deadline` has passed.
//!
//! All methods run on the host's thread and never block on a render.

use std::time::Instant;

use crate::cursor::Position;
use crate::dirty::DirtyLines;
use crate::host::TextHost;
use crate::index::RegionIndex;
use crate::perf::ValidationStats;
use crate::region::{RegionId, RegionSnapshot, ValidatorId};
use crate::scheduler::{IdleQueue, IdleTask};
use crate::validator::{LineMatch, Validator};

/// Line range of a deletion, captured before the text goes away.
#[derive(Debug, Clone, Copy)]
struct PendingDelete {
    first_line: usize,
    last_line: usize,
}

/// Region overlay engine for one buffer.
#[derive(Debug)]
pub struct Validation {
    validators: Vec<Validator>,
    index: RegionIndex,
    dirty: DirtyLines,
    /// Regions containing the cursor, in activation order.
    active: Vec<RegionId>,
    idle: IdleQueue,
    pending_delete: Option<PendingDelete>,
    saving: bool,
    stopped: bool,
    stats: ValidationStats,
}

impl Validation {
    /// Installs `validators` in `host` and schedules a pass over the whole
    /// document.
    pub fn new<H: TextHost>(host: &mut H, mut validators: Vec<Validator>) -> Self {
        for validator in &mut validators {
            validator.install(host);
        }
        log::debug!(
            "Validation started with {} validators over {} lines",
            validators.len(),
            host.line_count()
        );

        let mut validation = Self {
            validators,
            index: RegionIndex::new(),
            dirty: DirtyLines::new(),
            active: Vec::new(),
            idle: IdleQueue::new(),
            pending_delete: None,
            saving: false,
            stopped: false,
            stats: ValidationStats::default(),
        };
        validation.invalidate(0, host.line_count().saturating_sub(1));
        validation
    }

    // ==================== Notifications ====================

    /// Text was inserted; `start..end` is the inserted range after the edit.
    pub fn on_insert<H: TextHost>(&mut self, host: &mut H, start: Position, end: Position) {
        if self.stopped {
            return;
        }
        self.warn_if_saving("insert");

        let added = end.line.saturating_sub(start.line);
        if added > 0 {
            self.index.shift(start.line + 1, added as isize);
            self.dirty.shift(start.line + 1, added as isize);

            // Regions keyed on the edited line may now start further down
            for id in self.index.find_on_line(start.line) {
                let moved_to = self
                    .index
                    .get(id)
                    .and_then(|r| host.mark_position(r.start))
                    .map(|p| p.line)
                    .filter(|&line| line != start.line);
                if let Some(line) = moved_to {
                    self.index.rekey(id, line);
                }
            }
        }
        self.invalidate(start.line, end.line);
    }

    /// Text in `start..end` is about to be deleted.
    ///
    /// Regions lying entirely inside the range are destroyed now, while
    /// their positions still mean something.
    pub fn on_delete_before<H: TextHost>(&mut self, host: &mut H, start: Position, end: Position) {
        if self.stopped {
            return;
        }
        self.warn_if_saving("delete");

        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        self.pending_delete = Some(PendingDelete {
            first_line: start.line,
            last_line: end.line,
        });

        let mut doomed = Vec::new();
        for line in start.line..=end.line {
            for id in self.index.find_on_line(line) {
                let inside = self
                    .index
                    .get(id)
                    .and_then(|r| r.span(host))
                    .is_some_and(|(s, e)| start <= s && e <= end);
                if inside {
                    doomed.push(id);
                }
            }
        }
        for id in doomed {
            self.destroy(host, id, false);
        }
    }

    /// The deletion announced by `on_delete_before` happened; `at` is where
    /// the removed text used to start.
    pub fn on_delete_after<H: TextHost>(&mut self, _host: &mut H, at: Position) {
        if self.stopped {
            return;
        }
        let line = match self.pending_delete.take() {
            Some(pending) => {
                let removed = pending.last_line - pending.first_line;
                if removed > 0 {
                    let delta = -(removed as isize);
                    self.index.shift(pending.last_line, delta);
                    self.dirty.shift(pending.last_line, delta);
                }
                pending.first_line
            }
            None => {
                log::warn!("Delete at {} without a prior notification", at);
                at.line
            }
        };
        self.invalidate(line, line);
    }

    /// The cursor moved. Handled in the next idle slice.
    pub fn on_cursor_moved(&mut self) {
        if !self.stopped {
            self.idle.schedule(IdleTask::CursorMoved);
        }
    }

    /// The document is about to be written.
    pub fn on_before_save<H: TextHost>(&mut self, host: &mut H) {
        if self.stopped {
            return;
        }
        self.saving = true;
        for id in self.index.ids() {
            if let Some(region) = self.index.get_mut(id) {
                let v = region.validator;
                self.validators[v].store_for_save(host, region);
            }
        }
    }

    /// The document has been written.
    pub fn on_after_save<H: TextHost>(&mut self, host: &mut H) {
        if self.stopped {
            return;
        }
        for id in self.index.ids() {
            if let Some(region) = self.index.get_mut(id) {
                let v = region.validator;
                self.validators[v].restore_after_save(host, region);
            }
        }
        self.saving = false;
    }

    // ==================== Scheduling ====================

    /// Returns true if `run_idle` has work to do.
    pub fn has_idle_work(&self) -> bool {
        !self.idle.is_empty()
    }

    /// Runs the work queued for this idle slice.
    ///
    /// Returns true if anything ran.
    pub fn run_idle<H: TextHost>(&mut self, host: &mut H) -> bool {
        let tasks = self.idle.take_all();
        for &task in &tasks {
            match task {
                IdleTask::Revalidate => self.revalidate(host),
                IdleTask::CursorMoved => self.update_active(host),
            }
        }
        !tasks.is_empty()
    }

    /// Returns when `on_timer` next has something to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.validators.iter().filter_map(Validator::next_deadline).min()
    }

    /// Polls outstanding renders and applies the finished ones.
    ///
    /// Returns the number of renders that finished.
    pub fn on_timer<H: TextHost>(&mut self, host: &mut H, now: Instant) -> usize {
        let mut finished = 0;
        for validator in &mut self.validators {
            for (id, status) in validator.poll_renders(now) {
                finished += 1;
                match self.index.get_mut(id) {
                    Some(region) => validator.complete_render(host, region, status),
                    None => log::debug!("Render finished for destroyed region {}", id.0),
                }
            }
        }
        finished
    }

    /// Returns the number of renders still running.
    pub fn running_renders(&self) -> usize {
        self.validators.iter().map(Validator::running_renders).sum()
    }

    /// Destroys every region, kills every render and uninstalls the
    /// validators. Later notifications are ignored.
    pub fn stop<H: TextHost>(&mut self, host: &mut H) {
        if self.stopped {
            return;
        }
        self.idle.cancel_all();
        self.dirty.clear();
        for id in self.index.ids() {
            self.destroy(host, id, false);
        }
        self.active.clear();
        for validator in &mut self.validators {
            validator.uninstall(host);
        }
        self.stopped = true;
        log::debug!("Validation stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    // ==================== Queries ====================

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn regions(&self) -> &RegionIndex {
        &self.index
    }

    /// Returns the ids of regions containing the cursor.
    pub fn active_regions(&self) -> &[RegionId] {
        &self.active
    }

    pub fn dirty_lines(&self) -> &DirtyLines {
        &self.dirty
    }

    /// Returns the engine counters with render totals filled in.
    pub fn stats(&self) -> ValidationStats {
        let mut stats = self.stats.clone();
        for validator in &self.validators {
            stats.renders.merge(validator.render_stats());
        }
        stats
    }

    /// Describes every live region in index order.
    pub fn snapshot<H: TextHost>(&self, host: &H) -> Vec<RegionSnapshot> {
        self.index
            .keys()
            .into_iter()
            .filter_map(|(line, id)| {
                let region = self.index.get(id)?;
                let (start, end) = region.span(host)?;
                Some(RegionSnapshot {
                    id,
                    validator: self.validators[region.validator].name().to_string(),
                    line,
                    start,
                    end,
                    text: host.slice(start, end),
                    active: region.active,
                    render: region.data.render,
                    image_shown: region.data.image_shown,
                })
            })
            .collect()
    }

    // ==================== Internals ====================

    fn invalidate(&mut self, a: usize, b: usize) {
        self.dirty.invalidate(a, b);
        self.idle.schedule(IdleTask::Revalidate);
    }

    fn warn_if_saving(&self, what: &str) {
        if self.saving {
            log::warn!("Buffer {} while saving; images may not be restored", what);
        }
    }

    /// One revalidation pass over the dirty lines.
    fn revalidate<H: TextHost>(&mut self, host: &mut H) {
        let started = Instant::now();
        let lines = self.dirty.take();

        // Drop regions whose text no longer matches exactly or that an
        // inserted newline has split across lines
        for &line in &lines {
            for id in self.index.find_on_line(line) {
                let verdict = self.index.get(id).and_then(|region| {
                    let (start, end) = region.span(host)?;
                    if start.line != end.line {
                        return None;
                    }
                    let text = host.slice(start, end);
                    let m = self.validators[region.validator].pattern().match_exact(&text)?;
                    let changed = text != region.matched && !region.active;
                    Some((text, m, changed))
                });
                match verdict {
                    None => self.destroy(host, id, true),
                    Some((text, m, true)) => self.refresh(host, id, text, &m),
                    Some(_) => {}
                }
            }
        }

        // Then pick up new matches
        for v in 0..self.validators.len() {
            for &line in &lines {
                let Some(text) = host.line_text(line) else {
                    continue;
                };
                for m in self.validators[v].find_matches(&text) {
                    let matched: String = text.chars().skip(m.start).take(m.len()).collect();
                    self.add_region(host, v, line, &m, matched);
                }
            }
        }

        let elapsed = started.elapsed();
        self.stats.passes += 1;
        self.stats.lines_scanned += lines.len() as u64;
        self.stats.pass_time.record(elapsed);
        log::trace!(
            "Revalidated {} lines in {:?}, {} regions live",
            lines.len(),
            elapsed,
            self.index.len()
        );
    }

    fn add_region<H: TextHost>(
        &mut self,
        host: &mut H,
        v: ValidatorId,
        line: usize,
        m: &LineMatch,
        matched: String,
    ) {
        let start = Position::new(line, m.start);
        let end = Position::new(line, m.end);
        if self.index.contains_span(host, v, start, end) {
            return;
        }

        let start_mark = host.create_mark(start, true);
        let end_mark = host.create_mark(end, false);
        let id = self.index.insert(line, v, start_mark, end_mark);
        self.stats.regions_created += 1;
        log::debug!(
            "Created {} region {} at {}-{}",
            self.validators[v].name(),
            id.0,
            start,
            end
        );

        let Some(region) = self.index.get_mut(id) else {
            return;
        };
        self.validators[v].apply(host, region, m);
        region.matched = matched;

        let cursor = host.cursor();
        if region.contains(host, cursor) {
            region.active = true;
            self.active.push(id);
            self.validators[v].enter(host, region);
        }
    }

    /// Reapplies the effect of a surviving region whose text changed.
    fn refresh<H: TextHost>(&mut self, host: &mut H, id: RegionId, text: String, m: &LineMatch) {
        let Some(region) = self.index.get_mut(id) else {
            return;
        };
        let v = region.validator;
        self.validators[v].revert(host, region);
        self.validators[v].apply(host, region, m);
        log::debug!("Refreshed {} region {}: {:?}", self.validators[v].name(), id.0, text);
        region.matched = text;
    }

    /// Destroys a region. With `fire_exit` an active region gets its exit
    /// hook before the effect is reverted.
    fn destroy<H: TextHost>(&mut self, host: &mut H, id: RegionId, fire_exit: bool) {
        let Some(region) = self.index.get_mut(id) else {
            return;
        };
        let v = region.validator;

        if region.active {
            region.active = false;
            self.active.retain(|&a| a != id);
            if fire_exit {
                self.validators[v].exit(host, region);
            }
        }
        self.validators[v].revert(host, region);
        self.index.remove(host, id);
        self.stats.regions_destroyed += 1;
        log::debug!("Destroyed {} region {}", self.validators[v].name(), id.0);
    }

    /// Brings the active set in line with the cursor.
    fn update_active<H: TextHost>(&mut self, host: &mut H) {
        let mut cursor = host.cursor();

        for id in self.active.clone() {
            let Some(region) = self.index.get_mut(id) else {
                self.active.retain(|&a| a != id);
                continue;
            };
            if !region.contains(host, cursor) {
                region.active = false;
                self.active.retain(|&a| a != id);
                let v = region.validator;
                self.validators[v].exit(host, region);
                region.matched = region.text(host).unwrap_or_default();
                cursor = host.cursor();
            }
        }

        for id in self.index.find_on_line(cursor.line) {
            let Some(region) = self.index.get_mut(id) else {
                continue;
            };
            if !region.active && region.contains(host, cursor) {
                region.active = true;
                self.active.push(id);
                let v = region.validator;
                self.validators[v].enter(host, region);
                cursor = host.cursor();
            }
        }
    }
}
