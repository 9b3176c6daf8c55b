//! Document - a text buffer with the overlay engine attached.
//!
//! This is the editor side of the contract: every edit goes through the
//! document, which mutates the buffer and delivers the matching engine
//! notifications (two-phase for deletions), and saving is wrapped in the
//! engine's save hooks.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::buffer::TextBuffer;
use crate::cursor::Position;
use crate::error::{OverlayError, Result};
use crate::region::RegionSnapshot;
use crate::validation::Validation;
use crate::validator::Validator;

/// A buffer plus its validation engine.
#[derive(Debug)]
pub struct Document {
    buffer: TextBuffer,
    validation: Validation,
    /// Current file path, if any.
    file_path: Option<PathBuf>,
}

impl Document {
    /// Attaches `validators` to an existing buffer.
    pub fn new(mut buffer: TextBuffer, validators: Vec<Validator>) -> Self {
        let validation = Validation::new(&mut buffer, validators);
        Self {
            buffer,
            validation,
            file_path: None,
        }
    }

    /// Creates a document from a string.
    pub fn from_str(text: &str, validators: Vec<Validator>) -> Self {
        Self::new(TextBuffer::from_str(text), validators)
    }

    /// Opens a file.
    pub fn open_file<P: AsRef<Path>>(path: P, validators: Vec<Validator>) -> Result<Self> {
        let path = path.as_ref();
        let buffer = TextBuffer::from_file(path).map_err(|e| OverlayError::io(path, e))?;
        log::info!("Opened {} ({} lines)", path.display(), buffer.len_lines());

        let mut document = Self::new(buffer, validators);
        document.file_path = Some(path.to_path_buf());
        Ok(document)
    }

    /// Saves to the current file path.
    pub fn save(&mut self) -> Result<()> {
        let path = self.file_path.clone().ok_or(OverlayError::NoFilePath)?;
        self.write_to(&path)
    }

    /// Saves to a new file path, which becomes the current one.
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.write_to(path)?;
        self.file_path = Some(path.to_path_buf());
        Ok(())
    }

    fn write_to(&mut self, path: &Path) -> Result<()> {
        // Store, write and restore happen in this one call, so no edit can
        // land between the two save hooks
        self.validation.on_before_save(&mut self.buffer);
        let result = self.buffer.save_to_file(path);
        self.validation.on_after_save(&mut self.buffer);

        result.map_err(|e| OverlayError::io(path, e))?;
        log::info!("Saved {}", path.display());
        Ok(())
    }

    /// Returns the current file path.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Returns whether the text changed since it was opened or saved.
    pub fn is_modified(&self) -> bool {
        self.buffer.is_modified()
    }

    /// Returns a reference to the buffer.
    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    /// Returns a reference to the engine.
    pub fn validation(&self) -> &Validation {
        &self.validation
    }

    /// Returns the document text.
    pub fn text(&self) -> String {
        self.buffer.to_string()
    }

    /// Returns the cursor position.
    pub fn cursor(&self) -> Position {
        self.buffer.char_to_position(self.buffer.cursor_char())
    }

    /// Describes every live region.
    pub fn snapshot(&self) -> Vec<RegionSnapshot> {
        self.validation.snapshot(&self.buffer)
    }

    // ==================== Editing ====================

    /// Moves the cursor.
    pub fn set_cursor(&mut self, pos: Position) {
        self.buffer.set_cursor(pos);
        self.validation.on_cursor_moved();
    }

    /// Inserts text at a character index.
    pub fn insert(&mut self, char_idx: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let idx = char_idx.min(self.buffer.len_chars());
        let cursor_before = self.buffer.cursor_char();

        let start = self.buffer.char_to_position(idx);
        self.buffer.insert(idx, text);
        let end = self.buffer.char_to_position(idx + text.chars().count());
        self.validation.on_insert(&mut self.buffer, start, end);

        if self.buffer.cursor_char() != cursor_before {
            self.validation.on_cursor_moved();
        }
    }

    /// Inserts text at the cursor.
    pub fn insert_at_cursor(&mut self, text: &str) {
        self.insert(self.buffer.cursor_char(), text);
    }

    /// Deletes the characters in `start..end`.
    pub fn delete(&mut self, start: usize, end: usize) {
        let len = self.buffer.len_chars();
        let (start, end) = (start.min(len), end.min(len));
        if start >= end {
            return;
        }
        let cursor_before = self.buffer.cursor_char();

        let from = self.buffer.char_to_position(start);
        let to = self.buffer.char_to_position(end);
        self.validation.on_delete_before(&mut self.buffer, from, to);
        self.buffer.remove(start, end);
        self.validation.on_delete_after(&mut self.buffer, from);

        if self.buffer.cursor_char() != cursor_before {
            self.validation.on_cursor_moved();
        }
    }

    // ==================== Event loop ====================

    /// Runs one idle slice and any due timer.
    ///
    /// Returns true if anything happened.
    pub fn pump(&mut self) -> bool {
        let ran = self.validation.run_idle(&mut self.buffer);

        let now = Instant::now();
        let finished = match self.validation.next_deadline() {
            Some(deadline) if deadline <= now => self.validation.on_timer(&mut self.buffer, now),
            _ => 0,
        };
        ran || finished > 0
    }

    /// Pumps until no idle work is queued and no render is running.
    ///
    /// Sleeps between timer deadlines. Returns false if `timeout` expired
    /// first.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if !self.validation.has_idle_work() && self.validation.running_renders() == 0 {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if self.validation.has_idle_work() {
                continue;
            }
            let wake = self
                .validation
                .next_deadline()
                .map_or(deadline, |d| d.min(deadline));
            thread::sleep(wake.saturating_duration_since(now));
        }
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        self.validation.stop(&mut self.buffer);
    }
}
