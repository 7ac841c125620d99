//! Progress-notes editing with debounced autosave and bounded undo

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Quiet period after the last edit before an autosave
pub const AUTOSAVE_DELAY: Duration = Duration::from_secs(10);
/// Prior states kept for undo
pub const UNDO_LIMIT: usize = 10;

/// Editor state for one record's notes.
///
/// The editor never saves by itself: [`poll`](Self::poll) and
/// [`flush`](Self::flush) hand out the text to persist and the caller reports
/// success with [`mark_saved`](Self::mark_saved).
#[derive(Debug, Clone)]
pub struct NotesEditor {
    text: String,
    saved: String,
    undo: VecDeque<String>,
    last_edit: Option<Instant>,
}

impl NotesEditor {
    pub fn new(saved: impl Into<String>) -> Self {
        let saved = saved.into();
        Self {
            text: saved.clone(),
            saved,
            undo: VecDeque::with_capacity(UNDO_LIMIT),
            last_edit: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_dirty(&self) -> bool {
        self.text != self.saved
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    /// Replace the text. Identical text is ignored and does not restart the
    /// autosave delay.
    pub fn edit(&mut self, text: impl Into<String>, now: Instant) {
        let text = text.into();
        if text == self.text {
            return;
        }
        if self.undo.len() == UNDO_LIMIT {
            self.undo.pop_front();
        }
        self.undo
            .push_back(std::mem::replace(&mut self.text, text));
        self.last_edit = Some(now);
    }

    /// Go back to the previous text; false when there is nothing to undo
    pub fn undo(&mut self, now: Instant) -> bool {
        match self.undo.pop_back() {
            Some(previous) => {
                self.text = previous;
                self.last_edit = Some(now);
                true
            }
            None => false,
        }
    }

    /// When the pending autosave is due, if there is one
    pub fn deadline(&self) -> Option<Instant> {
        self.last_edit
            .filter(|_| self.is_dirty())
            .map(|at| at + AUTOSAVE_DELAY)
    }

    /// Text to autosave once the delay after the last edit has passed
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match self.deadline() {
            Some(due) if now >= due => self.flush(),
            _ => None,
        }
    }

    /// Text to save right away, or `None` when nothing changed
    pub fn flush(&mut self) -> Option<String> {
        self.last_edit = None;
        self.is_dirty().then(|| self.text.clone())
    }

    pub fn mark_saved(&mut self, text: &str) {
        self.saved = text.to_string();
    }
}
