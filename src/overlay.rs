//! Heads-up tally display
//!
//! The overlay is just another session listener: it keeps the latest tally
//! and renders it as one status line.

use crate::record::CapturedRequest;
use crate::session::{SessionListener, Tally};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
pub struct Overlay {
    tally: Mutex<Tally>,
    attached: AtomicBool,
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Overlay {
    pub fn new() -> Self {
        Self {
            tally: Mutex::new(Tally::default()),
            attached: AtomicBool::new(true),
        }
    }

    pub fn tally(&self) -> Tally {
        *self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub(crate) fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    /// Current status line
    pub fn text(&self) -> String {
        render(&self.tally())
    }
}

/// `sonda | 12 req | auth 2 | input 1 | error 0 | race 3`
pub fn render(tally: &Tally) -> String {
    format!(
        "sonda | {} req | auth {} | input {} | error {} | race {}",
        tally.total, tally.auth, tally.input, tally.error, tally.race
    )
}

impl SessionListener for Overlay {
    fn on_record(&self, _record: &CapturedRequest, tally: &Tally) {
        if self.is_attached() {
            *self.tally.lock().unwrap_or_else(PoisonError::into_inner) = *tally;
        }
    }

    fn on_clear(&self) {
        *self.tally.lock().unwrap_or_else(PoisonError::into_inner) = Tally::default();
    }
}
