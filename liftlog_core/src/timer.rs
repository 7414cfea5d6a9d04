//! Rest timer owned by an active workout session.
//!
//! A single countdown: remaining seconds, a running flag and a category
//! label. Ticks are driven by the owner, one per elapsed second.

use std::fmt;

/// Rest lengths at or above this are classified as compound rests
pub const COMPOUND_REST_THRESHOLD: u32 = 120;

/// Classification shown next to the countdown
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestCategory {
    Compound,
    Isolation,
}

impl RestCategory {
    pub fn for_duration(seconds: u32) -> Self {
        if seconds >= COMPOUND_REST_THRESHOLD {
            RestCategory::Compound
        } else {
            RestCategory::Isolation
        }
    }
}

impl fmt::Display for RestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestCategory::Compound => write!(f, "Compound"),
            RestCategory::Isolation => write!(f, "Isolation"),
        }
    }
}

/// Countdown state plus panel visibility
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RestTimer {
    remaining: u32,
    running: bool,
    category: Option<RestCategory>,
    visible: bool,
}

impl RestTimer {
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn category(&self) -> Option<RestCategory> {
        self.category
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Replace any countdown in progress with a fresh one and show the panel
    pub fn start(&mut self, seconds: u32) {
        self.remaining = seconds;
        self.running = true;
        self.category = Some(RestCategory::for_duration(seconds));
        self.visible = true;
        tracing::debug!("Rest timer started: {}s ({:?})", seconds, self.category);
    }

    /// Pause or resume. An expired countdown stays paused.
    pub fn toggle(&mut self) {
        self.running = !self.running && self.remaining > 0;
    }

    pub fn add_seconds(&mut self, seconds: u32) {
        self.remaining = self.remaining.saturating_add(seconds);
    }

    /// Hide the panel. The countdown keeps its state and keeps running.
    pub fn close(&mut self) {
        self.visible = false;
    }

    pub fn toggle_panel(&mut self) {
        self.visible = !self.visible;
    }

    /// Advance by one second
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
            tracing::debug!("Rest timer finished");
        }
    }

    /// Advance by several seconds, stopping early once the countdown ends
    pub fn advance(&mut self, seconds: u64) {
        for _ in 0..seconds {
            if !self.running {
                break;
            }
            self.tick();
        }
    }
}

/// Format seconds as `m:ss`
pub fn format_clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
