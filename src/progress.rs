//! Progress tracking and reporting
//!
//! The tracker holds the latest percentage for the active session, last
//! reported value wins with no smoothing across phases. Updates carry the
//! session token they originated from; anything from a superseded session is
//! ignored so a rapid image swap never paints stale progress.

use crate::{engine::ProgressEvent, session::SessionId};
use instant::Instant;
use std::sync::{
    atomic::{AtomicU64, AtomicU8, Ordering},
    Mutex,
};

/// Progress update handed to reporters
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Engine-defined phase key
    pub phase: String,
    /// Latest percentage (0-100)
    pub percentage: u8,
    /// Elapsed time since the session started (milliseconds)
    pub elapsed_ms: u64,
}

/// Trait for observing progress during removal sessions
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report session completion
    fn report_completion(&self, elapsed_ms: u64);

    /// Report a terminal session error
    fn report_error(&self, error: &str);
}

/// No-op progress reporter that discards all updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {
        // Intentionally empty - discards progress updates
    }

    fn report_completion(&self, _elapsed_ms: u64) {
        // Intentionally empty - discards completion notification
    }

    fn report_error(&self, _error: &str) {
        // Intentionally empty - discards error reports
    }
}

/// Progress reporter that logs through the `log` facade
pub struct LogProgressReporter;

impl ProgressReporter for LogProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        log::info!(
            "[{}%] {} ({}ms elapsed)",
            update.percentage,
            update.phase,
            update.elapsed_ms
        );
    }

    fn report_completion(&self, elapsed_ms: u64) {
        log::info!("Background removal completed in {}ms", elapsed_ms);
    }

    fn report_error(&self, error: &str) {
        log::error!("Background removal failed: {}", error);
    }
}

/// Holds the latest percentage for the active session
pub struct ProgressTracker {
    active: AtomicU64,
    percentage: AtomicU8,
    started: Mutex<Instant>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: AtomicU64::new(0),
            percentage: AtomicU8::new(0),
            started: Mutex::new(Instant::now()),
        }
    }

    /// Start tracking a new session, resetting the percentage to 0
    pub fn begin(&self, session: SessionId) {
        self.active.store(session.value(), Ordering::SeqCst);
        self.percentage.store(0, Ordering::SeqCst);
        if let Ok(mut started) = self.started.lock() {
            *started = Instant::now();
        }
    }

    /// Apply a progress event from the given session
    ///
    /// Returns the update when applied, or `None` when the event came from a
    /// session that is no longer active.
    pub fn apply(&self, session: SessionId, event: &ProgressEvent) -> Option<ProgressUpdate> {
        if !self.is_active(session) {
            log::debug!(
                "Discarding progress from superseded session {}: {} {}/{}",
                session.value(),
                event.phase,
                event.current,
                event.total
            );
            return None;
        }

        let percentage = event.percentage();
        self.percentage.store(percentage, Ordering::SeqCst);

        let elapsed_ms = self
            .started
            .lock()
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0);

        Some(ProgressUpdate {
            phase: event.phase.clone(),
            percentage,
            elapsed_ms,
        })
    }

    /// Latest percentage for the active session (0-100)
    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.percentage.load(Ordering::SeqCst)
    }

    /// Whether the given session is still the active one
    #[must_use]
    pub fn is_active(&self, session: SessionId) -> bool {
        self.active.load(Ordering::SeqCst) == session.value()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
