//! Session orchestration for the removal pipeline
//!
//! One session covers a single selected image from selection to terminal
//! success or failure: normalize, invoke the engine with a progress sink,
//! and land in `Done` or `Failed`. Sessions are identified by a monotonically
//! increasing token; starting a new session invalidates the previous one, so
//! callbacks from a superseded engine invocation are compared against the
//! active token and discarded rather than cancelled (the engine exposes no
//! cancellation API).

use crate::{
    engine::{EngineConfig, ProgressEvent, ProgressFn, RemovalEngine, ResultAsset},
    error::Result,
    normalize::{FormatNormalizer, NormalizedSource},
    progress::{NoOpProgressReporter, ProgressReporter, ProgressTracker},
    source::ImageSource,
};
use chrono::{DateTime, Utc};
use instant::Instant;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tracing::instrument;

/// Monotonic token identifying one processing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

/// State of the active processing session
///
/// Transitions are monotonic forward; `Done`/`Failed` return to a fresh
/// `Idle` only through an explicit reset when the user discards the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingState {
    /// No image selected
    Idle,
    /// Normalizing the selected source
    Decoding,
    /// Engine invocation in flight with the latest reported percentage
    Removing {
        /// Latest percentage (0-100), last reported value wins
        percent: u8,
    },
    /// Terminal success with the produced cut-out
    Done(ResultAsset),
    /// Terminal failure with a human-readable reason
    Failed(String),
}

impl ProcessingState {
    /// Whether processing is still in flight
    #[must_use]
    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Decoding | Self::Removing { .. })
    }

    /// Whether the session reached a terminal state
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }

    /// The result asset, if the session completed successfully
    #[must_use]
    pub fn result(&self) -> Option<&ResultAsset> {
        match self {
            Self::Done(asset) => Some(asset),
            _ => None,
        }
    }
}

/// Timing and identity metadata for the most recent session
#[derive(Debug, Clone)]
pub struct SessionMetadata {
    /// Token of the session this metadata describes
    pub session: SessionId,
    /// Wall-clock time the session started
    pub started_at: DateTime<Utc>,
    /// Total elapsed milliseconds, set on terminal transition
    pub elapsed_ms: u64,
}

/// Orchestrates normalize → engine for one session at a time
pub struct SessionController {
    engine: Arc<dyn RemovalEngine>,
    config: EngineConfig,
    reporter: Arc<dyn ProgressReporter>,
    tracker: Arc<ProgressTracker>,
    state: Arc<Mutex<ProcessingState>>,
    counter: AtomicU64,
    metadata: Mutex<Option<SessionMetadata>>,
}

impl SessionController {
    /// Create a controller with a no-op progress reporter
    #[must_use]
    pub fn new(engine: Arc<dyn RemovalEngine>, config: EngineConfig) -> Self {
        Self::with_reporter(engine, config, Arc::new(NoOpProgressReporter))
    }

    /// Create a controller with a custom progress reporter
    #[must_use]
    pub fn with_reporter(
        engine: Arc<dyn RemovalEngine>,
        config: EngineConfig,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            engine,
            config,
            reporter,
            tracker: Arc::new(ProgressTracker::new()),
            state: Arc::new(Mutex::new(ProcessingState::Idle)),
            counter: AtomicU64::new(0),
            metadata: Mutex::new(None),
        }
    }

    /// Start a new session for a freshly selected image
    ///
    /// Allocates the next session token, resets the tracker to 0, and moves
    /// the state to `Decoding`. Any session still in flight is superseded:
    /// its later callbacks no longer match the active token and are dropped.
    pub fn begin(&self) -> SessionId {
        let session = SessionId::new(self.counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.tracker.begin(session);
        self.set_state(ProcessingState::Decoding);
        if let Ok(mut metadata) = self.metadata.lock() {
            *metadata = Some(SessionMetadata {
                session,
                started_at: Utc::now(),
                elapsed_ms: 0,
            });
        }
        log::debug!("Session {} started", session.value());
        session
    }

    /// Run the pipeline for a session started with [`begin`](Self::begin)
    ///
    /// Every failure is caught here and converted into a single terminal
    /// `Failed` state; no partial result is ever exposed. Returns the state
    /// the session ended in. If the session was superseded while in flight
    /// its outcome is discarded and the current state is returned untouched.
    #[instrument(skip(self, source), fields(session = session.value()))]
    pub async fn process(&self, session: SessionId, source: ImageSource) -> ProcessingState {
        let started = Instant::now();

        let normalized = match FormatNormalizer::normalize(source) {
            Ok(normalized) => normalized,
            Err(e) => {
                self.fail(session, &e.to_string(), started);
                return self.state();
            },
        };

        match self.invoke_engine(session, &normalized).await {
            Ok(asset) => {
                if self.apply_if_active(session, ProcessingState::Done(asset)) {
                    self.finish_metadata(session, started);
                    self.reporter
                        .report_completion(started.elapsed().as_millis() as u64);
                } else {
                    log::debug!(
                        "Discarding result of superseded session {}",
                        session.value()
                    );
                }
            },
            Err(e) => self.fail(session, &e.to_string(), started),
        }

        self.state()
    }

    /// Invoke the engine exactly once with a session-guarded progress sink
    async fn invoke_engine(
        &self,
        session: SessionId,
        normalized: &NormalizedSource,
    ) -> Result<ResultAsset> {
        let tracker = Arc::clone(&self.tracker);
        let reporter = Arc::clone(&self.reporter);
        let state = Arc::clone(&self.state);

        let progress: ProgressFn = Arc::new(move |event: ProgressEvent| {
            // Stale sessions fall out here; their updates never reach state.
            let Some(update) = tracker.apply(session, &event) else {
                return;
            };
            if let Ok(mut guard) = state.lock() {
                // Re-checked under the lock: a new session may have begun
                // between the tracker update and this write.
                if tracker.is_active(session) && guard.is_processing() {
                    *guard = ProcessingState::Removing {
                        percent: update.percentage,
                    };
                }
            }
            reporter.report_progress(update);
        });

        self.engine
            .remove_background(normalized, &self.config, progress)
            .await
    }

    /// Discard the current image and return to `Idle`
    ///
    /// Also invalidates any in-flight session so late callbacks are dropped.
    pub fn reset(&self) {
        let fence = SessionId::new(self.counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.tracker.begin(fence);
        self.set_state(ProcessingState::Idle);
        log::debug!("Session state reset");
    }

    /// Snapshot of the current processing state
    #[must_use]
    pub fn state(&self) -> ProcessingState {
        self.state
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or(ProcessingState::Idle)
    }

    /// Latest percentage for the active session
    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.tracker.percentage()
    }

    /// Metadata for the most recent session, if one was started
    #[must_use]
    pub fn metadata(&self) -> Option<SessionMetadata> {
        self.metadata.lock().ok().and_then(|guard| guard.clone())
    }

    fn fail(&self, session: SessionId, message: &str, started: Instant) {
        if self.apply_if_active(session, ProcessingState::Failed(message.to_string())) {
            self.finish_metadata(session, started);
            self.reporter.report_error(message);
        } else {
            log::debug!(
                "Discarding failure of superseded session {}: {}",
                session.value(),
                message
            );
        }
    }

    /// Apply a state transition only when the session is still active
    ///
    /// The token check happens under the state lock, so a `begin` racing on
    /// another thread cannot slip in between the check and the write.
    fn apply_if_active(&self, session: SessionId, next: ProcessingState) -> bool {
        if let Ok(mut guard) = self.state.lock() {
            if self.tracker.is_active(session) {
                *guard = next;
                return true;
            }
        }
        false
    }

    fn set_state(&self, next: ProcessingState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = next;
        }
    }

    fn finish_metadata(&self, session: SessionId, started: Instant) {
        if let Ok(mut guard) = self.metadata.lock() {
            if let Some(metadata) = guard.as_mut() {
                if metadata.session == session {
                    metadata.elapsed_ms = started.elapsed().as_millis() as u64;
                }
            }
        }
    }
}
