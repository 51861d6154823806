#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # MagicErase Pipeline
//!
//! Image ingestion and comparison pipeline for client-side background
//! removal: accept a user-supplied image in arbitrary supported formats,
//! normalize it into a form the removal engine can decode, track
//! asynchronous multi-phase progress, and render an interactive
//! before/after reveal with a preview-only background compositor.
//!
//! The removal computation itself is an external capability consumed as a
//! black box through the [`RemovalEngine`] trait, so the pipeline never
//! hard-wires a concrete engine and tests substitute a stub.
//!
//! ## Features
//!
//! - **Format Normalization**: WebP/AVIF uploads are losslessly re-encoded
//!   to PNG before reaching the engine; everything else passes through
//! - **Session Safety**: monotonic session tokens invalidate superseded
//!   invocations, so a rapid image swap never paints stale progress or
//!   stale results
//! - **Progress Tracking**: `(phase, current, total)` tuples collapse to a
//!   last-value-wins percentage with no smoothing across phases
//! - **Comparison Viewer**: draggable split reveal, progress and error
//!   panels, fixed-name PNG export of the engine's bytes verbatim
//! - **Background Compositor**: solid, gradient, and remote image backdrops
//!   for preview only; the export never bakes a backdrop in
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use magicerase::{
//!     ComparisonViewer, EngineConfig, ImageSource, ProcessingState, RemovalEngine,
//!     SessionController,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(engine: Arc<dyn RemovalEngine>, upload: Vec<u8>) -> anyhow::Result<()> {
//! let controller = SessionController::new(engine, EngineConfig::default());
//!
//! let source = ImageSource::from_bytes(upload, "image/jpeg");
//! let session = controller.begin();
//! let state = controller.process(session, source).await;
//!
//! if let ProcessingState::Done(asset) = &state {
//!     let viewer = ComparisonViewer::new(asset.to_rgba()?);
//!     let export = viewer.export(&state)?;
//!     export.write_to_dir(".")?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod compositor;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod progress;
pub mod session;
pub mod source;
pub mod viewer;

use std::sync::Arc;

// Public API exports
pub use compositor::{
    presets, BackgroundChoice, BackgroundCompositor, Color, Gradient, GradientDirection,
};
pub use engine::{EngineConfig, ProgressEvent, ProgressFn, RemovalEngine, ResultAsset};
pub use error::{RemovalError, Result};
pub use normalize::{FormatNormalizer, NormalizedSource, REENCODE_TYPES};
pub use progress::{
    LogProgressReporter, NoOpProgressReporter, ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use session::{ProcessingState, SessionController, SessionId, SessionMetadata};
pub use source::{ImageSource, MediaType, UploadCheck, UploadPolicy, MAX_UPLOAD_BYTES};
pub use viewer::{ComparisonViewer, Export, SplitPosition, ViewerPanel, EXPORT_FILE_NAME};

/// Remove the background from an image source in one call
///
/// Normalizes the source and invokes the engine once with a no-op progress
/// sink, bypassing the session state machine. Use [`SessionController`] when
/// you need progress display or supersession semantics.
///
/// # Errors
/// Propagates normalization failures (`Decode`/`Encode`) and engine failures
/// (`Processing`).
pub async fn remove_background_from_source(
    source: ImageSource,
    engine: &dyn RemovalEngine,
    config: &EngineConfig,
) -> Result<ResultAsset> {
    let normalized = FormatNormalizer::normalize(source)?;
    let progress: ProgressFn = Arc::new(|_| {});
    engine.remove_background(&normalized, config, progress).await
}

/// Remove the background from raw image bytes with a declared MIME type
///
/// # Errors
/// Propagates normalization failures (`Decode`/`Encode`) and engine failures
/// (`Processing`).
pub async fn remove_background_from_bytes(
    data: Vec<u8>,
    mime: &str,
    engine: &dyn RemovalEngine,
    config: &EngineConfig,
) -> Result<ResultAsset> {
    remove_background_from_source(ImageSource::from_bytes(data, mime), engine, config).await
}
