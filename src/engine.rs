//! Removal engine boundary
//!
//! The background removal capability is an external black box: one
//! asynchronous operation taking a normalized raster source, a configuration
//! bundle, and a progress callback, returning an alpha-channel raster blob.
//! It is modeled as a trait so the pipeline never hard-wires a concrete
//! implementation and tests can substitute a stub.

use crate::{
    error::{RemovalError, Result},
    normalize::NormalizedSource,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single progress tuple reported by the engine
///
/// Engines report `(phase_key, current_step, total_steps)` across possibly
/// multiple phases (model download, then inference). Percentages are not
/// monotonic across phase boundaries; a new phase may reset to near zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Engine-defined phase key, e.g. `fetch:model` or `compute:inference`
    pub phase: String,
    /// Current step within the phase
    pub current: u64,
    /// Total steps within the phase
    pub total: u64,
}

impl ProgressEvent {
    #[must_use]
    pub fn new<S: Into<String>>(phase: S, current: u64, total: u64) -> Self {
        Self {
            phase: phase.into(),
            current,
            total,
        }
    }

    /// Percentage for this tuple: `round(current / total * 100)`
    ///
    /// A zero total clamps to 0 rather than dividing.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.current as f64 / self.total as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

/// Progress callback handed to the engine
///
/// Shared rather than boxed so the session can keep reporting through the
/// same sink it hands out.
pub type ProgressFn = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Configuration bundle passed to the removal engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base path for fetching model assets
    pub asset_base_url: String,
    /// Enable engine-side debug output
    pub debug: bool,
}

impl EngineConfig {
    /// Create a configuration with the given model asset base path
    #[must_use]
    pub fn new<S: Into<String>>(asset_base_url: S) -> Self {
        Self {
            asset_base_url: asset_base_url.into(),
            debug: false,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("https://staticimgly.com/@imgly/background-removal-data/1.7.0/dist/")
    }
}

/// The processed cut-out: an alpha-channel PNG blob
///
/// The engine's bytes are stored verbatim; export returns exactly these
/// bytes, so switching preview backgrounds can never alter the download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultAsset {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl ResultAsset {
    /// Wrap engine output, validating it decodes as an alpha-capable raster
    ///
    /// # Errors
    /// Returns `RemovalError::Processing` when the engine's blob does not
    /// decode; an engine that returns garbage is an engine failure, not a
    /// decode failure of the user's input.
    pub fn from_png_bytes(data: Vec<u8>) -> Result<Self> {
        let decoded = image::load_from_memory(&data).map_err(|e| {
            RemovalError::processing(format!("Engine returned an undecodable result: {e}"))
        })?;
        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            data,
        })
    }

    /// The raw result bytes, exactly as the engine produced them
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pixel dimensions of the result
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Decode to an RGBA surface for compositing and display
    ///
    /// # Errors
    /// Returns `RemovalError::Decode` if the stored bytes no longer decode
    /// (should not happen for an asset built through `from_png_bytes`).
    pub fn to_rgba(&self) -> Result<image::RgbaImage> {
        let decoded = image::load_from_memory(&self.data)
            .map_err(|e| RemovalError::decode(format!("Failed to decode result asset: {e}")))?;
        Ok(decoded.to_rgba8())
    }
}

/// Injectable asynchronous background removal capability
///
/// Exactly one invocation runs per user-initiated session; superseded
/// sessions are invalidated by the caller, not cancelled here (the capability
/// exposes no cancellation API).
#[async_trait]
pub trait RemovalEngine: Send + Sync {
    /// Remove the background from a normalized source
    ///
    /// Reports `(phase, current, total)` tuples through `progress` in
    /// emission order and resolves with an alpha-channel raster blob.
    ///
    /// # Errors
    /// Returns `RemovalError::Processing` for model fetch failures, internal
    /// decode failures, and unknown engine errors.
    async fn remove_background(
        &self,
        source: &NormalizedSource,
        config: &EngineConfig,
        progress: ProgressFn,
    ) -> Result<ResultAsset>;
}
