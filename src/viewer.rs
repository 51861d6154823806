//! Before/after comparison viewer
//!
//! Renders the original and the cut-out layered with a draggable divider.
//! While the session is processing it shows a progress overlay instead; on
//! terminal failure it shows an error panel with a reset affordance and never
//! attempts partial rendering. Export hands back the result bytes verbatim
//! under a fixed file name.

use crate::{
    compositor::{BackgroundChoice, BackgroundCompositor},
    error::{RemovalError, Result},
    normalize::NormalizedSource,
    session::ProcessingState,
};
use image::{imageops, RgbaImage};
use std::path::{Path, PathBuf};

/// Fixed output file name for the download boundary
pub const EXPORT_FILE_NAME: &str = "magic-erase-result.png";

/// Percentage of the "after" image revealed over the "before" image
///
/// Always clamped to `[0, 100]`; mutated continuously by pointer movement and
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPosition(f32);

impl SplitPosition {
    #[must_use]
    pub fn new(percent: f32) -> Self {
        Self(percent.clamp(0.0, 100.0))
    }

    /// Recompute from a pointer position over the viewer's bounding box
    ///
    /// `clamp(0, 100, (pointer_x - bounds_left) / bounds_width * 100)`;
    /// pointers outside the bounds clamp to the nearest edge.
    #[must_use]
    pub fn from_pointer(pointer_x: f32, bounds_left: f32, bounds_width: f32) -> Self {
        if bounds_width <= 0.0 {
            return Self(0.0);
        }
        Self::new((pointer_x - bounds_left) / bounds_width * 100.0)
    }

    #[must_use]
    pub fn percent(self) -> f32 {
        self.0
    }
}

impl Default for SplitPosition {
    fn default() -> Self {
        Self(50.0)
    }
}

/// What the viewer displays for a given processing state
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerPanel {
    /// Nothing selected yet; the upload surface is shown instead
    Empty,
    /// Original image plus percentage overlay while processing
    Progress {
        /// Latest percentage (0-100)
        percent: u8,
    },
    /// Draggable split comparison of original and cut-out
    Split {
        /// Current divider position
        position: SplitPosition,
    },
    /// Terminal failure message with a reset affordance
    Error {
        /// Human-readable failure reason
        message: String,
    },
}

/// An export ready for the download boundary
#[derive(Debug, Clone)]
pub struct Export {
    /// Fixed output file name (`.png`)
    pub file_name: &'static str,
    /// The result asset's bytes, verbatim
    pub data: Vec<u8>,
}

impl Export {
    /// Write the export into a directory under its fixed file name
    ///
    /// # Errors
    /// Returns `RemovalError::Io` on write failure.
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(self.file_name);
        std::fs::write(&path, &self.data)?;
        Ok(path)
    }
}

/// Interactive before/after viewer over one session's state
pub struct ComparisonViewer {
    original: RgbaImage,
    split: SplitPosition,
    background: BackgroundChoice,
    backdrop_image: Option<RgbaImage>,
}

impl ComparisonViewer {
    /// Create a viewer around the decoded original display image
    #[must_use]
    pub fn new(original: RgbaImage) -> Self {
        Self {
            original,
            split: SplitPosition::default(),
            background: BackgroundChoice::default(),
            backdrop_image: None,
        }
    }

    /// Create a viewer from the normalized source used for processing
    ///
    /// The viewer displays the normalized image, not the raw original bytes.
    ///
    /// # Errors
    /// - `RemovalError::Decode` if the blob does not decode
    /// - `RemovalError::InvalidConfig` for location sources, which the caller
    ///   must resolve to pixels first
    pub fn from_normalized(source: &NormalizedSource) -> Result<Self> {
        let bytes = source.bytes().ok_or_else(|| {
            RemovalError::invalid_config("Location sources must be decoded by the caller")
        })?;
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| RemovalError::decode(format!("Failed to decode display image: {e}")))?;
        Ok(Self::new(decoded.to_rgba8()))
    }

    /// Current divider position
    #[must_use]
    pub fn split(&self) -> SplitPosition {
        self.split
    }

    /// Recompute the divider from a pointer position over the viewer bounds
    pub fn pointer_moved(&mut self, pointer_x: f32, bounds_left: f32, bounds_width: f32) {
        self.split = SplitPosition::from_pointer(pointer_x, bounds_left, bounds_width);
    }

    /// Current backdrop selection
    #[must_use]
    pub fn background(&self) -> &BackgroundChoice {
        &self.background
    }

    /// Select a backdrop for the preview
    ///
    /// For `Image` choices the caller supplies the pre-fetched backdrop (see
    /// [`BackgroundCompositor::fetch_backdrop`]); it is ignored otherwise.
    /// Never affects the result asset or the export.
    pub fn set_background(&mut self, choice: BackgroundChoice, backdrop_image: Option<RgbaImage>) {
        self.background = choice;
        self.backdrop_image = backdrop_image;
    }

    /// What to display for the given session state
    #[must_use]
    pub fn panel(&self, state: &ProcessingState) -> ViewerPanel {
        match state {
            ProcessingState::Idle => ViewerPanel::Empty,
            ProcessingState::Decoding => ViewerPanel::Progress { percent: 0 },
            ProcessingState::Removing { percent } => ViewerPanel::Progress { percent: *percent },
            ProcessingState::Done(_) => ViewerPanel::Split {
                position: self.split,
            },
            ProcessingState::Failed(message) => ViewerPanel::Error {
                message: message.clone(),
            },
        }
    }

    /// Render the split comparison raster for a completed session
    ///
    /// The left `split%` shows the cut-out composited over the selected
    /// backdrop; the rest shows the original.
    ///
    /// # Errors
    /// - `RemovalError::InvalidConfig` when the session has no result yet
    /// - compositing errors from the backdrop layer
    pub fn render(&self, state: &ProcessingState) -> Result<RgbaImage> {
        let asset = state.result().ok_or_else(|| {
            RemovalError::invalid_config("Split comparison requires a completed session")
        })?;

        let after = BackgroundCompositor::composite(
            &self.background,
            asset,
            self.backdrop_image.as_ref(),
        )?;
        let (width, height) = after.dimensions();

        let before = if self.original.dimensions() == (width, height) {
            self.original.clone()
        } else {
            imageops::resize(&self.original, width, height, imageops::FilterType::Triangle)
        };

        let divider = (width as f32 * self.split.percent() / 100.0).round() as u32;
        let mut canvas = before;
        for (x, y, pixel) in after.enumerate_pixels() {
            if x < divider {
                canvas.put_pixel(x, y, *pixel);
            }
        }
        Ok(canvas)
    }

    /// Export the result asset's current bytes under the fixed file name
    ///
    /// Unavailable while processing is in flight or before a result exists.
    ///
    /// # Errors
    /// Returns `RemovalError::InvalidConfig` when export is unavailable.
    pub fn export(&self, state: &ProcessingState) -> Result<Export> {
        if state.is_processing() {
            return Err(RemovalError::invalid_config(
                "Export unavailable while processing is in progress",
            ));
        }
        let asset = state
            .result()
            .ok_or_else(|| RemovalError::invalid_config("No result available to export"))?;
        Ok(Export {
            file_name: EXPORT_FILE_NAME,
            data: asset.bytes().to_vec(),
        })
    }
}
