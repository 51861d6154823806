//! Format normalization ahead of the removal engine
//!
//! The removal engine's decoding layer does not accept every format the
//! upload surface does. The normalizer renders such sources to an off-screen
//! raster surface and re-encodes them losslessly to PNG, so the engine always
//! receives a directly-decodable blob. Everything else passes through
//! untouched, including location references.

use crate::{
    error::{RemovalError, Result},
    source::{ImageSource, MediaType},
};
use image::ImageFormat;
use std::io::Cursor;

/// Media types the engine cannot decode natively and must be re-encoded
pub const REENCODE_TYPES: &[MediaType] = &[MediaType::WebP, MediaType::Avif];

/// An image source guaranteed decodable by the removal engine
///
/// Owned solely by the processing operation that created it and discarded
/// after the engine call.
#[derive(Debug, Clone)]
pub struct NormalizedSource {
    source: ImageSource,
    reencoded: bool,
}

impl NormalizedSource {
    /// The underlying source handed to the engine
    #[must_use]
    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// Whether normalization produced a fresh re-encoded blob
    #[must_use]
    pub fn was_reencoded(&self) -> bool {
        self.reencoded
    }

    /// Blob bytes, if this is a blob source
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.source {
            ImageSource::Blob { data, .. } => Some(data),
            ImageSource::Location(_) => None,
        }
    }
}

/// Normalizes arbitrary upload sources into engine-decodable form
pub struct FormatNormalizer;

impl FormatNormalizer {
    /// Normalize a source for the removal engine
    ///
    /// Blob sources whose media type is in [`REENCODE_TYPES`] are decoded and
    /// re-encoded to PNG; the output keeps the input's pixel dimensions and
    /// full alpha. All other sources pass through unchanged.
    ///
    /// # Errors
    /// - `RemovalError::Decode` when the source cannot be rendered (corrupt
    ///   data or a codec this build cannot decode)
    /// - `RemovalError::Encode` when the PNG re-encode fails
    pub fn normalize(source: ImageSource) -> Result<NormalizedSource> {
        let needs_reencode = source
            .media_type()
            .is_some_and(|t| REENCODE_TYPES.contains(t));
        if !needs_reencode {
            return Ok(NormalizedSource {
                source,
                reencoded: false,
            });
        }

        let ImageSource::Blob { data, media_type } = source else {
            unreachable!("location sources never carry a media type");
        };

        log::debug!("Pre-decoding {} blob to PNG", media_type.mime());

        let surface = image::load_from_memory(&data).map_err(|e| {
            RemovalError::decode(format!(
                "Failed to render {} source to a surface: {e}",
                media_type.mime()
            ))
        })?;

        // Lossless PNG round-trip preserves dimensions and alpha exactly.
        let mut encoded = Cursor::new(Vec::new());
        surface
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(|e| RemovalError::encode(format!("Failed to re-encode surface to PNG: {e}")))?;

        Ok(NormalizedSource {
            source: ImageSource::Blob {
                data: encoded.into_inner(),
                media_type: MediaType::Png,
            },
            reencoded: true,
        })
    }
}
