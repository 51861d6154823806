//! Image ingestion: media types, upload sources, and the accepted-format policy
//!
//! An [`ImageSource`] is a user-supplied image before any normalization. It is
//! either an in-memory blob with a declared media type, or a location
//! reference (URL or path) that the removal engine resolves itself. The enum
//! guarantees exactly one representation is populated at a time.

use crate::error::{RemovalError, Result};
use image::ImageFormat;
use serde::{Deserialize, Serialize};

/// Maximum upload size guidance in bytes (~40 MB)
///
/// Guidance only: oversize uploads are reported, not rejected, matching the
/// picker-level enforcement of the upload surface.
pub const MAX_UPLOAD_BYTES: u64 = 40 * 1024 * 1024;

/// Media types the pipeline knows how to classify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// image/png
    Png,
    /// image/jpeg
    Jpeg,
    /// image/webp
    WebP,
    /// image/avif
    Avif,
    /// image/tiff
    Tiff,
    /// Anything else, carrying the declared MIME string
    Other(String),
}

impl MediaType {
    /// Classify a declared MIME type string
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/webp" => Self::WebP,
            "image/avif" => Self::Avif,
            "image/tiff" => Self::Tiff,
            other => Self::Other(other.to_string()),
        }
    }

    /// Sniff the media type from magic bytes
    ///
    /// # Errors
    /// Returns `RemovalError::Decode` when the bytes match no known container.
    pub fn sniff(data: &[u8]) -> Result<Self> {
        let format = image::guess_format(data)
            .map_err(|e| RemovalError::decode(format!("Unrecognized image data: {e}")))?;
        Ok(match format {
            ImageFormat::Png => Self::Png,
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::WebP => Self::WebP,
            ImageFormat::Avif => Self::Avif,
            ImageFormat::Tiff => Self::Tiff,
            other => Self::Other(other.to_mime_type().to_string()),
        })
    }

    /// The canonical MIME string for this media type
    #[must_use]
    pub fn mime(&self) -> &str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
            Self::Tiff => "image/tiff",
            Self::Other(mime) => mime,
        }
    }

    /// Whether this type is in the accepted upload set (JPEG, PNG, WebP, AVIF)
    #[must_use]
    pub fn is_accepted_upload(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png | Self::WebP | Self::Avif)
    }
}

/// A user-supplied image prior to normalization
///
/// Created on selection (picker, drag/drop) or programmatic navigation with a
/// preset sample. Blob sources own their bytes; location sources are resolved
/// downstream by whoever consumes them.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Raw binary blob with a declared media type
    Blob {
        /// Encoded image bytes
        data: Vec<u8>,
        /// Declared (or previously sniffed) media type
        media_type: MediaType,
    },
    /// URL or path reference resolved by the consumer
    Location(String),
}

impl ImageSource {
    /// Create a blob source from bytes and a declared MIME string
    #[must_use]
    pub fn from_bytes(data: Vec<u8>, mime: &str) -> Self {
        Self::Blob {
            data,
            media_type: MediaType::from_mime(mime),
        }
    }

    /// Create a blob source by sniffing the media type from magic bytes
    ///
    /// # Errors
    /// Returns `RemovalError::Decode` when the bytes match no known container.
    pub fn from_bytes_sniffed(data: Vec<u8>) -> Result<Self> {
        let media_type = MediaType::sniff(&data)?;
        Ok(Self::Blob { data, media_type })
    }

    /// Create a location source from a URL or path reference
    #[must_use]
    pub fn from_location<S: Into<String>>(location: S) -> Self {
        Self::Location(location.into())
    }

    /// The declared media type, if this is a blob source
    #[must_use]
    pub fn media_type(&self) -> Option<&MediaType> {
        match self {
            Self::Blob { media_type, .. } => Some(media_type),
            Self::Location(_) => None,
        }
    }

    /// Size in bytes for blob sources, `None` for locations
    #[must_use]
    pub fn byte_len(&self) -> Option<u64> {
        match self {
            Self::Blob { data, .. } => Some(data.len() as u64),
            Self::Location(_) => None,
        }
    }
}

/// Outcome of an upload policy check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCheck {
    /// Declared or sniffed media type is in the accepted set
    pub accepted_type: bool,
    /// Blob exceeds the size guidance (informational, never fatal)
    pub oversize: bool,
}

/// Accepted-format and size policy for the file input boundary
pub struct UploadPolicy {
    max_bytes: u64,
}

impl UploadPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }

    /// Check a source against the accepted-type set and size guidance
    ///
    /// Location references always pass: the type filter only applies to
    /// picked files, and downstream decoding catches anything unreadable.
    ///
    /// # Errors
    /// Returns `RemovalError::UnsupportedFormat` for blob sources whose media
    /// type is outside the accepted set.
    pub fn check(&self, source: &ImageSource) -> Result<UploadCheck> {
        match source {
            ImageSource::Location(_) => Ok(UploadCheck {
                accepted_type: true,
                oversize: false,
            }),
            ImageSource::Blob { data, media_type } => {
                if !media_type.is_accepted_upload() {
                    return Err(RemovalError::unsupported_format(format!(
                        "{} is not an accepted upload type (JPEG, PNG, WebP, AVIF)",
                        media_type.mime()
                    )));
                }
                let oversize = data.len() as u64 > self.max_bytes;
                if oversize {
                    log::warn!(
                        "Upload of {} bytes exceeds the {} byte guidance",
                        data.len(),
                        self.max_bytes
                    );
                }
                Ok(UploadCheck {
                    accepted_type: true,
                    oversize,
                })
            },
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_from_mime() {
        assert_eq!(MediaType::from_mime("image/png"), MediaType::Png);
        assert_eq!(MediaType::from_mime("image/jpg"), MediaType::Jpeg);
        assert_eq!(MediaType::from_mime("IMAGE/WEBP"), MediaType::WebP);
        assert_eq!(
            MediaType::from_mime("image/heic"),
            MediaType::Other("image/heic".to_string())
        );
    }

    #[test]
    fn test_media_type_sniff_png() {
        let mut png = image::RgbaImage::new(2, 2);
        png.put_pixel(0, 0, image::Rgba([10, 20, 30, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(png)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        assert_eq!(MediaType::sniff(bytes.get_ref()).unwrap(), MediaType::Png);
    }

    #[test]
    fn test_media_type_sniff_garbage() {
        let err = MediaType::sniff(&[0x00, 0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, RemovalError::Decode(_)));
    }

    #[test]
    fn test_accepted_upload_set() {
        assert!(MediaType::Jpeg.is_accepted_upload());
        assert!(MediaType::Png.is_accepted_upload());
        assert!(MediaType::WebP.is_accepted_upload());
        assert!(MediaType::Avif.is_accepted_upload());
        assert!(!MediaType::Tiff.is_accepted_upload());
        assert!(!MediaType::Other("image/gif".to_string()).is_accepted_upload());
    }

    #[test]
    fn test_upload_policy_rejects_unsupported_type() {
        let policy = UploadPolicy::new();
        let source = ImageSource::from_bytes(vec![0u8; 16], "image/tiff");
        let err = policy.check(&source).unwrap_err();
        assert!(matches!(err, RemovalError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_upload_policy_flags_oversize_without_rejecting() {
        let policy = UploadPolicy { max_bytes: 8 };
        let source = ImageSource::from_bytes(vec![0u8; 16], "image/png");
        let check = policy.check(&source).unwrap();
        assert!(check.accepted_type);
        assert!(check.oversize);
    }

    #[test]
    fn test_upload_policy_passes_locations() {
        let policy = UploadPolicy::new();
        let source = ImageSource::from_location("/samples/portrait.jpg");
        let check = policy.check(&source).unwrap();
        assert!(check.accepted_type);
        assert!(!check.oversize);
    }

    #[test]
    fn test_source_exclusivity() {
        let blob = ImageSource::from_bytes(vec![1, 2, 3], "image/png");
        assert!(blob.media_type().is_some());
        assert_eq!(blob.byte_len(), Some(3));

        let loc = ImageSource::from_location("https://example.com/cat.jpg");
        assert!(loc.media_type().is_none());
        assert_eq!(loc.byte_len(), None);
    }
}
