//! Background compositing for on-screen preview
//!
//! Re-renders the alpha-channel cut-out against a user-selected backdrop.
//! This is presentation only: switching backdrops never mutates the
//! [`ResultAsset`] and never affects the exported file, which always remains
//! the transparent PNG the engine produced.

use crate::{
    engine::ResultAsset,
    error::{RemovalError, Result},
};
use image::{imageops, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Checkerboard tile size for the transparency preview, in pixels
const CHECKER_TILE: u32 = 20;

/// An opaque RGB backdrop color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[must_use]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#rrggbb` hex string
    ///
    /// # Errors
    /// Returns `RemovalError::InvalidConfig` for anything that is not six hex
    /// digits with a leading `#`.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 {
            return Err(RemovalError::invalid_config(format!(
                "Invalid hex color: {hex}"
            )));
        }
        let parse = |range: std::ops::Range<usize>| {
            digits
                .get(range)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| RemovalError::invalid_config(format!("Invalid hex color: {hex}")))
        };
        Ok(Self {
            r: parse(0..2)?,
            g: parse(2..4)?,
            b: parse(4..6)?,
        })
    }
}

/// Direction of a linear gradient backdrop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GradientDirection {
    ToRight,
    ToBottom,
    /// Top-left toward bottom-right (the 135° case)
    Diagonal,
}

/// A two-stop linear gradient backdrop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gradient {
    pub start: Color,
    pub end: Color,
    pub direction: GradientDirection,
}

/// The user's backdrop selection for the comparison preview
///
/// Serializes as a tagged union, the same shape the selection takes on the
/// wire in the upload UI. Default is `Transparent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum BackgroundChoice {
    #[default]
    Transparent,
    Color(Color),
    Gradient(Gradient),
    Image {
        url: String,
    },
}

/// Built-in backdrop galleries offered by the upload surface
pub mod presets {
    use super::{Color, Gradient, GradientDirection};

    /// Solid color swatches
    #[must_use]
    pub fn colors() -> Vec<(&'static str, Color)> {
        vec![
            ("White", Color::new(0xff, 0xff, 0xff)),
            ("Black", Color::new(0x00, 0x00, 0x00)),
            ("Soft Blue", Color::new(0xe0, 0xf2, 0xfe)),
            ("Rose", Color::new(0xff, 0xf1, 0xf2)),
            ("Emerald", Color::new(0xec, 0xfd, 0xf5)),
        ]
    }

    /// Linear gradient swatches
    #[must_use]
    pub fn gradients() -> Vec<(&'static str, Gradient)> {
        vec![
            (
                "Sunset",
                Gradient {
                    start: Color::new(0xff, 0x5f, 0x6d),
                    end: Color::new(0xff, 0xc3, 0x71),
                    direction: GradientDirection::ToRight,
                },
            ),
            (
                "Ocean",
                Gradient {
                    start: Color::new(0x21, 0x93, 0xb0),
                    end: Color::new(0x6d, 0xd5, 0xed),
                    direction: GradientDirection::ToRight,
                },
            ),
            (
                "Midnight",
                Gradient {
                    start: Color::new(0x23, 0x25, 0x26),
                    end: Color::new(0x41, 0x43, 0x45),
                    direction: GradientDirection::ToBottom,
                },
            ),
            (
                "Purple",
                Gradient {
                    start: Color::new(0x66, 0x7e, 0xea),
                    end: Color::new(0x76, 0x4b, 0xa2),
                    direction: GradientDirection::Diagonal,
                },
            ),
        ]
    }

    /// Remote studio backdrop images
    #[must_use]
    pub fn image_urls() -> Vec<(&'static str, &'static str)> {
        vec![
            (
                "Studio",
                "https://images.unsplash.com/photo-1621839673705-68b7eda1f72d?auto=format&fit=crop&q=80&w=2000",
            ),
            (
                "Office",
                "https://images.unsplash.com/photo-1497366216548-37526070297c?auto=format&fit=crop&q=80&w=2000",
            ),
            (
                "Loft",
                "https://images.unsplash.com/photo-1554995207-c18c203602cb?auto=format&fit=crop&q=80&w=2000",
            ),
        ]
    }
}

/// Renders backdrops beneath the alpha-channel cut-out
pub struct BackgroundCompositor;

impl BackgroundCompositor {
    /// Composite the cut-out over the chosen backdrop at the cut-out's size
    ///
    /// `backdrop_image` must be supplied (pre-fetched) when the choice is
    /// `Image`; it is ignored otherwise.
    ///
    /// # Errors
    /// - `RemovalError::Decode` if the result asset no longer decodes
    /// - `RemovalError::InvalidConfig` for an `Image` choice without a
    ///   resolved backdrop
    pub fn composite(
        choice: &BackgroundChoice,
        asset: &ResultAsset,
        backdrop_image: Option<&RgbaImage>,
    ) -> Result<RgbaImage> {
        let cutout = asset.to_rgba()?;
        let (width, height) = cutout.dimensions();
        let mut canvas = Self::backdrop(choice, width, height, backdrop_image)?;
        Self::blend_over(&mut canvas, &cutout);
        Ok(canvas)
    }

    /// Fetch a remote backdrop image for an `Image` choice
    ///
    /// # Errors
    /// - `RemovalError::Network` for request or transfer failures
    /// - `RemovalError::Decode` if the response body is not a decodable image
    pub async fn fetch_backdrop(url: &str) -> Result<RgbaImage> {
        log::debug!("Fetching backdrop image from {}", url);
        let response = reqwest::get(url)
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| RemovalError::network_error("Failed to fetch backdrop", e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemovalError::network_error("Failed to read backdrop body", e))?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| RemovalError::decode(format!("Backdrop is not a decodable image: {e}")))?;
        Ok(decoded.to_rgba8())
    }

    /// Render the backdrop layer at the given size
    fn backdrop(
        choice: &BackgroundChoice,
        width: u32,
        height: u32,
        backdrop_image: Option<&RgbaImage>,
    ) -> Result<RgbaImage> {
        match choice {
            BackgroundChoice::Transparent => Ok(Self::checkerboard(width, height)),
            BackgroundChoice::Color(color) => Ok(RgbaImage::from_pixel(
                width,
                height,
                Rgba([color.r, color.g, color.b, 255]),
            )),
            BackgroundChoice::Gradient(gradient) => Ok(Self::gradient(gradient, width, height)),
            BackgroundChoice::Image { url } => {
                let source = backdrop_image.ok_or_else(|| {
                    RemovalError::invalid_config(format!("Backdrop image not resolved: {url}"))
                })?;
                Ok(Self::cover_fit(source, width, height))
            },
        }
    }

    /// The classic transparency checkerboard used for preview only
    fn checkerboard(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let light = ((x / CHECKER_TILE) + (y / CHECKER_TILE)) % 2 == 0;
            if light {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([204, 204, 204, 255])
            }
        })
    }

    fn gradient(gradient: &Gradient, width: u32, height: u32) -> RgbaImage {
        let span_x = width.saturating_sub(1).max(1) as f32;
        let span_y = height.saturating_sub(1).max(1) as f32;
        RgbaImage::from_fn(width, height, |x, y| {
            let t = match gradient.direction {
                GradientDirection::ToRight => x as f32 / span_x,
                GradientDirection::ToBottom => y as f32 / span_y,
                GradientDirection::Diagonal => (x as f32 / span_x + y as f32 / span_y) / 2.0,
            };
            let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
            Rgba([
                lerp(gradient.start.r, gradient.end.r),
                lerp(gradient.start.g, gradient.end.g),
                lerp(gradient.start.b, gradient.end.b),
                255,
            ])
        })
    }

    /// Scale to cover the target box, then center-crop (CSS `center/cover`)
    fn cover_fit(source: &RgbaImage, width: u32, height: u32) -> RgbaImage {
        let (src_w, src_h) = source.dimensions();
        if src_w == 0 || src_h == 0 {
            return RgbaImage::new(width, height);
        }
        let scale = (width as f32 / src_w as f32).max(height as f32 / src_h as f32);
        let scaled_w = ((src_w as f32 * scale).round() as u32).max(width);
        let scaled_h = ((src_h as f32 * scale).round() as u32).max(height);
        let scaled = imageops::resize(source, scaled_w, scaled_h, imageops::FilterType::Triangle);
        let offset_x = (scaled_w - width) / 2;
        let offset_y = (scaled_h - height) / 2;
        imageops::crop_imm(&scaled, offset_x, offset_y, width, height).to_image()
    }

    /// Alpha-blend the cut-out over an opaque backdrop, in place
    fn blend_over(backdrop: &mut RgbaImage, cutout: &RgbaImage) {
        for (bg, fg) in backdrop.pixels_mut().zip(cutout.pixels()) {
            let alpha = fg[3] as u32;
            let inverse = 255 - alpha;
            bg[0] = ((fg[0] as u32 * alpha + bg[0] as u32 * inverse) / 255) as u8;
            bg[1] = ((fg[1] as u32 * alpha + bg[1] as u32 * inverse) / 255) as u8;
            bg[2] = ((fg[2] as u32 * alpha + bg[2] as u32 * inverse) / 255) as u8;
            bg[3] = 255;
        }
    }
}
