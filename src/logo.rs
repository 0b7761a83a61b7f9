//! Logo embedding.
//!
//! A logo occludes part of the symbol, which only scans reliably when enough
//! error correction is in reserve. The policy here is decided *before*
//! generation: [`plan_escalation`] raises the requested level to the policy
//! minimum, and [`composite`] draws the logo over the finished raster inside a
//! coverage budget well below what the escalated level can recover.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::QrError;
use crate::qrcode::EccLevel;
use crate::render::RenderStyle;

/// A logo to embed, as raw encoded image bytes plus placement limits.
#[derive(Clone, PartialEq, Debug)]
pub struct LogoSpec {
    /// Encoded image data in any format the `image` crate can sniff.
    pub image_bytes: Vec<u8>,
    /// Fraction of the symbol area the padded logo box may cover, capped at 0.30.
    pub max_coverage_fraction: f64,
    /// Width of the opaque padding border around the logo, in modules.
    pub padding_modules: u32,
}

// f64 has no Eq, but the fraction is always a finite config value.
impl Eq for LogoSpec {}

impl LogoSpec {
    /// Creates a spec with the default coverage fraction (0.25) and one module
    /// of padding.
    pub fn new(image_bytes: Vec<u8>) -> Self {
        Self {
            image_bytes,
            max_coverage_fraction: 0.25,
            padding_modules: 1,
        }
    }
}

/// Minimum error correction level enforced whenever a logo is present.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LogoPolicy {
    pub minimum_level: EccLevel,
}

impl Default for LogoPolicy {
    fn default() -> Self {
        Self {
            minimum_level: EccLevel::Quartile,
        }
    }
}

/// Returns the effective error correction level for a symbol that will carry
/// a logo: the requested level, raised to the policy minimum if below it.
pub fn plan_escalation(requested: EccLevel, policy: &LogoPolicy) -> EccLevel {
    requested.max(policy.minimum_level)
}

/// Draws the logo centered over a rendered symbol.
///
/// The logo is shrunk (never enlarged) with aspect ratio preserved so its
/// padded box stays within `max_coverage_fraction` of the symbol's area, then
/// placed on an opaque background-colored pad so modules never show through.
///
/// # Errors
///
/// [`QrError::InvalidInput`] when the bytes do not decode as an image, and
/// [`QrError::LogoTooLarge`] when the coverage budget leaves no room for even
/// a single pixel of logo.
pub fn composite(
    base: &RgbaImage,
    logo: &LogoSpec,
    style: &RenderStyle,
    matrix_side: i32,
) -> Result<RgbaImage, QrError> {
    let decoded = image::load_from_memory(&logo.image_bytes)
        .map_err(|err| QrError::InvalidInput {
            field: "logo",
            reason: format!("image data could not be decoded: {err}"),
        })?
        .to_rgba8();

    let scale = style.scale.max(1);
    let symbol_px = matrix_side as u32 * scale;
    let fraction = logo.max_coverage_fraction.clamp(0.0, 0.30);
    let padding_px = logo.padding_modules * scale;

    // The box side that covers `fraction` of the symbol area, minus padding
    let box_px = (f64::from(symbol_px) * fraction.sqrt()).floor() as u32;
    let max_dim = box_px.saturating_sub(2 * padding_px);
    if max_dim == 0 {
        return Err(QrError::LogoTooLarge);
    }

    let (w, h) = (decoded.width(), decoded.height());
    let (logo_w, logo_h) = if w <= max_dim && h <= max_dim {
        (w, h)
    } else {
        let ratio = f64::from(max_dim) / f64::from(w.max(h));
        (
            ((f64::from(w) * ratio) as u32).max(1),
            ((f64::from(h) * ratio) as u32).max(1),
        )
    };
    let resized = imageops::resize(&decoded, logo_w, logo_h, FilterType::Lanczos3);

    // Opaque pad in the background color, so the logo never sits directly on
    // dark modules even with a transparent style
    let pad_w = logo_w + 2 * padding_px;
    let pad_h = logo_h + 2 * padding_px;
    let bg = Rgba([
        style.background_color[0],
        style.background_color[1],
        style.background_color[2],
        255,
    ]);
    let mut pad = RgbaImage::from_pixel(pad_w, pad_h, bg);
    imageops::overlay(&mut pad, &resized, i64::from(padding_px), i64::from(padding_px));

    let mut result = base.clone();
    let x = (i64::from(result.width()) - i64::from(pad_w)) / 2;
    let y = (i64::from(result.height()) - i64::from(pad_h)) / 2;
    imageops::overlay(&mut result, &pad, x, y);
    Ok(result)
}
