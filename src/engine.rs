//! Single-item generation pipeline.
//!
//! Wires the stages together: content encoding, logo-driven level escalation,
//! symbol generation, rendering, and compositing. Each stage is pure, so the
//! pipeline is safe to call from any number of threads at once.

use image::RgbaImage;
use tracing::debug;

use crate::content::{self, ContentRequest};
use crate::error::QrError;
use crate::logo::{self, LogoPolicy, LogoSpec};
use crate::qrcode::{EccLevel, QrCode, Version};
use crate::render::{self, RenderStyle};

/// Runs the full pipeline for one request and returns the finished raster.
///
/// When a logo is present the error correction level is escalated to the
/// policy minimum before generation; the symbol is never regenerated after
/// the logo is drawn.
///
/// # Errors
///
/// Propagates validation and capacity errors from the stages. A payload that
/// does not fit at the logo-forced level surfaces as
/// [`QrError::CannotEncodeWithLogo`] so callers can tell the logo is what
/// made it unencodable.
pub fn generate_image(
    request: &ContentRequest,
    level: EccLevel,
    style: &RenderStyle,
    logo: Option<&LogoSpec>,
    policy: &LogoPolicy,
) -> Result<RgbaImage, QrError> {
    let payload = content::encode(request)?;

    let effective = match logo {
        Some(_) => logo::plan_escalation(level, policy),
        None => level,
    };
    if effective != level {
        debug!(requested = %level, effective = %effective, "escalated error correction for logo");
    }

    let qr = QrCode::encode_text(payload.text(), effective, Version::MIN).map_err(|err| {
        match (&err, logo) {
            // The logo pinned the level at the policy minimum and the payload
            // still does not fit; lowering the level is not an option.
            (QrError::PayloadTooLarge { .. }, Some(_)) if effective == policy.minimum_level => {
                QrError::CannotEncodeWithLogo {
                    required: effective,
                }
            }
            _ => err,
        }
    })?;
    debug!(
        version = qr.version().value(),
        size = qr.size(),
        level = %qr.error_correction_level(),
        "symbol generated"
    );

    let image = render::render(&qr, style);
    match logo {
        Some(spec) => logo::composite(&image, spec, style, qr.size()),
        None => Ok(image),
    }
}

/// Runs the pipeline up to SVG serialization. Logos are raster-only, so this
/// path takes none.
pub fn generate_svg_string(
    request: &ContentRequest,
    level: EccLevel,
    style: &RenderStyle,
) -> Result<String, QrError> {
    let payload = content::encode(request)?;
    let qr = QrCode::encode_text(payload.text(), level, Version::MIN)?;
    Ok(render::to_svg_string(&qr, style))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_logo() -> LogoSpec {
        let img = RgbaImage::from_pixel(32, 32, Rgba([200, 30, 30, 255]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        LogoSpec::new(buf)
    }

    #[test]
    fn pipeline_produces_a_square_raster() {
        let request = ContentRequest::Website {
            url: "example.com".into(),
        };
        let style = RenderStyle::default();
        let image =
            generate_image(&request, EccLevel::Medium, &style, None, &LogoPolicy::default())
                .unwrap();
        assert_eq!(image.width(), image.height());
        assert!(image.width() > 0);
    }

    #[test]
    fn logo_request_composites_onto_the_symbol() {
        let request = ContentRequest::PlainText {
            text: "with logo".into(),
        };
        let style = RenderStyle::default();
        let logo = png_logo();
        let image = generate_image(
            &request,
            EccLevel::Low,
            &style,
            Some(&logo),
            &LogoPolicy::default(),
        )
        .unwrap();
        let center = image.get_pixel(image.width() / 2, image.height() / 2);
        assert_eq!(center.0, [200, 30, 30, 255]);
    }

    #[test]
    fn invalid_content_fails_before_generation() {
        let request = ContentRequest::Wifi {
            ssid: String::new(),
            password: None,
            security: crate::content::WifiSecurity::Wpa,
            hidden: false,
        };
        let err = generate_image(
            &request,
            EccLevel::Low,
            &RenderStyle::default(),
            None,
            &LogoPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, QrError::InvalidInput { field: "ssid", .. }));
    }

    #[test]
    fn unencodable_payload_with_logo_names_the_forced_level() {
        // Fits at Low (version 40-L holds 2953 bytes) but not at the
        // logo-forced Quartile (1663 bytes)
        let request = ContentRequest::PlainText {
            text: "x".repeat(2200),
        };
        let logo = png_logo();
        let err = generate_image(
            &request,
            EccLevel::Low,
            &RenderStyle::default(),
            Some(&logo),
            &LogoPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            QrError::CannotEncodeWithLogo {
                required: EccLevel::Quartile
            }
        ));

        // Without the logo the same payload encodes fine
        let image = generate_image(
            &request,
            EccLevel::Low,
            &RenderStyle::default(),
            None,
            &LogoPolicy::default(),
        )
        .unwrap();
        assert!(image.width() > 0);
    }

    #[test]
    fn svg_pipeline_yields_a_document() {
        let request = ContentRequest::Phone {
            number: "555-0100".into(),
        };
        let svg =
            generate_svg_string(&request, EccLevel::Medium, &RenderStyle::default()).unwrap();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains("<svg"));
    }
}
