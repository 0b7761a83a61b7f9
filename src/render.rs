//! Rendering a module matrix to pixels.
//!
//! Maps a [`QrCode`] onto an RGBA raster with configurable module and
//! background colors, scale, and quiet zone, then encodes the raster as PNG or
//! JPEG. An SVG serializer and a console printer round out the output paths.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::QrError;
use crate::qrcode::QrCode;

const JPEG_QUALITY: u8 = 95;

/// Visual parameters of a rendered symbol.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RenderStyle {
    /// Color of dark modules.
    pub module_color: [u8; 3],
    /// Color of light modules and the quiet zone.
    pub background_color: [u8; 3],
    /// Render light pixels fully transparent instead of the background color.
    pub transparent_background: bool,
    /// Pixels per module.
    pub scale: u32,
    /// Quiet zone width in modules on each side.
    pub quiet_zone: u32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            module_color: [0, 0, 0],
            background_color: [255, 255, 255],
            transparent_background: false,
            scale: 10,
            quiet_zone: 4,
        }
    }
}

/// Raster file format for exported symbols.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    /// Whether the format can carry an alpha channel.
    pub fn supports_alpha(self) -> bool {
        matches!(self, OutputFormat::Png)
    }
}

impl core::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(match self {
            OutputFormat::Png => "PNG",
            OutputFormat::Jpeg => "JPEG",
        })
    }
}

/// Renders the matrix to an RGBA raster.
///
/// The image side is `(qr.size() + 2 * quiet_zone) * scale` pixels. Dark
/// modules get the module color at full alpha; everything else gets the
/// background color, or alpha 0 when the style asks for transparency.
pub fn render(qr: &QrCode, style: &RenderStyle) -> RgbaImage {
    let scale = style.scale.max(1);
    let border = i32::try_from(style.quiet_zone).unwrap_or(4);
    let side = (qr.size() as u32 + 2 * style.quiet_zone) * scale;

    let dark = Rgba([
        style.module_color[0],
        style.module_color[1],
        style.module_color[2],
        255,
    ]);
    let light = if style.transparent_background {
        Rgba([0, 0, 0, 0])
    } else {
        Rgba([
            style.background_color[0],
            style.background_color[1],
            style.background_color[2],
            255,
        ])
    };

    let mut image: RgbaImage = ImageBuffer::new(side, side);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let qx = (x / scale) as i32 - border;
        let qy = (y / scale) as i32 - border;
        // Out-of-bounds module reads are light, so the quiet zone needs no
        // special casing here.
        *pixel = if qr.get_module(qx, qy) { dark } else { light };
    }
    image
}

/// Encodes a rendered raster into the given file format.
///
/// # Errors
///
/// [`QrError::IncompatibleFormat`] when the style asks for a transparent
/// background and the format cannot carry alpha. Transparency is never
/// silently flattened.
pub fn encode_image(
    image: &RgbaImage,
    format: OutputFormat,
    style: &RenderStyle,
) -> Result<Vec<u8>, QrError> {
    if style.transparent_background && !format.supports_alpha() {
        return Err(QrError::IncompatibleFormat { format });
    }
    let mut buf: Vec<u8> = Vec::new();
    match format {
        OutputFormat::Png => {
            image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            rgb.write_with_encoder(encoder)?;
        }
    }
    Ok(buf)
}

/// Encodes and writes a rendered raster to a file.
pub fn save_image(
    image: &RgbaImage,
    path: &Path,
    format: OutputFormat,
    style: &RenderStyle,
) -> Result<(), QrError> {
    let bytes = encode_image(image, format, style)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Serializes the matrix as an SVG document string using the style's colors
/// and quiet zone. One `<path>` covers all dark modules; the background rect
/// is omitted when the style is transparent.
pub fn to_svg_string(qr: &QrCode, style: &RenderStyle) -> String {
    let border = i64::from(style.quiet_zone);
    let dimension = i64::from(qr.size())
        .checked_add(border * 2)
        .expect("overflow");
    let fg = hex_color(style.module_color);
    let bg = hex_color(style.background_color);

    let mut result = String::new();
    result += "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
    result += "<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n";
    result += &format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" viewBox=\"0 0 {dimension} {dimension}\" stroke=\"none\">\n"
    );
    if !style.transparent_background {
        result += &format!("\t<rect width=\"100%\" height=\"100%\" fill=\"{bg}\"/>\n");
    }
    result += "\t<path d=\"";
    for y in 0..qr.size() {
        for x in 0..qr.size() {
            if qr.get_module(x, y) {
                if x != 0 || y != 0 {
                    result += " ";
                }
                result += &format!(
                    "M{},{}h1v1h-1z",
                    i64::from(x) + border,
                    i64::from(y) + border
                );
            }
        }
    }
    result += &format!("\" fill=\"{fg}\"/>\n");
    result += "</svg>\n";
    result
}

/// Prints the matrix to stdout with block characters. Debug helper.
pub fn print_qr(qr: &QrCode) {
    let border: i32 = 4;
    for y in -border..qr.size() + border {
        for x in -border..qr.size() + border {
            let c: char = if qr.get_module(x, y) { '█' } else { ' ' };
            print!("{0}{0}", c);
        }
        println!();
    }
    println!();
}

fn hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}
