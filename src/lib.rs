//! # qrsmith
//!
//! A QR code generation and compositing pipeline.
//!
//! `qrsmith` turns typed content requests (plain text, web addresses, WiFi
//! credentials, email, phone, SMS, vCard contacts, geo coordinates) into QR
//! Code Model 2 symbols, renders them as styled rasters or SVG, embeds logos
//! with automatic error-correction escalation, and exports whole batches with
//! progress reporting and cancellation.
//!
//! ## Features
//!
//! - Encode payloads in numeric, alphanumeric, or byte mode, versions 1 to 40,
//!   four error correction levels.
//! - Content presets that produce the exact payload formats readers expect
//!   (`WIFI:`, `mailto:`, `tel:`, `sms:`, vCard 3.0, `geo:`).
//! - Styled rendering: custom module and background colors, scale, quiet zone,
//!   transparent backgrounds, PNG/JPEG/SVG output.
//! - Logo embedding that escalates the error correction level before
//!   generation so the occluded area stays recoverable.
//! - Batch export on a worker thread with per-item failure isolation,
//!   filename templating, progress events, and cooperative cancellation.
//! - Safe Rust implementation with no unsafe code.
//!
//! ## Example
//!
//! Generate a styled symbol for a web address:
//!
//! ```rust
//! use qrsmith::content::ContentRequest;
//! use qrsmith::engine::generate_image;
//! use qrsmith::logo::LogoPolicy;
//! use qrsmith::qrcode::EccLevel;
//! use qrsmith::render::RenderStyle;
//!
//! let request = ContentRequest::Website {
//!     url: "example.com".into(),
//! };
//! let image = generate_image(
//!     &request,
//!     EccLevel::Medium,
//!     &RenderStyle::default(),
//!     None,
//!     &LogoPolicy::default(),
//! )
//! .unwrap();
//! assert!(image.width() > 0);
//! ```
//!
//! ## Modules
//!
//! - [`content`]: Content presets and payload encoding.
//! - [`qrcode`]: Core QR symbol encoding.
//! - [`render`]: Raster, SVG, and console rendering.
//! - [`logo`]: Logo embedding and error-correction escalation policy.
//! - [`engine`]: Single-item generation pipeline.
//! - [`batch`]: Batch export with progress and cancellation.
//! - [`error`]: The crate's error taxonomy.

pub mod batch;
pub mod content;
pub mod engine;
pub mod error;
pub mod logo;
pub mod qrcode;
pub mod render;
