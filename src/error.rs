//! Error taxonomy for the generation pipeline.
//!
//! Every failure carries enough context (field, constraint, sizes) to be shown
//! to a caller without inspecting internals. Variants are cloneable so batch
//! results can record one per item.

use crate::qrcode::EccLevel;
use crate::render::OutputFormat;
use thiserror::Error;

/// Errors produced by the content encoder, symbol generator, renderer,
/// logo compositor, and batch orchestrator.
#[derive(Debug, Clone, Error)]
pub enum QrError {
    /// A required field is empty or a value failed variant-specific validation.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        field: &'static str,
        reason: String,
    },

    /// No symbol version up to 40 has enough capacity for the payload at the
    /// requested error correction level.
    #[error("payload needs {data_bits} bits but at most {capacity_bits} fit at the requested level")]
    PayloadTooLarge {
        data_bits: usize,
        capacity_bits: usize,
    },

    /// The payload does not fit at the minimum level the logo demands, and the
    /// level cannot be lowered while the logo is present.
    #[error("payload does not fit at {required}, the minimum error correction level required by the logo")]
    CannotEncodeWithLogo { required: EccLevel },

    /// The logo cannot be scaled down to a non-empty raster within the
    /// configured coverage fraction.
    #[error("logo cannot be scaled to a non-empty raster within the coverage limit")]
    LogoTooLarge,

    /// Transparency was requested with an output format that cannot carry an
    /// alpha channel.
    #[error("{format} cannot carry an alpha channel; transparent backgrounds require PNG")]
    IncompatibleFormat { format: OutputFormat },

    /// A batch run was cancelled before this item was processed. Clean early
    /// termination, not a processing failure.
    #[error("batch run cancelled")]
    Cancelled,

    /// Reading or writing a file failed.
    #[error("I/O failure: {0}")]
    Io(String),
}

impl From<std::io::Error> for QrError {
    fn from(err: std::io::Error) -> Self {
        QrError::Io(err.to_string())
    }
}

impl From<image::ImageError> for QrError {
    fn from(err: image::ImageError) -> Self {
        QrError::Io(err.to_string())
    }
}
