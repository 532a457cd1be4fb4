//! Error types for swatch color extraction

use thiserror::Error;

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Error, Debug)]
pub enum ExtractError {
    /// The pixel grid holds no pixels at all
    #[error("Invalid image: {width}x{height} grid has no pixels")]
    InvalidImage { width: u32, height: u32 },

    /// Pixel buffer does not match the declared dimensions
    #[error("Pixel buffer holds {actual} pixels, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A sampler tunable is outside its accepted range
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: &'static str, value: String },

    /// Image bytes or file could not be decoded
    #[error("Unable to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// Hex color string is malformed
    #[error("Invalid hex color: {value:?}")]
    InvalidHex { value: String },

    /// Sampler parameter file is not valid JSON or has mistyped fields
    #[error("Invalid sampler configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ExtractError {
    pub(crate) fn invalid_parameter(parameter: &'static str, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter,
            value: value.to_string(),
        }
    }

    /// Whether a batch should skip this item and keep going.
    ///
    /// Image-level failures only affect one product color; parameter and hex
    /// errors are configuration mistakes that would fail every item.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExtractError::InvalidImage { .. }
                | ExtractError::DimensionMismatch { .. }
                | ExtractError::Decode(_)
        )
    }
}
