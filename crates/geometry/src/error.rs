//! Error types for geometry operations.

use thiserror::Error;

/// Result type alias for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;

/// Errors produced by invalid or degenerate transform requests.
///
/// Well-formed positive-dimension requests never fail; these variants
/// only cover requests that have no meaningful geometric answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// Crop requested with both target dimensions zero
    #[error("degenerate crop request: width and height are both zero")]
    DegenerateCrop,

    /// Source image has a zero dimension
    #[error("source image has zero dimension ({width}x{height})")]
    EmptySource {
        /// Source width in pixels
        width: u32,
        /// Source height in pixels
        height: u32,
    },
}
