//! Error types for the imaging crate.

use thiserror::Error;

/// Result type alias for imaging operations.
pub type Result<T> = std::result::Result<T, ImagingError>;

/// Errors from turning bytes into a pixel buffer.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No decoder matched the byte signature
    #[error("unsupported image format")]
    UnknownFormat,

    /// Too few bytes to even inspect the signature
    #[error("input too short for format detection ({0} bytes)")]
    TruncatedInput(usize),

    /// A decoder matched but the data is damaged or cut off
    #[error("corrupt image data: {0}")]
    Corrupt(#[source] image::ImageError),
}

/// Errors from turning a pixel buffer back into bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// No encoder exists for the resolved format
    #[error("no encoder for format {0:?}")]
    UnsupportedFormat(String),

    /// The underlying codec failed
    #[error("encode failed: {0}")]
    Codec(#[from] image::ImageError),
}

/// Umbrella error for the [`Processor`](crate::Processor) surface.
#[derive(Debug, Error)]
pub enum ImagingError {
    /// Decoding the input bytes failed
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Re-encoding the result failed
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The transform request itself was invalid
    #[error(transparent)]
    Geometry(#[from] prism_geometry::GeometryError),
}
