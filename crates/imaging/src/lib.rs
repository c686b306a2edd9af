//! Image decoding, encoding, and transform operations for Prism.
//!
//! This crate provides:
//! - Format detection from magic bytes and robust in-memory decoding
//! - A format-keyed encoder registry bound to compression options
//! - Transform operations: crop, resize, watermark, grayscale
//! - A [`Processor`] facade tying them together with telemetry
//!
//! Transforms never mutate their input across operation boundaries; each
//! produces a new pixel buffer (or returns the input untouched when the
//! operation is a no-op).

#![warn(missing_docs)]

mod decode;
mod detect;
mod encode;
mod error;
mod ops;
mod processor;

pub use decode::decode;
pub use detect::{detect_format, SourceFormat};
pub use encode::{CompressionOptions, Encoder, EncoderRegistry, PngCompression};
pub use error::{DecodeError, EncodeError, ImagingError, Result};
pub use ops::{composite_over, crop, grayscale, resize};
pub use processor::Processor;
