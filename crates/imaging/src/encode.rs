//! Format-keyed encoder dispatch bound to compression options.

use crate::{EncodeError, SourceFormat};
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{DynamicImage, ImageEncoder, ImageOutputFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Cursor;

/// PNG compression level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    /// Minimal compression, fastest
    Fast,
    /// Balanced (the default)
    #[default]
    Default,
    /// Maximum compression, slowest
    Best,
}

impl From<PngCompression> for CompressionType {
    fn from(value: PngCompression) -> Self {
        match value {
            PngCompression::Fast => CompressionType::Fast,
            PngCompression::Default => CompressionType::Default,
            PngCompression::Best => CompressionType::Best,
        }
    }
}

/// Per-format compression and quality parameters.
///
/// Immutable after construction; the registry binds these into each
/// encoder it hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionOptions {
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    /// PNG compression level
    pub png_compression: PngCompression,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: 85,
            png_compression: PngCompression::Default,
        }
    }
}

/// An encoder capability bound to its compression parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoder {
    /// JPEG with a quality level
    Jpeg {
        /// Quality, 1-100
        quality: u8,
    },
    /// PNG with a compression level
    Png {
        /// Compression level
        compression: PngCompression,
    },
    /// Lossless WebP
    WebP,
    /// GIF
    Gif,
}

impl Encoder {
    /// The encoder configured for a detected source format.
    #[must_use]
    pub fn for_format(format: SourceFormat, options: &CompressionOptions) -> Self {
        match format {
            SourceFormat::Jpeg => Encoder::Jpeg {
                quality: options.jpeg_quality,
            },
            SourceFormat::Png => Encoder::Png {
                compression: options.png_compression,
            },
            SourceFormat::WebP => Encoder::WebP,
            SourceFormat::Gif => Encoder::Gif,
        }
    }

    /// Canonical name of the format this encoder produces.
    #[must_use]
    pub fn format_name(&self) -> &'static str {
        match self {
            Encoder::Jpeg { .. } => "jpeg",
            Encoder::Png { .. } => "png",
            Encoder::WebP => "webp",
            Encoder::Gif => "gif",
        }
    }

    /// Encode a pixel buffer into output bytes.
    pub fn encode(&self, img: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
        let mut buffer = Cursor::new(Vec::new());

        match self {
            Encoder::Jpeg { quality } => {
                // JPEG carries no alpha channel
                let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
                rgb.write_to(&mut buffer, ImageOutputFormat::Jpeg(*quality))?;
            }
            Encoder::Png { compression } => {
                let encoder = PngEncoder::new_with_quality(
                    &mut buffer,
                    (*compression).into(),
                    PngFilterType::Adaptive,
                );
                encoder.write_image(img.as_bytes(), img.width(), img.height(), img.color())?;
            }
            Encoder::WebP => img.write_to(&mut buffer, ImageOutputFormat::WebP)?,
            Encoder::Gif => img.write_to(&mut buffer, ImageOutputFormat::Gif)?,
        }

        Ok(buffer.into_inner())
    }
}

/// Format-name-keyed encoder lookup with source-format fallback.
///
/// `"jpg"`, `"jpeg"`, `"png"`, `"webp"`, and `"gif"` are registered out
/// of the box; further names (including aliases for existing encoders)
/// can be added with [`EncoderRegistry::register`] without touching the
/// transform operations. An empty or unknown request resolves to the
/// encoder for the buffer's originally detected format.
#[derive(Debug, Clone)]
pub struct EncoderRegistry {
    encoders: HashMap<String, Encoder>,
    options: CompressionOptions,
}

impl Default for EncoderRegistry {
    fn default() -> Self {
        Self::new(CompressionOptions::default())
    }
}

impl EncoderRegistry {
    /// Build the registry with the built-in formats bound to `options`.
    #[must_use]
    pub fn new(options: CompressionOptions) -> Self {
        let mut registry = Self {
            encoders: HashMap::new(),
            options,
        };
        registry.register(
            "jpeg",
            Encoder::Jpeg {
                quality: options.jpeg_quality,
            },
        );
        registry.register(
            "jpg",
            Encoder::Jpeg {
                quality: options.jpeg_quality,
            },
        );
        registry.register(
            "png",
            Encoder::Png {
                compression: options.png_compression,
            },
        );
        registry.register("webp", Encoder::WebP);
        registry.register("gif", Encoder::Gif);
        registry
    }

    /// The compression options this registry was built with.
    #[must_use]
    pub fn options(&self) -> &CompressionOptions {
        &self.options
    }

    /// Register (or override) an encoder under a format name.
    pub fn register(&mut self, name: impl Into<String>, encoder: Encoder) {
        self.encoders.insert(name.into().to_lowercase(), encoder);
    }

    /// Resolve the encoder for a requested format name.
    ///
    /// Lookup is strictly keyed on the lowercased name; an empty or
    /// unrecognized request falls back to the encoder for `source`.
    #[must_use]
    pub fn encoder_for(&self, requested: &str, source: SourceFormat) -> Encoder {
        let key = requested.trim().to_lowercase();
        if !key.is_empty() {
            if let Some(encoder) = self.encoders.get(&key) {
                return *encoder;
            }
        }
        self.encoders
            .get(source.name())
            .copied()
            .unwrap_or_else(|| Encoder::for_format(source, &self.options))
    }
}
