//! Processor facade combining decode, transforms, and encode.

use crate::{
    decode, ops, CompressionOptions, DecodeError, EncodeError, EncoderRegistry, ImagingError,
    SourceFormat,
};
use image::DynamicImage;
use prism_geometry::CropPoint;
use prism_telemetry::{noop_sink, MetricUpdate, TelemetrySink};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Metric scope for transform-boundary telemetry.
const TRANSFORM_SCOPE: &str = "transform";

/// Stateless image processor shared across concurrent requests.
///
/// Owns the encoder registry (bound to compression options) and the
/// telemetry sink; both are immutable after construction, so a single
/// processor is safely shared by reference between request tasks.
#[derive(Clone)]
pub struct Processor {
    registry: EncoderRegistry,
    sink: Arc<dyn TelemetrySink>,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    /// Processor with default compression and no telemetry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_compression(CompressionOptions::default())
    }

    /// Processor with custom compression options.
    #[must_use]
    pub fn with_compression(options: CompressionOptions) -> Self {
        Self {
            registry: EncoderRegistry::new(options),
            sink: noop_sink(),
        }
    }

    /// Attach a telemetry sink; duration metrics are emitted around each
    /// transform boundary.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// The encoder registry in use.
    #[must_use]
    pub fn registry(&self) -> &EncoderRegistry {
        &self.registry
    }

    /// Decode raw bytes into a pixel buffer plus its detected format.
    pub fn decode(&self, data: &[u8]) -> Result<(DynamicImage, SourceFormat), DecodeError> {
        decode(data)
    }

    /// Encode a pixel buffer in `requested` format, falling back to the
    /// buffer's detected source format for empty or unknown names.
    pub fn encode(
        &self,
        img: &DynamicImage,
        requested: &str,
        source: SourceFormat,
    ) -> Result<Vec<u8>, EncodeError> {
        let encoder = self.registry.encoder_for(requested, source);
        let start = Instant::now();
        let data = encoder.encode(img)?;
        self.emit("encode", start);
        debug!(
            format = encoder.format_name(),
            bytes = data.len(),
            "image encoded"
        );
        Ok(data)
    }

    /// Crop to `width x height` anchored at `point`.
    pub fn crop(
        &self,
        img: &DynamicImage,
        width: u32,
        height: u32,
        point: CropPoint,
    ) -> Result<DynamicImage, ImagingError> {
        let start = Instant::now();
        let out = ops::crop(img, width, height, point)?;
        self.emit("crop", start);
        Ok(out)
    }

    /// Resize to `width x height` (no-op when dimensions are unchanged).
    #[must_use]
    pub fn resize(&self, img: DynamicImage, width: u32, height: u32) -> DynamicImage {
        let start = Instant::now();
        let out = ops::resize(img, width, height);
        self.emit("resize", start);
        out
    }

    /// Convert to BT.601 grayscale.
    #[must_use]
    pub fn grayscale(&self, img: &DynamicImage) -> DynamicImage {
        let start = Instant::now();
        let out = ops::grayscale(img);
        self.emit("grayscale", start);
        out
    }

    /// Watermark `base` with `overlay` at the given uniform opacity.
    ///
    /// Both inputs are decoded (either failure propagates); the overlay
    /// is scaled to half the base width at its own aspect ratio,
    /// centered, composited over, and the result re-encoded in the
    /// base's originally detected format.
    pub fn watermark(
        &self,
        base: &[u8],
        overlay: &[u8],
        opacity: u8,
    ) -> Result<Vec<u8>, ImagingError> {
        let start = Instant::now();

        let (base_img, base_format) = self.decode(base)?;
        let (overlay_img, _) = self.decode(overlay)?;

        // Half the base width, overlay aspect preserved
        let target_w = (base_img.width() / 2).max(1);
        let ratio = f64::from(overlay_img.height()) / f64::from(overlay_img.width());
        let target_h = ((f64::from(target_w) * ratio).round() as u32).max(1);
        let overlay_img = ops::resize(overlay_img, target_w, target_h);

        // Centered offset
        let x = base_img.width().saturating_sub(overlay_img.width()) / 2;
        let y = base_img.height().saturating_sub(overlay_img.height()) / 2;

        let composited = ops::composite_over(&base_img, &overlay_img, x, y, opacity);
        let data = self.encode(&composited, base_format.name(), base_format)?;

        self.emit("watermark", start);
        Ok(data)
    }

    fn emit(&self, op: &str, start: Instant) {
        self.sink.update(MetricUpdate::duration(
            TRANSFORM_SCOPE,
            format!("{op}.duration"),
            start.elapsed(),
        ));
    }
}
