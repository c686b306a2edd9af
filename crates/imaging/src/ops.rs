//! Transform operations: crop, resize, grayscale, alpha compositing.
//!
//! All operations use a linear interpolation filter (`Triangle`) for
//! scaling and produce new pixel buffers; the watermark pipeline that
//! combines decoding, compositing, and re-encoding lives on
//! [`Processor`](crate::Processor).

use image::{DynamicImage, GenericImageView, Rgba};
use prism_geometry::{crop_anchor, resize_dims, resize_dims_for_crop, CropPoint, GeometryError};

/// Linear interpolation, the proxy's scaling filter.
const SCALE_FILTER: image::imageops::FilterType = image::imageops::FilterType::Triangle;

/// Crop an image to `width x height`, anchored at `point`.
///
/// The source is first resized (aspect-preserving, linear filter) to the
/// smallest dimensions that fully cover the request, then the rectangle
/// is extracted at the anchor. A zero axis is derived from the source
/// aspect ratio; a request with both axes zero is rejected as degenerate.
///
/// On success the output dimensions equal the (derived) request exactly.
pub fn crop(
    img: &DynamicImage,
    width: u32,
    height: u32,
    point: CropPoint,
) -> Result<DynamicImage, GeometryError> {
    if width == 0 && height == 0 {
        return Err(GeometryError::DegenerateCrop);
    }

    let (src_w, src_h) = img.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(GeometryError::EmptySource {
            width: src_w,
            height: src_h,
        });
    }

    let (req_w, req_h) = resize_dims(width, height, src_w, src_h);
    let (resized_w, resized_h) = resize_dims_for_crop(width, height, src_w, src_h);

    let resized = img.resize_exact(resized_w, resized_h, SCALE_FILTER);
    let (x0, y0) = crop_anchor(resized_w, resized_h, req_w, req_h, point);

    Ok(resized.crop_imm(x0, y0, req_w, req_h))
}

/// Resize an image to `width x height`.
///
/// Zero axes follow [`resize_dims`]: one zero axis is derived from the
/// source aspect ratio, both zero passes the source through. When the
/// computed dimensions equal the source dimensions the input is returned
/// unmodified.
#[must_use]
pub fn resize(img: DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (src_w, src_h) = img.dimensions();
    let (target_w, target_h) = resize_dims(width, height, src_w, src_h);

    if (target_w, target_h) == (src_w, src_h) {
        return img;
    }

    img.resize_exact(target_w, target_h, SCALE_FILTER)
}

/// Convert an image to grayscale using BT.601 luma coefficients.
///
/// Each output channel carries `0.299 R + 0.587 G + 0.114 B` (broadcast
/// luma, not the BT.709 variant); the alpha channel is preserved.
#[must_use]
pub fn grayscale(img: &DynamicImage) -> DynamicImage {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut output = image::RgbaImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;
        let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        let luma = luma.round() as u8;
        output.put_pixel(x, y, Rgba([luma, luma, luma, a]));
    }

    DynamicImage::ImageRgba8(output)
}

/// Composite `overlay` over `base` at `(x, y)` with a uniform opacity mask.
///
/// The mask multiplies into the overlay's own alpha channel, then
/// standard "over" compositing applies: `opacity` 0 leaves the base
/// untouched, 255 blends the overlay at its full alpha. Overlay pixels
/// falling outside the base are discarded.
#[must_use]
pub fn composite_over(
    base: &DynamicImage,
    overlay: &DynamicImage,
    x: u32,
    y: u32,
    opacity: u8,
) -> DynamicImage {
    let mut output = base.to_rgba8();
    let (base_w, base_h) = output.dimensions();
    let overlay = overlay.to_rgba8();

    for (ox, oy, pixel) in overlay.enumerate_pixels() {
        let bx = x + ox;
        let by = y + oy;
        if bx >= base_w || by >= base_h {
            continue;
        }

        let Rgba([or, og, ob, oa]) = *pixel;
        // Uniform mask scales the overlay's own alpha
        let alpha = scale(oa, opacity);
        if alpha == 0 {
            continue;
        }

        let Rgba([br, bg, bb, ba]) = *output.get_pixel(bx, by);
        let inv = 255 - alpha;
        output.put_pixel(
            bx,
            by,
            Rgba([
                blend(or, br, alpha, inv),
                blend(og, bg, alpha, inv),
                blend(ob, bb, alpha, inv),
                alpha.saturating_add(scale(ba, inv)),
            ]),
        );
    }

    DynamicImage::ImageRgba8(output)
}

/// `a * b / 255` with rounding.
#[inline]
fn scale(a: u8, b: u8) -> u8 {
    ((u16::from(a) * u16::from(b) + 127) / 255) as u8
}

/// One channel of "over" compositing: `fg * alpha + bg * (255 - alpha)`.
#[inline]
fn blend(fg: u8, bg: u8, alpha: u8, inv: u8) -> u8 {
    ((u16::from(fg) * u16::from(alpha) + u16::from(bg) * u16::from(inv) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn solid(w: u32, h: u32, color: [u8; 4]) -> DynamicImage {
        let img = RgbaImage::from_pixel(w, h, Rgba(color));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_crop_center_exact_dimensions() {
        let img = solid(400, 300, [10, 20, 30, 255]);
        let out = crop(&img, 100, 100, CropPoint::Center).unwrap();
        assert_eq!((out.width(), out.height()), (100, 100));
    }

    #[test]
    fn test_crop_all_anchor_points_stay_in_bounds() {
        let img = solid(397, 211, [1, 2, 3, 255]);
        for point in [
            CropPoint::Center,
            CropPoint::Top,
            CropPoint::Bottom,
            CropPoint::Left,
            CropPoint::Right,
            CropPoint::TopLeft,
            CropPoint::TopRight,
            CropPoint::BottomLeft,
            CropPoint::BottomRight,
        ] {
            let out = crop(&img, 120, 80, point).unwrap();
            assert_eq!((out.width(), out.height()), (120, 80));
        }
    }

    #[test]
    fn test_crop_rejects_degenerate_request() {
        let img = solid(100, 100, [0, 0, 0, 255]);
        assert_eq!(
            crop(&img, 0, 0, CropPoint::Center).unwrap_err(),
            GeometryError::DegenerateCrop
        );
    }

    #[test]
    fn test_crop_derives_single_zero_axis() {
        let img = solid(400, 300, [0, 0, 0, 255]);
        let out = crop(&img, 200, 0, CropPoint::Center).unwrap();
        assert_eq!((out.width(), out.height()), (200, 150));
    }

    #[test]
    fn test_resize_zero_zero_is_noop() {
        let img = solid(123, 77, [9, 9, 9, 255]);
        let out = resize(img, 0, 0);
        assert_eq!((out.width(), out.height()), (123, 77));
    }

    #[test]
    fn test_resize_matching_dims_is_noop() {
        let img = solid(50, 40, [9, 9, 9, 255]);
        let out = resize(img, 50, 40);
        assert_eq!((out.width(), out.height()), (50, 40));
    }

    #[test]
    fn test_resize_explicit_ignores_aspect() {
        let img = solid(100, 100, [9, 9, 9, 255]);
        let out = resize(img, 30, 70);
        assert_eq!((out.width(), out.height()), (30, 70));
    }

    #[test]
    fn test_resize_derives_height_from_width() {
        let img = solid(200, 100, [9, 9, 9, 255]);
        let out = resize(img, 100, 0);
        assert_eq!((out.width(), out.height()), (100, 50));
    }

    #[test]
    fn test_grayscale_bt601_luma() {
        let img = solid(2, 2, [100, 150, 50, 255]);
        let out = grayscale(&img).to_rgba8();
        // 0.299*100 + 0.587*150 + 0.114*50 = 123.65
        let Rgba([r, g, b, a]) = *out.get_pixel(0, 0);
        assert!((i16::from(r) - 124).abs() <= 1);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(a, 255);
    }

    #[test]
    fn test_grayscale_preserves_alpha() {
        let img = solid(1, 1, [255, 0, 0, 99]);
        let out = grayscale(&img).to_rgba8();
        assert_eq!(out.get_pixel(0, 0)[3], 99);
    }

    #[test]
    fn test_composite_zero_opacity_leaves_base() {
        let base = solid(4, 4, [10, 20, 30, 255]);
        let overlay = solid(2, 2, [200, 200, 200, 255]);
        let out = composite_over(&base, &overlay, 1, 1, 0).to_rgba8();
        for pixel in out.pixels() {
            assert_eq!(*pixel, Rgba([10, 20, 30, 255]));
        }
    }

    #[test]
    fn test_composite_full_opacity_replaces_pixels() {
        let base = solid(4, 4, [10, 20, 30, 255]);
        let overlay = solid(2, 2, [200, 100, 50, 255]);
        let out = composite_over(&base, &overlay, 1, 1, 255).to_rgba8();
        assert_eq!(*out.get_pixel(1, 1), Rgba([200, 100, 50, 255]));
        assert_eq!(*out.get_pixel(2, 2), Rgba([200, 100, 50, 255]));
        // Outside the overlay rectangle the base survives
        assert_eq!(*out.get_pixel(0, 0), Rgba([10, 20, 30, 255]));
        assert_eq!(*out.get_pixel(3, 3), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_composite_half_opacity_blends() {
        let base = solid(1, 1, [0, 0, 0, 255]);
        let overlay = solid(1, 1, [255, 255, 255, 255]);
        let out = composite_over(&base, &overlay, 0, 0, 128).to_rgba8();
        let Rgba([r, ..]) = *out.get_pixel(0, 0);
        assert!((i16::from(r) - 128).abs() <= 1);
    }

    #[test]
    fn test_composite_clips_overlay_at_edges() {
        let base = solid(2, 2, [0, 0, 0, 255]);
        let overlay = solid(4, 4, [255, 255, 255, 255]);
        let out = composite_over(&base, &overlay, 1, 1, 255).to_rgba8();
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*out.get_pixel(1, 1), Rgba([255, 255, 255, 255]));
    }
}
