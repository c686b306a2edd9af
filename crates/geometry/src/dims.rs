//! Resize dimension computation.
//!
//! Two flavors exist: [`resize_dims`] for plain resizes (zero axes are
//! derived from the source aspect ratio, or passed through when both are
//! zero) and [`resize_dims_for_crop`] which computes the smallest
//! aspect-preserving resize from which a requested rectangle can be cut
//! without padding.

/// Computes the target dimensions for a plain resize.
///
/// - Both axes nonzero: returned verbatim (explicit, aspect-ignoring).
/// - Exactly one axis zero: derived from the other to preserve the
///   source aspect ratio.
/// - Both axes zero: source dimensions pass through unchanged.
///
/// # Example
/// ```
/// use prism_geometry::resize_dims;
///
/// assert_eq!(resize_dims(200, 0, 400, 300), (200, 150));
/// assert_eq!(resize_dims(0, 0, 400, 300), (400, 300));
/// assert_eq!(resize_dims(123, 45, 400, 300), (123, 45));
/// ```
#[must_use]
pub fn resize_dims(req_w: u32, req_h: u32, src_w: u32, src_h: u32) -> (u32, u32) {
    match (req_w, req_h) {
        (0, 0) => (src_w, src_h),
        (w, 0) => (w, derive_axis(w, src_h, src_w)),
        (0, h) => (derive_axis(h, src_w, src_h), h),
        (w, h) => (w, h),
    }
}

/// Computes the smallest aspect-preserving resize of the source such
/// that a `req_w x req_h` rectangle can be fully extracted afterwards.
///
/// The axis that would otherwise come up short is scaled to exactly meet
/// the request; the other axis overflows and is cropped away later.
/// A zero request axis is first derived from the source aspect ratio,
/// matching [`resize_dims`]; with both axes zero the source passes
/// through unchanged.
///
/// Returned dimensions are always `>= (req_w, req_h)` on both axes.
#[must_use]
pub fn resize_dims_for_crop(req_w: u32, req_h: u32, src_w: u32, src_h: u32) -> (u32, u32) {
    if (req_w == 0 && req_h == 0) || src_w == 0 || src_h == 0 {
        return (src_w, src_h);
    }

    let (req_w, req_h) = resize_dims(req_w, req_h, src_w, src_h);

    // Scale so the constraining axis exactly meets the request.
    let scale_w = f64::from(req_w) / f64::from(src_w);
    let scale_h = f64::from(req_h) / f64::from(src_h);
    let scale = scale_w.max(scale_h);

    let out_w = (f64::from(src_w) * scale).ceil() as u32;
    let out_h = (f64::from(src_h) * scale).ceil() as u32;

    // ceil() already guarantees coverage; the clamp keeps the invariant
    // airtight against float rounding at extreme dimensions.
    (out_w.max(req_w), out_h.max(req_h))
}

/// Derives one axis from the other at the source aspect ratio.
#[inline]
fn derive_axis(known: u32, src_num: u32, src_den: u32) -> u32 {
    if src_den == 0 {
        return known;
    }
    let derived = (f64::from(known) * f64::from(src_num) / f64::from(src_den)).round() as u32;
    derived.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn explicit_dims_pass_through() {
        assert_eq!(resize_dims(640, 480, 1920, 1080), (640, 480));
    }

    #[test]
    fn both_zero_returns_source() {
        assert_eq!(resize_dims(0, 0, 1920, 1080), (1920, 1080));
    }

    #[test]
    fn width_only_derives_height() {
        assert_eq!(resize_dims(960, 0, 1920, 1080), (960, 540));
    }

    #[test]
    fn height_only_derives_width() {
        assert_eq!(resize_dims(0, 540, 1920, 1080), (960, 540));
    }

    #[test]
    fn derived_axis_never_zero() {
        // Extreme aspect ratios must not round the derived axis to zero
        let (_, h) = resize_dims(1, 0, 1000, 1);
        assert!(h >= 1);
        let (w, _) = resize_dims(0, 1, 1, 1000);
        assert!(w >= 1);
    }

    #[test]
    fn crop_dims_cover_landscape_source() {
        // 400x300 source, 100x100 crop: height is the constraining axis
        let (w, h) = resize_dims_for_crop(100, 100, 400, 300);
        assert_eq!((w, h), (134, 100));
    }

    #[test]
    fn crop_dims_cover_portrait_source() {
        let (w, h) = resize_dims_for_crop(100, 100, 300, 400);
        assert_eq!((w, h), (100, 134));
    }

    #[test]
    fn crop_dims_upscale_small_source() {
        let (w, h) = resize_dims_for_crop(500, 500, 100, 50);
        assert!(w >= 500 && h >= 500);
        assert_eq!(h, 500);
    }

    #[test]
    fn crop_dims_with_one_zero_axis() {
        // Missing axis derived at source aspect; no overflow needed after
        let (w, h) = resize_dims_for_crop(200, 0, 400, 300);
        assert_eq!((w, h), (200, 150));
    }

    #[test]
    fn crop_dims_both_zero_pass_through() {
        assert_eq!(resize_dims_for_crop(0, 0, 400, 300), (400, 300));
    }

    proptest! {
        #[test]
        fn single_zero_axis_preserves_aspect(
            req in 1u32..4000,
            src_w in 1u32..4000,
            src_h in 1u32..4000,
        ) {
            let (w, h) = resize_dims(req, 0, src_w, src_h);
            prop_assert_eq!(w, req);
            // Within 1px of the exact aspect-derived value
            let exact = f64::from(req) * f64::from(src_h) / f64::from(src_w);
            prop_assert!((f64::from(h) - exact).abs() <= 1.0);
        }

        #[test]
        fn crop_resize_always_covers_request(
            req_w in 1u32..2000,
            req_h in 1u32..2000,
            src_w in 1u32..4000,
            src_h in 1u32..4000,
        ) {
            let (w, h) = resize_dims_for_crop(req_w, req_h, src_w, src_h);
            prop_assert!(w >= req_w);
            prop_assert!(h >= req_h);
        }
    }
}
