//! Crop anchor placement.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Anchor bias for extracting a crop rectangle from a larger image.
///
/// `Center` splits the overflow margins symmetrically on both axes;
/// edge variants pin the rectangle to the named edge and center the
/// other axis; corner variants pin both axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropPoint {
    /// Symmetric margins on both axes (the default)
    #[default]
    Center,
    /// Pinned to the top edge
    Top,
    /// Pinned to the bottom edge
    Bottom,
    /// Pinned to the left edge
    Left,
    /// Pinned to the right edge
    Right,
    /// Pinned to the top-left corner
    TopLeft,
    /// Pinned to the top-right corner
    TopRight,
    /// Pinned to the bottom-left corner
    BottomLeft,
    /// Pinned to the bottom-right corner
    BottomRight,
}

impl FromStr for CropPoint {
    type Err = String;

    /// Parses the caller-layer crop vocabulary (case-insensitive).
    /// An empty string maps to `Center`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "center" => Ok(Self::Center),
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "topleft" | "top-left" => Ok(Self::TopLeft),
            "topright" | "top-right" => Ok(Self::TopRight),
            "bottomleft" | "bottom-left" => Ok(Self::BottomLeft),
            "bottomright" | "bottom-right" => Ok(Self::BottomRight),
            other => Err(format!("unknown crop point: {other}")),
        }
    }
}

/// Returns the `(x0, y0)` origin of a `req_w x req_h` rectangle inside a
/// `resized_w x resized_h` image, biased toward `point`.
///
/// The origin is clamped so the rectangle always lies fully within
/// `[0, resized_w) x [0, resized_h)`: never negative and never past
/// `resized_w - req_w` / `resized_h - req_h`. Requests larger than the
/// resized image therefore anchor at the origin.
#[must_use]
pub fn crop_anchor(
    resized_w: u32,
    resized_h: u32,
    req_w: u32,
    req_h: u32,
    point: CropPoint,
) -> (u32, u32) {
    let max_x = resized_w.saturating_sub(req_w);
    let max_y = resized_h.saturating_sub(req_h);

    let mid_x = max_x / 2;
    let mid_y = max_y / 2;

    match point {
        CropPoint::Center => (mid_x, mid_y),
        CropPoint::Top => (mid_x, 0),
        CropPoint::Bottom => (mid_x, max_y),
        CropPoint::Left => (0, mid_y),
        CropPoint::Right => (max_x, mid_y),
        CropPoint::TopLeft => (0, 0),
        CropPoint::TopRight => (max_x, 0),
        CropPoint::BottomLeft => (0, max_y),
        CropPoint::BottomRight => (max_x, max_y),
    }
}
