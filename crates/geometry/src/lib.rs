//! Pure geometry for the Prism image proxy.
//!
//! This crate provides:
//! - Resize dimension computation (explicit, aspect-derived, passthrough)
//! - Pre-crop resize computation guaranteeing full coverage
//! - Crop anchor placement for center, edge, and corner biases
//!
//! Everything here is deterministic integer/float math with no I/O, so
//! callers may run it with full parallelism across requests.
//!
//! # Example
//!
//! ```
//! use prism_geometry::{crop_anchor, resize_dims_for_crop, CropPoint};
//!
//! let (w, h) = resize_dims_for_crop(100, 100, 400, 300);
//! assert!(w >= 100 && h >= 100);
//!
//! let (x0, y0) = crop_anchor(w, h, 100, 100, CropPoint::Center);
//! assert!(x0 + 100 <= w && y0 + 100 <= h);
//! ```

#![warn(missing_docs)]

mod anchor;
mod dims;
mod error;

pub use anchor::{crop_anchor, CropPoint};
pub use dims::{resize_dims, resize_dims_for_crop};
pub use error::{GeometryError, Result};
