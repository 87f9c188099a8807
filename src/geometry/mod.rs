//! Geometry of quadrilateral text-region rectification.
//!
//! The pipeline for one annotation runs, in order:
//!
//! 1. [`order_corners`] resolves the four unordered label points into
//!    top-left, top-right, bottom-right, bottom-left roles.
//! 2. [`rectified_size`] picks the integer size of the output raster.
//! 3. [`Homography::rectify`] solves the projective transform from the
//!    quadrilateral onto that raster's corners.
//! 4. [`rectify`] resamples the source image through the inverse transform.

mod corners;
mod homography;
mod size;
mod warp;

pub use corners::{order_corners, CornerOrder, OrderedQuad};
pub use homography::{destination_corners, Homography};
pub use size::{rectified_size, RectifiedSize};
pub use warp::{rectify, warp_perspective};
