//! Output raster sizing for rectified crops.

use super::corners::OrderedQuad;

/// Integer size of a rectified crop. Both sides are at least 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RectifiedSize {
    pub width: u32,
    pub height: u32,
}

impl RectifiedSize {
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Computes the crop size for an ordered quad.
///
/// Each side takes the longer of its two opposing edges, so the edge that
/// perspective foreshortened is stretched back rather than the near edge
/// being shrunk.
pub fn rectified_size(quad: &OrderedQuad) -> RectifiedSize {
    let top = quad.top_left.distance(&quad.top_right);
    let bottom = quad.bottom_left.distance(&quad.bottom_right);
    let left = quad.top_left.distance(&quad.bottom_left);
    let right = quad.top_right.distance(&quad.bottom_right);

    RectifiedSize {
        width: to_dimension(top.max(bottom)),
        height: to_dimension(left.max(right)),
    }
}

fn to_dimension(length: f64) -> u32 {
    if !length.is_finite() {
        return 1;
    }
    length.floor().clamp(1.0, f64::from(u32::MAX)) as u32
}
