//! Projective transforms between a quadrilateral and an axis-aligned rectangle.

use nalgebra::{DMatrix, DVector, Matrix3, RowDVector, Vector3};

use super::corners::OrderedQuad;
use super::size::RectifiedSize;
use crate::error::LabelCropError;
use crate::label::Point;

/// Twice a triangle's area below this fraction of its squared longest side
/// means its corners are collinear.
const COLLINEAR_EPS: f64 = 1e-9;
/// Allowed control-point residual, relative to the destination extent.
const RESIDUAL_EPS: f64 = 1e-6;
/// Homogeneous weights smaller than this map to infinity.
const W_EPS: f64 = 1e-12;

const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];

/// A 3x3 projective transform acting on pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

/// Corners of a `size` raster in walking order: (0, 0), (w-1, 0), (w-1, h-1), (0, h-1).
///
/// A side of one pixel spans -0.5 to 0.5 instead, so that single row or
/// column samples the quad's mid-line.
pub fn destination_corners(size: RectifiedSize) -> [Point; 4] {
    let (left, right) = span(size.width);
    let (top, bottom) = span(size.height);
    [
        Point::new(left, top),
        Point::new(right, top),
        Point::new(right, bottom),
        Point::new(left, bottom),
    ]
}

fn span(pixels: u32) -> (f64, f64) {
    if pixels <= 1 {
        (-0.5, 0.5)
    } else {
        (0.0, f64::from(pixels - 1))
    }
}

impl Homography {
    /// Solves the transform that maps each `src[i]` onto `dst[i]`.
    ///
    /// Fixes the bottom-right matrix entry to 1 and solves the remaining
    /// eight unknowns from the eight linear equations given by the four
    /// correspondences.
    ///
    /// # Errors
    /// Returns `IllConditionedTransform` if three points on either side are
    /// collinear, the system is singular, or the solution does not reproduce
    /// the control points.
    pub fn from_correspondences(src: &[Point; 4], dst: &[Point; 4]) -> Result<Self, LabelCropError> {
        if let Some((i, j, k)) = collinear_triple(src) {
            return Err(ill_conditioned(format!(
                "source corners {i}, {j} and {k} are collinear"
            )));
        }
        if let Some((i, j, k)) = collinear_triple(dst) {
            return Err(ill_conditioned(format!(
                "destination corners {i}, {j} and {k} are collinear"
            )));
        }

        let mut a = DMatrix::<f64>::zeros(8, 8);
        let mut b = DVector::<f64>::zeros(8);

        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            a.set_row(
                i * 2,
                &RowDVector::from_row_slice(&[
                    s.x,
                    s.y,
                    1.0,
                    0.0,
                    0.0,
                    0.0,
                    -s.x * d.x,
                    -s.y * d.x,
                ]),
            );
            b[i * 2] = d.x;

            a.set_row(
                i * 2 + 1,
                &RowDVector::from_row_slice(&[
                    0.0,
                    0.0,
                    0.0,
                    s.x,
                    s.y,
                    1.0,
                    -s.x * d.y,
                    -s.y * d.y,
                ]),
            );
            b[i * 2 + 1] = d.y;
        }

        let solution = a
            .lu()
            .solve(&b)
            .ok_or_else(|| ill_conditioned("linear system is singular".to_string()))?;

        if solution.iter().any(|v| !v.is_finite()) {
            return Err(ill_conditioned(
                "solution has non-finite coefficients".to_string(),
            ));
        }

        let homography = Self {
            matrix: Matrix3::new(
                solution[0],
                solution[1],
                solution[2],
                solution[3],
                solution[4],
                solution[5],
                solution[6],
                solution[7],
                1.0,
            ),
        };

        let extent = dst
            .iter()
            .map(|p| p.x.abs().max(p.y.abs()))
            .fold(1.0, f64::max);
        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let residual = homography
                .apply(*s)
                .map(|mapped| mapped.distance(d))
                .unwrap_or(f64::INFINITY);
            if residual > RESIDUAL_EPS * extent {
                return Err(ill_conditioned(format!(
                    "control point {i} maps with residual {residual:e}"
                )));
            }
        }

        Ok(homography)
    }

    /// Solves the transform taking an ordered quad onto the corners of a
    /// `size` raster.
    pub fn rectify(quad: &OrderedQuad, size: RectifiedSize) -> Result<Self, LabelCropError> {
        Self::from_correspondences(&quad.corners(), &destination_corners(size))
    }

    /// Maps a point, or returns `None` if it lands on the line at infinity.
    #[inline]
    pub fn apply(&self, point: Point) -> Option<Point> {
        let v = self.matrix * Vector3::new(point.x, point.y, 1.0);
        if v.z.abs() <= W_EPS {
            return None;
        }
        Some(Point::new(v.x / v.z, v.y / v.z))
    }

    /// The inverse transform.
    pub fn inverse(&self) -> Result<Self, LabelCropError> {
        self.matrix
            .try_inverse()
            .map(|matrix| Self { matrix })
            .ok_or_else(|| ill_conditioned("transform matrix is not invertible".to_string()))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }
}

fn collinear_triple(points: &[Point; 4]) -> Option<(usize, usize, usize)> {
    TRIPLES.into_iter().find(|&(i, j, k)| {
        let (a, b, c) = (points[i], points[j], points[k]);
        let twice_area = ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)).abs();
        let longest = a.distance(&b).max(a.distance(&c)).max(b.distance(&c));
        twice_area <= COLLINEAR_EPS * longest * longest
    })
}

fn ill_conditioned(message: String) -> LabelCropError {
    LabelCropError::IllConditionedTransform { message }
}
