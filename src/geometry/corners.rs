//! Corner role resolution for unordered quadrilaterals.

use serde::Serialize;

use crate::error::LabelCropError;
use crate::label::{Point, Quad};

/// Points closer than this are treated as the same point.
const COINCIDENT_EPS: f64 = 1e-9;
/// Signed area below this fraction of the squared bounding extent counts as zero.
const RELATIVE_AREA_EPS: f64 = 1e-12;

/// Strategy used to assign corner roles.
///
/// Changing the strategy changes which crops a label file produces, so the
/// default stays the x-split heuristic that existing manifests were built with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CornerOrder {
    /// Two smallest-x points are the left pair, the rest the right pair; in
    /// each pair the smaller y is on top. Ties keep input order.
    ///
    /// Quads rotated by roughly 45 to 135 degrees can land a corner in the
    /// wrong pair.
    #[default]
    XSplit,
    /// Sort by angle around the centroid, starting from the point with the
    /// smallest `x + y`. Robust to rotation, but not output-compatible with
    /// [`CornerOrder::XSplit`].
    CentroidAngle,
}

impl CornerOrder {
    pub fn name(&self) -> &'static str {
        match self {
            CornerOrder::XSplit => "x-split",
            CornerOrder::CentroidAngle => "centroid-angle",
        }
    }
}

/// A quadrilateral with resolved corner roles.
///
/// Values returned by [`order_corners`] have pairwise distinct points,
/// non-zero area, and do not self-intersect when walked
/// top-left, top-right, bottom-right, bottom-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrderedQuad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl OrderedQuad {
    /// Corners in walking order: top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Shoelace area; positive when the walk is clockwise on screen (y down).
    pub fn signed_area(&self) -> f64 {
        let c = self.corners();
        let twice: f64 = (0..4)
            .map(|i| {
                let (a, b) = (c[i], c[(i + 1) % 4]);
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice / 2.0
    }

    /// True unless opposite edges cross each other.
    pub fn is_simple(&self) -> bool {
        !segments_cross(self.top_left, self.top_right, self.bottom_right, self.bottom_left)
            && !segments_cross(self.top_right, self.bottom_right, self.bottom_left, self.top_left)
    }
}

/// Resolves the corner roles of `quad` with the given strategy.
///
/// # Errors
/// Returns `DegenerateQuadrilateral` if a coordinate is not finite, two
/// points coincide, the ordered quad has zero area, or it self-intersects.
pub fn order_corners(quad: &Quad, order: CornerOrder) -> Result<OrderedQuad, LabelCropError> {
    if !quad.is_finite() {
        return Err(degenerate("non-finite coordinate".to_string()));
    }

    let points = quad.points;
    for i in 0..4 {
        for j in (i + 1)..4 {
            if points[i].distance(&points[j]) <= COINCIDENT_EPS {
                return Err(degenerate(format!(
                    "points {i} and {j} coincide at ({}, {})",
                    points[i].x, points[i].y
                )));
            }
        }
    }

    let ordered = match order {
        CornerOrder::XSplit => order_by_x_split(points),
        CornerOrder::CentroidAngle => order_by_centroid_angle(points),
    };

    let extent = bounding_extent(&points);
    let area = ordered.signed_area();
    if area.abs() <= RELATIVE_AREA_EPS * extent * extent {
        return Err(degenerate("points are collinear (zero area)".to_string()));
    }

    if !ordered.is_simple() {
        return Err(degenerate(format!(
            "ordered corners self-intersect under {} ordering",
            order.name()
        )));
    }

    Ok(ordered)
}

fn order_by_x_split(points: [Point; 4]) -> OrderedQuad {
    let mut by_x = [0usize, 1, 2, 3];
    // Stable sort: on equal x the earlier input point stays first.
    by_x.sort_by(|&a, &b| points[a].x.total_cmp(&points[b].x));

    let (top_left, bottom_left) = split_by_y(&points, by_x[0], by_x[1]);
    let (top_right, bottom_right) = split_by_y(&points, by_x[2], by_x[3]);

    OrderedQuad {
        top_left,
        top_right,
        bottom_right,
        bottom_left,
    }
}

/// Splits a pair of input indices into (upper, lower); equal y goes to the
/// earlier input point.
fn split_by_y(points: &[Point; 4], a: usize, b: usize) -> (Point, Point) {
    let (pa, pb) = (points[a], points[b]);
    if pb.y < pa.y || (pb.y == pa.y && b < a) {
        (pb, pa)
    } else {
        (pa, pb)
    }
}

fn order_by_centroid_angle(points: [Point; 4]) -> OrderedQuad {
    let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;

    // With y pointing down, increasing atan2 walks clockwise on screen.
    let mut by_angle = points;
    by_angle.sort_by(|a, b| {
        let angle_a = (a.y - cy).atan2(a.x - cx);
        let angle_b = (b.y - cy).atan2(b.x - cx);
        angle_a.total_cmp(&angle_b)
    });

    let start = (0..4)
        .min_by(|&i, &j| {
            let a = by_angle[i].x + by_angle[i].y;
            let b = by_angle[j].x + by_angle[j].y;
            a.total_cmp(&b)
        })
        .unwrap_or(0);
    by_angle.rotate_left(start);

    OrderedQuad {
        top_left: by_angle[0],
        top_right: by_angle[1],
        bottom_right: by_angle[2],
        bottom_left: by_angle[3],
    }
}

fn bounding_extent(points: &[Point; 4]) -> f64 {
    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    (max_x - min_x).max(max_y - min_y)
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Proper crossing of segments `ab` and `cd` (touching endpoints do not count).
fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let d1 = cross(a, b, c);
    let d2 = cross(a, b, d);
    let d3 = cross(c, d, a);
    let d4 = cross(c, d, b);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

fn degenerate(message: String) -> LabelCropError {
    LabelCropError::DegenerateQuadrilateral { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(pairs: [[f64; 2]; 4]) -> Quad {
        Quad::new(pairs.map(Point::from))
    }

    #[test]
    fn x_split_orders_axis_aligned_rectangle() {
        let shuffled = quad([[100.0, 50.0], [0.0, 0.0], [0.0, 50.0], [100.0, 0.0]]);
        let ordered = order_corners(&shuffled, CornerOrder::XSplit).unwrap();

        assert_eq!(ordered.top_left, Point::new(0.0, 0.0));
        assert_eq!(ordered.top_right, Point::new(100.0, 0.0));
        assert_eq!(ordered.bottom_right, Point::new(100.0, 50.0));
        assert_eq!(ordered.bottom_left, Point::new(0.0, 50.0));
        assert!(ordered.signed_area() > 0.0);
    }

    #[test]
    fn x_split_orders_slightly_rotated_quad() {
        let rotated = quad([[12.0, 30.0], [10.0, 5.0], [90.0, 12.0], [88.0, 37.0]]);
        let ordered = order_corners(&rotated, CornerOrder::XSplit).unwrap();

        assert_eq!(ordered.top_left, Point::new(10.0, 5.0));
        assert_eq!(ordered.top_right, Point::new(90.0, 12.0));
        assert_eq!(ordered.bottom_right, Point::new(88.0, 37.0));
        assert_eq!(ordered.bottom_left, Point::new(12.0, 30.0));
    }

    #[test]
    fn x_split_ties_keep_input_order() {
        // The right pair shares y, so whichever was listed first goes on top.
        let first = quad([[0.0, 0.0], [0.0, 10.0], [20.0, 5.0], [10.0, 5.0]]);
        let ordered = order_corners(&first, CornerOrder::XSplit).unwrap();
        assert_eq!(ordered.top_left, Point::new(0.0, 0.0));
        assert_eq!(ordered.bottom_left, Point::new(0.0, 10.0));
        assert_eq!(ordered.top_right, Point::new(20.0, 5.0));
        assert_eq!(ordered.bottom_right, Point::new(10.0, 5.0));

        let swapped = quad([[0.0, 0.0], [0.0, 10.0], [10.0, 5.0], [20.0, 5.0]]);
        let ordered = order_corners(&swapped, CornerOrder::XSplit).unwrap();
        assert_eq!(ordered.top_right, Point::new(10.0, 5.0));
        assert_eq!(ordered.bottom_right, Point::new(20.0, 5.0));
    }

    #[test]
    fn centroid_angle_handles_diamond() {
        let diamond = quad([[10.0, 5.0], [5.0, 10.0], [0.0, 5.0], [5.0, 0.0]]);
        let ordered = order_corners(&diamond, CornerOrder::CentroidAngle).unwrap();

        assert_eq!(ordered.top_left, Point::new(5.0, 0.0));
        assert_eq!(ordered.top_right, Point::new(10.0, 5.0));
        assert_eq!(ordered.bottom_right, Point::new(5.0, 10.0));
        assert_eq!(ordered.bottom_left, Point::new(0.0, 5.0));
    }

    #[test]
    fn centroid_angle_matches_x_split_for_rectangles() {
        let rect = quad([[0.0, 50.0], [100.0, 0.0], [0.0, 0.0], [100.0, 50.0]]);
        let a = order_corners(&rect, CornerOrder::XSplit).unwrap();
        let b = order_corners(&rect, CornerOrder::CentroidAngle).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn coincident_points_are_degenerate() {
        let dup = quad([[0.0, 0.0], [10.0, 0.0], [10.0, 0.0], [0.0, 5.0]]);
        let err = order_corners(&dup, CornerOrder::XSplit).unwrap_err();
        assert!(matches!(err, LabelCropError::DegenerateQuadrilateral { .. }));
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let line = quad([[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]);
        let err = order_corners(&line, CornerOrder::XSplit).unwrap_err();
        assert!(err.to_string().contains("zero area"));
    }

    #[test]
    fn self_intersecting_order_is_degenerate() {
        let bowtie = quad([[0.0, 0.0], [1.0, 1.0], [3.0, 100.0], [2.0, 101.0]]);
        let err = order_corners(&bowtie, CornerOrder::XSplit).unwrap_err();
        assert!(err.to_string().contains("self-intersect"));
    }

    #[test]
    fn non_finite_points_are_degenerate() {
        let bad = quad([[f64::NAN, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        assert!(order_corners(&bad, CornerOrder::XSplit).is_err());
    }
}
