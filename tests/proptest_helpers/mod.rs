#![allow(dead_code)]

use labelcrop::label::{Point, Quad};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// Tolerance for control-point residuals, relative to the crop extent.
pub fn eps_control_point(width: u32, height: u32) -> f64 {
    width.max(height) as f64 * 1e-7
}

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Axis-aligned rectangle with integer corners, as `(x, y, w, h)`.
pub fn arb_rect() -> BoxedStrategy<(u32, u32, u32, u32)> {
    (0u32..2000, 0u32..2000, 2u32..800, 2u32..800).boxed()
}

/// The rectangle's corners in top-left, top-right, bottom-right, bottom-left
/// order, then shuffled by `rotation` and optionally mirrored.
pub fn rect_quad(rect: (u32, u32, u32, u32), rotation: usize, mirrored: bool) -> Quad {
    let (x, y, w, h) = rect;
    let (x0, y0) = (x as f64, y as f64);
    let (x1, y1) = ((x + w) as f64, (y + h) as f64);
    let mut points = [
        Point::new(x0, y0),
        Point::new(x1, y0),
        Point::new(x1, y1),
        Point::new(x0, y1),
    ];
    if mirrored {
        points.reverse();
    }
    points.rotate_left(rotation % 4);
    Quad::new(points)
}

/// Convex quadrilateral made by pulling the corners of a rectangle inward by
/// less than a quarter of its shorter side, so corner roles stay unambiguous.
pub fn arb_convex_quad() -> BoxedStrategy<Quad> {
    (arb_rect(), prop::array::uniform8(0.0f64..0.24))
        .prop_map(|((x, y, w, h), jitter)| {
            let (x0, y0) = (x as f64, y as f64);
            let (w, h) = (w.max(8) as f64, h.max(8) as f64);
            let m = w.min(h);
            Quad::new([
                Point::new(x0 + jitter[0] * m, y0 + jitter[1] * m),
                Point::new(x0 + w - jitter[2] * m, y0 + jitter[3] * m),
                Point::new(x0 + w - jitter[4] * m, y0 + h - jitter[5] * m),
                Point::new(x0 + jitter[6] * m, y0 + h - jitter[7] * m),
            ])
        })
        .boxed()
}
