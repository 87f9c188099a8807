//! Fuzz target for corner ordering and the perspective solve.
//!
//! Arbitrary coordinates (including NaN and huge values) must either be
//! rejected with an error or produce a transform, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use labelcrop::geometry::{order_corners, rectified_size, CornerOrder, Homography};
use labelcrop::label::{Point, Quad};

fuzz_target!(|data: [f64; 8]| {
    let quad = Quad::new([
        Point::new(data[0], data[1]),
        Point::new(data[2], data[3]),
        Point::new(data[4], data[5]),
        Point::new(data[6], data[7]),
    ]);

    for order in [CornerOrder::XSplit, CornerOrder::CentroidAngle] {
        let Ok(ordered) = order_corners(&quad, order) else {
            continue;
        };
        let size = rectified_size(&ordered);
        assert!(size.width >= 1 && size.height >= 1);
        if let Ok(homography) = Homography::rectify(&ordered, size) {
            let _ = homography.inverse();
        }
    }
});
