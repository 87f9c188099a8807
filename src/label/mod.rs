//! Annotation records as produced by a text-region labeling tool.
//!
//! A label file lists one source image per line together with the
//! quadrilateral text regions drawn on it and their transcriptions. This
//! module holds the in-memory form of those records and the reader for the
//! PPOCRLabel `Label.txt` layout.
//!
//! # Example
//!
//! ```
//! use labelcrop::label::io_ppocr_label::parse_label_line;
//!
//! let line = "img1.jpg\t[{\"points\":[[0,0],[100,0],[100,50],[0,50]],\"transcription\":\"TEST\"}]";
//! let record = parse_label_line(line, 1).unwrap().unwrap();
//! assert_eq!(record.image_path, "img1.jpg");
//! assert_eq!(record.annotations[0].transcription, "TEST");
//! ```

pub mod io_ppocr_label;
mod model;

pub use model::{Annotation, ImageRecord, Point, Quad};
