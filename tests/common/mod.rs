#![allow(dead_code)]

use std::fs;
use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};

/// RGB image whose red channel encodes x and green channel encodes y.
pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

pub fn write_rgb(path: &Path, image: &RgbImage) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    image.save(path).expect("write image file");
}

pub fn write_gradient_png(path: &Path, width: u32, height: u32) {
    write_rgb(path, &gradient_rgb(width, height));
}

pub fn write_gray_png(path: &Path, width: u32, height: u32, value: u8) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    GrayImage::from_pixel(width, height, Luma([value]))
        .save(path)
        .expect("write image file");
}

/// One label line with a single annotation.
pub fn label_line(image_path: &str, points: [[f64; 2]; 4], transcription: &str) -> String {
    label_line_multi(image_path, &[(points, transcription)])
}

/// One label line carrying several annotations in order.
pub fn label_line_multi(image_path: &str, annotations: &[([[f64; 2]; 4], &str)]) -> String {
    let regions: Vec<serde_json::Value> = annotations
        .iter()
        .map(|(points, transcription)| {
            serde_json::json!({
                "transcription": transcription,
                "points": points,
                "difficult": false,
            })
        })
        .collect();
    format!(
        "{}\t{}",
        image_path,
        serde_json::to_string(&regions).expect("serialize regions")
    )
}

pub fn rect(x: f64, y: f64, w: f64, h: f64) -> [[f64; 2]; 4] {
    [[x, y], [x + w, y], [x + w, y + h], [x, y + h]]
}
