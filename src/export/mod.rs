//! Crop naming and persistence.
//!
//! Every crop is named `{base}_{index}.{ext}`, where `base` comes from the
//! source image path and `index` is the annotation's zero-based position on
//! its label line.

pub mod manifest;

pub use manifest::{parse_manifest_str, read_manifest, ManifestEntry, ManifestWriter};

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, ImageFormat};
use serde::Serialize;

use crate::error::LabelCropError;

/// JPEG quality used for crops, matching what OpenCV writes by default.
pub const JPEG_QUALITY: u8 = 95;

/// How the base of a crop file name is derived from its image path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileNameScheme {
    /// The image file name up to its first dot, e.g. `receipts/img1.jpg`
    /// becomes `img1` and `scan.v2.png` becomes `scan`.
    ///
    /// Two different images sharing a base resolve to the same name; the
    /// converter reports that as a collision instead of overwriting.
    #[default]
    Basename,
    /// The same base followed by the CRC32C of the image path as written in
    /// the label file, e.g. `img1_1a2b3c4d`.
    PathHash,
}

impl FileNameScheme {
    pub fn name(&self) -> &'static str {
        match self {
            FileNameScheme::Basename => "basename",
            FileNameScheme::PathHash => "path-hash",
        }
    }
}

/// Assigns crop file names.
#[derive(Clone, Debug)]
pub struct CropNamer {
    scheme: FileNameScheme,
    extension: String,
}

impl CropNamer {
    pub fn new(scheme: FileNameScheme, extension: impl Into<String>) -> Self {
        Self {
            scheme,
            extension: extension.into(),
        }
    }

    /// Resolves the base name for an image path, or `None` if the file name
    /// is missing or starts with a dot.
    pub fn base_name(&self, image_path: &str) -> Option<String> {
        // Label files written on Windows use backslashes.
        let normalized = image_path.replace('\\', "/");
        let file_name = Path::new(&normalized).file_name()?.to_str()?;
        let base = file_name.split('.').next()?;
        if base.is_empty() {
            return None;
        }

        Some(match self.scheme {
            FileNameScheme::Basename => base.to_string(),
            FileNameScheme::PathHash => {
                format!("{base}_{:08x}", crc32c::crc32c(normalized.as_bytes()))
            }
        })
    }

    /// File name of the crop for annotation `index` of an image with `base`.
    pub fn file_name(&self, base: &str, index: usize) -> String {
        format!("{base}_{index}.{}", self.extension)
    }
}

/// Resolves a crop extension to a writable image format.
pub fn crop_format(extension: &str) -> Result<ImageFormat, LabelCropError> {
    let format = ImageFormat::from_extension(extension.to_ascii_lowercase()).ok_or_else(|| {
        LabelCropError::InvalidOptions {
            message: format!("unknown image extension '{extension}'"),
        }
    })?;

    if !format.writing_enabled() {
        return Err(LabelCropError::InvalidOptions {
            message: format!("image format {format:?} cannot be written"),
        });
    }

    Ok(format)
}

/// Encodes one crop to `path`.
///
/// JPEG cannot carry alpha, so alpha layouts are flattened to their colour
/// channels before encoding. Unless `overwrite` is set, an existing file at
/// `path` is left untouched and reported as a write failure.
pub fn write_crop(
    crop: &DynamicImage,
    path: &Path,
    format: ImageFormat,
    overwrite: bool,
) -> Result<(), LabelCropError> {
    let to_crop_error = |source: ImageError| LabelCropError::CropWrite {
        path: path.to_path_buf(),
        source,
    };

    let flattened = match crop {
        _ if format != ImageFormat::Jpeg => None,
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => None,
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLumaA16(_) => Some(DynamicImage::ImageLuma8(crop.to_luma8())),
        _ => Some(DynamicImage::ImageRgb8(crop.to_rgb8())),
    };
    let encodable = flattened.as_ref().unwrap_or(crop);

    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let file = options
        .open(path)
        .map_err(|err| to_crop_error(ImageError::IoError(err)))?;
    let mut writer = BufWriter::new(file);

    if format == ImageFormat::Jpeg {
        let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
        encodable
            .write_with_encoder(encoder)
            .map_err(to_crop_error)?;
    } else {
        encodable
            .write_to(&mut writer, format)
            .map_err(to_crop_error)?;
    }

    writer
        .flush()
        .map_err(|err| to_crop_error(ImageError::IoError(err)))
}
