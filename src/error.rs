use std::path::PathBuf;
use thiserror::Error;

use crate::conversion::ConversionReport;

/// The main error type for labelcrop operations.
#[derive(Debug, Error)]
pub enum LabelCropError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read label file {path}: {source}")]
    LabelFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed label record at line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    #[error("Failed to open source image {path}: {source}")]
    MissingSource {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Degenerate quadrilateral: {message}")]
    DegenerateQuadrilateral { message: String },

    #[error("Ill-conditioned perspective transform: {message}")]
    IllConditionedTransform { message: String },

    #[error("Rectified crop of {width}x{height} exceeds the {limit} pixel limit")]
    OversizedCrop { width: u32, height: u32, limit: u64 },

    #[error("Failed to write crop {path}: {source}")]
    CropWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write manifest {path}: {source}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Output name '{base_name}' from '{image_path}' is already used by '{first_image_path}' (line {first_line})"
    )]
    FilenameCollision {
        base_name: String,
        image_path: String,
        first_image_path: String,
        first_line: usize,
    },

    #[error("Crop '{file_name}' from '{image_path}' is already listed in {manifest}")]
    CropAlreadyListed {
        file_name: String,
        image_path: String,
        manifest: PathBuf,
    },

    #[error("Failed to serialize report: {source}")]
    ReportWrite {
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid options: {message}")]
    InvalidOptions { message: String },

    #[error("Conversion skipped {failed} annotation(s) across {issue_count} failure(s)")]
    ConversionHadFailures {
        failed: usize,
        issue_count: usize,
        report: ConversionReport,
    },
}
