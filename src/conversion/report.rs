//! Conversion report types for tracking produced crops and skipped work.
//!
//! Every failure that does not stop the run is recorded here with the label
//! line (and annotation index) it came from, so nothing is silently dropped.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::LabelCropError;
use crate::export::FileNameScheme;
use crate::geometry::CornerOrder;

/// A report generated by a label-file conversion.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionReport {
    /// Label file the records were read from.
    pub label_file: String,
    /// Directory crops and the manifest were written to.
    pub output_dir: String,
    /// True when geometry was checked without reading or writing images.
    pub dry_run: bool,
    /// Corner ordering the quads were resolved with.
    pub corner_order: CornerOrder,
    /// How crop base names were derived.
    pub file_names: FileNameScheme,
    /// Running totals.
    pub counts: ConversionCounts,
    /// Issues discovered during conversion, in label-file order.
    pub issues: Vec<ConversionIssue>,
}

impl ConversionReport {
    /// Create a new empty report.
    pub fn new(label_file: impl Into<String>, output_dir: impl Into<String>) -> Self {
        Self {
            label_file: label_file.into(),
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    /// Add an issue to the report.
    pub fn add(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    /// Number of issues of a given kind.
    pub fn count_of(&self, kind: FailureKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    /// Issue counts per kind, in a stable order.
    pub fn failure_counts(&self) -> BTreeMap<FailureKind, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Annotations from parsed records that did not produce a crop.
    pub fn skipped_annotations(&self) -> usize {
        self.counts.annotations.saturating_sub(self.counts.crops)
    }

    /// Returns true if nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "checked" } else { "converted" };
        writeln!(
            f,
            "  {} record(s), {} annotation(s): {} crop(s) {}, {} annotation(s) skipped",
            self.counts.records,
            self.counts.annotations,
            self.counts.crops,
            verb,
            self.skipped_annotations()
        )?;
        writeln!(
            f,
            "  corner order: {}, file names: {}",
            self.corner_order.name(),
            self.file_names.name()
        )?;

        if self.issues.is_empty() {
            return Ok(());
        }

        writeln!(f)?;
        writeln!(f, "Failures ({}):", self.issues.len())?;
        for (kind, count) in self.failure_counts() {
            writeln!(f, "  {:<26} {}", kind.name(), count)?;
        }

        writeln!(f)?;
        for issue in &self.issues {
            writeln!(f, "  - {}", issue)?;
        }

        Ok(())
    }
}

/// Totals for one conversion run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversionCounts {
    /// Label lines that parsed into records.
    pub records: usize,
    /// Annotations carried by those records.
    pub annotations: usize,
    /// Crops produced (or, in a dry run, annotations that passed every check).
    pub crops: usize,
}

/// A single record- or annotation-level failure.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionIssue {
    pub kind: FailureKind,
    pub message: String,
    pub context: IssueContext,
}

impl ConversionIssue {
    pub fn new(kind: FailureKind, message: impl Into<String>, context: IssueContext) -> Self {
        Self {
            kind,
            message: message.into(),
            context,
        }
    }
}

impl fmt::Display for ConversionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.name(), self.context, self.message)
    }
}

/// Where in the label file an issue occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum IssueContext {
    /// A whole label line.
    Record { line: usize },
    /// One annotation of a label line (zero-based index).
    Annotation { line: usize, index: usize },
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueContext::Record { line } => write!(f, "line {}", line),
            IssueContext::Annotation { line, index } => {
                write!(f, "line {}, annotation {}", line, index)
            }
        }
    }
}

/// Stable failure codes for programmatic consumption.
///
/// These codes are part of the JSON report and should remain stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Label line could not be split or parsed, or a transcription cannot be
    /// written to the manifest.
    MalformedRecord,
    /// Referenced image could not be opened or decoded.
    MissingSource,
    /// Corner points coincide, are collinear, or self-intersect.
    DegenerateQuadrilateral,
    /// Perspective transform could not be solved reliably.
    IllConditionedTransform,
    /// Rectified crop would exceed the pixel limit.
    OversizedCrop,
    /// Crop image could not be encoded or written.
    CropWriteFailed,
    /// Two records resolve to the same crop base name, or a crop name is
    /// already listed in the manifest being appended to.
    FilenameCollision,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::MalformedRecord => "malformed_record",
            FailureKind::MissingSource => "missing_source",
            FailureKind::DegenerateQuadrilateral => "degenerate_quadrilateral",
            FailureKind::IllConditionedTransform => "ill_conditioned_transform",
            FailureKind::OversizedCrop => "oversized_crop",
            FailureKind::CropWriteFailed => "crop_write_failed",
            FailureKind::FilenameCollision => "filename_collision",
        }
    }

    /// The kind of a record- or annotation-local error.
    ///
    /// Returns `None` for errors that must abort the whole run.
    pub fn of(err: &LabelCropError) -> Option<Self> {
        match err {
            LabelCropError::MalformedRecord { .. } => Some(FailureKind::MalformedRecord),
            LabelCropError::MissingSource { .. } => Some(FailureKind::MissingSource),
            LabelCropError::DegenerateQuadrilateral { .. } => {
                Some(FailureKind::DegenerateQuadrilateral)
            }
            LabelCropError::IllConditionedTransform { .. } => {
                Some(FailureKind::IllConditionedTransform)
            }
            LabelCropError::OversizedCrop { .. } => Some(FailureKind::OversizedCrop),
            LabelCropError::CropWrite { .. } => Some(FailureKind::CropWriteFailed),
            LabelCropError::FilenameCollision { .. }
            | LabelCropError::CropAlreadyListed { .. } => Some(FailureKind::FilenameCollision),
            _ => None,
        }
    }
}
