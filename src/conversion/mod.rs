//! Batch conversion of a PPOCRLabel label file into rectified crops.
//!
//! Records move through the converter in bounded windows, each in three
//! phases:
//!
//! 1. **Plan** (sequential): parse the window's lines, resolve each record's
//!    crop base name and reject records whose crops would replace another
//!    record's, including crops already listed in a manifest being appended to.
//! 2. **Process** (parallel): each worker loads its record's source image,
//!    rectifies every annotation and writes the crops.
//! 3. **Consume** (sequential, file order): append manifest lines, log and
//!    record failures.
//!
//! Crop names depend only on the plan, and the manifest is written by the
//! consumer alone, so the output is identical for any thread count.
//!
//! Record- and annotation-level failures are collected in the
//! [`ConversionReport`]; only setup failures and manifest write failures
//! abort the run.

pub mod report;

pub use report::{ConversionCounts, ConversionIssue, ConversionReport, FailureKind, IssueContext};

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::LabelCropError;
use crate::export::{
    crop_format, read_manifest, write_crop, CropNamer, FileNameScheme, ManifestEntry, ManifestWriter,
};
use crate::geometry::{order_corners, rectified_size, rectify, CornerOrder, Homography, RectifiedSize};
use crate::label::io_ppocr_label::{parse_label_records, read_label_file};
use crate::label::{Annotation, ImageRecord};

/// Largest crop, in pixels, the converter will allocate.
pub const MAX_CROP_PIXELS: u64 = 64 * 1024 * 1024;

/// Records handed to the worker pool at a time.
const RECORDS_PER_WINDOW: usize = 256;

/// Options for a conversion run.
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    /// Directory the image paths in the label file are relative to.
    pub image_root: PathBuf,
    /// Directory crops and the manifest are written to.
    pub output_dir: PathBuf,
    /// Manifest file name inside `output_dir`.
    pub manifest_name: String,
    /// Crop file extension; selects the encoder.
    pub extension: String,
    pub corner_order: CornerOrder,
    pub file_names: FileNameScheme,
    /// Append to an existing manifest instead of truncating it. Crops named
    /// in that manifest are never replaced.
    pub append_manifest: bool,
    /// Check parsing and geometry only. No image is read and nothing is written.
    pub dry_run: bool,
    /// Worker threads; `None` uses rayon's default.
    pub jobs: Option<usize>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            image_root: PathBuf::from("."),
            output_dir: PathBuf::from("train_data/crop_img"),
            manifest_name: "rec_gt.txt".to_string(),
            extension: "jpg".to_string(),
            corner_order: CornerOrder::default(),
            file_names: FileNameScheme::default(),
            append_manifest: false,
            dry_run: false,
            jobs: None,
        }
    }
}

impl ConvertOptions {
    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(&self.manifest_name)
    }

    fn extension(&self) -> &str {
        self.extension.trim_start_matches('.')
    }

    fn validate(&self) -> Result<ImageFormat, LabelCropError> {
        if self.jobs == Some(0) {
            return Err(LabelCropError::InvalidOptions {
                message: "jobs must be at least 1".to_string(),
            });
        }

        let manifest = Path::new(&self.manifest_name);
        if self.manifest_name.is_empty()
            || manifest.file_name() != Some(manifest.as_os_str())
        {
            return Err(LabelCropError::InvalidOptions {
                message: format!(
                    "manifest name '{}' must be a plain file name",
                    self.manifest_name
                ),
            });
        }

        crop_format(self.extension())
    }
}

/// Converts the label file at `path`.
///
/// # Errors
/// Fails only for setup problems (unreadable label file, invalid options,
/// output directory) and manifest write failures. Everything else is
/// recorded in the returned report.
pub fn convert_label_file(
    path: &Path,
    opts: &ConvertOptions,
) -> Result<ConversionReport, LabelCropError> {
    let content = read_label_file(path)?;
    convert_content(path.display().to_string(), &content, opts)
}

/// Converts label file content that is already in memory.
pub fn convert_label_str(
    content: &str,
    opts: &ConvertOptions,
) -> Result<ConversionReport, LabelCropError> {
    convert_content(String::new(), content, opts)
}

fn convert_content(
    label_file: String,
    content: &str,
    opts: &ConvertOptions,
) -> Result<ConversionReport, LabelCropError> {
    let format = opts.validate()?;
    let namer = CropNamer::new(opts.file_names, opts.extension());

    let mut report = ConversionReport::new(label_file, opts.output_dir.display().to_string());
    report.dry_run = opts.dry_run;
    report.corner_order = opts.corner_order;
    report.file_names = opts.file_names;

    let listed = if opts.append_manifest {
        listed_crops(&opts.manifest_path())?
    } else {
        HashSet::new()
    };
    let mut planner = Planner {
        namer: &namer,
        manifest_path: opts.manifest_path(),
        listed,
        claimed: HashMap::new(),
    };

    let mut manifest = if opts.dry_run {
        None
    } else {
        fs::create_dir_all(&opts.output_dir).map_err(|source| LabelCropError::OutputDir {
            path: opts.output_dir.clone(),
            source,
        })?;
        Some(ManifestWriter::create(
            &opts.manifest_path(),
            opts.append_manifest,
        )?)
    };

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(jobs) = opts.jobs {
        builder = builder.num_threads(jobs);
    }
    let pool = builder
        .build()
        .map_err(|err| LabelCropError::InvalidOptions {
            message: format!("failed to start worker pool: {err}"),
        })?;

    let worker = Worker {
        opts,
        namer: &namer,
        format,
    };

    let mut records = parse_label_records(content);
    loop {
        let window = records
            .by_ref()
            .take(RECORDS_PER_WINDOW)
            .map(|parsed| planner.plan(parsed))
            .collect::<Result<Vec<_>, _>>()?;
        if window.is_empty() {
            break;
        }

        let outcomes: Vec<Result<RecordOutcome, LabelCropError>> = pool.install(|| {
            window
                .par_iter()
                .map(|item| worker.process(item))
                .collect()
        });

        for outcome in outcomes {
            consume(outcome?, manifest.as_mut(), &mut report)?;
        }
    }

    if let Some(manifest) = manifest {
        manifest.finish()?;
    }

    info!(
        records = report.counts.records,
        annotations = report.counts.annotations,
        crops = report.counts.crops,
        skipped = report.skipped_annotations(),
        failures = report.issues.len(),
        dry_run = opts.dry_run,
        "conversion finished"
    );

    Ok(report)
}

/// One label line after planning.
#[derive(Debug)]
enum PlanItem {
    Record { record: ImageRecord, base_name: String },
    Rejected {
        annotations: Option<usize>,
        issue: ConversionIssue,
    },
}

/// Crop names already listed in the manifest at `path`, if there is one.
fn listed_crops(path: &Path) -> Result<HashSet<String>, LabelCropError> {
    if !path.is_file() {
        return Ok(HashSet::new());
    }
    Ok(read_manifest(path)?
        .into_iter()
        .map(|entry| entry.file_name)
        .collect())
}

/// Assigns crop base names in file order.
struct Planner<'a> {
    namer: &'a CropNamer,
    manifest_path: PathBuf,
    /// Crop names from the manifest being appended to.
    listed: HashSet<String>,
    // base name -> (image path, line) of the record that claimed it
    claimed: HashMap<String, (String, usize)>,
}

impl Planner<'_> {
    fn plan(
        &mut self,
        parsed: Result<ImageRecord, LabelCropError>,
    ) -> Result<PlanItem, LabelCropError> {
        let record = match parsed {
            Ok(record) => record,
            Err(LabelCropError::MalformedRecord { line, message }) => {
                return Ok(PlanItem::Rejected {
                    annotations: None,
                    issue: ConversionIssue::new(
                        FailureKind::MalformedRecord,
                        message,
                        IssueContext::Record { line },
                    ),
                });
            }
            Err(other) => return Err(other),
        };

        let context = IssueContext::Record { line: record.line };
        let annotations = Some(record.annotations.len());
        let reject = move |err: LabelCropError| -> Result<PlanItem, LabelCropError> {
            Ok(PlanItem::Rejected {
                annotations,
                issue: into_issue(err, context)?,
            })
        };

        let Some(base_name) = self.namer.base_name(&record.image_path) else {
            return reject(LabelCropError::MalformedRecord {
                line: record.line,
                message: format!("image path '{}' has no file name", record.image_path),
            });
        };

        if let Some((first_image_path, first_line)) = self.claimed.get(&base_name) {
            return reject(LabelCropError::FilenameCollision {
                base_name,
                image_path: record.image_path.clone(),
                first_image_path: first_image_path.clone(),
                first_line: *first_line,
            });
        }

        let already_listed = (0..record.annotations.len())
            .map(|index| self.namer.file_name(&base_name, index))
            .find(|file_name| self.listed.contains(file_name));
        if let Some(file_name) = already_listed {
            return reject(LabelCropError::CropAlreadyListed {
                file_name,
                image_path: record.image_path.clone(),
                manifest: self.manifest_path.clone(),
            });
        }

        self.claimed
            .insert(base_name.clone(), (record.image_path.clone(), record.line));
        Ok(PlanItem::Record { record, base_name })
    }
}

/// Result of processing one plan item, consumed in file order.
#[derive(Debug)]
struct RecordOutcome {
    /// Annotations on the line, if it parsed.
    annotations: Option<usize>,
    record_issue: Option<ConversionIssue>,
    results: Vec<AnnotationResult>,
}

#[derive(Debug)]
enum AnnotationResult {
    Cropped {
        entry: ManifestEntry,
        size: RectifiedSize,
    },
    Skipped(ConversionIssue),
}

struct Worker<'a> {
    opts: &'a ConvertOptions,
    namer: &'a CropNamer,
    format: ImageFormat,
}

impl Worker<'_> {
    fn process(&self, item: &PlanItem) -> Result<RecordOutcome, LabelCropError> {
        let (record, base_name) = match item {
            PlanItem::Record { record, base_name } => (record, base_name),
            PlanItem::Rejected { annotations, issue } => {
                return Ok(RecordOutcome {
                    annotations: *annotations,
                    record_issue: Some(issue.clone()),
                    results: Vec::new(),
                });
            }
        };

        let mut outcome = RecordOutcome {
            annotations: Some(record.annotations.len()),
            record_issue: None,
            results: Vec::with_capacity(record.annotations.len()),
        };

        let source = if self.opts.dry_run || record.annotations.is_empty() {
            None
        } else {
            match self.load_source(&record.image_path) {
                Ok(image) => Some(image),
                Err(err) => {
                    outcome.record_issue =
                        Some(into_issue(err, IssueContext::Record { line: record.line })?);
                    return Ok(outcome);
                }
            }
        };

        for (index, annotation) in record.annotations.iter().enumerate() {
            let file_name = self.namer.file_name(base_name, index);
            let result = match self.crop_annotation(source.as_ref(), record.line, annotation, &file_name)
            {
                Ok(size) => AnnotationResult::Cropped {
                    entry: ManifestEntry::new(file_name, annotation.transcription.clone()),
                    size,
                },
                Err(err) => AnnotationResult::Skipped(into_issue(
                    err,
                    IssueContext::Annotation {
                        line: record.line,
                        index,
                    },
                )?),
            };
            outcome.results.push(result);
        }

        Ok(outcome)
    }

    fn load_source(&self, image_path: &str) -> Result<DynamicImage, LabelCropError> {
        let path = self.opts.image_root.join(image_path);
        image::open(&path).map_err(|source| LabelCropError::MissingSource { path, source })
    }

    /// Runs one annotation through ordering, sizing and rectification. With
    /// no source image (dry run) the transform is solved but not applied.
    fn crop_annotation(
        &self,
        source: Option<&DynamicImage>,
        line: usize,
        annotation: &Annotation,
        file_name: &str,
    ) -> Result<RectifiedSize, LabelCropError> {
        if annotation.transcription.contains(['\n', '\r']) {
            return Err(LabelCropError::MalformedRecord {
                line,
                message: "transcription contains a line break".to_string(),
            });
        }

        let quad = order_corners(&annotation.quad, self.opts.corner_order)?;
        let size = rectified_size(&quad);
        if size.pixel_count() > MAX_CROP_PIXELS {
            return Err(LabelCropError::OversizedCrop {
                width: size.width,
                height: size.height,
                limit: MAX_CROP_PIXELS,
            });
        }

        match source {
            Some(source) => {
                let crop = rectify(source, &quad, size)?;
                write_crop(
                    &crop,
                    &self.opts.output_dir.join(file_name),
                    self.format,
                    !self.opts.append_manifest,
                )?;
            }
            None => {
                Homography::rectify(&quad, size)?.inverse()?;
            }
        }

        Ok(size)
    }
}

fn consume(
    outcome: RecordOutcome,
    mut manifest: Option<&mut ManifestWriter>,
    report: &mut ConversionReport,
) -> Result<(), LabelCropError> {
    if let Some(annotations) = outcome.annotations {
        report.counts.records += 1;
        report.counts.annotations += annotations;
    }

    if let Some(issue) = outcome.record_issue {
        log_issue(&issue);
        report.add(issue);
    }

    for result in outcome.results {
        match result {
            AnnotationResult::Cropped { entry, size } => {
                if entry.transcription.contains('\t') {
                    warn!(
                        file = %entry.file_name,
                        "transcription contains a tab; readers splitting on every tab will cut it short"
                    );
                }
                if let Some(manifest) = manifest.as_deref_mut() {
                    manifest.append(&entry)?;
                }
                debug!(
                    file = %entry.file_name,
                    width = size.width,
                    height = size.height,
                    "rectified crop"
                );
                report.counts.crops += 1;
            }
            AnnotationResult::Skipped(issue) => {
                log_issue(&issue);
                report.add(issue);
            }
        }
    }

    Ok(())
}

fn log_issue(issue: &ConversionIssue) {
    match issue.context {
        IssueContext::Record { line } => {
            warn!(line, kind = issue.kind.name(), "skipping record: {}", issue.message);
        }
        IssueContext::Annotation { line, index } => {
            warn!(
                line,
                annotation = index,
                kind = issue.kind.name(),
                "skipping annotation: {}",
                issue.message
            );
        }
    }
}

/// Turns a local failure into a report issue. Errors with no
/// [`FailureKind`] are fatal and handed back.
fn into_issue(err: LabelCropError, context: IssueContext) -> Result<ConversionIssue, LabelCropError> {
    let Some(kind) = FailureKind::of(&err) else {
        return Err(err);
    };
    let message = match err {
        LabelCropError::MalformedRecord { message, .. }
        | LabelCropError::DegenerateQuadrilateral { message }
        | LabelCropError::IllConditionedTransform { message } => message,
        other => other.to_string(),
    };
    Ok(ConversionIssue::new(kind, message, context))
}
