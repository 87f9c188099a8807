//! Labelcrop: cut labelled text regions into training crops.
//!
//! Labelcrop reads a PPOCRLabel `Label.txt` file (one image path and a JSON
//! list of quadrilateral text regions per line), rectifies every region into
//! an upright crop and writes a recognition ground-truth manifest pairing
//! each crop with its transcription.
//!
//! # Modules
//!
//! - [`label`]: Label file data model and parser
//! - [`geometry`]: Corner ordering, crop sizing and perspective rectification
//! - [`export`]: Crop naming, encoding and the ground-truth manifest
//! - [`conversion`]: Batch conversion driver and its report
//! - [`error`]: Error types for labelcrop operations

pub mod conversion;
pub mod error;
pub mod export;
pub mod geometry;
pub mod label;
pub mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

pub use conversion::{convert_label_file, convert_label_str, ConversionReport, ConvertOptions};
pub use error::LabelCropError;

use export::FileNameScheme;
use geometry::CornerOrder;

/// The labelcrop CLI application.
#[derive(Parser)]
#[command(name = "labelcrop")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Increase log detail (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Rectify every labelled region into a crop and write the manifest.
    Convert(ConvertArgs),
    /// Parse the label file and check every region's geometry without
    /// reading images or writing files.
    Check(CheckArgs),
}

/// Arguments shared by convert and check.
#[derive(clap::Args)]
struct LabelArgs {
    /// PPOCRLabel label file (`Label.txt`).
    label_file: PathBuf,

    /// Strategy for assigning corner roles.
    #[arg(long, value_enum, default_value_t = CornerOrderArg::XSplit)]
    corner_order: CornerOrderArg,

    /// How crop file names are derived from image paths.
    #[arg(long, value_enum, default_value_t = FileNamesArg::Basename)]
    file_names: FileNamesArg,

    /// Crop image extension; selects the encoder.
    #[arg(long, default_value = "jpg")]
    ext: String,

    /// Number of worker threads (default: one per core).
    #[arg(long, short = 'j')]
    jobs: Option<usize>,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report: ReportFormat,

    /// Exit non-zero if any record or annotation was skipped.
    #[arg(long)]
    strict: bool,
}

/// Arguments for the convert subcommand.
#[derive(clap::Args)]
struct ConvertArgs {
    #[command(flatten)]
    label: LabelArgs,

    /// Directory the image paths in the label file are relative to.
    #[arg(long, env = "LABELCROP_IMAGE_ROOT", default_value = ".")]
    image_root: PathBuf,

    /// Directory crops and the manifest are written to.
    #[arg(long, short = 'o', env = "LABELCROP_OUTPUT_DIR", default_value = "train_data/crop_img")]
    output_dir: PathBuf,

    /// Manifest file name inside the output directory.
    #[arg(long, default_value = "rec_gt.txt")]
    manifest: String,

    /// Append to an existing manifest instead of truncating it.
    #[arg(long)]
    append: bool,
}

/// Arguments for the check subcommand.
#[derive(clap::Args)]
struct CheckArgs {
    #[command(flatten)]
    label: LabelArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CornerOrderArg {
    XSplit,
    CentroidAngle,
}

impl From<CornerOrderArg> for CornerOrder {
    fn from(arg: CornerOrderArg) -> Self {
        match arg {
            CornerOrderArg::XSplit => CornerOrder::XSplit,
            CornerOrderArg::CentroidAngle => CornerOrder::CentroidAngle,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FileNamesArg {
    Basename,
    PathHash,
}

impl From<FileNamesArg> for FileNameScheme {
    fn from(arg: FileNamesArg) -> Self {
        match arg {
            FileNamesArg::Basename => FileNameScheme::Basename,
            FileNamesArg::PathHash => FileNameScheme::PathHash,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

/// Run the labelcrop CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), LabelCropError> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args),
        Some(Commands::Check(args)) => run_check(args),
        None => {
            println!("labelcrop {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Cut labelled text regions into rectified training crops.");
            println!();
            println!("Run 'labelcrop --help' for usage information.");
            Ok(())
        }
    }
}

fn run_convert(args: ConvertArgs) -> Result<(), LabelCropError> {
    let opts = ConvertOptions {
        image_root: args.image_root,
        output_dir: args.output_dir,
        manifest_name: args.manifest,
        append_manifest: args.append,
        dry_run: false,
        ..label_options(&args.label)
    };
    let report = convert_label_file(&args.label.label_file, &opts)?;
    finish(report, &args.label)
}

fn run_check(args: CheckArgs) -> Result<(), LabelCropError> {
    let opts = ConvertOptions {
        dry_run: true,
        ..label_options(&args.label)
    };
    let report = convert_label_file(&args.label.label_file, &opts)?;
    finish(report, &args.label)
}

fn label_options(args: &LabelArgs) -> ConvertOptions {
    ConvertOptions {
        extension: args.ext.clone(),
        corner_order: args.corner_order.into(),
        file_names: args.file_names.into(),
        jobs: args.jobs,
        ..Default::default()
    }
}

/// Prints the report and decides the exit status.
fn finish(report: ConversionReport, args: &LabelArgs) -> Result<(), LabelCropError> {
    match args.report {
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|source| LabelCropError::ReportWrite { source })?;
            println!("{json}");
        }
        ReportFormat::Text => {
            if report.dry_run {
                println!("Checked {}:", report.label_file);
            } else {
                println!("Converted {} -> {}:", report.label_file, report.output_dir);
            }
            print!("{}", report);
        }
    }

    if args.strict && !report.is_clean() {
        return Err(LabelCropError::ConversionHadFailures {
            failed: report.skipped_annotations(),
            issue_count: report.issues.len(),
            report,
        });
    }

    Ok(())
}
