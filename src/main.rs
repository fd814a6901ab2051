use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dicom::object::open_file;
use dicom_deid_volume::{
    AnonymizationPolicy, Orientation, SortBy, VolumeLoader, WindowLevel, anonymize_directory,
    anonymize_file, list_tags, validate_file,
};

#[derive(Parser)]
#[command(version, about = "De-identify, validate and reslice DICOM series")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the attributes of a file
    Tags { file: PathBuf },

    /// Audit a file against the de-identification policy
    Validate {
        file: PathBuf,
        /// Do not expect Patient ID to be removed
        #[arg(long)]
        keep_patient_id: bool,
    },

    /// Write de-identified copies into an "Anonymized" directory
    Anonymize {
        /// A single file or a directory of .dcm files
        path: PathBuf,
        /// Keep Patient ID
        #[arg(long)]
        keep_patient_id: bool,
    },

    /// Render a cross-section of the volume in a directory as PNG
    Render {
        dir: PathBuf,
        #[arg(long, value_enum, default_value_t = Axis::Axial)]
        orientation: Axis,
        /// Position along the axis, defaults to the middle
        #[arg(long)]
        index: Option<usize>,
        #[arg(long, requires = "width")]
        center: Option<f64>,
        #[arg(long, requires = "center")]
        width: Option<f64>,
        /// Order slices by Instance Number instead of file name
        #[arg(long)]
        instance_number: bool,
        #[arg(long, short)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Axis {
    Axial,
    Coronal,
    Sagittal,
}

impl From<Axis> for Orientation {
    fn from(axis: Axis) -> Self {
        match axis {
            Axis::Axial => Orientation::Axial,
            Axis::Coronal => Orientation::Coronal,
            Axis::Sagittal => Orientation::Sagittal,
        }
    }
}

fn policy(keep_patient_id: bool) -> AnonymizationPolicy {
    if keep_patient_id {
        AnonymizationPolicy::retain_patient_id()
    } else {
        AnonymizationPolicy::default()
    }
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Tags { file } => {
            let object = open_file(&file)
                .with_context(|| format!("Failed to open DICOM file: {}", file.display()))?;
            for entry in list_tags(&object) {
                println!("{:40} {}", entry.key, entry.value);
            }
        }
        Command::Validate {
            file,
            keep_patient_id,
        } => {
            let report = validate_file(&file, &policy(keep_patient_id))
                .with_context(|| format!("Failed to validate {}", file.display()))?;
            print!("{report}");
            if !report.passed() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Anonymize {
            path,
            keep_patient_id,
        } => {
            let policy = policy(keep_patient_id);
            if path.is_dir() {
                let summary = anonymize_directory(&path, &policy)?;
                for (file, err) in &summary.failures {
                    eprintln!("{}: {err}", file.display());
                }
                println!(
                    "{} succeeded, {} failed",
                    summary.succeeded(),
                    summary.failed()
                );
                if summary.failed() > 0 {
                    return Ok(ExitCode::FAILURE);
                }
            } else {
                let output = anonymize_file(&path, &policy)?;
                println!("{}", output.display());
            }
        }
        Command::Render {
            dir,
            orientation,
            index,
            center,
            width,
            instance_number,
            output,
        } => {
            let sort_by = if instance_number {
                SortBy::InstanceNumber
            } else {
                SortBy::FileName
            };
            let volume = VolumeLoader::load_from_directory(&dir, sort_by)?;
            let orientation = Orientation::from(orientation);
            let index = index.unwrap_or(volume.axis_len(orientation) / 2);

            let window = match (center, width) {
                (Some(center), Some(width)) => WindowLevel::new(center, width),
                _ => stored_window(&volume.files).unwrap_or_else(|| {
                    let (min, max) = volume.value_range().unwrap_or((0.0, 255.0));
                    WindowLevel::from_range(min, max)
                }),
            };

            let image = volume
                .get_image_from_axis(index, orientation, window)
                .context("Failed to build the output image")?;
            image
                .save(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("{}", output.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Window stored in the first slice of the volume
fn stored_window(files: &[PathBuf]) -> Option<WindowLevel> {
    let object = open_file(files.first()?).ok()?;
    WindowLevel::from_object(&object)
}
