//! # DICOM de-identification and volume library
//!
//! This crate serves a high-level API for two jobs on a series of
//! per-slice DICOM files:
//!
//!  - De-identification: a fixed policy removes patient and provider
//!    identifying attributes and regenerates the study, series and
//!    instance UIDs. A validator audits an object against the same policy
//!    and a few structural rules and returns a report.
//!  - Volume reconstruction: the slices of a folder are decoded and
//!    stacked into a volume that can be sliced in the three medical axes
//!    (axial, coronal, sagittal) and windowed to 8-bit grayscale.
//!
//! The library is part of the dicom-rs ecosystem and uses its object
//! parser and pixel data decoder. Independent files are processed in
//! parallel using rayon. DICOM files are assumed to have the following
//! attributes:
//!   - Axial data set, one slice per file
//!   - No multiframe (always the first frame is used)
//!   - Slice order given by the file names
//!
//! # Examples
//!
//! ## Reading multiple DICOM files into a volume
//!
//! Read all DICOM files from the dicom/ directory in file name order and
//! render the sagittal image at the center of the volume.
//!
//! ```no_run
//! # use dicom_deid_volume::{VolumeLoader, Orientation, SortBy, WindowLevel};
//! let volume = VolumeLoader::load_from_directory("dicom", SortBy::FileName)
//!     .expect("should have loaded files from directory");
//! let image = volume
//!     .get_image_from_axis(
//!         volume.dim().2 / 2,
//!         Orientation::Sagittal,
//!         WindowLevel::new(40.0, 400.0),
//!     )
//!     .expect("should have returned image at center of volume");
//! image.save("result.png").expect("should have written the image");
//! ```
//!
//! ## Anonymizing a folder
//!
//! ```no_run
//! # use dicom_deid_volume::{AnonymizationPolicy, anonymize_directory};
//! let summary = anonymize_directory("dicom", &AnonymizationPolicy::default())
//!     .expect("should have listed the directory");
//! println!("{} written, {} failed", summary.succeeded(), summary.failed());
//! ```

pub mod anonymizer;
pub mod enums;
pub mod slice;
pub mod tag_store;
pub mod validator;
pub mod volume;
pub mod volume_loader;
pub mod window;

#[cfg(test)]
mod fixtures;

pub use anonymizer::{
    AnonymizationPolicy, AnonymizeError, BatchSummary, anonymize, anonymize_batch,
    anonymize_directory, anonymize_file, generate_uid,
};
pub use enums::{BitDepth, Orientation, SortBy};
pub use slice::{DecodeError, Slice, decode_samples, decode_slice};
pub use tag_store::{TagEntry, TagLookup, list_tags};
pub use validator::{
    CheckResult, CheckStatus, ValidateError, ValidationReport, validate, validate_file,
};
pub use volume::Volume;
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
pub use window::{WindowLevel, to_grayscale};
