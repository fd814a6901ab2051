use crate::tag_store::TagLookup;
use crate::volume_loader::list_directory;

use dicom::core::header::Header;
use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::object::{InMemDicomObject, open_file};
use dicom_dictionary_std::tags;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Name of the directory created next to the source files
pub const OUTPUT_DIR_NAME: &str = "Anonymized";

/// Suffix appended to the stem of every written file
pub const OUTPUT_SUFFIX: &str = "_anon";

/// Elements removed by every policy variant, in removal order
const REMOVED_TAGS: [Tag; 13] = [
    tags::PATIENT_NAME,
    tags::PATIENT_BIRTH_DATE,
    tags::STUDY_DATE,
    tags::STUDY_TIME,
    tags::SERIES_DATE,
    tags::ACQUISITION_DATE,
    tags::ETHNIC_GROUP,
    tags::OCCUPATION,
    tags::INSTITUTION_NAME,
    tags::INSTITUTION_ADDRESS,
    tags::REFERRING_PHYSICIAN_NAME,
    tags::PERFORMING_PHYSICIAN_NAME,
    tags::OPERATORS_NAME,
];

/// Group of the patient module
const PATIENT_GROUP: u16 = 0x0010;

/// Element range in the patient group holding other patient identifiers
const OTHER_PATIENT_IDS: std::ops::RangeInclusive<u16> = 0x1000..=0x109C;

/// Demographics kept even though they fall inside `OTHER_PATIENT_IDS`
const PRESERVED_TAGS: [Tag; 3] = [
    tags::PATIENT_AGE,
    tags::PATIENT_SIZE,
    tags::PATIENT_WEIGHT,
];

/// Identifiers that get a fresh UID instead of being removed
pub const REGENERATED_UIDS: [Tag; 3] = [
    tags::STUDY_INSTANCE_UID,
    tags::SERIES_INSTANCE_UID,
    tags::SOP_INSTANCE_UID,
];

#[derive(Debug, Error)]
pub enum AnonymizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Read(#[from] dicom::object::ReadError),

    #[error("Could not write DICOM file: {0}")]
    Write(#[from] dicom::object::WriteError),

    #[error("Path has no file name: {0}")]
    InvalidPath(PathBuf),
}

/// Configuration of the de-identification policy.
///
/// The removal list is fixed; only the handling of Patient ID varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnonymizationPolicy {
    /// Remove Patient ID (0010,0020) together with the other identifiers
    pub remove_patient_id: bool,
}

impl Default for AnonymizationPolicy {
    fn default() -> Self {
        Self {
            remove_patient_id: true,
        }
    }
}

impl AnonymizationPolicy {
    /// Policy variant that keeps Patient ID
    pub fn retain_patient_id() -> Self {
        Self {
            remove_patient_id: false,
        }
    }

    /// Every single tag this policy removes, in removal order
    pub fn removed_tags(&self) -> Vec<Tag> {
        let mut removed = Vec::with_capacity(REMOVED_TAGS.len() + 1);
        removed.push(tags::PATIENT_NAME);
        if self.remove_patient_id {
            removed.push(tags::PATIENT_ID);
        }
        removed.extend_from_slice(&REMOVED_TAGS[1..]);
        removed
    }
}

/// Outcome of anonymizing a set of files
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Written files, in input order
    pub outputs: Vec<PathBuf>,
    /// Inputs that could not be anonymized, in input order
    pub failures: Vec<(PathBuf, AnonymizeError)>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outputs.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Generate a UUID-derived UID (`2.25.<uuid as decimal>`).
///
/// The UUID is a random version 4 UUID, so every call yields a new value.
pub fn generate_uid() -> String {
    let mut uuid: u128 = rand::random();
    uuid = (uuid & !(0xF_u128 << 76)) | (0x4_u128 << 76);
    uuid = (uuid & !(0x3_u128 << 62)) | (0x2_u128 << 62);
    format!("2.25.{uuid}")
}

/// Apply the de-identification policy to the object in place.
///
/// Absent tags are skipped. Removal is idempotent, but each call puts a
/// fresh UID into every identifier tag that is present.
pub fn anonymize(object: &mut InMemDicomObject, policy: &AnonymizationPolicy) {
    for tag in policy.removed_tags() {
        if object.remove_element(tag) {
            debug!("Removed {tag}");
        }
    }

    let other_ids: Vec<Tag> = object
        .iter()
        .map(|element| element.tag())
        .filter(|tag| {
            tag.group() == PATIENT_GROUP
                && OTHER_PATIENT_IDS.contains(&tag.element())
                && !PRESERVED_TAGS.contains(tag)
        })
        .collect();
    for tag in other_ids {
        object.remove_element(tag);
        debug!("Removed {tag}");
    }

    for tag in REGENERATED_UIDS {
        if !object.contains(tag) {
            continue;
        }
        object.put(DataElement::new(
            tag,
            VR::UI,
            PrimitiveValue::from(generate_uid()),
        ));
    }
}

/// Path the anonymized copy of `input` is written to
pub fn output_path(input: &Path) -> Result<PathBuf, AnonymizeError> {
    let stem = input
        .file_stem()
        .ok_or_else(|| AnonymizeError::InvalidPath(input.to_path_buf()))?;
    let dir = input.parent().unwrap_or_else(|| Path::new(""));

    let mut file_name = stem.to_os_string();
    file_name.push(OUTPUT_SUFFIX);
    if let Some(ext) = input.extension() {
        file_name.push(".");
        file_name.push(ext);
    }

    Ok(dir.join(OUTPUT_DIR_NAME).join(file_name))
}

/// Anonymize one file into the `Anonymized` directory next to it.
///
/// Returns the path of the written file.
pub fn anonymize_file(
    input: impl AsRef<Path>,
    policy: &AnonymizationPolicy,
) -> Result<PathBuf, AnonymizeError> {
    let input = input.as_ref();
    let output = output_path(input)?;

    let mut object = open_file(input)?;
    anonymize(&mut object, policy);

    // keep the file meta group in line with the regenerated instance UID
    if let Some(mut uid) = object.string_value(tags::SOP_INSTANCE_UID) {
        if uid.len() % 2 == 1 {
            uid.push('\0');
        }
        object.update_meta(|meta| {
            meta.media_storage_sop_instance_uid = uid.clone();
        });
    }

    let dir = output.parent().unwrap_or_else(|| Path::new(""));
    fs::create_dir_all(dir)?;

    // the temporary file is removed on drop unless it was persisted
    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        object.write_all(&mut writer)?;
        writer.flush()?;
    }
    temp.persist(&output).map_err(|err| err.error)?;

    info!("Anonymized {} -> {}", input.display(), output.display());
    Ok(output)
}

/// Anonymize every file independently on the rayon pool.
///
/// A failing file is recorded in the summary and never stops the others.
pub fn anonymize_batch<P>(paths: &[P], policy: &AnonymizationPolicy) -> BatchSummary
where
    P: AsRef<Path> + Sync,
{
    let results: Vec<_> = paths
        .par_iter()
        .map(|path| (path.as_ref().to_path_buf(), anonymize_file(path, policy)))
        .collect();

    let mut summary = BatchSummary::default();
    for (path, result) in results {
        match result {
            Ok(output) => summary.outputs.push(output),
            Err(err) => {
                warn!("Failed to anonymize {}: {err}", path.display());
                summary.failures.push((path, err));
            }
        }
    }

    info!(
        "Batch anonymization finished: {} succeeded, {} failed",
        summary.succeeded(),
        summary.failed()
    );
    summary
}

/// Anonymize all `.dcm` files of a directory in file name order
pub fn anonymize_directory(
    dir: impl AsRef<Path>,
    policy: &AnonymizationPolicy,
) -> Result<BatchSummary, AnonymizeError> {
    let paths = list_directory(dir.as_ref())?;
    Ok(anonymize_batch(&paths, policy))
}
