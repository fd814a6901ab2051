use crate::anonymizer::AnonymizationPolicy;
use crate::tag_store::TagLookup;

use dicom::core::Tag;
use dicom::object::{InMemDicomObject, open_file};
use dicom_dictionary_std::tags;
use log::{debug, info};
use std::{fmt, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("DICOM error: {0}")]
    Read(#[from] dicom::object::ReadError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Fail,
    Warn,
    Skip,
}

impl CheckStatus {
    /// Whether the check lets the overall report pass
    pub fn is_pass(self) -> bool {
        matches!(self, CheckStatus::Ok | CheckStatus::Skip)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Warn => "WARN",
            CheckStatus::Skip => "SKIP",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.name, self.detail)
    }
}

/// Result of one validation run, in check order
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub file_name: Option<String>,
    checks: Vec<CheckResult>,
}

impl ValidationReport {
    pub fn checks(&self) -> &[CheckResult] {
        &self.checks
    }

    /// PASS only when every check is OK or skipped
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.status.is_pass())
    }

    /// Find the first check with this name
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|check| check.name == name)
    }

    /// Text lines for display: a header followed by one line per check
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.checks.len() + 2);
        let verdict = if self.passed() { "PASS" } else { "WARN/FAIL" };
        lines.push(format!("[AQ] {verdict}"));
        if let Some(file_name) = &self.file_name {
            lines.push(format!("[FILE] {file_name}"));
        }
        lines.extend(self.checks.iter().map(ToString::to_string));
        lines
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

const REQUIRED_STRINGS: [(Tag, &str); 5] = [
    (tags::PATIENT_SEX, "Patient's Sex"),
    (tags::MODALITY, "Modality"),
    (tags::STUDY_INSTANCE_UID, "Study Instance UID"),
    (tags::SERIES_INSTANCE_UID, "Series Instance UID"),
    (tags::SOP_INSTANCE_UID, "SOP Instance UID"),
];

const NUMERIC_RANGES: [(Tag, &str, f64, f64); 4] = [
    (tags::KVP, "KVP", 50.0, 150.0),
    (tags::EXPOSURE_TIME, "Exposure Time", 1.0, 3000.0),
    (tags::ROWS, "Rows", 1.0, 4096.0),
    (tags::COLUMNS, "Columns", 1.0, 4096.0),
];

const UID_TAGS: [(Tag, &str); 3] = [
    (tags::STUDY_INSTANCE_UID, "Study Instance UID format"),
    (tags::SERIES_INSTANCE_UID, "Series Instance UID format"),
    (tags::SOP_INSTANCE_UID, "SOP Instance UID format"),
];

fn removed_tag_checks(policy: &AnonymizationPolicy) -> Vec<(Tag, &'static str)> {
    let mut checks = vec![(tags::PATIENT_NAME, "Patient's Name")];
    if policy.remove_patient_id {
        checks.push((tags::PATIENT_ID, "Patient ID"));
    }
    checks.extend([
        (tags::PATIENT_BIRTH_DATE, "Patient's Birth Date"),
        (tags::REFERRING_PHYSICIAN_NAME, "Referring Physician's Name"),
        (tags::INSTITUTION_NAME, "Institution Name"),
    ]);
    checks
}

/// Audit the object against the de-identification policy and the
/// structural rules. Never modifies the object.
pub fn validate(object: &InMemDicomObject, policy: &AnonymizationPolicy) -> ValidationReport {
    let mut checks = Vec::new();

    for (tag, name) in removed_tag_checks(policy) {
        checks.push(check_removed(object, tag, name));
    }
    for (tag, name) in REQUIRED_STRINGS {
        checks.push(check_required_string(object, tag, name));
    }
    for (tag, name, min, max) in NUMERIC_RANGES {
        checks.push(check_numeric_range(object, tag, name, min, max));
    }
    for (tag, name) in UID_TAGS {
        checks.push(check_uid_format(object, tag, name));
    }

    ValidationReport {
        file_name: None,
        checks,
    }
}

/// Open a file and validate it. A file that does not parse fails the whole
/// run with a single error.
pub fn validate_file(
    path: impl AsRef<Path>,
    policy: &AnonymizationPolicy,
) -> Result<ValidationReport, ValidateError> {
    let path = path.as_ref();
    let object = open_file(path)?;

    let mut report = validate(&object, policy);
    report.file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    let verdict = if report.passed() { "PASS" } else { "WARN/FAIL" };
    info!("Validation of {}: {verdict}", path.display());
    for check in report.checks() {
        debug!("{check}");
    }
    Ok(report)
}

fn check_removed(object: &InMemDicomObject, tag: Tag, name: &str) -> CheckResult {
    let (status, detail) = if object.contains(tag) {
        (CheckStatus::Fail, format!("still present {tag}"))
    } else {
        (CheckStatus::Ok, "removed".to_string())
    };
    CheckResult {
        name: name.to_string(),
        status,
        detail,
    }
}

fn check_required_string(object: &InMemDicomObject, tag: Tag, name: &str) -> CheckResult {
    let (status, detail) = match object.string_value(tag) {
        Some(value) if !value.trim().is_empty() => (CheckStatus::Ok, format!("\"{value}\"")),
        _ => (CheckStatus::Fail, format!("missing or empty {tag}")),
    };
    CheckResult {
        name: name.to_string(),
        status,
        detail,
    }
}

fn check_numeric_range(
    object: &InMemDicomObject,
    tag: Tag,
    name: &str,
    min: f64,
    max: f64,
) -> CheckResult {
    let (status, detail) = match object.single_number(tag) {
        None => (CheckStatus::Skip, format!("no value {tag}")),
        Some(value) if value < min || value > max => (
            CheckStatus::Warn,
            format!("{value} outside expected range {min}..{max}"),
        ),
        Some(value) => (CheckStatus::Ok, format!("{value} (range {min}..{max})")),
    };
    CheckResult {
        name: name.to_string(),
        status,
        detail,
    }
}

fn check_uid_format(object: &InMemDicomObject, tag: Tag, name: &str) -> CheckResult {
    let (status, detail) = match object.string_value(tag) {
        Some(uid) if !uid.trim().is_empty() => {
            if is_well_formed_uid(&uid) {
                (CheckStatus::Ok, "well formed".to_string())
            } else {
                (CheckStatus::Warn, format!("suspicious UID \"{uid}\""))
            }
        }
        _ => (CheckStatus::Fail, format!("missing or empty {tag}")),
    };
    CheckResult {
        name: name.to_string(),
        status,
        detail,
    }
}

/// Digits and dots only, no leading, trailing or doubled dot
pub fn is_well_formed_uid(uid: &str) -> bool {
    uid.chars().all(|c| c.is_ascii_digit() || c == '.')
        && !uid.starts_with('.')
        && !uid.ends_with('.')
        && !uid.contains("..")
}
