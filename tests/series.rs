use std::fs;
use std::path::{Path, PathBuf};

use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::{tags, uids};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject, open_file};
use dicom_deid_volume::{
    AnonymizationPolicy, CheckStatus, Orientation, SortBy, TagLookup, VolumeLoader,
    VolumeLoaderError, anonymize_directory, anonymize_file, validate_file,
};

fn identified_elements(instance: u16) -> Vec<DataElement<InMemDicomObject>> {
    let sop_instance_uid = format!("1.2.826.0.1.3680043.2.1.{instance}");
    vec![
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, uids::CT_IMAGE_STORAGE),
        DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, sop_instance_uid.as_str()),
        DataElement::new(tags::STUDY_DATE, VR::DA, "20240101"),
        DataElement::new(tags::MODALITY, VR::CS, "CT"),
        DataElement::new(tags::INSTITUTION_NAME, VR::LO, "General Hospital"),
        DataElement::new(tags::REFERRING_PHYSICIAN_NAME, VR::PN, "Who^Doctor"),
        DataElement::new(tags::PATIENT_NAME, VR::PN, "Doe^John"),
        DataElement::new(tags::PATIENT_ID, VR::LO, "12345"),
        DataElement::new(tags::PATIENT_BIRTH_DATE, VR::DA, "19800101"),
        DataElement::new(tags::PATIENT_SEX, VR::CS, "M"),
        DataElement::new(tags::STUDY_INSTANCE_UID, VR::UI, "1.2.826.0.1.3680043.2"),
        DataElement::new(tags::SERIES_INSTANCE_UID, VR::UI, "1.2.826.0.1.3680043.2.1"),
        DataElement::new(
            tags::INSTANCE_NUMBER,
            VR::IS,
            instance.to_string().as_str(),
        ),
    ]
}

fn image_elements(samples: &[u8]) -> Vec<DataElement<InMemDicomObject>> {
    vec![
        DataElement::new(
            tags::SAMPLES_PER_PIXEL,
            VR::US,
            PrimitiveValue::from(1_u16),
        ),
        DataElement::new(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"),
        DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(2_u16)),
        DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(2_u16)),
        DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(8_u16)),
        DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(8_u16)),
        DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(7_u16)),
        DataElement::new(
            tags::PIXEL_REPRESENTATION,
            VR::US,
            PrimitiveValue::from(0_u16),
        ),
        DataElement::new(
            tags::PIXEL_DATA,
            VR::OB,
            PrimitiveValue::from(samples.to_vec()),
        ),
    ]
}

fn write_object(path: &Path, elements: Vec<DataElement<InMemDicomObject>>) {
    let object = InMemDicomObject::from_element_iter(elements);
    let sop_instance_uid = object
        .string_value(tags::SOP_INSTANCE_UID)
        .expect("fixture has an instance UID");
    let file = object
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                .media_storage_sop_instance_uid(sop_instance_uid.as_str()),
        )
        .expect("fixture meta should be complete");
    file.write_to_file(path).expect("fixture should be written");
}

fn write_image(dir: &Path, name: &str, instance: u16, samples: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut elements = identified_elements(instance);
    elements.extend(image_elements(samples));
    write_object(&path, elements);
    path
}

#[test]
fn batch_anonymization_isolates_corrupt_files() {
    let dir = tempfile::tempdir().unwrap();
    write_image(dir.path(), "IM001.dcm", 1, &[1, 2, 3, 4]);
    write_image(dir.path(), "IM002.dcm", 2, &[5, 6, 7, 8]);
    fs::write(dir.path().join("IM003.dcm"), b"definitely not DICOM").unwrap();
    write_image(dir.path(), "IM004.dcm", 4, &[9, 10, 11, 12]);
    write_image(dir.path(), "IM005.dcm", 5, &[13, 14, 15, 16]);

    let policy = AnonymizationPolicy::default();
    let summary = anonymize_directory(dir.path(), &policy).unwrap();

    assert_eq!(summary.succeeded(), 4);
    assert_eq!(summary.failed(), 1);
    assert!(summary.failures[0].0.ends_with("IM003.dcm"));

    let output_dir = dir.path().join("Anonymized");
    let mut written: Vec<String> = fs::read_dir(&output_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    written.sort();
    assert_eq!(
        written,
        vec![
            "IM001_anon.dcm",
            "IM002_anon.dcm",
            "IM004_anon.dcm",
            "IM005_anon.dcm"
        ]
    );

    for output in &summary.outputs {
        let report = validate_file(output, &policy).unwrap();
        assert!(report.passed(), "{report}");

        let object = open_file(output).unwrap();
        assert!(!object.contains(tags::PATIENT_NAME));
        assert!(!object.contains(tags::PATIENT_ID));
        assert_eq!(object.string_value(tags::PATIENT_SEX).as_deref(), Some("M"));
        let uid = object.string_value(tags::SOP_INSTANCE_UID).unwrap();
        assert!(uid.starts_with("2.25."));
    }
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn single_file_leaves_only_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_image(dir.path(), "IM001.dcm", 1, &[1, 2, 3, 4]);

    let output = anonymize_file(&input, &AnonymizationPolicy::default()).unwrap();
    assert!(output.ends_with("Anonymized/IM001_anon.dcm"));
    assert_eq!(dir_entries(&dir.path().join("Anonymized")), vec!["IM001_anon.dcm"]);
}

#[test]
fn failed_write_leaves_no_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_image(dir.path(), "IM001.dcm", 1, &[1, 2, 3, 4]);
    // a directory in place of the output file makes the final rename fail
    let blocked = dir.path().join("Anonymized").join("IM001_anon.dcm");
    fs::create_dir_all(&blocked).unwrap();

    assert!(anonymize_file(&input, &AnonymizationPolicy::default()).is_err());
    assert_eq!(dir_entries(&dir.path().join("Anonymized")), vec!["IM001_anon.dcm"]);
    assert!(blocked.is_dir());
    assert!(fs::read_dir(&blocked).unwrap().next().is_none());
}

#[test]
fn original_files_fail_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "IM001.dcm", 1, &[1, 2, 3, 4]);

    let report = validate_file(&path, &AnonymizationPolicy::default()).unwrap();
    assert!(!report.passed());
    assert_eq!(report.file_name.as_deref(), Some("IM001.dcm"));
    let name_check = report.check("Patient's Name").unwrap();
    assert_eq!(name_check.status, CheckStatus::Fail);
}

#[test]
fn unparseable_file_fails_validation_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.dcm");
    fs::write(&path, b"not DICOM either").unwrap();

    assert!(validate_file(&path, &AnonymizationPolicy::default()).is_err());
}

#[test]
fn volume_skips_non_image_files() {
    let dir = tempfile::tempdir().unwrap();
    write_image(dir.path(), "b.dcm", 1, &[5, 6, 7, 8]);
    write_image(dir.path(), "A.dcm", 3, &[1, 2, 3, 4]);
    write_image(dir.path(), "c.DCM", 2, &[9, 10, 11, 12]);
    write_object(&dir.path().join("a2.dcm"), identified_elements(9));
    fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let volume = VolumeLoader::load_from_directory(dir.path(), SortBy::FileName).unwrap();
    assert_eq!(volume.dim(), (3, 2, 2));

    let names: Vec<_> = volume
        .files
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["A.dcm", "b.dcm", "c.DCM"]);

    let sagittal: Vec<i32> = volume.sagittal(0).iter().copied().collect();
    assert_eq!(sagittal, vec![1, 3, 5, 7, 9, 11]);
    assert_eq!(volume.clamp_index(10, Orientation::Axial), 2);
}

#[test]
fn volume_can_follow_instance_numbers() {
    let dir = tempfile::tempdir().unwrap();
    write_image(dir.path(), "b.dcm", 1, &[5, 6, 7, 8]);
    write_image(dir.path(), "A.dcm", 3, &[1, 2, 3, 4]);
    write_image(dir.path(), "c.dcm", 2, &[9, 10, 11, 12]);

    let volume = VolumeLoader::load_from_directory(dir.path(), SortBy::InstanceNumber).unwrap();
    let axial: Vec<i32> = volume.axial(0).iter().copied().collect();
    assert_eq!(axial, vec![5, 6, 7, 8]);
    assert!(volume.files[2].ends_with("A.dcm"));
}

#[test]
fn corrupt_slice_aborts_volume() {
    let dir = tempfile::tempdir().unwrap();
    write_image(dir.path(), "IM001.dcm", 1, &[1, 2, 3, 4]);
    fs::write(dir.path().join("IM002.dcm"), b"garbage").unwrap();

    let err = VolumeLoader::load_from_directory(dir.path(), SortBy::FileName).unwrap_err();
    assert!(matches!(err, VolumeLoaderError::Dicom { .. }));
}

#[test]
fn empty_directory_has_no_volume() {
    let dir = tempfile::tempdir().unwrap();
    let err = VolumeLoader::load_from_directory(dir.path(), SortBy::FileName).unwrap_err();
    assert!(matches!(err, VolumeLoaderError::EmptyVolume));
}
