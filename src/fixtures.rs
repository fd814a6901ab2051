//! In-memory DICOM objects shared by the unit tests

use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::object::{DefaultDicomObject, FileMetaTableBuilder, InMemDicomObject};
use dicom_dictionary_std::{tags, uids};

/// Little-endian bytes of 16-bit samples
pub(crate) fn pixel_bytes_u16(samples: &[i32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| (sample as u16).to_le_bytes())
        .collect()
}

/// A monochrome single-frame image in explicit VR little endian
pub(crate) fn image_object(
    rows: u16,
    cols: u16,
    bits: u16,
    signed: bool,
    pixel_bytes: Vec<u8>,
) -> DefaultDicomObject {
    let vr = if bits > 8 { VR::OW } else { VR::OB };
    InMemDicomObject::from_element_iter([
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, uids::CT_IMAGE_STORAGE),
        DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, "1.2.826.0.1.3680043.2.1"),
        DataElement::new(
            tags::SAMPLES_PER_PIXEL,
            VR::US,
            PrimitiveValue::from(1_u16),
        ),
        DataElement::new(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"),
        DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(rows)),
        DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(cols)),
        DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(bits)),
        DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(bits)),
        DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(bits - 1)),
        DataElement::new(
            tags::PIXEL_REPRESENTATION,
            VR::US,
            PrimitiveValue::from(u16::from(signed)),
        ),
        DataElement::new(tags::PIXEL_DATA, vr, PrimitiveValue::from(pixel_bytes)),
    ])
    .with_meta(
        FileMetaTableBuilder::new()
            .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
            .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
            .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1"),
    )
    .expect("fixture meta should be complete")
}
