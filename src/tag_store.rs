use dicom::core::Tag;
use dicom::core::dictionary::{DataDictionary, DataDictionaryEntry};
use dicom::core::header::Header;
use dicom::object::InMemDicomObject;
use dicom_dictionary_std::StandardDataDictionary;

/// Longest value shown in a metadata listing before it gets cut
const MAX_VALUE_LEN: usize = 120;

/// One line of a metadata listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub key: String,
    pub value: String,
}

/// Explicit present/absent lookups on an in-memory DICOM object.
///
/// Every lookup answers `None` when the element is missing or cannot be
/// converted, so callers never rely on errors to test for existence.
pub trait TagLookup {
    /// Whether an element with this tag exists
    fn contains(&self, tag: Tag) -> bool;

    /// The element as a trimmed string
    fn string_value(&self, tag: Tag) -> Option<String>;

    /// The element's value if it holds exactly one number
    fn single_number(&self, tag: Tag) -> Option<f64>;

    /// The element's value as an integer, taking the first value
    fn int_value(&self, tag: Tag) -> Option<i64>;
}

impl TagLookup for InMemDicomObject {
    fn contains(&self, tag: Tag) -> bool {
        self.get(tag).is_some()
    }

    fn string_value(&self, tag: Tag) -> Option<String> {
        let value = self.get(tag)?.to_str().ok()?;
        Some(value.trim().trim_end_matches('\0').to_string())
    }

    fn single_number(&self, tag: Tag) -> Option<f64> {
        let element = self.get(tag)?;
        if element.value().multiplicity() != 1 {
            return None;
        }
        element.to_float64().ok().filter(|value| value.is_finite())
    }

    fn int_value(&self, tag: Tag) -> Option<i64> {
        self.get(tag)?.to_int::<i64>().ok()
    }
}

/// List every element of the object in tag order as display pairs.
///
/// Keys use the standard dictionary alias when the tag is known and the
/// `(gggg,eeee)` form otherwise. Values that cannot be shown as text
/// (sequences) are rendered as their VR in brackets.
pub fn list_tags(object: &InMemDicomObject) -> Vec<TagEntry> {
    object
        .iter()
        .map(|element| {
            let tag = element.tag();
            let key = StandardDataDictionary
                .by_tag(tag)
                .map(|entry| entry.alias().to_string())
                .unwrap_or_else(|| tag.to_string());

            let value = element
                .to_str()
                .map(|value| value.into_owned())
                .unwrap_or_else(|_| format!("[{}]", element.vr()));

            TagEntry {
                key,
                value: truncate_value(value),
            }
        })
        .collect()
}

fn truncate_value(value: String) -> String {
    if value.chars().count() <= MAX_VALUE_LEN {
        return value;
    }
    let mut cut: String = value.chars().take(MAX_VALUE_LEN).collect();
    cut.push_str(" ...");
    cut
}
