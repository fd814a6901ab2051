use crate::enums::BitDepth;
use crate::tag_store::TagLookup;

use dicom::core::Tag;
use dicom::object::DefaultDicomObject;
use dicom::pixeldata::PixelDecoder;
use dicom_dictionary_std::tags;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("No pixel data element")]
    NoPixelData,

    #[error("Pixel data holds no frames")]
    NoFrames,

    #[error("Unsupported bits allocated: {0}")]
    UnsupportedDepth(i64),

    #[error("Missing or invalid image dimensions")]
    MissingDimensions,

    #[error("Pixel data error: {0}")]
    Pixel(#[from] dicom::pixeldata::Error),
}

/// One decoded image plane
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub rows: usize,
    pub cols: usize,
    pub bit_depth: BitDepth,
    pub signed: bool,
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    /// Row-major samples, always `rows * cols` long
    pub samples: Vec<i32>,
}

impl Slice {
    /// (rows, cols)
    pub fn dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

/// Decode the first frame of an image object.
///
/// Header attributes are checked before the payload is touched, so a
/// missing pixel data element or a bad header fails without decoding.
pub fn decode_slice(object: &DefaultDicomObject) -> Result<Slice, DecodeError> {
    if !object.contains(tags::PIXEL_DATA) {
        return Err(DecodeError::NoPixelData);
    }

    let rows = dimension(object, tags::ROWS)?;
    let cols = dimension(object, tags::COLUMNS)?;

    let rescale_slope = object.single_number(tags::RESCALE_SLOPE).unwrap_or(1.0);
    let rescale_intercept = object
        .single_number(tags::RESCALE_INTERCEPT)
        .unwrap_or(0.0);

    let bits_allocated = object.int_value(tags::BITS_ALLOCATED).unwrap_or(0);
    let bit_depth = BitDepth::try_from(bits_allocated).map_err(DecodeError::UnsupportedDepth)?;
    let signed = object.int_value(tags::PIXEL_REPRESENTATION) == Some(1);

    if matches!(object.int_value(tags::NUMBER_OF_FRAMES), Some(frames) if frames <= 0) {
        return Err(DecodeError::NoFrames);
    }

    let decoded = object.decode_pixel_data()?;

    let len = rows * cols;
    let data = decoded.data();
    let frame = &data[..data.len().min(len * bit_depth.bytes_per_sample())];

    Ok(Slice {
        rows,
        cols,
        bit_depth,
        signed,
        rescale_slope,
        rescale_intercept,
        samples: decode_samples(frame, bit_depth, signed, len),
    })
}

fn dimension(object: &DefaultDicomObject, tag: Tag) -> Result<usize, DecodeError> {
    match object.int_value(tag) {
        Some(value) if value > 0 => Ok(value as usize),
        _ => Err(DecodeError::MissingDimensions),
    }
}

/// Reinterpret a little-endian byte buffer as `len` integer samples.
///
/// 8-bit samples are unsigned bytes. 16-bit samples are read as `i16` or
/// `u16` depending on `signed`. Reading stops at the end of the buffer and
/// the remaining samples are zero; a dangling odd byte is ignored.
pub fn decode_samples(bytes: &[u8], bit_depth: BitDepth, signed: bool, len: usize) -> Vec<i32> {
    let mut samples: Vec<i32> = match bit_depth {
        BitDepth::Eight => bytes.iter().take(len).map(|&b| i32::from(b)).collect(),
        BitDepth::Sixteen => bytes
            .chunks_exact(2)
            .take(len)
            .map(|pair| {
                let pair = [pair[0], pair[1]];
                if signed {
                    i32::from(i16::from_le_bytes(pair))
                } else {
                    i32::from(u16::from_le_bytes(pair))
                }
            })
            .collect(),
    };
    samples.resize(len, 0);
    samples
}
