use dicom::object::InMemDicomObject;
use dicom_dictionary_std::tags;
use rayon::prelude::*;

/// A set of visualization window level parameters
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WindowLevel {
    pub center: f64,
    pub width: f64,
}

impl WindowLevel {
    pub fn new(center: f64, width: f64) -> Self {
        Self { center, width }
    }

    /// The first Window Center / Window Width pair stored in the object
    pub fn from_object(object: &InMemDicomObject) -> Option<Self> {
        let center = object.get(tags::WINDOW_CENTER)?.to_float64().ok()?;
        let width = object.get(tags::WINDOW_WIDTH)?.to_float64().ok()?;
        Some(Self { center, width })
    }

    /// Window mapping `min` to black and `max` to white
    pub fn from_range(min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            center: (min + max) / 2.0 + 0.5,
            width: max - min + 1.0,
        }
    }

    /// Map one stored value to an 8-bit gray level.
    ///
    /// Linear VOI function: `((x - (c - 0.5)) / (w - 1) + 0.5)` clamped to
    /// [0, 1] and scaled to 255. Widths of one or less collapse to a
    /// threshold at the center.
    #[inline]
    pub fn apply(&self, raw: i32, rescale_slope: f64, rescale_intercept: f64) -> u8 {
        let value = f64::from(raw) * rescale_slope + rescale_intercept;
        let center = self.center - 0.5;
        let width = (self.width.max(1.0) - 1.0).max(f64::EPSILON);
        let normalized = ((value - center) / width + 0.5).clamp(0.0, 1.0);
        (normalized * 255.0).round() as u8
    }
}

/// Map raw samples to 8-bit grayscale. The output has the same length as
/// the input.
pub fn to_grayscale(
    samples: &[i32],
    rescale_slope: f64,
    rescale_intercept: f64,
    window: WindowLevel,
) -> Vec<u8> {
    samples
        .par_iter()
        .map(|&raw| window.apply(raw, rescale_slope, rescale_intercept))
        .collect()
}
