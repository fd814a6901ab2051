use crate::enums::Orientation;
use crate::window::{WindowLevel, to_grayscale};

use image::{ImageBuffer, Luma};
use ndarray::{Array3, ArrayView2, s};
use std::path::PathBuf;

/// Grid of stored sample values, indexed (depth, rows, cols)
#[derive(Debug, Clone)]
pub struct Volume {
    pub data: Array3<i32>,
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    /// Source file of every axial slice, in slice order
    pub files: Vec<PathBuf>,
}

impl Volume {
    pub fn new(data: Array3<i32>, rescale: (f64, f64), files: Vec<PathBuf>) -> Self {
        Self {
            data,
            rescale_slope: rescale.0,
            rescale_intercept: rescale.1,
            files,
        }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<i32> {
        &self.data
    }

    /// Number of positions along the axis the orientation slices through
    pub fn axis_len(&self, orientation: Orientation) -> usize {
        let (depth, height, width) = self.dim();
        match orientation {
            Orientation::Axial => depth,
            Orientation::Coronal => height,
            Orientation::Sagittal => width,
        }
    }

    /// Clamp an index chosen for an earlier volume into this one
    pub fn clamp_index(&self, index: usize, orientation: Orientation) -> usize {
        index.min(self.axis_len(orientation).saturating_sub(1))
    }

    /// Cross-section through the volume. Out of range indices are clamped
    /// to the nearest edge.
    ///
    /// Axial views are (rows, cols); coronal views are (depth, cols) and
    /// sagittal views are (depth, rows), both with the first slice on top.
    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> ArrayView2<'_, i32> {
        let index = self.clamp_index(index, orientation);
        match orientation {
            Orientation::Axial => self.data.slice(s![index, .., ..]),
            Orientation::Coronal => self.data.slice(s![.., index, ..]),
            Orientation::Sagittal => self.data.slice(s![.., .., index]),
        }
    }

    pub fn axial(&self, z: usize) -> ArrayView2<'_, i32> {
        self.get_slice_from_axis(z, Orientation::Axial)
    }

    pub fn coronal(&self, y: usize) -> ArrayView2<'_, i32> {
        self.get_slice_from_axis(y, Orientation::Coronal)
    }

    pub fn sagittal(&self, x: usize) -> ArrayView2<'_, i32> {
        self.get_slice_from_axis(x, Orientation::Sagittal)
    }

    /// Smallest and largest rescaled value in the volume
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let min = *self.data.iter().min()?;
        let max = *self.data.iter().max()?;
        let a = self.rescale(min);
        let b = self.rescale(max);
        Some((a.min(b), a.max(b)))
    }

    #[inline]
    fn rescale(&self, value: i32) -> f64 {
        f64::from(value) * self.rescale_slope + self.rescale_intercept
    }

    /// Windowed 8-bit image of a cross-section
    pub fn get_image_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
        window: WindowLevel,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let slice = self.get_slice_from_axis(index, orientation);
        self.slice_to_image(&slice, window)
    }

    fn slice_to_image(
        &self,
        slice: &ArrayView2<'_, i32>,
        window: WindowLevel,
    ) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (height, width) = slice.dim();
        let samples: Vec<i32> = slice.iter().copied().collect();
        let pixel_data = to_grayscale(
            &samples,
            self.rescale_slope,
            self.rescale_intercept,
            window,
        );
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    /// Three 2x2 slices holding 1..=12
    fn small_volume() -> Volume {
        let data = Array::from_shape_vec((3, 2, 2), (1..=12).collect()).unwrap();
        Volume::new(data, (1.0, 0.0), Vec::new())
    }

    fn flatten(view: ArrayView2<'_, i32>) -> Vec<i32> {
        view.iter().copied().collect()
    }

    #[test]
    fn axial_returns_slice_samples() {
        let volume = small_volume();
        assert_eq!(flatten(volume.axial(1)), vec![5, 6, 7, 8]);
        assert_eq!(volume.axial(1).dim(), (2, 2));
    }

    #[test]
    fn sagittal_is_depth_by_rows() {
        let volume = small_volume();
        let view = volume.sagittal(0);
        assert_eq!(view.dim(), (3, 2));
        assert_eq!(flatten(view), vec![1, 3, 5, 7, 9, 11]);
    }

    #[test]
    fn coronal_is_depth_by_cols() {
        let volume = small_volume();
        let view = volume.coronal(0);
        assert_eq!(view.dim(), (3, 2));
        assert_eq!(flatten(view), vec![1, 2, 5, 6, 9, 10]);
    }

    #[test]
    fn out_of_range_indices_clamp_to_edge() {
        let volume = small_volume();
        assert_eq!(flatten(volume.sagittal(99)), flatten(volume.sagittal(1)));
        assert_eq!(flatten(volume.coronal(99)), vec![3, 4, 7, 8, 11, 12]);
        assert_eq!(flatten(volume.axial(99)), vec![9, 10, 11, 12]);
        assert_eq!(volume.clamp_index(7, Orientation::Axial), 2);
        assert_eq!(volume.clamp_index(1, Orientation::Axial), 1);
    }

    #[test]
    fn value_range_is_rescaled() {
        let mut volume = small_volume();
        assert_eq!(volume.value_range(), Some((1.0, 12.0)));

        volume.rescale_slope = -2.0;
        volume.rescale_intercept = 10.0;
        assert_eq!(volume.value_range(), Some((-14.0, 8.0)));
    }

    #[test]
    fn image_has_view_dimensions() {
        let volume = small_volume();
        let window = WindowLevel::from_range(1.0, 12.0);

        let image = volume
            .get_image_from_axis(0, Orientation::Sagittal, window)
            .unwrap();
        assert_eq!(image.dimensions(), (2, 3));
        assert_eq!(image.get_pixel(0, 0).0, [0]);
        assert!(image.get_pixel(1, 2).0[0] > image.get_pixel(0, 2).0[0]);

        let image = volume
            .get_image_from_axis(2, Orientation::Axial, window)
            .unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(1, 1).0, [255]);
    }
}
