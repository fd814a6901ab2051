use crate::enums::SortBy;
use crate::slice::{DecodeError, Slice, decode_slice};
use crate::tag_store::TagLookup;
use crate::volume::Volume;

use dicom::object::{DefaultDicomObject, open_file};
use dicom_dictionary_std::tags;
use log::{debug, info};
use ndarray::{Array3, s};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No DICOM images found")]
    EmptyVolume,

    #[error("Inconsistent image dimensions in {name}: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        name: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error in {path}: {source}")]
    Dicom {
        path: PathBuf,
        #[source]
        source: dicom::object::ReadError,
    },

    #[error("Could not decode {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: DecodeError,
    },
}

/// List the `.dcm` files of a directory in slice order
pub fn list_directory(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths: Vec<_> = fs::read_dir(path)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
        })
        .collect();
    sort_by_file_name(&mut paths);
    Ok(paths)
}

/// Ordinal, case-insensitive file name order
pub fn sort_by_file_name(paths: &mut [PathBuf]) {
    paths.sort_by_cached_key(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_uppercase())
            .unwrap_or_default()
    });
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from DICOM objects already in slice order
    ///
    /// Objects without pixel data are skipped.
    ///
    /// # Errors
    ///
    /// Returns error if no image remains, a slice fails to decode or the
    /// slice dimensions differ
    pub fn load_from_dicom_objects(
        dicom_objects: &[DefaultDicomObject],
    ) -> Result<Volume, VolumeLoaderError> {
        let images: Vec<_> = dicom_objects
            .iter()
            .enumerate()
            .filter(|(_, object)| object.contains(tags::PIXEL_DATA))
            .map(|(i, object)| (format!("object #{i}"), object))
            .collect();

        let (data, rescale) = Self::assemble(&images)?;
        Ok(Volume::new(data, rescale, Vec::new()))
    }

    /// Load a volume from file paths
    ///
    /// The files are ordered by `sort_by`. Files without pixel data are
    /// dropped and the volume keeps the list of the remaining ones.
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let mut paths: Vec<PathBuf> = paths
            .iter()
            .map(|path| path.as_ref().to_path_buf())
            .collect();
        sort_by_file_name(&mut paths);

        let objects: Vec<(PathBuf, DefaultDicomObject)> = paths
            .into_par_iter()
            .map(|path| match open_file(&path) {
                Ok(object) => Ok((path, object)),
                Err(source) => Err(VolumeLoaderError::Dicom { path, source }),
            })
            .collect::<Result<_, _>>()?;

        let mut images: Vec<_> = objects
            .into_iter()
            .filter(|(path, object)| {
                let has_pixels = object.contains(tags::PIXEL_DATA);
                if !has_pixels {
                    debug!("Skipping {} without pixel data", path.display());
                }
                has_pixels
            })
            .collect();

        if matches!(sort_by, SortBy::InstanceNumber) {
            // stable, so equal or missing numbers stay in file name order
            images.sort_by_key(|(_, object)| {
                let number = object.int_value(tags::INSTANCE_NUMBER);
                (number.is_none(), number)
            });
        }

        let named: Vec<_> = images
            .iter()
            .map(|(path, object)| (path.display().to_string(), object))
            .collect();
        let (data, rescale) = Self::assemble(&named)?;

        let files: Vec<PathBuf> = images.into_iter().map(|(path, _)| path).collect();
        info!("Loaded volume {:?} from {} files", data.dim(), files.len());
        Ok(Volume::new(data, rescale, files))
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let paths = list_directory(path.as_ref())?;

        if paths.is_empty() {
            return Err(VolumeLoaderError::EmptyVolume);
        }

        Self::load_from_file_paths(&paths, sort_by)
    }

    /// Decode every image and stack them. The first image fixes the
    /// dimensions and rescale parameters of the volume; any failure aborts.
    fn assemble(
        images: &[(String, &DefaultDicomObject)],
    ) -> Result<(Array3<i32>, (f64, f64)), VolumeLoaderError> {
        let Some(((first_name, first_object), rest)) = images.split_first() else {
            return Err(VolumeLoaderError::EmptyVolume);
        };

        let first = Self::decode(first_name, first_object)?;
        let expected = first.dim();

        let rest: Vec<Slice> = rest
            .par_iter()
            .map(|(name, object)| {
                let slice = Self::decode(name, object)?;
                if slice.dim() != expected {
                    return Err(VolumeLoaderError::DimensionMismatch {
                        name: name.clone(),
                        expected,
                        found: slice.dim(),
                    });
                }
                Ok(slice)
            })
            .collect::<Result<_, _>>()?;

        let rescale = (first.rescale_slope, first.rescale_intercept);
        let slices: Vec<Slice> = std::iter::once(first).chain(rest).collect();
        Ok((Self::build_volume_array(&slices), rescale))
    }

    fn decode(name: &str, object: &DefaultDicomObject) -> Result<Slice, VolumeLoaderError> {
        debug!("Decoding {name}");
        decode_slice(object).map_err(|source| VolumeLoaderError::Decode {
            name: name.to_string(),
            source,
        })
    }

    fn build_volume_array(slices: &[Slice]) -> Array3<i32> {
        let (height, width) = slices[0].dim();
        let depth = slices.len();
        let mut volume = Array3::<i32>::zeros((depth, height, width));

        for (i, slice) in slices.iter().enumerate() {
            volume
                .slice_mut(s![i, .., ..])
                .iter_mut()
                .zip(&slice.samples)
                .for_each(|(voxel, &sample)| *voxel = sample);
        }

        volume
    }
}
