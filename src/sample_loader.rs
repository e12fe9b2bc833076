//! Validation-set access: reads the image and mask batches once and slices
//! single samples out of them.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use ndarray::ArrayD;
use ndarray_npy::NpzReader;

use crate::common::{Sample, Shape4D};
use crate::error::EvalError;
use crate::Result;

pub const IMAGES_KEY: &str = "imgs_validation";
pub const MASKS_KEY: &str = "msks_validation";

/// A container of named n-dimensional arrays.
pub trait DatasetArchive {
    /// Names of every array stored in the archive.
    fn names(&mut self) -> Result<Vec<String>>;

    /// Shape and row-major data of the named array, as 64-bit floats.
    fn read_f64(&mut self, name: &str) -> Result<(Vec<usize>, Vec<f64>)>;
}

/// `.npz` archive as written by `numpy.savez`.
pub struct NpzArchive<R: Read + Seek> {
    npz: NpzReader<R>,
}

impl NpzArchive<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            EvalError::DataUnavailable(format!("cannot open {}: {e}", path.display()))
        })?;
        Self::new(file)
    }
}

impl<R: Read + Seek> NpzArchive<R> {
    pub fn new(reader: R) -> Result<Self> {
        let npz = NpzReader::new(reader)
            .map_err(|e| EvalError::DataUnavailable(format!("not an npz archive: {e}")))?;
        Ok(Self { npz })
    }

    fn read_array(&mut self, entry: &str) -> Result<ArrayD<f64>> {
        self.npz
            .by_name(entry)
            .map_err(|e| EvalError::DataUnavailable(format!("cannot read array {entry}: {e}")))
    }
}

impl<R: Read + Seek> DatasetArchive for NpzArchive<R> {
    fn names(&mut self) -> Result<Vec<String>> {
        self.npz
            .names()
            .map_err(|e| EvalError::DataUnavailable(format!("cannot list npz entries: {e}")))
    }

    fn read_f64(&mut self, name: &str) -> Result<(Vec<usize>, Vec<f64>)> {
        // numpy stores `name` as the zip entry `name.npy`
        let plain = name.strip_suffix(".npy").unwrap_or(name).to_string();
        let suffixed = format!("{plain}.npy");
        let array = match self.read_array(name) {
            Ok(array) => array,
            Err(_) if name == plain => self.read_array(&suffixed)?,
            Err(_) => self.read_array(&plain)?,
        };

        let dims = array.shape().to_vec();
        let data = if array.is_standard_layout() {
            array.into_raw_vec_and_offset().0
        } else {
            array.iter().copied().collect()
        };
        Ok((dims, data))
    }
}

/// Archive held in memory. Useful for tests and for callers that already have
/// the arrays loaded.
#[derive(Debug, Default, Clone)]
pub struct MemoryArchive {
    arrays: BTreeMap<String, (Vec<usize>, Vec<f64>)>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_array(mut self, name: &str, dims: &[usize], data: Vec<f64>) -> Self {
        self.arrays.insert(name.to_string(), (dims.to_vec(), data));
        self
    }
}

impl DatasetArchive for MemoryArchive {
    fn names(&mut self) -> Result<Vec<String>> {
        Ok(self.arrays.keys().cloned().collect())
    }

    fn read_f64(&mut self, name: &str) -> Result<(Vec<usize>, Vec<f64>)> {
        self.arrays
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::DataUnavailable(format!("no array named {name}")))
    }
}

/// The whole validation batch, read exactly once.
#[derive(Debug, Clone)]
pub struct SampleLoader {
    images: Vec<f64>,
    masks: Vec<f64>,
    image_shape: Shape4D,
    mask_shape: Shape4D,
}

impl SampleLoader {
    pub fn open_npz<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut archive = NpzArchive::open(path)?;
        Self::from_archive(&mut archive)
    }

    pub fn from_archive<A: DatasetArchive>(archive: &mut A) -> Result<Self> {
        let names = archive.names()?;
        let has = |key: &str| {
            names
                .iter()
                .any(|n| n == key || n.strip_suffix(".npy") == Some(key))
        };
        for key in [IMAGES_KEY, MASKS_KEY] {
            if !has(key) {
                return Err(EvalError::DataUnavailable(format!(
                    "archive has no `{key}` array (found: {})",
                    names.join(", ")
                )));
            }
        }

        let (images, image_shape) = read_batch(archive, IMAGES_KEY)?;
        let (masks, mask_shape) = read_batch(archive, MASKS_KEY)?;
        if image_shape.count != mask_shape.count {
            log::warn!(
                "`{IMAGES_KEY}` holds {} samples but `{MASKS_KEY}` holds {}",
                image_shape.count,
                mask_shape.count
            );
        }
        log::info!("Numpy arrays loaded");
        log::info!("Input Shape: {image_shape}");
        log::info!("Output Shape: {mask_shape}");

        Ok(Self {
            images,
            masks,
            image_shape,
            mask_shape,
        })
    }

    pub fn image_shape(&self) -> Shape4D {
        self.image_shape
    }

    pub fn mask_shape(&self) -> Shape4D {
        self.mask_shape
    }

    pub fn batch_count(&self) -> usize {
        self.image_shape.count
    }

    /// Clamps into `[0, batch_count]`. The upper bound is one past the last
    /// sample; loading it fails with `DataUnavailable`.
    pub fn clamp_index(&self, index: i64) -> usize {
        let upper = self.batch_count();
        if index < 0 {
            0
        } else if index as u64 > upper as u64 {
            upper
        } else {
            index as usize
        }
    }

    pub fn load(&self, index: i64) -> Result<Sample> {
        let img_index = self.clamp_index(index);
        if img_index as i64 != index {
            log::warn!("Requested image index {index} clamped to {img_index}");
        }

        let image = slice_sample(&self.images, self.image_shape, img_index, IMAGES_KEY)?;
        let mask = slice_sample(&self.masks, self.mask_shape, img_index, MASKS_KEY)?;
        log::debug!("Finished reading sample {img_index}");

        Ok(Sample {
            index: img_index,
            image,
            mask,
            image_shape: self.image_shape.single(),
            mask_shape: self.mask_shape.single(),
        })
    }
}

fn read_batch<A: DatasetArchive>(archive: &mut A, key: &str) -> Result<(Vec<f64>, Shape4D)> {
    let (dims, data) = archive.read_f64(key)?;
    let shape = Shape4D::from_dims(&dims).ok_or_else(|| {
        EvalError::DataUnavailable(format!("`{key}` must be 4-D, got dims {dims:?}"))
    })?;
    let total = shape
        .checked_sample_len()
        .and(shape.checked_total_len())
        .ok_or_else(|| EvalError::DataUnavailable(format!("`{key}` dims {dims:?} overflow")))?;
    if data.len() != total {
        return Err(EvalError::DataUnavailable(format!(
            "`{key}` holds {} values but its shape needs {total}",
            data.len()
        )));
    }
    Ok((data, shape))
}

fn slice_sample(data: &[f64], shape: Shape4D, index: usize, key: &str) -> Result<Vec<f64>> {
    let len = shape.sample_len();
    let range = len
        .checked_mul(index)
        .and_then(|start| Some(start..start.checked_add(len)?));
    range
        .and_then(|r| data.get(r))
        .map(<[f64]>::to_vec)
        .ok_or_else(|| {
            EvalError::DataUnavailable(format!(
                "`{key}` sample {index} of {len} values lies outside the {} loaded values",
                data.len()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(count: usize) -> MemoryArchive {
        let (h, w) = (2, 3);
        let images = (0..count * h * w * 2).map(|x| x as f64).collect();
        let masks = (0..count * h * w).map(|x| (x % 2) as f64).collect();
        MemoryArchive::new()
            .with_array(IMAGES_KEY, &[count, h, w, 2], images)
            .with_array(MASKS_KEY, &[count, h, w, 1], masks)
    }

    #[test]
    fn image_and_mask_shapes_may_differ() {
        let loader = SampleLoader::from_archive(&mut archive(3)).unwrap();
        let sample = loader.load(1).unwrap();
        assert_eq!(sample.image.len(), 2 * 3 * 2);
        assert_eq!(sample.mask.len(), 2 * 3);
        assert_eq!(sample.image[0], 12.0);
        assert_eq!(sample.image_shape, Shape4D::new(1, 2, 3, 2));
        assert_eq!(sample.mask_shape, Shape4D::new(1, 2, 3, 1));
    }

    #[test]
    fn negative_index_loads_first_sample() {
        let loader = SampleLoader::from_archive(&mut archive(3)).unwrap();
        let a = loader.load(-5).unwrap();
        let b = loader.load(0).unwrap();
        assert_eq!(a.index, 0);
        assert_eq!(a.image, b.image);
        assert_eq!(a.mask, b.mask);
    }

    #[test]
    fn index_clamps_to_batch_count() {
        let loader = SampleLoader::from_archive(&mut archive(3)).unwrap();
        assert_eq!(loader.clamp_index(3), 3);
        assert_eq!(loader.clamp_index(103), 3);
        assert_eq!(loader.clamp_index(i64::MAX), 3);
        assert_eq!(loader.clamp_index(2), 2);
    }

    #[test]
    fn one_past_last_sample_is_unavailable() {
        let loader = SampleLoader::from_archive(&mut archive(3)).unwrap();
        assert!(matches!(loader.load(3), Err(EvalError::DataUnavailable(_))));
        assert!(matches!(loader.load(103), Err(EvalError::DataUnavailable(_))));
    }

    #[test]
    fn missing_mask_array_is_unavailable() {
        let mut archive = MemoryArchive::new().with_array(IMAGES_KEY, &[1, 1, 1, 1], vec![0.0]);
        let err = SampleLoader::from_archive(&mut archive).unwrap_err();
        assert!(matches!(err, EvalError::DataUnavailable(msg) if msg.contains(MASKS_KEY)));
    }

    #[test]
    fn non_4d_array_is_unavailable() {
        let mut archive = MemoryArchive::new()
            .with_array(IMAGES_KEY, &[4, 4], vec![0.0; 16])
            .with_array(MASKS_KEY, &[1, 4, 4, 1], vec![0.0; 16]);
        assert!(matches!(
            SampleLoader::from_archive(&mut archive),
            Err(EvalError::DataUnavailable(_))
        ));
    }

    #[test]
    fn overflowing_dims_are_unavailable() {
        let mut archive = MemoryArchive::new()
            .with_array(IMAGES_KEY, &[usize::MAX, 4, 4, 1], Vec::new())
            .with_array(MASKS_KEY, &[1, 4, 4, 1], vec![0.0; 16]);
        assert!(matches!(
            SampleLoader::from_archive(&mut archive),
            Err(EvalError::DataUnavailable(msg)) if msg.contains("overflow")
        ));

        let mut archive = MemoryArchive::new()
            .with_array(IMAGES_KEY, &[0, usize::MAX, 2, 1], Vec::new())
            .with_array(MASKS_KEY, &[1, 4, 4, 1], vec![0.0; 16]);
        assert!(matches!(
            SampleLoader::from_archive(&mut archive),
            Err(EvalError::DataUnavailable(_))
        ));
    }

    #[test]
    fn short_mask_batch_loads_until_it_runs_out() {
        let mut archive = MemoryArchive::new()
            .with_array(IMAGES_KEY, &[3, 2, 2, 1], vec![0.0; 12])
            .with_array(MASKS_KEY, &[2, 2, 2, 1], vec![1.0; 8]);
        let loader = SampleLoader::from_archive(&mut archive).unwrap();
        assert_eq!(loader.batch_count(), 3);
        assert!(loader.load(1).is_ok());
        assert!(matches!(loader.load(2), Err(EvalError::DataUnavailable(msg)) if msg.contains(MASKS_KEY)));
    }

    #[test]
    fn channelless_mask_loads() {
        let mut archive = MemoryArchive::new()
            .with_array(IMAGES_KEY, &[1, 4, 4, 1], vec![0.0; 16])
            .with_array(MASKS_KEY, &[1, 4, 4, 0], Vec::new());
        let sample = SampleLoader::from_archive(&mut archive).unwrap().load(0).unwrap();
        assert!(sample.mask.is_empty());
        assert_eq!(sample.mask_shape, Shape4D::new(1, 4, 4, 0));
    }

    #[test]
    fn truncated_buffer_is_unavailable() {
        let mut archive = MemoryArchive::new()
            .with_array(IMAGES_KEY, &[2, 4, 4, 1], vec![0.0; 20])
            .with_array(MASKS_KEY, &[2, 4, 4, 1], vec![0.0; 32]);
        assert!(matches!(
            SampleLoader::from_archive(&mut archive),
            Err(EvalError::DataUnavailable(_))
        ));
    }
}
