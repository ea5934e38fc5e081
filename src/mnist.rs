use crate::data::Dataset;
use crate::error::{DnnError, Result};
use flate2::read::GzDecoder;
use itertools::Itertools;
use ndarray::Array2;
use std::{fs::File, io::Read, path::Path};

pub const NUM_CLASSES: usize = 10;

const IMAGE_MAGIC: u32 = 2051;
const LABEL_MAGIC: u32 = 2049;
const VALIDATION_SIZE: usize = 10000;

/// The MNIST handwritten digits, with the last 10000 training images held back for validation.
/// Every image is one row of 784 grey levels scaled into [0, 1], and every label a one-hot row of
/// 10 entries.
pub struct MnistData {
    pub training: Dataset,
    pub validation: Dataset,
    pub test: Dataset,
}

impl MnistData {
    /// Loads the four gzipped IDX files from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<MnistData> {
        let dir = dir.as_ref();
        let training = read_dataset(
            &dir.join("train-images-idx3-ubyte.gz"),
            &dir.join("train-labels-idx1-ubyte.gz"),
        )?;
        let (training, validation) = training.split_tail(VALIDATION_SIZE)?;
        let test = read_dataset(
            &dir.join("t10k-images-idx3-ubyte.gz"),
            &dir.join("t10k-labels-idx1-ubyte.gz"),
        )?;

        Ok(MnistData {
            training,
            validation,
            test,
        })
    }
}

fn read_gz(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    GzDecoder::new(File::open(path)?).read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn read_dataset(images: &Path, labels: &Path) -> Result<Dataset> {
    images_and_labels_to_dataset(&read_gz(images)?, &read_gz(labels)?)
}

// IDX headers are a run of big-endian u32s: the magic number followed by the dimensions.
fn read_header(bytes: &[u8], count: usize, magic: u32, what: &str) -> Result<Vec<usize>> {
    if bytes.len() < count * 4 {
        return Err(DnnError::InvalidData(format!("{what} file is too short for its header")));
    }
    let header = bytes[..count * 4]
        .chunks_exact(4)
        .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect::<Vec<_>>();
    if header[0] != magic {
        return Err(DnnError::InvalidData(format!(
            "{what} file has magic number {}, expected {magic}",
            header[0]
        )));
    }
    Ok(header[1..].iter().map(|&value| value as usize).collect())
}

/// Parses raw (already decompressed) IDX image and label bytes.
pub fn images_and_labels_to_dataset(image_bytes: &[u8], label_bytes: &[u8]) -> Result<Dataset> {
    let image_header = read_header(image_bytes, 4, IMAGE_MAGIC, "image")?;
    let (images, rows, columns) = (image_header[0], image_header[1], image_header[2]);
    let label_header = read_header(label_bytes, 2, LABEL_MAGIC, "label")?;
    let labels = label_header[0];

    if images != labels {
        return Err(DnnError::InvalidData(format!(
            "{images} images but {labels} labels"
        )));
    }

    // The dimensions come straight from the file, so their products may not fit in a usize.
    let overflow = || {
        DnnError::InvalidData(format!("image dimensions {images}x{rows}x{columns} overflow"))
    };
    let pixels = rows.checked_mul(columns).ok_or_else(overflow)?;
    let image_len = images.checked_mul(pixels).ok_or_else(overflow)?;

    // Everything past the header is payload: one byte per pixel, and one byte per label.
    let image_data = &image_bytes[16..];
    let label_data = &label_bytes[8..];
    if image_data.len() != image_len || label_data.len() != labels {
        return Err(DnnError::InvalidData(format!(
            "expected {images} images of {pixels} pixels, found {} image bytes and {} labels",
            image_data.len(),
            label_data.len()
        )));
    }

    // Grey levels are scaled from 0..=255 into [0, 1], one image per row.
    let mut inputs = Array2::zeros((images, pixels));
    for (mut row, chunk) in inputs
        .rows_mut()
        .into_iter()
        .zip(&image_data.iter().chunks(pixels.max(1)))
    {
        for (value, &byte) in row.iter_mut().zip(chunk) {
            *value = byte as f64 / 255.0;
        }
    }

    // Labels are single digits; `from_classes` rejects anything outside 0..10.
    let classes = label_data.iter().map(|&label| label as usize).collect_vec();
    Dataset::from_classes(inputs, &classes, NUM_CLASSES)
}

/// Prints an ASCII rendering of one 28x28 image and its label, for eyeballing the data.
pub fn visualize(dataset: &Dataset, index: usize) {
    const COLUMNS: usize = 28;

    let inputs = dataset.inputs();
    for (position, value) in inputs.row(index).iter().enumerate() {
        if position % COLUMNS == 0 {
            println!()
        }
        let shade = match value {
            a if *a < 0.2 => ' ',
            a if *a < 0.4 => '░',
            a if *a < 0.6 => '▒',
            a if *a < 0.8 => '▓',
            _ => '█',
        };
        print!("{shade}");
    }
    println!("\nAnswer: {}", dataset.classes()[index]);
}
