use crate::error::{DnnError, Result};
use ndarray::{Array2, ArrayView2, Axis, concatenate, s};

/// A labelled dataset: one example per row of `inputs`, with the matching one-hot (or soft) label
/// on the same row of `labels`.
#[derive(Debug, Clone)]
pub struct Dataset {
    inputs: Array2<f64>,
    labels: Array2<f64>,
}

impl Dataset {
    pub fn new(inputs: Array2<f64>, labels: Array2<f64>) -> Result<Dataset> {
        if inputs.nrows() != labels.nrows() {
            return Err(DnnError::shape(
                "dataset labels",
                labels.dim(),
                (inputs.nrows(), labels.ncols()),
            ));
        }
        Ok(Dataset { inputs, labels })
    }

    /// Builds a dataset from class indices, one-hot encoding them over `num_classes` columns.
    pub fn from_classes(
        inputs: Array2<f64>,
        classes: &[usize],
        num_classes: usize,
    ) -> Result<Dataset> {
        Dataset::new(inputs, one_hot(classes, num_classes)?)
    }

    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.nrows() == 0
    }

    pub fn inputs(&self) -> ArrayView2<'_, f64> {
        self.inputs.view()
    }

    pub fn labels(&self) -> ArrayView2<'_, f64> {
        self.labels.view()
    }

    /// Splits off the last `count` rows, returning `(remaining, split_off)`.
    pub fn split_tail(self, count: usize) -> Result<(Dataset, Dataset)> {
        if count > self.len() {
            return Err(DnnError::InvalidConfig(format!(
                "cannot split {count} examples off a dataset of {}",
                self.len()
            )));
        }
        let at = self.len() - count;
        let head = Dataset {
            inputs: self.inputs.slice(s![..at, ..]).to_owned(),
            labels: self.labels.slice(s![..at, ..]).to_owned(),
        };
        let tail = Dataset {
            inputs: self.inputs.slice(s![at.., ..]).to_owned(),
            labels: self.labels.slice(s![at.., ..]).to_owned(),
        };
        Ok((head, tail))
    }

    /// A new dataset holding this dataset's rows followed by `other`'s.
    pub fn concat(&self, other: &Dataset) -> Result<Dataset> {
        if other.inputs.ncols() != self.inputs.ncols() {
            return Err(DnnError::shape(
                "appended inputs",
                other.inputs.dim(),
                (other.len(), self.inputs.ncols()),
            ));
        }
        if other.labels.ncols() != self.labels.ncols() {
            return Err(DnnError::shape(
                "appended labels",
                other.labels.dim(),
                (other.len(), self.labels.ncols()),
            ));
        }
        let inputs = concatenate(Axis(0), &[self.inputs.view(), other.inputs.view()])
            .map_err(|err| DnnError::InvalidData(err.to_string()))?;
        let labels = concatenate(Axis(0), &[self.labels.view(), other.labels.view()])
            .map_err(|err| DnnError::InvalidData(err.to_string()))?;
        Ok(Dataset { inputs, labels })
    }

    /// The class index of every row, taken as the argmax of its label.
    pub fn classes(&self) -> Vec<usize> {
        crate::metrics::argmax_rows(self.labels.view())
    }

    /// Row counts per class.
    pub fn class_counts(&self) -> Vec<usize> {
        self.labels
            .map_axis(Axis(0), |column| column.iter().filter(|&&v| v > 0.5).count())
            .to_vec()
    }
}

/// Encodes class indices as rows of a `[classes.len() x num_classes]` matrix with a single 1.0 per
/// row.
pub fn one_hot(classes: &[usize], num_classes: usize) -> Result<Array2<f64>> {
    if let Some(&bad) = classes.iter().find(|&&class| class >= num_classes) {
        return Err(DnnError::InvalidData(format!(
            "class {bad} out of range for {num_classes} classes"
        )));
    }
    Ok(Array2::from_shape_fn((classes.len(), num_classes), |(i, j)| {
        if classes[i] == j { 1.0 } else { 0.0 }
    }))
}
