use thiserror::Error;

pub type Result<T> = std::result::Result<T, DnnError>;

/// Everything that can go wrong while building, running or training a network.
///
/// None of these are recovered internally. A failure inside a training run aborts the whole run,
/// since a half-applied weight update would leave the network in an unusable state.
#[derive(Debug, Error)]
pub enum DnnError {
    /// Two operands have dimensions that cannot be combined. Shapes are `(rows, columns)`.
    #[error("shape mismatch for {what}: got {got:?}, expected {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        got: (usize, usize),
        expected: (usize, usize),
    },

    /// A batch with no examples, for which averaging over examples is undefined.
    #[error("empty batch: {what} has no examples")]
    EmptyBatch { what: &'static str },

    /// Predictions at exactly 0 or 1 (or non-finite) would make the loss infinite or NaN.
    #[error("numeric degeneracy: {what}")]
    NumericDegeneracy { what: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DnnError {
    pub(crate) fn shape(what: &'static str, got: (usize, usize), expected: (usize, usize)) -> Self {
        DnnError::ShapeMismatch {
            what,
            got,
            expected,
        }
    }
}
