//! Loss and accuracy of a batch of predictions against its labels.

use crate::error::{DnnError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Zip};

/// Probability floor used by the training loop when it reports the loss.
pub const LOSS_EPSILON: f64 = 1e-12;

/// Binary cross-entropy summed over classes and averaged over examples:
/// `sum(-y·ln(p) - (1-y)·ln(1-p)) / rows`.
///
/// Predictions of exactly 0 or 1, or non-finite ones, are reported as
/// [`DnnError::NumericDegeneracy`] instead of producing an infinite or NaN loss. Use
/// [`compute_loss_clamped`] to evaluate outputs that may saturate.
pub fn compute_loss(y_true: ArrayView2<'_, f64>, y_pred: ArrayView2<'_, f64>) -> Result<f64> {
    check_pair("loss predictions", y_true, y_pred)?;
    if y_pred.iter().any(|&p| !(p > 0.0 && p < 1.0)) {
        return Err(DnnError::NumericDegeneracy {
            what: "predicted probabilities must lie strictly between 0 and 1",
        });
    }
    Ok(cross_entropy(y_true, y_pred))
}

/// Like [`compute_loss`], but first clamps every prediction into `[epsilon, 1 - epsilon]`.
/// `epsilon` must lie in `[0, 0.5)`.
pub fn compute_loss_clamped(
    y_true: ArrayView2<'_, f64>,
    y_pred: ArrayView2<'_, f64>,
    epsilon: f64,
) -> Result<f64> {
    // A NaN or oversized epsilon would leave an empty clamp interval.
    if !(0.0..0.5).contains(&epsilon) {
        return Err(DnnError::InvalidConfig(format!(
            "loss epsilon must lie in [0, 0.5), got {epsilon}"
        )));
    }
    check_pair("loss predictions", y_true, y_pred)?;
    if y_pred.iter().any(|p| p.is_nan()) {
        return Err(DnnError::NumericDegeneracy {
            what: "predicted probabilities contain NaN",
        });
    }
    let clamped: Array2<f64> = y_pred.mapv(|p| p.clamp(epsilon, 1.0 - epsilon));
    Ok(cross_entropy(y_true, clamped.view()))
}

/// Percentage of rows whose most probable predicted class is the labelled class.
pub fn compute_acc(y_true: ArrayView2<'_, f64>, y_pred: ArrayView2<'_, f64>) -> Result<f64> {
    check_pair("accuracy predictions", y_true, y_pred)?;
    if y_true.ncols() < 2 {
        return Err(DnnError::shape(
            "accuracy labels (argmax needs at least two classes)",
            y_true.dim(),
            (y_true.nrows(), 2),
        ));
    }
    let correct = y_true
        .rows()
        .into_iter()
        .zip(y_pred.rows())
        .filter(|(truth, prediction)| argmax(*truth) == argmax(*prediction))
        .count();
    Ok(correct as f64 * 100.0 / y_true.nrows() as f64)
}

/// Index of the largest value in a row. Ties go to the lowest index.
pub fn argmax(row: ArrayView1<'_, f64>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, max), (index, &value)| {
            if value > max { (index, value) } else { (best, max) }
        })
        .0
}

pub fn argmax_rows(matrix: ArrayView2<'_, f64>) -> Vec<usize> {
    matrix.rows().into_iter().map(argmax).collect()
}

fn check_pair(
    what: &'static str,
    y_true: ArrayView2<'_, f64>,
    y_pred: ArrayView2<'_, f64>,
) -> Result<()> {
    if y_pred.dim() != y_true.dim() {
        return Err(DnnError::shape(what, y_pred.dim(), y_true.dim()));
    }
    if y_true.nrows() == 0 {
        return Err(DnnError::EmptyBatch { what });
    }
    Ok(())
}

fn cross_entropy(y_true: ArrayView2<'_, f64>, y_pred: ArrayView2<'_, f64>) -> f64 {
    let total = Zip::from(&y_true)
        .and(&y_pred)
        .fold(0.0, |acc, &y, &p| acc - y * p.ln() - (1.0 - y) * (1.0 - p).ln());
    total / y_true.nrows() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn accuracy_is_all_or_nothing_on_simple_inputs() {
        let y = array![[1.0, 0.0], [0.0, 1.0]];
        let right = array![[0.9, 0.1], [0.2, 0.8]];
        let wrong = array![[0.1, 0.9], [0.8, 0.2]];
        assert_eq!(compute_acc(y.view(), right.view()).unwrap(), 100.0);
        assert_eq!(compute_acc(y.view(), wrong.view()).unwrap(), 0.0);
    }

    #[test]
    fn accuracy_counts_partial_matches() {
        let y = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]];
        let p = array![[0.5, 0.3, 0.2], [0.5, 0.3, 0.2], [0.1, 0.1, 0.8], [0.2, 0.7, 0.1]];
        assert_eq!(compute_acc(y.view(), p.view()).unwrap(), 50.0);
    }

    #[test]
    fn accuracy_needs_two_classes() {
        let y = array![[1.0], [0.0]];
        assert!(matches!(
            compute_acc(y.view(), y.view()),
            Err(DnnError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn loss_matches_hand_computation() {
        let y = array![[1.0, 0.0]];
        let p = array![[0.8, 0.2]];
        let expected = -(0.8f64.ln()) - (0.8f64).ln();
        assert_relative_eq!(compute_loss(y.view(), p.view()).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn loss_is_averaged_over_examples_not_elements() {
        let y = array![[1.0, 0.0], [0.0, 1.0]];
        let p = array![[0.8, 0.2], [0.2, 0.8]];
        let single = compute_loss(array![[1.0, 0.0]].view(), array![[0.8, 0.2]].view()).unwrap();
        assert_relative_eq!(compute_loss(y.view(), p.view()).unwrap(), single, epsilon = 1e-12);
    }

    #[test]
    fn loss_shrinks_as_predictions_approach_targets() {
        let y = array![[0.0, 1.0, 0.0]];
        let mut previous = f64::INFINITY;
        for eps in [0.3, 0.1, 1e-3, 1e-6] {
            let p = array![[eps / 2.0, 1.0 - eps, eps / 2.0]];
            let loss = compute_loss(y.view(), p.view()).unwrap();
            assert!(loss < previous);
            previous = loss;
        }
        assert!(previous < 1e-5);
    }

    #[test]
    fn saturated_predictions_are_surfaced() {
        let y = array![[1.0, 0.0]];
        assert!(matches!(
            compute_loss(y.view(), y.view()),
            Err(DnnError::NumericDegeneracy { .. })
        ));
        let clamped = compute_loss_clamped(y.view(), y.view(), LOSS_EPSILON).unwrap();
        assert!(clamped.is_finite() && clamped < 1e-9);
    }

    #[test]
    fn clamp_epsilon_outside_half_interval_is_rejected() {
        let y = array![[1.0, 0.0]];
        let p = array![[0.7, 0.3]];
        for epsilon in [0.5, 0.6, -1e-3, f64::NAN, f64::INFINITY] {
            assert!(
                matches!(
                    compute_loss_clamped(y.view(), p.view(), epsilon),
                    Err(DnnError::InvalidConfig(_))
                ),
                "epsilon {epsilon}"
            );
        }
        let unclamped = compute_loss_clamped(y.view(), p.view(), 0.0).unwrap();
        assert_relative_eq!(unclamped, compute_loss(y.view(), p.view()).unwrap(), epsilon = 1e-12);
    }

    #[test]
    fn mismatched_or_empty_inputs_fail() {
        let y = array![[1.0, 0.0]];
        let p = array![[0.5, 0.25, 0.25]];
        assert!(matches!(
            compute_loss(y.view(), p.view()),
            Err(DnnError::ShapeMismatch { .. })
        ));
        let empty = Array2::<f64>::zeros((0, 2));
        assert!(matches!(
            compute_acc(empty.view(), empty.view()),
            Err(DnnError::EmptyBatch { .. })
        ));
    }

    #[test]
    fn argmax_prefers_first_of_equal_values() {
        assert_eq!(argmax(array![0.25, 0.25, 0.5].view()), 2);
        assert_eq!(argmax(array![1.0, 1.0, 1.0].view()), 0);
    }
}
