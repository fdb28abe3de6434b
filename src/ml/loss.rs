// ============================================================
// Layer 5 — Masked Cross-Entropy Loss
// ============================================================
// Both heads are trained with cross-entropy where targets equal
// to the ignore index contribute nothing:
//
//   loss_head = - Σ_i valid_i · log softmax(logits_i)[target_i]
//               ─────────────────────────────────────────────
//                          max(1, Σ_i valid_i)
//
//   loss = (loss_browse_node + loss_brand) / 2
//
// Ignored targets are replaced by class 0 before the gather so
// the index stays in range; their weight is zero anyway. A batch
// where every target is ignored yields 0, not NaN.

use burn::{prelude::*, tensor::activation::log_softmax};

use crate::data::batcher::ProductBatch;
use crate::domain::IGNORE_INDEX;
use crate::ml::model::ClassifierOutput;

/// Combines the per-head losses of a forward pass into one scalar.
pub trait LossFn<B: Backend> {
    fn loss(&self, output: &ClassifierOutput<B>, batch: &ProductBatch<B>) -> Tensor<B, 1>;

    /// Target value excluded from loss and accuracy
    fn ignore_index(&self) -> i64;
}

#[derive(Clone, Debug)]
pub struct MaskedCrossEntropy {
    pub ignore_index: i64,
}

impl Default for MaskedCrossEntropy {
    fn default() -> Self {
        Self { ignore_index: IGNORE_INDEX }
    }
}

impl<B: Backend> LossFn<B> for MaskedCrossEntropy {
    fn loss(&self, output: &ClassifierOutput<B>, batch: &ProductBatch<B>) -> Tensor<B, 1> {
        let node_loss = masked_cross_entropy(
            output.browse_node_logits.clone(),
            batch.browse_nodes.clone(),
            self.ignore_index,
        );
        let brand_loss = masked_cross_entropy(
            output.brand_logits.clone(),
            batch.brands.clone(),
            self.ignore_index,
        );
        (node_loss + brand_loss) / 2.0
    }

    fn ignore_index(&self) -> i64 {
        self.ignore_index
    }
}

/// logits: [batch, classes], targets: [batch] → mean loss over valid targets, shape [1]
pub fn masked_cross_entropy<B: Backend>(
    logits:       Tensor<B, 2>,
    targets:      Tensor<B, 1, Int>,
    ignore_index: i64,
) -> Tensor<B, 1> {
    let [batch_size, _] = logits.dims();

    let valid   = targets.clone().not_equal_elem(ignore_index);
    let safe    = targets.mask_fill(valid.clone().bool_not(), 0);
    let weights = valid.float();

    let log_probs = log_softmax(logits, 1);
    let picked    = log_probs
        .gather(1, safe.reshape([batch_size, 1]))
        .reshape([batch_size]);

    let total = (picked * weights.clone()).sum().neg();
    let count = weights.sum().clamp_min(1.0);
    total / count
}

/// (correct, counted) predictions, skipping ignored targets
pub fn masked_accuracy<B: Backend>(
    logits:       Tensor<B, 2>,
    targets:      Tensor<B, 1, Int>,
    ignore_index: i64,
) -> (usize, usize) {
    let [batch_size, _] = logits.dims();

    // argmax(1) returns shape [batch, 1] — flatten to [batch]
    let preds   = logits.argmax(1).reshape([batch_size]);
    let valid   = targets.clone().not_equal_elem(ignore_index).int();
    let correct = preds.equal(targets).int() * valid.clone();

    let correct: i64 = correct.sum().into_scalar().elem::<i64>();
    let counted: i64 = valid.sum().into_scalar().elem::<i64>();
    (correct as usize, counted as usize)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::loss::CrossEntropyLossConfig;

    type TestBackend = NdArray;

    fn logits(values: Vec<f32>, rows: usize) -> Tensor<TestBackend, 2> {
        let cols = values.len() / rows;
        Tensor::from_data(TensorData::new(values, [rows, cols]), &Default::default())
    }

    fn targets(values: Vec<i64>) -> Tensor<TestBackend, 1, Int> {
        let n = values.len();
        Tensor::from_data(TensorData::new(values, [n]), &Default::default())
    }

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar().elem::<f32>()
    }

    #[test]
    fn test_matches_plain_cross_entropy_without_ignored_targets() {
        let l = logits(vec![1.0, 2.0, 3.0, 0.5, -1.0, 2.0], 2);
        let t = targets(vec![2, 0]);

        let ce = CrossEntropyLossConfig::new().init(&Default::default());
        let expected = scalar(ce.forward(l.clone(), t.clone()));
        let actual   = scalar(masked_cross_entropy(l, t, IGNORE_INDEX));
        assert!((expected - actual).abs() < 1e-5, "{expected} vs {actual}");
    }

    #[test]
    fn test_ignored_target_does_not_contribute() {
        let with_ignored = masked_cross_entropy(
            logits(vec![1.0, 2.0, 3.0, 5.0, 0.0, 0.0], 2),
            targets(vec![2, IGNORE_INDEX]),
            IGNORE_INDEX,
        );
        let alone = masked_cross_entropy(
            logits(vec![1.0, 2.0, 3.0], 1),
            targets(vec![2]),
            IGNORE_INDEX,
        );
        assert!((scalar(with_ignored) - scalar(alone)).abs() < 1e-6);
    }

    #[test]
    fn test_all_ignored_gives_zero() {
        let loss = masked_cross_entropy(
            logits(vec![1.0, 2.0, 0.0, 4.0], 2),
            targets(vec![IGNORE_INDEX, IGNORE_INDEX]),
            IGNORE_INDEX,
        );
        let value = scalar(loss);
        assert!(value.is_finite());
        assert_eq!(value, 0.0);
    }

    #[test]
    fn test_accuracy_skips_ignored_targets() {
        // predictions: 2, 0, 1
        let l = logits(vec![0.0, 0.0, 9.0, 9.0, 0.0, 0.0, 0.0, 9.0, 0.0], 3);
        let (correct, counted) = masked_accuracy(l, targets(vec![2, IGNORE_INDEX, 0]), IGNORE_INDEX);
        assert_eq!(counted, 2);
        assert_eq!(correct, 1);
    }
}
