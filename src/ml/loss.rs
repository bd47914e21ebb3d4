// ============================================================
// Layer 5 — Label-Smoothed KL Loss
// ============================================================
// Target distribution per label row, vocabulary size V, ε = smoothing:
//
//   gold token      1 − ε
//   padding column  0
//   every other     ε / (V − 2)
//
// Rows whose label is padding contribute nothing.
//
// KL(t ‖ p) = Σ t·ln t − Σ t·ln p. The first term is the same
// constant for every real row, so only the gold log-probability
// and the row sum of log-probabilities are needed:
//
//   loss_row = C − (1 − ε)·ln p_gold − ε/(V − 2)·(Σ ln p − ln p_pad − ln p_gold)
//
// Reference: Szegedy et al. (2016) Rethinking the Inception Architecture

use burn::prelude::*;

#[derive(Debug, Clone)]
pub struct LabelSmoothing {
    vocab_size:  usize,
    padding_idx: usize,
    smoothing:   f64,
}

impl LabelSmoothing {
    pub fn new(vocab_size: usize, padding_idx: usize, smoothing: f64) -> Self {
        assert!(vocab_size > 2, "label smoothing needs a vocabulary beyond gold and padding");
        Self { vocab_size, padding_idx, smoothing }
    }

    /// Σ t·ln t for one non-padding row.
    fn entropy_term(&self) -> f64 {
        let xlnx = |x: f64| if x > 0.0 { x * x.ln() } else { 0.0 };
        let off  = self.smoothing / (self.vocab_size - 2) as f64;
        xlnx(1.0 - self.smoothing) + (self.vocab_size - 2) as f64 * xlnx(off)
    }

    /// log_probs: [N, V], target: [N] → summed loss, shape [1].
    pub fn forward<B: Backend>(&self, log_probs: Tensor<B, 2>, target: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let [n, v] = log_probs.dims();
        let off = self.smoothing / (self.vocab_size - 2) as f64;

        let gold = log_probs.clone().gather(1, target.clone().reshape([n, 1])).reshape([n]);
        let pad  = log_probs.clone().slice([0..n, self.padding_idx..self.padding_idx + 1]).reshape([n]);
        let all  = log_probs.sum_dim(1).reshape([n]);
        debug_assert_eq!(v, self.vocab_size);

        let others = all - pad - gold.clone();
        let rows = gold.mul_scalar(-(1.0 - self.smoothing))
            .sub(others.mul_scalar(off))
            .add_scalar(self.entropy_term());

        let keep = target.not_equal_elem(self.padding_idx as i32).float();
        (rows * keep).sum()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::activation::log_softmax;

    type TB = NdArray;

    fn scalar(t: Tensor<TB, 1>) -> f32 {
        t.into_scalar().elem::<f32>()
    }

    #[test]
    fn test_no_smoothing_is_gold_nll() {
        let device = Default::default();
        let logits = Tensor::<TB, 2>::from_floats([[1.0, 0.0, 2.0, 0.5], [0.0, 0.0, 0.0, 3.0]], &device);
        let lp     = log_softmax(logits, 1);
        let target = Tensor::<TB, 1, Int>::from_ints([2, 3], &device);

        let expected = -(lp.clone().slice([0..1, 2..3]).into_scalar().elem::<f32>()
            + lp.clone().slice([1..2, 3..4]).into_scalar().elem::<f32>());
        let loss = scalar(LabelSmoothing::new(4, 1, 0.0).forward(lp, target));
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_padding_rows_are_ignored() {
        let device = Default::default();
        let lp     = log_softmax(Tensor::<TB, 2>::from_floats([[0.3, 0.1, 2.0, 0.5], [5.0, 1.0, 0.0, 0.0]], &device), 1);
        let crit   = LabelSmoothing::new(4, 1, 0.1);

        let both   = scalar(crit.forward(lp.clone(), Tensor::from_ints([2, 1], &device)));
        let single = scalar(crit.forward(lp.slice([0..1, 0..4]), Tensor::from_ints([2], &device)));
        assert!((both - single).abs() < 1e-6);
    }

    #[test]
    fn test_perfect_match_has_zero_loss() {
        // p equal to the smoothed target itself
        let device = Default::default();
        let (eps, v) = (0.2f32, 5usize);
        let off  = eps / (v - 2) as f32;
        let row  = [off, 1e-30, 1.0 - eps, off, off];
        let lp   = Tensor::<TB, 2>::from_floats([row], &device).log();
        let loss = scalar(LabelSmoothing::new(v, 1, eps as f64).forward(lp, Tensor::from_ints([2], &device)));
        assert!(loss.abs() < 1e-4);
    }
}
