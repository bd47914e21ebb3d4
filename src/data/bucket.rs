// ============================================================
// Layer 4 — Token-Budget Bucketing
// ============================================================
// Batches are sized by padded token count, not by example count,
// so short sentences travel in large batches and long ones in
// small batches.
//
// Cost of a batch of n examples:
//   n × max(longest source, longest target + 2)
// (the +2 accounts for <s> and </s> on the decoder side).
//
// Training order:
//   shuffle examples
//     → pools of 100 × budget examples
//     → sort each pool by (source len, target len)
//     → cut into batches within the budget
//     → shuffle the batches of each pool
//
// Validation order: sort everything, cut, no shuffling.
//
// Reference: Popel & Bojar (2018) Training Tips for the Transformer Model

use rand::{rngs::StdRng, seq::SliceRandom};

const POOL_FACTOR: usize = 100;

pub struct TokenBudgetBucketer {
    budget: usize,
}

impl TokenBudgetBucketer {
    pub fn new(budget: usize) -> Self {
        Self { budget: budget.max(1) }
    }

    /// Shuffled, pooled batches of indices into `lengths`.
    pub fn train_batches(&self, lengths: &[(usize, usize)], rng: &mut StdRng) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..lengths.len()).collect();
        order.shuffle(rng);

        let mut batches = Vec::new();
        for pool in order.chunks(self.budget * POOL_FACTOR) {
            let mut pool = pool.to_vec();
            pool.sort_by_key(|&i| lengths[i]);
            let mut pooled = self.cut(&pool, lengths);
            pooled.shuffle(rng);
            batches.extend(pooled);
        }
        batches
    }

    /// Deterministic batches of indices into `lengths`.
    pub fn eval_batches(&self, lengths: &[(usize, usize)]) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..lengths.len()).collect();
        // Stable sort keeps corpus order among equal lengths
        order.sort_by_key(|&i| lengths[i]);
        self.cut(&order, lengths)
    }

    /// Greedily cut `order` into consecutive batches whose cost stays
    /// within the budget. An example that alone exceeds the budget
    /// becomes a batch of one.
    fn cut(&self, order: &[usize], lengths: &[(usize, usize)]) -> Vec<Vec<usize>> {
        let mut batches = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let (mut max_src, mut max_tgt) = (0usize, 0usize);

        for &i in order {
            let (src, tgt) = lengths[i];
            let next_src = max_src.max(src);
            let next_tgt = max_tgt.max(tgt + 2);
            let cost     = (current.len() + 1) * next_src.max(next_tgt);

            if cost > self.budget && !current.is_empty() {
                batches.push(std::mem::take(&mut current));
                max_src = src;
                max_tgt = tgt + 2;
            } else {
                max_src = next_src;
                max_tgt = next_tgt;
            }
            current.push(i);
        }
        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }
}
