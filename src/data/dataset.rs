use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One numericalised parallel example.
/// Both sides are `<s> ids… </s>`, unpadded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seq2SeqSample {
    pub source_ids: Vec<u32>,
    pub target_ids: Vec<u32>,
}

impl Seq2SeqSample {
    pub fn new(source_ids: Vec<u32>, target_ids: Vec<u32>) -> Self {
        Self { source_ids, target_ids }
    }

    /// Token counts without the two boundary ids, as used by the
    /// token budget.
    pub fn token_lengths(&self) -> (usize, usize) {
        (
            self.source_ids.len().saturating_sub(2),
            self.target_ids.len().saturating_sub(2),
        )
    }
}

pub struct Seq2SeqDataset {
    samples: Vec<Seq2SeqSample>,
}

impl Seq2SeqDataset {
    pub fn new(samples: Vec<Seq2SeqSample>) -> Self { Self { samples } }

    /// `(source, target)` token counts of every sample, in order.
    pub fn lengths(&self) -> Vec<(usize, usize)> {
        self.samples.iter().map(Seq2SeqSample::token_lengths).collect()
    }

    /// Clone out the samples at `indices`, skipping any out of range.
    pub fn gather(&self, indices: &[usize]) -> Vec<Seq2SeqSample> {
        indices.iter().filter_map(|&i| self.get(i)).collect()
    }
}

impl Dataset<Seq2SeqSample> for Seq2SeqDataset {
    fn get(&self, index: usize) -> Option<Seq2SeqSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
