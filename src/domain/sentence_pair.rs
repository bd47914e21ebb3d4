// ============================================================
// Layer 3 — Sentence Pair Domain Types
// ============================================================
// A sentence pair is one line of the tab-separated corpus:
//   "<source sentence>\t<target sentence>"
// after normalisation and whitespace tokenisation.
//
// The embedding types below are the framework-free shape of
// what the contextual embedder returns for one sentence.
// No Burn tensors live here — the ml layer converts its
// tensors into these plain row-major matrices.

use serde::{Deserialize, Serialize};

/// Two token sequences read from the same corpus line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePair {
    pub source: Vec<String>,
    pub target: Vec<String>,
}

impl SentencePair {
    pub fn new(source: Vec<String>, target: Vec<String>) -> Self {
        Self { source, target }
    }

    /// Both sentences as one batch, source first.
    pub fn as_batch(&self) -> [Vec<String>; 2] {
        [self.source.clone(), self.target.clone()]
    }
}

/// Contextual vectors for every token of one sentence.
/// `values` is row-major with shape `[tokens, dim]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenEmbeddings {
    pub tokens: usize,
    pub dim:    usize,
    pub values: Vec<f32>,
}

impl TokenEmbeddings {
    pub fn new(tokens: usize, dim: usize, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), tokens * dim);
        Self { tokens, dim, values }
    }

    /// The vector of the `index`-th token.
    pub fn row(&self, index: usize) -> &[f32] {
        &self.values[index * self.dim..(index + 1) * self.dim]
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.tokens, self.dim]
    }
}

/// The embedder output for one sentence pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub source: TokenEmbeddings,
    pub target: TokenEmbeddings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_slices_by_dim() {
        let e = TokenEmbeddings::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(e.row(1), &[4.0, 5.0, 6.0]);
        assert_eq!(e.shape(), [2, 3]);
    }

    #[test]
    fn test_batch_keeps_source_first() {
        let p = SentencePair::new(vec!["a".into()], vec!["b".into(), "c".into()]);
        let [src, trg] = p.as_batch();
        assert_eq!(src, vec!["a"]);
        assert_eq!(trg.len(), 2);
    }
}
