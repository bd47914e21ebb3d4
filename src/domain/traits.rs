// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits, not
// against concrete loaders or models:
//   - TsvPairLoader implements PairSource
//   - ElmoEmbedder  implements ContextualEmbedder
//
// Tests substitute small in-memory implementations, and a
// different pretrained embedder only has to implement
// ContextualEmbedder to plug into the `embed` pipeline.

use anyhow::Result;

use crate::domain::sentence_pair::{SentencePair, TokenEmbeddings};

// ─── PairSource ───────────────────────────────────────────────────────────────
/// Anything that yields normalised, tokenised sentence pairs.
pub trait PairSource {
    fn load_pairs(&self) -> Result<Vec<SentencePair>>;
}

// ─── ContextualEmbedder ───────────────────────────────────────────────────────
/// A frozen model mapping a batch of token sequences to one
/// vector per token, in context.
///
/// The returned Vec has one entry per input sentence, in order,
/// and each entry has exactly as many rows as its sentence has
/// tokens (no padding, no sentence-boundary rows).
pub trait ContextualEmbedder {
    fn embed(&self, sentences: &[Vec<String>]) -> Result<Vec<TokenEmbeddings>>;

    /// Width of every returned vector.
    fn output_dim(&self) -> usize;
}
