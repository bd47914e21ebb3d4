// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between raw text files and tensor batches.
//
// `embed` path:
//
//   train.txt (source<TAB>target)
//       │
//       ▼
//   TsvPairLoader     → one SentencePair per line
//       │
//       ▼
//   Preprocessor      → normalise + whitespace tokenise
//       │
//       ▼
//   CharacterMapper   → ELMo character ids per token
//
// `train` path:
//
//   lang8.train.src / lang8.train.trg
//       │
//       ▼
//   ParallelCorpusLoader → RawExample per line pair
//       │
//       ▼
//   Vocabulary (infra)   → <s> ids… </s>
//       │
//       ▼
//   Seq2SeqDataset       → implements Burn's Dataset trait
//       │
//       ▼
//   TokenBudgetBucketer  → index batches within a token budget
//       │
//       ▼
//   Seq2SeqBatcher       → padded tensors per batch
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Tab-separated pairs and parallel .src/.trg files
pub mod loader;

/// Unicode normalisation and whitespace tokenisation
pub mod preprocessor;

/// ELMo character-id encoding
pub mod characters;

/// Implements Burn's Dataset trait for numericalised pairs
pub mod dataset;

/// Token-budget batch construction
pub mod bucket;

/// Implements Burn's Batcher trait with dynamic padding
pub mod batcher;
