// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Filesystem and network concerns shared by the use cases:
//
//   layout.rs          — data/{src,test,eval,models} paths and
//                        idempotent directory creation
//
//   vocab_store.rs     — vocabulary construction and persistence
//                        as a tokenizers JSON file; sentence ↔ ids
//
//   checkpoint.rs      — model weights (gzip MessagePack) and
//                        the per-embedding train config (JSON)
//
//   vectors.rs         — GloVe-style pretrained word vectors
//
//   embedding_store.rs — safetensors file of ELMo embedding pairs
//
//   resources.rs       — local path or cached download for the
//                        ELMo options and weights
//
//   metrics.rs         — per-epoch CSV log
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

pub mod layout;

pub mod vocab_store;

pub mod checkpoint;

pub mod vectors;

pub mod embedding_store;

pub mod resources;

/// Training metrics CSV logger
pub mod metrics;
