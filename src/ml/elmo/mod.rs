// ============================================================
// Layer 5 — ELMo
// ============================================================
// Pretrained contextual word embeddings, used frozen by the
// `embed` command.
//
//   options.rs  — published options.json layout
//   network.rs  — char CNN, projected biLSTM, scalar mix
//   weights.rs  — pretrained parameters from HDF5 or safetensors
//   embedder.rs — ContextualEmbedder implementation

pub mod options;

pub mod network;

pub mod weights;

pub mod embedder;
