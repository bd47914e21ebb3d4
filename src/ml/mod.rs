// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model, loss and training code lives here.
//
//   elmo/        — frozen character-CNN + biLSTM language model
//                  used by `embed`, with its weight loader and
//                  the ContextualEmbedder implementation
//
//   model.rs     — encoder–decoder Transformer (pre-norm,
//                  sinusoidal positions, log-softmax generator)
//
//   loss.rs      — label-smoothed KL divergence, padding ignored
//
//   schedule.rs  — Noam warmup / inverse-sqrt learning rate
//
//   parallel.rs  — one optimiser step spread over several devices
//
//   trainer.rs   — epoch loop: train, checkpoint, validate, log
//
//   inferencer.rs — greedy decoding from a saved checkpoint
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            Peters et al. (2018) Deep contextualized word representations

pub mod elmo;

/// Seq2seq Transformer architecture
pub mod model;

pub mod loss;

pub mod schedule;

pub mod parallel;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Greedy translation from a checkpoint
pub mod inferencer;
