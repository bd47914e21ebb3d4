// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one command (embed, train or translate).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// ELMo embedding extraction for a tab-separated corpus
pub mod embed_use_case;

// The training workflow
pub mod train_use_case;

// Greedy correction of a test file
pub mod translate_use_case;
