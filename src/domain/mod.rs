// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the system
// works with: sentence pairs and their embeddings.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits

// Sentence pairs and the embedding records produced from them
pub mod sentence_pair;

// Core abstractions (traits) that other layers implement
pub mod traits;
