// ============================================================
// Layer 4 — Sentence Normaliser
// ============================================================
// Turns one raw corpus field into the token sequence the
// embedder sees.
//
// Cleaning steps (applied in order):
//   1. Trim, NFD-decompose, strip combining marks, lowercase
//      (done by a `tokenizers` normaliser sequence, so accented
//      letters become their plain ASCII base letter)
//   2. Put a space in front of every `.`, `!` and `?`
//   3. Collapse every run of characters outside [a-z.!?]
//      into a single space
//   4. Split on whitespace
//
// Example:
//   "Café,  c'est FINI!"  →  "cafe c est fini !"
//                         →  ["cafe", "c", "est", "fini", "!"]
//
// Reference: Rust Book §8 (Strings in Rust)
//            tokenizers crate — normalizers module

use anyhow::Result;
use tokenizers::normalizers::{Lowercase, Sequence, StripAccents, NFD};
use tokenizers::{NormalizedString, Normalizer};

pub struct Preprocessor {
    /// Unicode part of the pipeline (steps 1)
    unicode: Sequence,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self {
            unicode: Sequence::new(vec![NFD.into(), StripAccents.into(), Lowercase.into()]),
        }
    }

    /// Normalise a raw sentence into a single space-separated string.
    pub fn normalize(&self, text: &str) -> Result<String> {
        let mut normalized = NormalizedString::from(text.trim());
        self.unicode
            .normalize(&mut normalized)
            .map_err(|e| anyhow::anyhow!("Normalisation error: {e}"))?;

        let ascii  = normalized.get();
        let mut out = String::with_capacity(ascii.len() + 8);
        // true while we are inside a run of separator characters
        let mut in_gap = false;

        for c in ascii.chars() {
            match c {
                '.' | '!' | '?' => {
                    if !in_gap {
                        out.push(' ');
                    }
                    out.push(c);
                    in_gap = false;
                }
                c if c.is_ascii_alphabetic() => {
                    out.push(c);
                    in_gap = false;
                }
                _ => {
                    if !in_gap {
                        out.push(' ');
                        in_gap = true;
                    }
                }
            }
        }

        Ok(out)
    }

    /// Normalise and split into tokens.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        Ok(self
            .normalize(text)?
            .split_whitespace()
            .map(str::to_string)
            .collect())
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
