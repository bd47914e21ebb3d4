// ============================================================
// Layer 4 — Corpus Loaders
// ============================================================
// Two on-disk corpus shapes are supported:
//
//   1. Tab-separated pairs (used by `embed`)
//        source sentence<TAB>target sentence
//      one pair per line. Each field is normalised and
//      whitespace-tokenised by the Preprocessor.
//
//   2. Parallel files (used by `train` / `translate`)
//        lang8.train.src   ← line i is a source sentence
//        lang8.train.trg   ← line i is its target sentence
//      Lines are only trimmed here; tokenisation happens
//      against the vocabulary in the infra layer.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{bail, Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::data::preprocessor::Preprocessor;
use crate::domain::sentence_pair::SentencePair;
use crate::domain::traits::PairSource;

// ─── Tab-separated pairs ─────────────────────────────────────────────────────

/// Loads sentence pairs from one tab-separated UTF-8 file.
pub struct TsvPairLoader {
    path:  PathBuf,
    /// Keep only the first `limit` pairs when set
    limit: Option<usize>,
    preprocessor: Preprocessor,
}

impl TsvPairLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path:  path.into(),
            limit: None,
            preprocessor: Preprocessor::new(),
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Parse one corpus line into a pair. `line_no` is 1-based and
    /// only used for the error message.
    fn parse_line(&self, line: &str, line_no: usize) -> Result<SentencePair> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 2 {
            bail!(
                "{}:{}: expected 2 tab-separated fields, found {}",
                self.path.display(),
                line_no,
                fields.len()
            );
        }
        Ok(SentencePair::new(
            self.preprocessor.tokenize(fields[0])?,
            self.preprocessor.tokenize(fields[1])?,
        ))
    }
}

impl PairSource for TsvPairLoader {
    fn load_pairs(&self) -> Result<Vec<SentencePair>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read corpus '{}'", self.path.display()))?;

        let mut pairs = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if self.limit.is_some_and(|n| pairs.len() >= n) {
                break;
            }
            // Blank lines carry no pair
            if line.trim().is_empty() {
                continue;
            }
            pairs.push(self.parse_line(line, idx + 1)?);
        }

        tracing::info!("Loaded {} sentence pairs from '{}'", pairs.len(), self.path.display());
        Ok(pairs)
    }
}

// ─── Parallel .src / .trg files ──────────────────────────────────────────────

/// One untokenised example of a parallel corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExample {
    pub source: String,
    pub target: String,
}

/// Loads `<prefix>.src` and `<prefix>.trg` line by line.
pub struct ParallelCorpusLoader {
    prefix: PathBuf,
}

impl ParallelCorpusLoader {
    /// `prefix` is the path without extension, e.g. `data/src/lang8.train`.
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn source_path(&self) -> PathBuf {
        with_suffix(&self.prefix, "src")
    }

    pub fn target_path(&self) -> PathBuf {
        with_suffix(&self.prefix, "trg")
    }

    pub fn load(&self) -> Result<Vec<RawExample>> {
        let src_path = self.source_path();
        let trg_path = self.target_path();
        let src = fs::read_to_string(&src_path)
            .with_context(|| format!("Cannot read '{}'", src_path.display()))?;
        let trg = fs::read_to_string(&trg_path)
            .with_context(|| format!("Cannot read '{}'", trg_path.display()))?;

        let src_lines: Vec<&str> = src.lines().collect();
        let trg_lines: Vec<&str> = trg.lines().collect();
        if src_lines.len() != trg_lines.len() {
            bail!(
                "'{}' has {} lines but '{}' has {}",
                src_path.display(),
                src_lines.len(),
                trg_path.display(),
                trg_lines.len()
            );
        }

        let mut skipped  = 0usize;
        let mut examples = Vec::with_capacity(src_lines.len());
        for (s, t) in src_lines.iter().zip(&trg_lines) {
            let (s, t) = (s.trim(), t.trim());
            if s.is_empty() || t.is_empty() {
                skipped += 1;
                continue;
            }
            examples.push(RawExample { source: s.to_string(), target: t.to_string() });
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} pairs with an empty side in '{}'", skipped, self.prefix.display());
        }
        tracing::info!("Loaded {} examples from '{}'", examples.len(), self.prefix.display());
        Ok(examples)
    }
}

/// Read a plain file of one sentence per line (used for decoding).
pub fn load_lines(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    Ok(text.lines().map(|l| l.trim().to_string()).collect())
}

/// `data/src/lang8.train` + "src" → `data/src/lang8.train.src`.
/// `Path::with_extension` would replace `.train`, so append instead.
fn with_suffix(prefix: &Path, ext: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}
