// ============================================================
// Layer 6 — Project Directory Layout
// ============================================================
// Every path the `train` and `translate` commands read or write
// is derived from one root directory:
//
//   <root>/data/
//     src/     lang8.train.{src,trg}, lang8.val.{src,trg}
//     test/    lang8.test.src
//     eval/    predictions
//     models/  english.vocab.json, metrics.csv,
//              {emb}_transformer.mpk.gz,
//              {emb}_transformer.config.json

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn src_dir(&self) -> PathBuf {
        self.data_dir().join("src")
    }

    pub fn test_dir(&self) -> PathBuf {
        self.data_dir().join("test")
    }

    pub fn eval_dir(&self) -> PathBuf {
        self.data_dir().join("eval")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.data_dir().join("models")
    }

    /// Corpus prefix, e.g. `data/src/lang8.train`.
    pub fn corpus_prefix(&self, split: &str) -> PathBuf {
        self.src_dir().join(format!("lang8.{split}"))
    }

    /// Default `translate` input.
    pub fn test_source(&self) -> PathBuf {
        self.test_dir().join("lang8.test.src")
    }

    /// Default `translate` output.
    pub fn predictions_path(&self) -> PathBuf {
        self.eval_dir().join("pred.txt")
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.models_dir().join("english.vocab.json")
    }

    /// Checkpoint stem without extension. The recorder appends
    /// `.mpk.gz` with `Path::with_extension`, which would cut at a
    /// dot, so dots in the embedding name become underscores.
    pub fn checkpoint_stem(&self, emb: &str) -> PathBuf {
        self.models_dir().join(format!("{}_transformer", emb.replace('.', "_")))
    }

    /// Create every directory of the layout. Safe to call repeatedly.
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.src_dir(), self.test_dir(), self.eval_dir(), self.models_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Cannot create directory '{}'", dir.display()))?;
        }
        tracing::debug!("Project layout ready under '{}'", self.root.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_is_idempotent() {
        let dir    = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        layout.ensure().unwrap();
        layout.ensure().unwrap();
        assert!(layout.models_dir().is_dir());
        assert!(layout.eval_dir().is_dir());
    }

    #[test]
    fn test_checkpoint_stem_has_no_dots() {
        let layout = ProjectLayout::new("/r");
        assert_eq!(
            layout.checkpoint_stem("glove.6B.200d"),
            PathBuf::from("/r/data/models/glove_6B_200d_transformer")
        );
    }
}
