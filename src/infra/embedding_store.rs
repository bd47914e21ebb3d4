// ============================================================
// Layer 6 — Embedding Artifact Store
// ============================================================
// All embedding records of one `embed` run go into a single
// safetensors file:
//
//   pairs.0.source   [tokens, dim]  f32
//   pairs.0.target   [tokens, dim]  f32
//   pairs.1.source   ...
//
// with string metadata `pairs` (record count) and `dim`.
//
// Reference: huggingface/safetensors file format

use anyhow::{bail, Context, Result};
use safetensors::{tensor::TensorView, Dtype, SafeTensors};
use std::{collections::HashMap, fs, path::PathBuf};

use crate::domain::sentence_pair::{EmbeddingRecord, TokenEmbeddings};

pub struct EmbeddingStore {
    path: PathBuf,
}

fn to_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn to_matrix(st: &SafeTensors<'_>, name: &str) -> Result<TokenEmbeddings> {
    let view = st
        .tensor(name)
        .map_err(|e| anyhow::anyhow!("Missing tensor '{name}': {e:?}"))?;
    if view.dtype() != Dtype::F32 || view.shape().len() != 2 {
        bail!("Tensor '{name}' is not a 2-D f32 matrix");
    }
    let values = view
        .data()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(TokenEmbeddings::new(view.shape()[0], view.shape()[1], values))
}

impl EmbeddingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn save(&self, records: &[EmbeddingRecord]) -> Result<()> {
        let dim = records.first().map(|r| r.source.dim).unwrap_or(0);

        // Buffers must outlive the views that borrow them
        let mut buffers: Vec<(String, [usize; 2], Vec<u8>)> = Vec::with_capacity(records.len() * 2);
        for (i, record) in records.iter().enumerate() {
            for (side, emb) in [("source", &record.source), ("target", &record.target)] {
                buffers.push((format!("pairs.{i}.{side}"), emb.shape(), to_bytes(&emb.values)));
            }
        }

        let mut views = Vec::with_capacity(buffers.len());
        for (name, shape, bytes) in &buffers {
            let view = TensorView::new(Dtype::F32, shape.to_vec(), bytes)
                .map_err(|e| anyhow::anyhow!("Bad tensor '{name}': {e:?}"))?;
            views.push((name.clone(), view));
        }

        let metadata: HashMap<String, String> = HashMap::from([
            ("pairs".to_string(), records.len().to_string()),
            ("dim".to_string(), dim.to_string()),
        ]);

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        }
        safetensors::serialize_to_file(views, &Some(metadata), &self.path)
            .map_err(|e| anyhow::anyhow!("Cannot write '{}': {e:?}", self.path.display()))?;

        tracing::info!("Saved {} embedding pairs to '{}'", records.len(), self.path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<EmbeddingRecord>> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Cannot read '{}'", self.path.display()))?;

        let (_, header) = SafeTensors::read_metadata(&bytes)
            .map_err(|e| anyhow::anyhow!("Invalid safetensors header: {e:?}"))?;
        let count: usize = header
            .metadata()
            .as_ref()
            .and_then(|m| m.get("pairs"))
            .context("Embedding file has no 'pairs' metadata")?
            .parse()
            .context("Malformed 'pairs' metadata")?;

        let st = SafeTensors::deserialize(&bytes)
            .map_err(|e| anyhow::anyhow!("Invalid safetensors file: {e:?}"))?;
        (0..count)
            .map(|i| {
                Ok(EmbeddingRecord {
                    source: to_matrix(&st, &format!("pairs.{i}.source"))?,
                    target: to_matrix(&st, &format!("pairs.{i}.target"))?,
                })
            })
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn record(src_tokens: usize, trg_tokens: usize) -> EmbeddingRecord {
        let m = |n: usize| TokenEmbeddings::new(n, 3, (0..n * 3).map(|v| v as f32).collect());
        EmbeddingRecord { source: m(src_tokens), target: m(trg_tokens) }
    }

    #[test]
    fn test_every_pair_is_written() {
        let dir   = tempfile::tempdir().unwrap();
        let store = EmbeddingStore::new(dir.path().join("train.elmo"));
        let records = vec![record(2, 3), record(4, 1), record(0, 2)];
        store.save(&records).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[1].source.shape(), [4, 3]);
        assert_eq!(loaded[2].source.tokens, 0);
        assert_eq!(loaded[0].target.row(2), &[6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_empty_run_still_writes_file() {
        let dir   = tempfile::tempdir().unwrap();
        let store = EmbeddingStore::new(dir.path().join("empty.elmo"));
        store.save(&[]).unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
