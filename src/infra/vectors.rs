// ============================================================
// Layer 6 — Pretrained Word Vectors
// ============================================================
// Reads GloVe-style text vectors:
//
//   the 0.418 0.24968 -0.41242 ...
//   ,   0.013441 0.23682 -0.16899 ...
//
// one word per line followed by its components. A word2vec
// style "<count> <dim>" header line is skipped.
//
// The vectors are aligned to a vocabulary as a row-major
// [vocab_size, dim] matrix; tokens without a vector get a zero
// row.

use anyhow::{bail, Context, Result};
use std::{collections::HashMap, fs, path::Path};

pub struct PretrainedVectors {
    dim:   usize,
    table: HashMap<String, Vec<f32>>,
}

impl PretrainedVectors {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read vectors '{}'", path.display()))?;

        let mut dim   = 0usize;
        let mut table = HashMap::new();
        for (idx, line) in text.lines().enumerate() {
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else { continue };
            let values: Vec<f32> = fields
                .map(str::parse)
                .collect::<Result<_, _>>()
                .with_context(|| format!("{}:{}: bad vector component", path.display(), idx + 1))?;

            if idx == 0 && values.len() == 1 {
                continue;
            }
            if dim == 0 {
                dim = values.len();
            } else if values.len() != dim {
                bail!(
                    "{}:{}: expected {} components, found {}",
                    path.display(), idx + 1, dim, values.len()
                );
            }
            table.insert(word.to_string(), values);
        }

        if dim == 0 {
            bail!("No vectors found in '{}'", path.display());
        }
        tracing::info!("Loaded {} vectors of dim {} from '{}'", table.len(), dim, path.display());
        Ok(Self { dim, table })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Row-major `[tokens.len(), dim]` matrix and the number of
    /// tokens that had a vector.
    pub fn matrix_for(&self, tokens: &[String]) -> (Vec<f32>, usize) {
        let mut matrix = vec![0.0f32; tokens.len() * self.dim];
        let mut found  = 0usize;
        for (row, token) in tokens.iter().enumerate() {
            if let Some(v) = self.table.get(token) {
                matrix[row * self.dim..(row + 1) * self.dim].copy_from_slice(v);
                found += 1;
            }
        }
        (matrix, found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligns_to_vocabulary_with_zero_rows() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("vec.txt");
        fs::write(&path, "2 3\nthe 1 2 3\ncat 4 5 6\n").unwrap();

        let v = PretrainedVectors::load(&path).unwrap();
        assert_eq!(v.dim(), 3);

        let tokens = vec!["<unk>".to_string(), "cat".to_string()];
        let (m, found) = v.matrix_for(&tokens);
        assert_eq!(found, 1);
        assert_eq!(m, vec![0.0, 0.0, 0.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("vec.txt");
        fs::write(&path, "a 1 2\nb 1\n").unwrap();
        assert!(PretrainedVectors::load(&path).is_err());
    }
}
