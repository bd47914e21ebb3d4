use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// The published ELMo `options.json` layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElmoOptions {
    pub lstm:     LstmOptions,
    pub char_cnn: CharCnnOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmOptions {
    /// Memory cell width
    pub dim:            usize,
    pub projection_dim: usize,
    pub n_layers:       usize,
    #[serde(default)]
    pub cell_clip:      Option<f64>,
    #[serde(default)]
    pub proj_clip:      Option<f64>,
    #[serde(default)]
    pub use_skip_connections: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharCnnOptions {
    pub activation: CnnActivation,
    pub embedding:  CharEmbeddingOptions,
    /// `[width, num_filters]` per convolution
    pub filters:    Vec<[usize; 2]>,
    pub max_characters_per_token: usize,
    pub n_characters: usize,
    pub n_highway:  usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharEmbeddingOptions {
    pub dim: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CnnActivation {
    Relu,
    Tanh,
}

impl ElmoOptions {
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read ELMo options '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed ELMo options '{}'", path.display()))
    }

    /// Width of the concatenated convolution outputs.
    pub fn n_filters(&self) -> usize {
        self.char_cnn.filters.iter().map(|[_, n]| n).sum()
    }

    /// Width of every biLM layer output (forward ‖ backward).
    pub fn output_dim(&self) -> usize {
        2 * self.lstm.projection_dim
    }

    /// Number of representations the biLM produces: the token
    /// layer plus one per LSTM layer.
    pub fn num_layers(&self) -> usize {
        self.lstm.n_layers + 1
    }
}

/// A shape small enough to run in unit tests.
#[cfg(test)]
pub(crate) fn tiny_options() -> ElmoOptions {
    ElmoOptions {
        lstm: LstmOptions {
            dim: 8,
            projection_dim: 4,
            n_layers: 2,
            cell_clip: Some(3.0),
            proj_clip: Some(3.0),
            use_skip_connections: true,
        },
        char_cnn: CharCnnOptions {
            activation: CnnActivation::Relu,
            embedding:  CharEmbeddingOptions { dim: 4 },
            filters:    vec![[1, 3], [2, 5]],
            max_characters_per_token: 6,
            n_characters: 262,
            n_highway:  1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLISHED: &str = r#"{
        "lstm": {"use_skip_connections": true, "projection_dim": 512, "cell_clip": 3,
                 "proj_clip": 3, "dim": 4096, "n_layers": 2},
        "char_cnn": {"activation": "relu",
                     "filters": [[1, 32], [2, 32], [3, 64], [4, 128], [5, 256], [6, 512], [7, 1024]],
                     "n_highway": 2, "embedding": {"dim": 16}, "n_characters": 262,
                     "max_characters_per_token": 50}
    }"#;

    #[test]
    fn test_parses_published_options() {
        let o: ElmoOptions = serde_json::from_str(PUBLISHED).unwrap();
        assert_eq!(o.n_filters(), 2048);
        assert_eq!(o.output_dim(), 1024);
        assert_eq!(o.num_layers(), 3);
        assert_eq!(o.lstm.cell_clip, Some(3.0));
        assert_eq!(o.char_cnn.activation, CnnActivation::Relu);
    }
}
