// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Create the data/ layout     (Layer 6 - infra)
//   Step 2: Load train + val corpora    (Layer 4 - data)
//   Step 3: Build + save vocabulary     (Layer 6 - infra)
//   Step 4: Pretrained vectors          (Layer 6 - infra)
//   Step 5: Encode <s> ids… </s>        (Layer 4 - data)
//   Step 6: Save config                 (Layer 6 - infra)
//   Step 7: Run training loop           (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{Context, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::{
    dataset::{Seq2SeqDataset, Seq2SeqSample},
    loader::{ParallelCorpusLoader, RawExample},
};
use crate::infra::{
    checkpoint::CheckpointManager,
    layout::ProjectLayout,
    metrics::MetricsLogger,
    vectors::PretrainedVectors,
    vocab_store::{build_tokens, VocabStore, Vocabulary},
};
use crate::ml::trainer::{run_training, TrainingData};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Saved next to the checkpoint so `translate` rebuilds the same model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub root_dir:     String,
    /// Embedding name; selects the checkpoint file name
    pub emb:          String,
    pub d_model:      usize,
    /// Max of count × padded length per batch
    pub batch_tokens: usize,
    pub epochs:       usize,
    /// GPU ordinals; the first one holds the master parameters
    pub devices:      Vec<usize>,
    pub min_freq:     usize,
    pub num_layers:   usize,
    pub num_heads:    usize,
    pub d_ff:         usize,
    pub dropout:      f64,
    pub smoothing:    f64,
    pub warmup:       usize,
    pub factor:       f64,
    /// GloVe-format text vectors for both embedding tables
    pub vectors:      Option<String>,
    pub seed:         u64,
    /// Filled in once the vocabulary is built
    pub vocab_size:   usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            root_dir:     ".".to_string(),
            emb:          "bow".to_string(),
            d_model:      512,
            batch_tokens: 2500,
            epochs:       3,
            devices:      vec![0],
            min_freq:     2,
            num_layers:   6,
            num_heads:    8,
            d_ff:         2048,
            dropout:      0.1,
            smoothing:    0.1,
            warmup:       2000,
            factor:       1.0,
            vectors:      None,
            seed:         42,
            vocab_size:   0,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let layout = ProjectLayout::new(&self.config.root_dir);
        let (cfg, data) = self.prepare(&layout)?;

        let ckpt    = CheckpointManager::new(layout.checkpoint_stem(&cfg.emb));
        let metrics = MetricsLogger::new(&layout.models_dir())?;
        run_training(&cfg, data, &ckpt, &metrics)?;
        Ok(())
    }

    /// Steps 1–6: everything up to the training loop. Returns the
    /// resolved config (vocab size, d_model) and the encoded data.
    pub fn prepare(&self, layout: &ProjectLayout) -> Result<(TrainConfig, TrainingData)> {
        let mut cfg = self.config.clone();

        // ── Step 1: Directory layout ──────────────────────────────────────────
        layout.ensure()?;

        // ── Step 2: Load parallel corpora ─────────────────────────────────────
        let train_raw = ParallelCorpusLoader::new(layout.corpus_prefix("train")).load()?;
        let val_raw   = ParallelCorpusLoader::new(layout.corpus_prefix("val")).load()?;
        if train_raw.is_empty() {
            anyhow::bail!("No training examples under '{}'", layout.src_dir().display());
        }
        log_random_example(&train_raw, cfg.seed);

        // ── Step 3: Vocabulary from training sources ──────────────────────────
        let vectors = match &cfg.vectors {
            Some(path) => Some(PretrainedVectors::load(Path::new(path))?),
            None       => None,
        };
        // Every token may have a pretrained vector, so keep them all
        let min_freq = if vectors.is_some() { 1 } else { cfg.min_freq };
        let tokens   = build_tokens(train_raw.iter().map(|ex| ex.source.as_str()), min_freq)?;
        let vocab    = VocabStore::new(layout.vocab_path()).save(&tokens)?;
        cfg.vocab_size = vocab.len();
        tracing::info!(
            "Vocabulary: {} tokens (min_freq {}) saved to '{}'",
            cfg.vocab_size, min_freq, layout.vocab_path().display()
        );

        // ── Step 4: Pretrained embedding table ────────────────────────────────
        let pretrained = match vectors {
            Some(vectors) => {
                cfg.d_model = vectors.dim();
                let (matrix, found) = vectors.matrix_for(&vocab.tokens());
                tracing::info!(
                    "{} of {} vocabulary tokens have a pretrained vector; d_model set to {}",
                    found, cfg.vocab_size, cfg.d_model
                );
                Some(matrix)
            }
            None => None,
        };

        // ── Step 5: Encode ────────────────────────────────────────────────────
        let train = encode_all(&vocab, &train_raw).context("Encoding training corpus")?;
        let val   = encode_all(&vocab, &val_raw).context("Encoding validation corpus")?;
        tracing::info!("Encoded {} train / {} validation examples", train.len(), val.len());

        // ── Step 6: Save config for translation ───────────────────────────────
        CheckpointManager::new(layout.checkpoint_stem(&cfg.emb)).save_config(&cfg)?;

        let data = TrainingData {
            train:      Seq2SeqDataset::new(train),
            val:        Seq2SeqDataset::new(val),
            vocab_size: cfg.vocab_size,
            pretrained,
        };
        Ok((cfg, data))
    }
}

fn encode_all(vocab: &Vocabulary, examples: &[RawExample]) -> Result<Vec<Seq2SeqSample>> {
    examples
        .iter()
        .map(|ex| Ok(Seq2SeqSample::new(vocab.encode(&ex.source)?, vocab.encode(&ex.target)?)))
        .collect()
}

fn log_random_example(examples: &[RawExample], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    if let Some(ex) = examples.choose(&mut rng) {
        tracing::info!("Example source: {}", ex.source);
        tracing::info!("Example target: {}", ex.target);
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::vocab_store::{BOS_ID, EOS_ID};
    use crate::ml::trainer::train_loop;
    use burn::backend::{Autodiff, NdArray};
    use std::fs;

    fn write_corpus(layout: &ProjectLayout) {
        layout.ensure().unwrap();
        let src = "I has a apple .\nShe go home .\nI has a dog .\n";
        let trg = "I have an apple .\nShe goes home .\nI have a dog .\n";
        for split in ["train", "val"] {
            let prefix = layout.corpus_prefix(split);
            fs::write(format!("{}.src", prefix.display()), src).unwrap();
            fs::write(format!("{}.trg", prefix.display()), trg).unwrap();
        }
    }

    fn tiny_config(root: &Path) -> TrainConfig {
        TrainConfig {
            root_dir:     root.to_string_lossy().into_owned(),
            d_model:      8,
            num_heads:    2,
            num_layers:   1,
            d_ff:         16,
            dropout:      0.0,
            batch_tokens: 32,
            epochs:       1,
            min_freq:     1,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_prepare_saves_vocab_and_config() {
        let dir    = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        write_corpus(&layout);

        let (cfg, data) = TrainUseCase::new(tiny_config(dir.path())).prepare(&layout).unwrap();

        assert!(layout.vocab_path().exists());
        assert_eq!(cfg.vocab_size, VocabStore::new(layout.vocab_path()).load().unwrap().len());
        let saved = CheckpointManager::new(layout.checkpoint_stem("bow")).load_config().unwrap();
        assert_eq!(saved.vocab_size, cfg.vocab_size);

        let first = data.train.gather(&[0]).remove(0);
        assert_eq!(first.source_ids.first(), Some(&BOS_ID));
        assert_eq!(first.source_ids.last(), Some(&EOS_ID));
        assert!(data.pretrained.is_none());
    }

    #[test]
    fn test_vectors_override_d_model() {
        let dir    = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        write_corpus(&layout);
        let vec_path = dir.path().join("vec.txt");
        fs::write(&vec_path, "I 0.1 0.2 0.3 0.4 0.5 0.6\nhome 1 1 1 1 1 1\n").unwrap();

        let mut config = tiny_config(dir.path());
        config.min_freq = 5;
        config.num_heads = 3;
        config.vectors = Some(vec_path.to_string_lossy().into_owned());
        let (cfg, data) = TrainUseCase::new(config).prepare(&layout).unwrap();

        assert_eq!(cfg.d_model, 6);
        // min_freq is ignored with vectors, so singletons are kept
        assert!(cfg.vocab_size > 4);
        assert_eq!(data.pretrained.unwrap().len(), cfg.vocab_size * 6);
    }

    #[test]
    fn test_missing_corpus_fails() {
        let dir    = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        assert!(TrainUseCase::new(tiny_config(dir.path())).prepare(&layout).is_err());
    }

    #[test]
    fn test_prepared_data_trains_one_epoch() {
        let dir    = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        write_corpus(&layout);

        let (cfg, data) = TrainUseCase::new(tiny_config(dir.path())).prepare(&layout).unwrap();
        let ckpt    = CheckpointManager::new(layout.checkpoint_stem(&cfg.emb));
        let metrics = MetricsLogger::new(&layout.models_dir()).unwrap();
        let history = train_loop::<Autodiff<NdArray>>(&cfg, data, vec![Default::default()], &ckpt, &metrics).unwrap();

        assert_eq!(history.len(), 1);
        assert!(layout.models_dir().join("bow_transformer.mpk.gz").exists());
    }
}
