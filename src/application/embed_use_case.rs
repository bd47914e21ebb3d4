// ============================================================
// Layer 2 — EmbedUseCase
// ============================================================
// Turns a tab-separated corpus into contextual embeddings:
//
//   Step 1: Fetch ELMo options + weights  (Layer 6 - infra)
//   Step 2: Build the frozen embedder     (Layer 5 - ml)
//   Step 3: Load + normalise pairs        (Layer 4 - data)
//   Step 4: Embed each pair as one batch  (Layer 5 - ml)
//   Step 5: Save all records              (Layer 6 - infra)
//
// Steps 3–5 only see the PairSource / ContextualEmbedder
// traits, so tests run them with a tiny randomly initialised
// network.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::data::loader::TsvPairLoader;
use crate::domain::{
    sentence_pair::EmbeddingRecord,
    traits::{ContextualEmbedder, PairSource},
};
use crate::infra::{embedding_store::EmbeddingStore, resources};
use crate::ml::elmo::{
    embedder::{ElmoEmbedder, Representation},
    network::Elmo,
    options::ElmoOptions,
    weights::WeightFile,
};

type EmbedBackend = burn::backend::Wgpu;

/// Pairs between two progress lines.
const LOG_EVERY: usize = 100;

#[derive(Debug, Clone)]
pub struct EmbedConfig {
    pub corpus:       PathBuf,
    pub output:       PathBuf,
    /// URL or local path
    pub options_file: String,
    /// URL or local path of the HDF5 or safetensors weights
    pub weight_file:  String,
    pub limit:        Option<usize>,
    /// Raw biLM layer instead of the scalar mix
    pub layer:        Option<usize>,
}

pub struct EmbedUseCase {
    config: EmbedConfig,
}

impl EmbedUseCase {
    pub fn new(config: EmbedConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<usize> {
        let cfg    = &self.config;
        let device = burn::backend::wgpu::WgpuDevice::default();

        // ── Step 1: Resources ─────────────────────────────────────────────────
        let options_path = resources::resolve(&cfg.options_file)?;
        let weights_path = resources::resolve(&cfg.weight_file)?;
        let options      = ElmoOptions::from_file(&options_path)?;

        // ── Step 2: Frozen embedder ───────────────────────────────────────────
        let weights = WeightFile::open(&weights_path)?;
        let model   = Elmo::<EmbedBackend>::new(&options, &device)
            .load_weights(&weights, &device)
            .context("Loading ELMo weights")?;
        let representation = match cfg.layer {
            Some(k) => Representation::Layer(k),
            None    => Representation::Mixed,
        };
        let embedder = ElmoEmbedder::new(model, &options, representation, device)?;
        tracing::info!(
            "ELMo ready: {} layers of width {}, emitting {:?}",
            options.num_layers(), embedder.output_dim(), representation
        );

        // ── Steps 3–5 ─────────────────────────────────────────────────────────
        let loader = TsvPairLoader::new(&cfg.corpus).with_limit(cfg.limit);
        run(&loader, &embedder, &EmbeddingStore::new(&cfg.output))
    }
}

/// Embed every pair of `source` and write the records to `store`.
/// Returns the number of records written.
pub fn run(
    source:   &impl PairSource,
    embedder: &impl ContextualEmbedder,
    store:    &EmbeddingStore,
) -> Result<usize> {
    let pairs   = source.load_pairs()?;
    let records = embed_pairs(&pairs, embedder)?;
    store.save(&records)?;
    Ok(records.len())
}

/// Source and target of a pair go through the embedder as one batch
/// of two. With [`ElmoEmbedder`] each pair starts from a fresh biLM
/// state, unlike AllenNLP, whose state carries over between pairs.
///
/// [`ElmoEmbedder`]: crate::ml::elmo::embedder::ElmoEmbedder
pub fn embed_pairs(
    pairs:    &[crate::domain::sentence_pair::SentencePair],
    embedder: &impl ContextualEmbedder,
) -> Result<Vec<EmbeddingRecord>> {
    let mut records = Vec::with_capacity(pairs.len());
    for (i, pair) in pairs.iter().enumerate() {
        let mut out = embedder
            .embed(&pair.as_batch())
            .with_context(|| format!("Embedding pair {}", i + 1))?
            .into_iter();
        let (Some(source), Some(target)) = (out.next(), out.next()) else {
            anyhow::bail!("Embedder returned fewer than 2 sentences for pair {}", i + 1);
        };
        records.push(EmbeddingRecord { source, target });

        if (i + 1) % LOG_EVERY == 0 {
            tracing::info!("Embedded {}/{} pairs", i + 1, pairs.len());
        }
    }
    Ok(records)
}
