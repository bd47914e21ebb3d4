// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's NamedMpkGzFileRecorder.
//
// Files in the models directory, one pair per embedding:
//   {emb}_transformer.mpk.gz       ← model weights, overwritten after
//                                    every epoch (the last epoch wins)
//   {emb}_transformer.config.json  ← hyperparameters of the run, so
//                                    `translate` can rebuild the same
//                                    architecture before loading
//
// Recorder:
//   - MessagePack, gzip compressed, half precision
//   - `load_record` does not compare shapes, so the loaded record is
//     checked against the target model first
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{HalfPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use std::{fs, path::PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::{Seq2SeqTransformer, Seq2SeqTransformerRecord};

type CheckpointRecorder = NamedMpkGzFileRecorder<HalfPrecisionSettings>;

pub struct CheckpointManager {
    /// Weights path without the recorder's extension
    model_stem:  PathBuf,
    config_path: PathBuf,
}

impl CheckpointManager {
    pub fn new(model_stem: impl Into<PathBuf>) -> Self {
        let model_stem  = model_stem.into();
        let mut config  = model_stem.clone().into_os_string();
        config.push(".config.json");
        Self { model_stem, config_path: PathBuf::from(config) }
    }

    /// Overwrite the checkpoint with `model`'s current weights.
    pub fn save_model<B: Backend>(&self, model: &Seq2SeqTransformer<B>) -> Result<()> {
        if let Some(dir) = self.model_stem.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        }
        CheckpointRecorder::new()
            .record(model.clone().into_record(), self.model_stem.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", self.model_stem.display())
            })?;
        tracing::debug!("Saved checkpoint '{}'", self.model_stem.display());
        Ok(())
    }

    /// Load the saved weights into `model`. Fails when the checkpoint
    /// was written by a model of another shape.
    pub fn load_model<B: Backend>(
        &self,
        model:  Seq2SeqTransformer<B>,
        device: &B::Device,
    ) -> Result<Seq2SeqTransformer<B>> {
        let record: Seq2SeqTransformerRecord<B> = CheckpointRecorder::new()
            .load(self.model_stem.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Have you trained the model first?",
                    self.model_stem.display()
                )
            })?;
        if let Some(problem) = shape_mismatch(&model, &record) {
            bail!(
                "Checkpoint '{}' does not match the configured model: {}",
                self.model_stem.display(), problem
            );
        }
        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&self.config_path, json)
            .with_context(|| format!("Cannot write config to '{}'", self.config_path.display()))?;
        tracing::debug!("Saved training config to '{}'", self.config_path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let json = fs::read_to_string(&self.config_path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' first.",
                self.config_path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", self.config_path.display()))
    }
}

/// First difference between the model and a loaded record, if any.
fn shape_mismatch<B: Backend>(
    model:  &Seq2SeqTransformer<B>,
    record: &Seq2SeqTransformerRecord<B>,
) -> Option<String> {
    let embed = (model.src_embed.weight.val().dims(), record.src_embed.weight.val().dims());
    if embed.0 != embed.1 {
        return Some(format!("embedding {:?} vs saved {:?}", embed.0, embed.1));
    }
    let generator = (model.generator.weight.val().dims(), record.generator.weight.val().dims());
    if generator.0 != generator.1 {
        return Some(format!("generator {:?} vs saved {:?}", generator.0, generator.1));
    }
    if model.encoder.len() != record.encoder.len() || model.decoder.len() != record.decoder.len() {
        return Some(format!(
            "{} layers vs saved {}",
            model.encoder.len(), record.encoder.len()
        ));
    }
    if let (Some(layer), Some(saved)) = (model.encoder.first(), record.encoder.first()) {
        let ffn = (layer.ffn.linear1.weight.val().dims(), saved.ffn.linear1.weight.val().dims());
        if ffn.0 != ffn.1 {
            return Some(format!("feed-forward {:?} vs saved {:?}", ffn.0, ffn.1));
        }
    }
    None
}
