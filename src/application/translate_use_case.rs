// ============================================================
// Layer 2 — TranslateUseCase
// ============================================================
// Corrects every line of an input file with the trained model
// and writes one prediction per line:
//
//   data/test/lang8.test.src ──► Translator ──► data/eval/pred.txt
//
// Blank input lines produce blank output lines so line numbers
// stay aligned with the references.

use anyhow::{Context, Result};
use burn::prelude::Backend;
use std::{fs, path::PathBuf};

use crate::data::loader::load_lines;
use crate::infra::layout::ProjectLayout;
use crate::ml::inferencer::Translator;

type InferBackend = burn::backend::Wgpu;

#[derive(Debug, Clone)]
pub struct TranslateConfig {
    pub root_dir: String,
    pub emb:      String,
    /// Defaults to the test source under `root_dir`
    pub input:    Option<PathBuf>,
    /// Defaults to `data/eval/pred.txt` under `root_dir`
    pub output:   Option<PathBuf>,
    pub max_len:  usize,
}

impl TranslateConfig {
    pub fn input_path(&self) -> PathBuf {
        self.input
            .clone()
            .unwrap_or_else(|| ProjectLayout::new(&self.root_dir).test_source())
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| ProjectLayout::new(&self.root_dir).predictions_path())
    }
}

pub struct TranslateUseCase {
    config: TranslateConfig,
}

impl TranslateUseCase {
    pub fn new(config: TranslateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<usize> {
        self.execute_on::<InferBackend>(Default::default())
    }

    /// Returns the number of lines written.
    pub fn execute_on<B: Backend>(&self, device: B::Device) -> Result<usize> {
        let cfg        = &self.config;
        let layout     = ProjectLayout::new(&cfg.root_dir);
        let translator = Translator::<B>::from_checkpoint(&layout, &cfg.emb, device, cfg.max_len)?;
        let (input, output) = (cfg.input_path(), cfg.output_path());

        let lines = load_lines(&input)?;
        tracing::info!("Translating {} lines from '{}'", lines.len(), input.display());

        let mut predictions = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            let prediction = if line.is_empty() {
                String::new()
            } else {
                translator
                    .translate(line)
                    .with_context(|| format!("{}:{}", input.display(), i + 1))?
            };
            tracing::debug!("{} → {}", line, prediction);
            predictions.push(prediction);
        }

        if let Some(dir) = output.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        }
        let mut text = predictions.join("\n");
        text.push('\n');
        fs::write(&output, text)
            .with_context(|| format!("Cannot write predictions to '{}'", output.display()))?;
        tracing::info!("Wrote {} predictions to '{}'", predictions.len(), output.display());
        Ok(predictions.len())
    }
}
