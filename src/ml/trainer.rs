// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop for the seq2seq Transformer:
//
//   for each epoch:
//     train     token-budget batches, one data-parallel step each,
//               learning rate from the Noam schedule
//     save      overwrite the checkpoint
//     validate  model.valid() on the main device, no dropout
//     report    "Epoch k/n - Loss: x" + metrics CSV row
//
// Key Burn insight:
//   - Training uses Autodiff<Wgpu> for gradients
//   - model.valid() returns the model on the inner backend (Wgpu),
//     so the validation batcher uses the inner backend as well
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam
//            Vaswani et al. (2017) §5.3 Optimizer

use anyhow::Result;
use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    optim::AdamConfig,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, SeedableRng};
use std::time::Instant;

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::Seq2SeqBatcher,
    bucket::TokenBudgetBucketer,
    dataset::Seq2SeqDataset,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
    vocab_store::PAD_ID,
};
use crate::ml::{
    loss::LabelSmoothing,
    model::{Seq2SeqTransformer, Seq2SeqTransformerConfig},
    parallel::{DataParallel, StepStats},
    schedule::NoamSchedule,
};

type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Progress is logged every this many optimiser steps.
const LOG_EVERY: usize = 50;

/// Everything the loop needs besides the hyperparameters.
pub struct TrainingData {
    pub train:      Seq2SeqDataset,
    pub val:        Seq2SeqDataset,
    pub vocab_size: usize,
    /// Row-major `[vocab_size, d_model]` initial embeddings
    pub pretrained: Option<Vec<f32>>,
}

pub fn model_config(cfg: &TrainConfig, vocab_size: usize, dropout: f64) -> Seq2SeqTransformerConfig {
    Seq2SeqTransformerConfig::new(
        vocab_size, cfg.d_model, cfg.num_heads, cfg.num_layers, cfg.d_ff, dropout,
    )
}

/// Train on the GPUs listed in `cfg.devices` (the first one holds
/// the master parameters).
pub fn run_training(
    cfg:     &TrainConfig,
    data:    TrainingData,
    ckpt:    &CheckpointManager,
    metrics: &MetricsLogger,
) -> Result<Vec<EpochMetrics>> {
    let devices: Vec<burn::backend::wgpu::WgpuDevice> = cfg
        .devices
        .iter()
        .map(|&i| burn::backend::wgpu::WgpuDevice::DiscreteGpu(i))
        .collect();
    tracing::info!("Using WGPU devices: {:?}", devices);
    train_loop::<MyBackend>(cfg, data, devices, ckpt, metrics)
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:     &TrainConfig,
    data:    TrainingData,
    devices: Vec<B::Device>,
    ckpt:    &CheckpointManager,
    metrics: &MetricsLogger,
) -> Result<Vec<EpochMetrics>> {
    let parallel = DataParallel::<B>::new(devices, PAD_ID);
    let device   = parallel.main_device().clone();

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = model_config(cfg, data.vocab_size, cfg.dropout);
    model_cfg.check()?;
    let mut model: Seq2SeqTransformer<B> = model_cfg.init(&device);
    if let Some(weights) = data.pretrained {
        if weights.len() != data.vocab_size * cfg.d_model {
            anyhow::bail!(
                "pretrained table has {} values, expected {} × {}",
                weights.len(), data.vocab_size, cfg.d_model
            );
        }
        let table = Tensor::<B, 2>::from_data(
            TensorData::new(weights, [data.vocab_size, cfg.d_model]),
            &device,
        );
        model = model.with_pretrained_embeddings(table)?;
        tracing::info!("Embeddings initialised from pretrained vectors");
    }
    tracing::info!(
        "Model ready: {} layers, d_model={}, vocab={}, {} device(s)",
        cfg.num_layers, cfg.d_model, data.vocab_size, parallel.device_count()
    );

    // ── Adam driven by the Noam schedule ──────────────────────────────────────
    let mut optim    = AdamConfig::new()
        .with_beta_1(0.9)
        .with_beta_2(0.98)
        .with_epsilon(1e-9)
        .init();
    let mut schedule = NoamSchedule::new(cfg.d_model, cfg.factor, cfg.warmup);

    let criterion = LabelSmoothing::new(data.vocab_size, PAD_ID as usize, cfg.smoothing);
    let bucketer  = TokenBudgetBucketer::new(cfg.batch_tokens);
    let mut rng   = StdRng::seed_from_u64(cfg.seed);

    let train_lengths = data.train.lengths();
    let val_lengths   = data.val.lengths();
    let mut history   = Vec::with_capacity(cfg.epochs);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        let started    = Instant::now();
        let batches    = bucketer.train_batches(&train_lengths, &mut rng);
        let mut epoch_stats = StepStats::default();
        let mut window      = StepStats::default();
        let mut window_start = Instant::now();

        for (step, indices) in batches.iter().enumerate() {
            let lr = schedule.step();
            let (updated, stats) = parallel.train_step(
                model, &mut optim, lr, &criterion, data.train.gather(indices),
            );
            model = updated;
            epoch_stats.add(stats);
            window.add(stats);

            if step % LOG_EVERY == 1 {
                let elapsed = window_start.elapsed().as_secs_f64().max(1e-9);
                tracing::info!(
                    "Epoch Step: {} Loss: {:.6} Tokens per Sec: {:.1} lr: {:.3e}",
                    step, stats.mean(), window.ntokens as f64 / elapsed, lr
                );
                window       = StepStats::default();
                window_start = Instant::now();
            }
        }
        let seconds = started.elapsed().as_secs_f64();

        ckpt.save_model(&model)?;
        tracing::info!("Checkpoint saved after epoch {}", epoch);

        // model.valid() → Seq2SeqTransformer<B::InnerBackend>, dropout off
        let val_stats = evaluate(&model.valid(), &data.val, &val_lengths, &bucketer, &criterion, &device);

        println!("Epoch {}/{} - Loss: {:.6}", epoch, cfg.epochs, val_stats.mean());
        let row = EpochMetrics::new(epoch, epoch_stats.mean(), val_stats.mean(), seconds);
        metrics.log(&row)?;
        history.push(row);
    }

    tracing::info!("Training complete!");
    Ok(history)
}

/// Summed loss over `dataset` in deterministic batch order.
pub fn evaluate<B: Backend>(
    model:     &Seq2SeqTransformer<B>,
    dataset:   &Seq2SeqDataset,
    lengths:   &[(usize, usize)],
    bucketer:  &TokenBudgetBucketer,
    criterion: &LabelSmoothing,
    device:    &B::Device,
) -> StepStats {
    let batcher   = Seq2SeqBatcher::<B>::new(device.clone(), PAD_ID);
    let mut total = StepStats::default();

    for indices in bucketer.eval_batches(lengths) {
        let batch     = batcher.batch(dataset.gather(&indices));
        let log_probs = model.forward(batch.src, batch.src_pad, batch.tgt_in, batch.tgt_pad);
        let [b, t, v] = log_probs.dims();
        let loss      = criterion.forward(log_probs.reshape([b * t, v]), batch.tgt_y.reshape([b * t]));
        total.add(StepStats {
            loss_sum: loss.into_scalar().elem::<f64>(),
            ntokens:  batch.ntokens,
        });
    }
    total
}
