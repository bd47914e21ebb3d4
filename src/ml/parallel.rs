// ============================================================
// Layer 5 — Data-Parallel Training Step
// ============================================================
// One optimiser step over a batch spread across devices:
//
//   samples ──► shard per device (contiguous, near-equal)
//       │
//       ▼
//   per shard:  fork replica onto the shard's device
//               batch → forward → label-smoothed loss / ntokens
//               backward → gradients moved to the main device
//       │
//       ▼
//   GradientsAccumulator (sum) ──► one optimiser step on the
//                                  main-device model
//
// Every shard's loss is divided by the token count of the
// *whole* batch, so the summed gradients equal the gradient of
// the single-device loss.
//
// Reference: Burn Book §5 (Custom Training Loop)

use burn::{
    data::dataloader::batcher::Batcher,
    optim::{GradientsAccumulator, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{batcher::Seq2SeqBatcher, dataset::Seq2SeqSample};
use crate::ml::{loss::LabelSmoothing, model::Seq2SeqTransformer};

/// Summed loss and label count of one step, for epoch averages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepStats {
    pub loss_sum: f64,
    pub ntokens:  usize,
}

impl StepStats {
    pub fn add(&mut self, other: StepStats) {
        self.loss_sum += other.loss_sum;
        self.ntokens  += other.ntokens;
    }

    /// Mean loss per label; NaN when no labels were seen.
    pub fn mean(&self) -> f64 {
        if self.ntokens > 0 { self.loss_sum / self.ntokens as f64 } else { f64::NAN }
    }
}

pub struct DataParallel<B: Backend> {
    /// `devices[0]` holds the master copy of the parameters
    devices: Vec<B::Device>,
    pad_id:  u32,
}

impl<B: Backend> DataParallel<B> {
    pub fn new(devices: Vec<B::Device>, pad_id: u32) -> Self {
        let devices = if devices.is_empty() { vec![B::Device::default()] } else { devices };
        Self { devices, pad_id }
    }

    pub fn main_device(&self) -> &B::Device {
        &self.devices[0]
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Split `samples` into at most one contiguous shard per device.
    /// Empty shards are dropped.
    pub fn shard(&self, samples: Vec<Seq2SeqSample>) -> Vec<(B::Device, Vec<Seq2SeqSample>)> {
        let per_device = samples.len().div_ceil(self.devices.len()).max(1);
        let mut shards = Vec::with_capacity(self.devices.len());
        let mut rest   = samples;
        for device in &self.devices {
            if rest.is_empty() {
                break;
            }
            let tail = rest.split_off(per_device.min(rest.len()));
            shards.push((device.clone(), rest));
            rest = tail;
        }
        shards
    }

    /// Labels that are not padding, over all samples.
    fn count_tokens(&self, samples: &[Seq2SeqSample]) -> usize {
        samples
            .iter()
            .map(|s| s.target_ids.iter().skip(1).filter(|&&id| id != self.pad_id).count())
            .sum()
    }
}

impl<B: AutodiffBackend> DataParallel<B> {
    /// Forward/backward on every shard, then one optimiser step.
    pub fn train_step<O>(
        &self,
        model:     Seq2SeqTransformer<B>,
        optim:     &mut O,
        lr:        f64,
        criterion: &LabelSmoothing,
        samples:   Vec<Seq2SeqSample>,
    ) -> (Seq2SeqTransformer<B>, StepStats)
    where
        O: Optimizer<Seq2SeqTransformer<B>, B>,
    {
        let total = self.count_tokens(&samples);
        if total == 0 {
            return (model, StepStats::default());
        }

        let main = self.main_device().clone();
        let mut accumulator = GradientsAccumulator::<Seq2SeqTransformer<B>>::new();
        let mut stats       = StepStats::default();

        for (device, shard) in self.shard(samples) {
            let replica = if device == main { model.clone() } else { model.clone().fork(&device) };
            let batch   = Seq2SeqBatcher::<B>::new(device, self.pad_id).batch(shard);

            let log_probs    = replica.forward(batch.src, batch.src_pad, batch.tgt_in, batch.tgt_pad);
            let [b, t, v]    = log_probs.dims();
            let loss         = criterion.forward(log_probs.reshape([b * t, v]), batch.tgt_y.reshape([b * t]));
            stats.add(StepStats {
                loss_sum: loss.clone().into_scalar().elem::<f64>(),
                ntokens:  batch.ntokens,
            });

            let grads = loss.div_scalar(total as f64).backward();
            let grads = GradientsParams::from_grads(grads, &replica).to_device(&main, &model);
            accumulator.accumulate(&model, grads);
        }

        let model = optim.step(lr, model, accumulator.grads());
        (model, stats)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::Seq2SeqTransformerConfig;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamConfig;

    type TB = Autodiff<NdArray>;

    fn samples() -> Vec<Seq2SeqSample> {
        vec![
            Seq2SeqSample::new(vec![2, 5, 6, 3], vec![2, 7, 3]),
            Seq2SeqSample::new(vec![2, 8, 3],    vec![2, 9, 10, 3]),
            Seq2SeqSample::new(vec![2, 4, 3],    vec![2, 4, 3]),
        ]
    }

    #[test]
    fn test_shards_cover_batch_in_order() {
        let dp     = DataParallel::<NdArray>::new(vec![Default::default(); 2], 1);
        let shards = dp.shard(samples());
        assert_eq!(shards.len(), 2);
        assert_eq!(shards[0].1.len(), 2);
        assert_eq!(shards[1].1[0], samples()[2]);
    }

    #[test]
    fn test_more_devices_than_samples() {
        let dp = DataParallel::<NdArray>::new(vec![Default::default(); 4], 1);
        assert_eq!(dp.shard(samples()[..1].to_vec()).len(), 1);
    }

    #[test]
    fn test_step_stats_match_across_device_counts() {
        let device    = Default::default();
        let model     = Seq2SeqTransformerConfig::new(12, 8, 2, 1, 16, 0.0).init::<TB>(&device);
        let criterion = LabelSmoothing::new(12, 1, 0.1);

        let mut optim = AdamConfig::new().init();
        let (_, one)  = DataParallel::<TB>::new(vec![device.clone()], 1)
            .train_step(model.clone(), &mut optim, 1e-3, &criterion, samples());
        let mut optim = AdamConfig::new().init();
        let (updated, two) = DataParallel::<TB>::new(vec![device.clone(); 2], 1)
            .train_step(model.clone(), &mut optim, 1e-3, &criterion, samples());

        assert_eq!(one.ntokens, 7);
        assert_eq!(two.ntokens, 7);
        assert!((one.loss_sum - two.loss_sum).abs() < 1e-3);

        let before = model.generator.weight.val().into_data();
        let after  = updated.generator.weight.val().into_data();
        assert_ne!(before, after);
    }
}
