// ============================================================
// Layer 4 — Seq2Seq Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<Seq2SeqSample>
// into padded tensors for one forward pass.
//
// Padding is dynamic: every sequence is padded with <blank> up
// to the longest sequence of *this* batch.
//
// Teacher forcing split of a target `<s> a b c </s>`:
//   decoder input  = <s> a b c
//   labels         =     a b c </s>
//
// Reference: Burn Book §4 (Batcher)
//            Vaswani et al. (2017) Attention Is All You Need

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::Seq2SeqSample;

// ─── Seq2SeqBatch ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    /// Source ids — [batch, src_len]
    pub src: Tensor<B, 2, Int>,

    /// true where `src` is padding — [batch, src_len]
    pub src_pad: Tensor<B, 2, Bool>,

    /// Decoder input ids — [batch, tgt_len]
    pub tgt_in: Tensor<B, 2, Int>,

    /// true where `tgt_in` is padding — [batch, tgt_len]
    pub tgt_pad: Tensor<B, 2, Bool>,

    /// Labels — [batch, tgt_len]
    pub tgt_y: Tensor<B, 2, Int>,

    /// Number of non-padding labels
    pub ntokens: usize,
}

// ─── Seq2SeqBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct Seq2SeqBatcher<B: Backend> {
    pub device: B::Device,
    pub pad_id: u32,
}

impl<B: Backend> Seq2SeqBatcher<B> {
    pub fn new(device: B::Device, pad_id: u32) -> Self {
        Self { device, pad_id }
    }

    /// Flatten `rows` into a [rows, width] id tensor, right-padded.
    fn padded(&self, rows: &[&[u32]]) -> (Tensor<B, 2, Int>, Tensor<B, 2, Bool>) {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0).max(1);
        let mut flat = Vec::with_capacity(rows.len() * width);
        for row in rows {
            flat.extend(row.iter().map(|&id| id as i32));
            flat.extend(std::iter::repeat(self.pad_id as i32).take(width - row.len()));
        }
        let ids = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([rows.len(), width]);
        let pad = ids.clone().equal_elem(self.pad_id as i32);
        (ids, pad)
    }
}

impl<B: Backend> Batcher<Seq2SeqSample, Seq2SeqBatch<B>> for Seq2SeqBatcher<B> {
    fn batch(&self, items: Vec<Seq2SeqSample>) -> Seq2SeqBatch<B> {
        let sources: Vec<&[u32]> = items.iter().map(|s| s.source_ids.as_slice()).collect();

        // Drop the last id for the decoder input and the first for the labels
        let inputs: Vec<&[u32]> = items
            .iter()
            .map(|s| &s.target_ids[..s.target_ids.len().saturating_sub(1)])
            .collect();
        let labels: Vec<&[u32]> = items
            .iter()
            .map(|s| s.target_ids.get(1..).unwrap_or(&[]))
            .collect();

        let ntokens = labels
            .iter()
            .map(|row| row.iter().filter(|&&id| id != self.pad_id).count())
            .sum();

        let (src, src_pad)    = self.padded(&sources);
        let (tgt_in, tgt_pad) = self.padded(&inputs);
        let (tgt_y, _)        = self.padded(&labels);

        Seq2SeqBatch { src, src_pad, tgt_in, tgt_pad, tgt_y, ntokens }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn ints(t: Tensor<TB, 2, Int>) -> Vec<i64> {
        t.into_data().iter::<i64>().collect()
    }

    #[test]
    fn test_dynamic_padding_and_shift() {
        let batcher = Seq2SeqBatcher::<TB>::new(Default::default(), 1);
        let batch   = batcher.batch(vec![
            Seq2SeqSample::new(vec![2, 10, 11, 3], vec![2, 20, 21, 3]),
            Seq2SeqSample::new(vec![2, 12, 3],     vec![2, 3]),
        ]);

        assert_eq!(batch.src.dims(), [2, 4]);
        assert_eq!(ints(batch.src), vec![2, 10, 11, 3, 2, 12, 3, 1]);
        assert_eq!(ints(batch.tgt_in), vec![2, 20, 21, 2, 1, 1]);
        assert_eq!(ints(batch.tgt_y),  vec![20, 21, 3, 3, 1, 1]);
        assert_eq!(batch.ntokens, 4);

        let pad: Vec<bool> = batch.src_pad.into_data().iter::<bool>().collect();
        assert_eq!(pad, vec![false, false, false, false, false, false, false, true]);
    }
}
