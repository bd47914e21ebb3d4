// ============================================================
// Layer 5 — Greedy Translator
// ============================================================
// Loads the saved config, vocabulary and checkpoint, then
// rewrites sentences one token at a time:
//
//   memory = encode(<s> source </s>)
//   ys     = [<s>]
//   repeat max_len times:
//     next = argmax generate(decode(memory, ys))[last]
//     ys  += next, stop at </s>
//
// The vocabulary is loaded before the checkpoint, since the
// model size depends on it.

use anyhow::{bail, Result};
use burn::prelude::*;

use crate::infra::{
    checkpoint::CheckpointManager,
    layout::ProjectLayout,
    vocab_store::{VocabStore, Vocabulary, BOS_ID, EOS_ID, PAD_ID},
};
use crate::ml::{model::Seq2SeqTransformer, trainer::model_config};

pub struct Translator<B: Backend> {
    model:   Seq2SeqTransformer<B>,
    vocab:   Vocabulary,
    device:  B::Device,
    max_len: usize,
}

impl<B: Backend> Translator<B> {
    pub fn new(model: Seq2SeqTransformer<B>, vocab: Vocabulary, device: B::Device, max_len: usize) -> Self {
        Self { model, vocab, device, max_len }
    }

    /// Rebuild the trained model of embedding `emb` under `layout`.
    pub fn from_checkpoint(layout: &ProjectLayout, emb: &str, device: B::Device, max_len: usize) -> Result<Self> {
        let ckpt = CheckpointManager::new(layout.checkpoint_stem(emb));
        let cfg  = ckpt.load_config()?;

        let store = VocabStore::new(layout.vocab_path());
        if !store.exists() {
            bail!(
                "Vocabulary '{}' not found; it must be built before the checkpoint is loaded",
                layout.vocab_path().display()
            );
        }
        let vocab = store.load()?;
        if vocab.len() != cfg.vocab_size {
            bail!(
                "Vocabulary has {} tokens but the checkpoint was trained with {}",
                vocab.len(), cfg.vocab_size
            );
        }

        let model_cfg = model_config(&cfg, vocab.len(), 0.0);
        model_cfg.check()?;
        let model = ckpt.load_model(model_cfg.init::<B>(&device), &device)?;
        tracing::info!("Model loaded from checkpoint ({} tokens, d_model={})", vocab.len(), cfg.d_model);
        Ok(Self::new(model, vocab, device, max_len))
    }

    pub fn translate(&self, sentence: &str) -> Result<String> {
        let source = self.vocab.encode(sentence)?;
        Ok(self.vocab.decode(&self.greedy_decode(&source)))
    }

    /// Output ids starting with `<s>`, ending with `</s>` unless
    /// `max_len` was reached first.
    pub fn greedy_decode(&self, source: &[u32]) -> Vec<u32> {
        let src     = self.ids_tensor(source);
        let src_pad = src.clone().equal_elem(PAD_ID as i64);
        let memory  = self.model.encode(src, src_pad.clone());

        let mut ys = vec![BOS_ID];
        for _ in 0..self.max_len {
            let tgt     = self.ids_tensor(&ys);
            let tgt_pad = tgt.clone().equal_elem(PAD_ID as i64);
            let hidden  = self.model.decode(memory.clone(), src_pad.clone(), tgt, tgt_pad);

            let [_, len, d] = hidden.dims();
            let last      = hidden.slice([0..1, len - 1..len, 0..d]);
            let log_probs = self.model.generate(last);
            let vocab     = log_probs.dims()[2];
            let next      = log_probs.reshape([1, vocab]).argmax(1).into_scalar().elem::<i64>() as u32;

            ys.push(next);
            if next == EOS_ID {
                break;
            }
        }
        ys
    }

    /// [1, len] id tensor.
    fn ids_tensor(&self, ids: &[u32]) -> Tensor<B, 2, Int> {
        let data: Vec<i64> = ids.iter().map(|&id| id as i64).collect();
        Tensor::<B, 1, Int>::from_data(TensorData::new(data, [ids.len()]), &self.device)
            .reshape([1, ids.len()])
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use crate::infra::vocab_store::build_tokens;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn tiny_config() -> TrainConfig {
        TrainConfig { d_model: 8, num_heads: 2, num_layers: 1, d_ff: 16, ..TrainConfig::default() }
    }

    /// Saves vocab, config and a fresh checkpoint under `layout`.
    fn setup(layout: &ProjectLayout) -> TrainConfig {
        save_run(layout, tiny_config())
    }

    fn save_run(layout: &ProjectLayout, cfg: TrainConfig) -> TrainConfig {
        layout.ensure().unwrap();
        let tokens = build_tokens(["the cat sat .", "a dog ran ."], 1).unwrap();
        let vocab  = VocabStore::new(layout.vocab_path()).save(&tokens).unwrap();
        let cfg    = TrainConfig { vocab_size: vocab.len(), ..cfg };

        let ckpt  = CheckpointManager::new(layout.checkpoint_stem(&cfg.emb));
        let model = model_config(&cfg, vocab.len(), 0.0).init::<TB>(&Default::default());
        ckpt.save_config(&cfg).unwrap();
        ckpt.save_model(&model).unwrap();
        cfg
    }

    #[test]
    fn test_decode_starts_with_bos_and_respects_max_len() {
        let dir    = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        setup(&layout);

        let translator = Translator::<TB>::from_checkpoint(&layout, "bow", Default::default(), 5).unwrap();
        let ids = translator.greedy_decode(&[BOS_ID, 4, 5, EOS_ID]);
        assert_eq!(ids[0], BOS_ID);
        assert!(ids.len() <= 6);
        if ids.len() < 6 {
            assert_eq!(ids.last(), Some(&EOS_ID));
        }
    }

    #[test]
    fn test_translate_is_deterministic() {
        let dir    = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        setup(&layout);

        let translator = Translator::<TB>::from_checkpoint(&layout, "bow", Default::default(), 4).unwrap();
        assert_eq!(translator.translate("the cat").unwrap(), translator.translate("the cat").unwrap());
    }

    #[test]
    fn test_missing_vocabulary_is_reported() {
        let dir    = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        setup(&layout);
        std::fs::remove_file(layout.vocab_path()).unwrap();

        let err = Translator::<TB>::from_checkpoint(&layout, "bow", Default::default(), 4)
            .err()
            .unwrap();
        assert!(err.to_string().contains("must be built before"));
    }

    #[test]
    fn test_runs_with_other_embeddings_keep_their_config() {
        let dir    = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        save_run(&layout, tiny_config());
        save_run(&layout, TrainConfig { emb: "glove.6B.12d".into(), d_model: 12, ..tiny_config() });

        let bow = Translator::<TB>::from_checkpoint(&layout, "bow", Default::default(), 3).unwrap();
        assert!(bow.translate("the cat").is_ok());
        let glove = Translator::<TB>::from_checkpoint(&layout, "glove.6B.12d", Default::default(), 3).unwrap();
        assert!(glove.translate("the cat").is_ok());
    }

    #[test]
    fn test_config_not_matching_checkpoint_is_an_error() {
        let dir    = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let cfg    = setup(&layout);
        CheckpointManager::new(layout.checkpoint_stem("bow"))
            .save_config(&TrainConfig { d_model: 12, ..cfg })
            .unwrap();

        let err = Translator::<TB>::from_checkpoint(&layout, "bow", Default::default(), 3)
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("does not match"));
    }

    #[test]
    fn test_missing_config_is_reported() {
        let dir    = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        assert!(Translator::<TB>::from_checkpoint(&layout, "bow", Default::default(), 4).is_err());
    }
}
