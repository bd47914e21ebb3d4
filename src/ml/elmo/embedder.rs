// ============================================================
// Layer 5 — ElmoEmbedder
// ============================================================
// Adapts the Burn ELMo network to the domain's
// ContextualEmbedder trait:
//
//   tokens ──► CharacterMapper ──► Int tensor [b, T, max_chars]
//                                  mask       [b, T]
//          ──► Elmo::forward    ──► [b, T, 2 × proj]
//          ──► rows 1..=len per sentence (boundaries dropped)
//          ──► TokenEmbeddings

use anyhow::{bail, Result};
use burn::prelude::*;

use crate::data::characters::CharacterMapper;
use crate::domain::sentence_pair::TokenEmbeddings;
use crate::domain::traits::ContextualEmbedder;
use crate::ml::elmo::network::Elmo;
use crate::ml::elmo::options::ElmoOptions;

/// Which biLM output is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Learned scalar mix of all layers
    Mixed,
    /// One raw layer: 0 is the token layer, 1.. are the LSTM layers
    Layer(usize),
}

/// Frozen ELMo behind [`ContextualEmbedder`].
///
/// Every call starts the biLM from a zero LSTM state, so a sentence
/// gets the same vectors whatever was embedded before it. AllenNLP's
/// `Elmo` keeps the LSTM state between batches instead, so for every
/// pair after the first the vectors differ from what it produces.
pub struct ElmoEmbedder<B: Backend> {
    model:          Elmo<B>,
    mapper:         CharacterMapper,
    representation: Representation,
    output_dim:     usize,
    device:         B::Device,
}

impl<B: Backend> ElmoEmbedder<B> {
    pub fn new(
        model:          Elmo<B>,
        options:        &ElmoOptions,
        representation: Representation,
        device:         B::Device,
    ) -> Result<Self> {
        if let Representation::Layer(k) = representation {
            if k >= options.num_layers() {
                bail!("ELMo has {} layers, layer {k} does not exist", options.num_layers());
            }
        }
        Ok(Self {
            model,
            mapper: CharacterMapper::new(options.char_cnn.max_characters_per_token),
            representation,
            output_dim: options.output_dim(),
            device,
        })
    }
}

impl<B: Backend> ContextualEmbedder for ElmoEmbedder<B> {
    fn embed(&self, sentences: &[Vec<String>]) -> Result<Vec<TokenEmbeddings>> {
        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        let chars = self.mapper.batch_ids(sentences);
        let ids = Tensor::<B, 1, Int>::from_ints(chars.ids.as_slice(), &self.device)
            .reshape([chars.batch, chars.timesteps, chars.max_chars]);
        let mask = Tensor::<B, 1>::from_floats(chars.mask().as_slice(), &self.device)
            .reshape([chars.batch, chars.timesteps]);

        let output = self.model.forward(ids, mask);
        let selected = match self.representation {
            Representation::Mixed    => output.mixed,
            Representation::Layer(k) => output.layers[k].clone(),
        };

        let dim = self.output_dim;
        let mut result = Vec::with_capacity(chars.batch);
        for (b, &len) in chars.lengths.iter().enumerate() {
            if len == 0 {
                result.push(TokenEmbeddings::new(0, dim, Vec::new()));
                continue;
            }
            let rows: Vec<f32> = selected
                .clone()
                .slice([b..b + 1, 1..len + 1, 0..dim])
                .into_data()
                .convert::<f32>()
                .to_vec()
                .map_err(|e| anyhow::anyhow!("Cannot read ELMo output: {e:?}"))?;
            result.push(TokenEmbeddings::new(len, dim, rows));
        }
        Ok(result)
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::elmo::options::tiny_options;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn embedder(representation: Representation) -> ElmoEmbedder<TB> {
        let device  = Default::default();
        let options = tiny_options();
        ElmoEmbedder::new(Elmo::new(&options, &device), &options, representation, device).unwrap()
    }

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_one_row_per_token() {
        let e   = embedder(Representation::Mixed);
        let out = e.embed(&[words("he go home ."), words("he goes")]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].shape(), [4, 8]);
        assert_eq!(out[1].shape(), [2, 8]);
    }

    #[test]
    fn test_padding_does_not_leak_into_short_sentence() {
        let e     = embedder(Representation::Layer(2));
        let alone = e.embed(&[words("a b")]).unwrap();
        let mixed = e.embed(&[words("a b"), words("c d e f g")]).unwrap();
        for (x, y) in alone[0].values.iter().zip(&mixed[0].values) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_earlier_calls_do_not_change_later_vectors() {
        let e      = embedder(Representation::Layer(1));
        let first  = e.embed(&[words("she go home")]).unwrap();
        e.embed(&[words("an other sentence entirely")]).unwrap();
        let second = e.embed(&[words("she go home")]).unwrap();
        assert_eq!(first[0].values, second[0].values);
    }

    #[test]
    fn test_empty_sentence_gives_empty_matrix() {
        let e   = embedder(Representation::Layer(0));
        let out = e.embed(&[Vec::new()]).unwrap();
        assert_eq!(out[0].tokens, 0);
    }

    #[test]
    fn test_rejects_unknown_layer() {
        let device  = Default::default();
        let options = tiny_options();
        let model   = Elmo::<TB>::new(&options, &device);
        assert!(ElmoEmbedder::new(model, &options, Representation::Layer(3), device).is_err());
    }
}
