use anyhow::{bail, Result};
use burn::{
    module::Param,
    nn::{
        attention::{generate_autoregressive_mask, MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
        PositionalEncoding, PositionalEncodingConfig,
    },
    prelude::*,
    tensor::activation::{log_softmax, relu},
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct Seq2SeqTransformerConfig {
    pub vocab_size: usize,
    pub d_model:    usize,
    pub num_heads:  usize,
    pub num_layers: usize,
    pub d_ff:       usize,
    pub dropout:    f64,
    #[config(default = 5000)]
    pub max_positions: usize,
}

impl Seq2SeqTransformerConfig {
    /// Reject shapes the attention layers cannot split into heads.
    pub fn check(&self) -> Result<()> {
        if self.num_heads == 0 || self.d_model % self.num_heads != 0 {
            bail!(
                "d_model ({}) must be a multiple of num_heads ({})",
                self.d_model, self.num_heads
            );
        }
        if self.vocab_size == 0 {
            bail!("vocabulary is empty");
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2SeqTransformer<B> {
        let encoder = (0..self.num_layers).map(|_| self.build_encoder_layer(device)).collect();
        let decoder = (0..self.num_layers).map(|_| self.build_decoder_layer(device)).collect();
        Seq2SeqTransformer {
            src_embed: EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            tgt_embed: EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            positions: PositionalEncodingConfig::new(self.d_model)
                .with_max_sequence_size(self.max_positions)
                .init(device),
            encoder,
            encoder_norm: LayerNormConfig::new(self.d_model).init(device),
            decoder,
            decoder_norm: LayerNormConfig::new(self.d_model).init(device),
            generator: LinearConfig::new(self.d_model, self.vocab_size).init(device),
            dropout:   DropoutConfig::new(self.dropout).init(),
            d_model:   self.d_model,
        }
    }

    fn attention<B: Backend>(&self, device: &B::Device) -> MultiHeadAttention<B> {
        MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device)
    }

    fn feed_forward<B: Backend>(&self, device: &B::Device) -> FeedForward<B> {
        FeedForward {
            linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }

    fn build_encoder_layer<B: Backend>(&self, device: &B::Device) -> EncoderLayer<B> {
        EncoderLayer {
            self_attn: self.attention(device),
            ffn:       self.feed_forward(device),
            norm1:     LayerNormConfig::new(self.d_model).init(device),
            norm2:     LayerNormConfig::new(self.d_model).init(device),
            dropout:   DropoutConfig::new(self.dropout).init(),
        }
    }

    fn build_decoder_layer<B: Backend>(&self, device: &B::Device) -> DecoderLayer<B> {
        DecoderLayer {
            self_attn:  self.attention(device),
            cross_attn: self.attention(device),
            ffn:        self.feed_forward(device),
            norm1:      LayerNormConfig::new(self.d_model).init(device),
            norm2:      LayerNormConfig::new(self.d_model).init(device),
            norm3:      LayerNormConfig::new(self.d_model).init(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
        }
    }
}

// ─── Position-wise feed-forward ───────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub linear1: Linear<B>,
    pub linear2: Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.linear2.forward(self.dropout.forward(relu(self.linear1.forward(x))))
    }
}

// ─── Encoder layer (pre-norm) ─────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    pub self_attn: MultiHeadAttention<B>,
    pub ffn:       FeedForward<B>,
    pub norm1:     LayerNorm<B>,
    pub norm2:     LayerNorm<B>,
    pub dropout:   Dropout,
}

impl<B: Backend> EncoderLayer<B> {
    /// x: [batch, src_len, d_model], src_pad: [batch, src_len]
    pub fn forward(&self, x: Tensor<B, 3>, src_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let h    = self.norm1.forward(x.clone());
        let attn = self.self_attn.forward(MhaInput::self_attn(h).mask_pad(src_pad)).context;
        let x    = x + self.dropout.forward(attn);

        let h = self.norm2.forward(x.clone());
        x + self.dropout.forward(self.ffn.forward(h))
    }
}

// ─── Decoder layer (pre-norm) ─────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    pub self_attn:  MultiHeadAttention<B>,
    pub cross_attn: MultiHeadAttention<B>,
    pub ffn:        FeedForward<B>,
    pub norm1:      LayerNorm<B>,
    pub norm2:      LayerNorm<B>,
    pub norm3:      LayerNorm<B>,
    pub dropout:    Dropout,
}

impl<B: Backend> DecoderLayer<B> {
    pub fn forward(
        &self,
        x:        Tensor<B, 3>,
        memory:   Tensor<B, 3>,
        src_pad:  Tensor<B, 2, Bool>,
        tgt_pad:  Tensor<B, 2, Bool>,
        causal:   Tensor<B, 3, Bool>,
    ) -> Tensor<B, 3> {
        let h    = self.norm1.forward(x.clone());
        let attn = self.self_attn
            .forward(MhaInput::self_attn(h).mask_pad(tgt_pad).mask_attn(causal))
            .context;
        let x    = x + self.dropout.forward(attn);

        let h     = self.norm2.forward(x.clone());
        let cross = self.cross_attn
            .forward(MhaInput::new(h, memory.clone(), memory).mask_pad(src_pad))
            .context;
        let x     = x + self.dropout.forward(cross);

        let h = self.norm3.forward(x.clone());
        x + self.dropout.forward(self.ffn.forward(h))
    }
}

// ─── Full encoder–decoder ─────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Seq2SeqTransformer<B: Backend> {
    pub src_embed:    Embedding<B>,
    pub tgt_embed:    Embedding<B>,
    pub positions:    PositionalEncoding<B>,
    pub encoder:      Vec<EncoderLayer<B>>,
    pub encoder_norm: LayerNorm<B>,
    pub decoder:      Vec<DecoderLayer<B>>,
    pub decoder_norm: LayerNorm<B>,
    pub generator:    Linear<B>,
    pub dropout:      Dropout,
    pub d_model:      usize,
}

impl<B: Backend> Seq2SeqTransformer<B> {
    /// Initialise both embedding tables from pretrained vectors
    /// `[vocab_size, d_model]`. They stay trainable.
    pub fn with_pretrained_embeddings(mut self, weights: Tensor<B, 2>) -> Result<Self> {
        let expected = self.src_embed.weight.dims();
        if weights.dims() != expected {
            bail!(
                "pretrained vectors have shape {:?}, model expects {:?}",
                weights.dims(), expected
            );
        }
        self.src_embed.weight = Param::from_tensor(weights.clone());
        self.tgt_embed.weight = Param::from_tensor(weights);
        Ok(self)
    }

    /// Token embedding × √d_model, plus sinusoidal positions.
    fn embed(&self, table: &Embedding<B>, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let x = table.forward(ids).mul_scalar((self.d_model as f64).sqrt());
        self.dropout.forward(self.positions.forward(x))
    }

    /// src: [batch, src_len] → memory [batch, src_len, d_model]
    pub fn encode(&self, src: Tensor<B, 2, Int>, src_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let mut x = self.embed(&self.src_embed, src);
        for layer in &self.encoder {
            x = layer.forward(x, src_pad.clone());
        }
        self.encoder_norm.forward(x)
    }

    /// tgt_in: [batch, tgt_len] → hidden states [batch, tgt_len, d_model]
    pub fn decode(
        &self,
        memory:  Tensor<B, 3>,
        src_pad: Tensor<B, 2, Bool>,
        tgt_in:  Tensor<B, 2, Int>,
        tgt_pad: Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let [batch, tgt_len] = tgt_in.dims();
        let causal = generate_autoregressive_mask::<B>(batch, tgt_len, &tgt_in.device());

        let mut x = self.embed(&self.tgt_embed, tgt_in);
        for layer in &self.decoder {
            x = layer.forward(x, memory.clone(), src_pad.clone(), tgt_pad.clone(), causal.clone());
        }
        self.decoder_norm.forward(x)
    }

    /// Hidden states → log-probabilities over the vocabulary.
    pub fn generate(&self, hidden: Tensor<B, 3>) -> Tensor<B, 3> {
        log_softmax(self.generator.forward(hidden), 2)
    }

    /// Teacher-forced log-probabilities [batch, tgt_len, vocab].
    pub fn forward(
        &self,
        src:     Tensor<B, 2, Int>,
        src_pad: Tensor<B, 2, Bool>,
        tgt_in:  Tensor<B, 2, Int>,
        tgt_pad: Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let memory = self.encode(src, src_pad.clone());
        self.generate(self.decode(memory, src_pad, tgt_in, tgt_pad))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn tiny() -> Seq2SeqTransformerConfig {
        Seq2SeqTransformerConfig::new(12, 8, 2, 2, 16, 0.0)
    }

    fn ids(rows: [[i32; 3]; 2]) -> Tensor<TB, 2, Int> {
        Tensor::from_ints(rows, &Default::default())
    }

    #[test]
    fn test_rejects_indivisible_heads() {
        assert!(Seq2SeqTransformerConfig::new(12, 10, 3, 1, 16, 0.0).check().is_err());
        assert!(tiny().check().is_ok());
    }

    #[test]
    fn test_forward_gives_log_probabilities() {
        let model = tiny().init::<TB>(&Default::default());
        let src   = ids([[2, 5, 3], [2, 3, 1]]);
        let tgt   = ids([[2, 6, 7], [2, 8, 1]]);
        let out   = model.forward(src.clone(), src.equal_elem(1), tgt.clone(), tgt.equal_elem(1));
        assert_eq!(out.dims(), [2, 3, 12]);

        let sums: Vec<f32> = out.exp().sum_dim(2).into_data().to_vec().unwrap();
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-4));
    }

    #[test]
    fn test_decoder_does_not_see_future_tokens() {
        let model  = tiny().init::<TB>(&Default::default());
        let src    = ids([[2, 5, 3], [2, 5, 3]]);
        let tgt    = ids([[2, 6, 7], [2, 6, 9]]);
        let out    = model.forward(src.clone(), src.equal_elem(1), tgt.clone(), tgt.equal_elem(1));

        let first  = out.clone().slice([0..1, 0..2, 0..12]);
        let second = out.slice([1..2, 0..2, 0..12]);
        let diff   = (first - second).abs().max().into_scalar().elem::<f32>();
        assert!(diff < 1e-5);
    }

    #[test]
    fn test_pretrained_embeddings_shape_checked() {
        let device = Default::default();
        let model  = tiny().init::<TB>(&device);
        assert!(model.with_pretrained_embeddings(Tensor::zeros([3, 8], &device)).is_err());

        let model = tiny().init::<TB>(&device);
        let model = model.with_pretrained_embeddings(Tensor::ones([12, 8], &device)).unwrap();
        let sum   = model.tgt_embed.weight.val().sum().into_scalar().elem::<f32>();
        assert_eq!(sum, 96.0);
    }
}
