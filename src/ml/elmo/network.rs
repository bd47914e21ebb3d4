// ============================================================
// Layer 5 — ELMo Network
// ============================================================
// The bidirectional language model behind ELMo, inference only.
//
//   char ids [batch, T, max_chars]
//       │
//       ▼
//   CharacterEncoder   char embedding → Conv1d per filter width
//       │              → max over time → activation → concat
//       │              → highway layers → linear projection
//       ▼
//   token repr [batch, T, proj]
//       │
//       ├──────────────► layer 0 = [repr ‖ repr]
//       ▼
//   ProjectedLstm × n_layers, forward and backward
//       │              (residual from layer 1 upward)
//       ▼
//   layer k = [forward_k ‖ backward_k]
//
// The LSTM follows the TensorFlow cell the weights were trained
// with: gates in i, j, f, o order, +1 forget bias, clipped cell
// and clipped projection.
//
// Reference: Peters et al. (2018) Deep contextualized word representations
//            Srivastava et al. (2015) Highway Networks

use burn::{
    module::Param,
    nn::{
        conv::{Conv1d, Conv1dConfig},
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{relu, sigmoid, softmax},
};

use crate::data::characters::PAD_CHAR;
use crate::ml::elmo::options::{CnnActivation, ElmoOptions};

/// Rows of the character embedding table: every shifted id up to
/// and including the padding character.
pub const CHAR_VOCAB: usize = (PAD_CHAR + 2) as usize;

// ─── Highway ──────────────────────────────────────────────────────────────────
/// y = g · relu(x·Wt + bt) + (1 − g) · x,  g = σ(x·Wc + bc)
#[derive(Module, Debug)]
pub struct Highway<B: Backend> {
    pub transform: Linear<B>,
    pub carry:     Linear<B>,
}

impl<B: Backend> Highway<B> {
    pub fn new(dim: usize, device: &B::Device) -> Self {
        Self {
            transform: LinearConfig::new(dim, dim).init(device),
            carry:     LinearConfig::new(dim, dim).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let gate        = sigmoid(self.carry.forward(x.clone()));
        let transformed = relu(self.transform.forward(x.clone()));
        gate.clone() * transformed + gate.neg().add_scalar(1.0) * x
    }
}

// ─── Character encoder ────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct CharacterEncoder<B: Backend> {
    pub char_embedding: Embedding<B>,
    pub convolutions:   Vec<Conv1d<B>>,
    pub highways:       Vec<Highway<B>>,
    pub projection:     Linear<B>,
    /// relu when true, tanh otherwise
    pub use_relu:       bool,
}

impl<B: Backend> CharacterEncoder<B> {
    pub fn new(options: &ElmoOptions, device: &B::Device) -> Self {
        let cnn       = &options.char_cnn;
        let char_dim  = cnn.embedding.dim;
        let n_filters = options.n_filters();

        let convolutions = cnn
            .filters
            .iter()
            .map(|&[width, num]| Conv1dConfig::new(char_dim, num, width).init(device))
            .collect();
        let highways = (0..cnn.n_highway)
            .map(|_| Highway::new(n_filters, device))
            .collect();

        Self {
            char_embedding: EmbeddingConfig::new(CHAR_VOCAB, char_dim).init(device),
            convolutions,
            highways,
            projection: LinearConfig::new(n_filters, options.lstm.projection_dim).init(device),
            use_relu:   cnn.activation == CnnActivation::Relu,
        }
    }

    /// char_ids: [batch, T, max_chars] → [batch, T, projection_dim]
    pub fn forward(&self, char_ids: Tensor<B, 3, Int>) -> Tensor<B, 3> {
        let [batch, timesteps, max_chars] = char_ids.dims();

        let flat     = char_ids.reshape([batch * timesteps, max_chars]);
        // [N, max_chars, char_dim] → [N, char_dim, max_chars] for Conv1d
        let embedded = self.char_embedding.forward(flat).swap_dims(1, 2);

        let pooled: Vec<Tensor<B, 2>> = self
            .convolutions
            .iter()
            .map(|conv| {
                // Max over time first, then the non-linearity
                let features = conv.forward(embedded.clone()).max_dim(2).squeeze::<2>(2);
                if self.use_relu { relu(features) } else { features.tanh() }
            })
            .collect();

        let mut x = Tensor::cat(pooled, 1);
        for highway in &self.highways {
            x = highway.forward(x);
        }
        let x   = self.projection.forward(x);
        let dim = x.dims()[1];
        x.reshape([batch, timesteps, dim])
    }
}

// ─── LSTM with projection ─────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ProjectedLstm<B: Backend> {
    /// [input ‖ h] → 4 × cell, gates in i, j, f, o order
    pub gates:      Linear<B>,
    /// cell → projection, no bias
    pub projection: Linear<B>,
    pub cell_dim:   usize,
    pub proj_dim:   usize,
    /// 0.0 disables clipping
    pub cell_clip:  f64,
    pub proj_clip:  f64,
    /// Walk the sequence right to left
    pub reverse:    bool,
}

impl<B: Backend> ProjectedLstm<B> {
    pub fn new(input_dim: usize, options: &ElmoOptions, reverse: bool, device: &B::Device) -> Self {
        let lstm = &options.lstm;
        Self {
            gates: LinearConfig::new(input_dim + lstm.projection_dim, 4 * lstm.dim).init(device),
            projection: LinearConfig::new(lstm.dim, lstm.projection_dim)
                .with_bias(false)
                .init(device),
            cell_dim:  lstm.dim,
            proj_dim:  lstm.projection_dim,
            cell_clip: lstm.cell_clip.unwrap_or(0.0),
            proj_clip: lstm.proj_clip.unwrap_or(0.0),
            reverse,
        }
    }

    /// inputs: [batch, T, input_dim], mask: [batch, T] (1.0 = token)
    /// → [batch, T, proj_dim], zero at padded steps.
    ///
    /// Padding sits at the end of each row, so walking right to left
    /// starts every sentence from a zero state.
    pub fn forward(&self, inputs: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let [batch, timesteps, input_dim] = inputs.dims();
        let device = inputs.device();

        let mut h = Tensor::<B, 2>::zeros([batch, self.proj_dim], &device);
        let mut c = Tensor::<B, 2>::zeros([batch, self.cell_dim], &device);
        let mut outputs = Vec::with_capacity(timesteps);

        let order: Vec<usize> = if self.reverse {
            (0..timesteps).rev().collect()
        } else {
            (0..timesteps).collect()
        };

        for t in order {
            let x_t = inputs
                .clone()
                .slice([0..batch, t..t + 1, 0..input_dim])
                .reshape([batch, input_dim]);
            let m_t = mask.clone().slice([0..batch, t..t + 1]);

            let z    = self.gates.forward(Tensor::cat(vec![x_t, h.clone()], 1));
            let cell = self.cell_dim;
            let gate = |k: usize| z.clone().slice([0..batch, k * cell..(k + 1) * cell]);
            let (i, j, f, o) = (gate(0), gate(1), gate(2), gate(3));

            let mut c_new = sigmoid(f.add_scalar(1.0)) * c.clone() + sigmoid(i) * j.tanh();
            if self.cell_clip > 0.0 {
                c_new = c_new.clamp(-self.cell_clip, self.cell_clip);
            }
            let mut h_new = self.projection.forward(sigmoid(o) * c_new.clone().tanh());
            if self.proj_clip > 0.0 {
                h_new = h_new.clamp(-self.proj_clip, self.proj_clip);
            }

            // Padded steps carry the previous state forward unchanged
            let m_c = m_t.clone().expand([batch, self.cell_dim]);
            let m_h = m_t.expand([batch, self.proj_dim]);
            c = c_new * m_c.clone() + c * m_c.neg().add_scalar(1.0);
            outputs.push(h_new.clone() * m_h.clone());
            h = h_new * m_h.clone() + h * m_h.neg().add_scalar(1.0);
        }

        if self.reverse {
            outputs.reverse();
        }
        if outputs.is_empty() {
            return Tensor::zeros([batch, 0, self.proj_dim], &device);
        }
        Tensor::stack(outputs, 1)
    }
}

// ─── Bidirectional LM ─────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ElmoBiLm<B: Backend> {
    pub char_encoder:     CharacterEncoder<B>,
    pub forward_layers:   Vec<ProjectedLstm<B>>,
    pub backward_layers:  Vec<ProjectedLstm<B>>,
    pub skip_connections: bool,
}

impl<B: Backend> ElmoBiLm<B> {
    pub fn new(options: &ElmoOptions, device: &B::Device) -> Self {
        let proj = options.lstm.projection_dim;
        let build = |reverse| {
            (0..options.lstm.n_layers)
                .map(|_| ProjectedLstm::new(proj, options, reverse, device))
                .collect()
        };
        Self {
            char_encoder:     CharacterEncoder::new(options, device),
            forward_layers:   build(false),
            backward_layers:  build(true),
            skip_connections: options.lstm.use_skip_connections,
        }
    }

    /// Returns `n_layers + 1` tensors of shape [batch, T, 2 × proj].
    pub fn forward(&self, char_ids: Tensor<B, 3, Int>, mask: Tensor<B, 2>) -> Vec<Tensor<B, 3>> {
        let tokens = self.char_encoder.forward(char_ids);
        let [batch, timesteps, proj] = tokens.dims();
        let token_mask = mask.clone().unsqueeze_dim::<3>(2).expand([batch, timesteps, 2 * proj]);

        let mut layers = vec![Tensor::cat(vec![tokens.clone(), tokens.clone()], 2) * token_mask];

        let mut fwd = tokens.clone();
        let mut bwd = tokens;
        for (k, (f_layer, b_layer)) in self.forward_layers.iter().zip(&self.backward_layers).enumerate() {
            let mut f_out = f_layer.forward(fwd.clone(), mask.clone());
            let mut b_out = b_layer.forward(bwd.clone(), mask.clone());
            if k > 0 && self.skip_connections {
                f_out = f_out + fwd;
                b_out = b_out + bwd;
            }
            layers.push(Tensor::cat(vec![f_out.clone(), b_out.clone()], 2));
            fwd = f_out;
            bwd = b_out;
        }
        layers
    }
}

// ─── Scalar mix ───────────────────────────────────────────────────────────────
/// γ · Σ softmax(w)_k · layer_k. Weights start at zero (a plain
/// average) and γ at one.
#[derive(Module, Debug)]
pub struct ScalarMix<B: Backend> {
    pub weights: Param<Tensor<B, 1>>,
    pub gamma:   Param<Tensor<B, 1>>,
}

impl<B: Backend> ScalarMix<B> {
    pub fn new(num_layers: usize, device: &B::Device) -> Self {
        Self {
            weights: Param::from_tensor(Tensor::zeros([num_layers], device)),
            gamma:   Param::from_tensor(Tensor::ones([1], device)),
        }
    }

    pub fn forward(&self, layers: &[Tensor<B, 3>]) -> Tensor<B, 3> {
        let n = layers.len();
        let stacked: Tensor<B, 4> = Tensor::stack(layers.to_vec(), 0);
        let [_, batch, timesteps, dim] = stacked.dims();

        let weights = softmax(self.weights.val(), 0)
            .reshape([n, 1, 1, 1])
            .expand([n, batch, timesteps, dim]);
        let gamma = self.gamma.val().reshape([1, 1, 1]).expand([batch, timesteps, dim]);

        (stacked * weights).sum_dim(0).squeeze::<3>(0) * gamma
    }
}

// ─── Elmo ─────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Elmo<B: Backend> {
    pub bilm: ElmoBiLm<B>,
    pub mix:  ScalarMix<B>,
}

pub struct ElmoOutput<B: Backend> {
    /// Raw biLM layers, boundaries included
    pub layers: Vec<Tensor<B, 3>>,
    /// Scalar mix of `layers`
    pub mixed:  Tensor<B, 3>,
}

impl<B: Backend> Elmo<B> {
    /// Randomly initialised network with the shape described by `options`.
    pub fn new(options: &ElmoOptions, device: &B::Device) -> Self {
        Self {
            bilm: ElmoBiLm::new(options, device),
            mix:  ScalarMix::new(options.num_layers(), device),
        }
    }

    pub fn forward(&self, char_ids: Tensor<B, 3, Int>, mask: Tensor<B, 2>) -> ElmoOutput<B> {
        let layers = self.bilm.forward(char_ids, mask);
        let mixed  = self.mix.forward(&layers);
        ElmoOutput { layers, mixed }
    }
}
