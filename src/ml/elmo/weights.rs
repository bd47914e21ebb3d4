// ============================================================
// Layer 5 — ELMo Weight Loading
// ============================================================
// Pretrained weights are read by dataset path, either from the
// published HDF5 file (`hdf5` feature) or from a safetensors file
// whose tensor names are those same paths:
//
//   char_embed                                     [261, char_dim]
//   CNN/W_cnn_{i}, CNN/b_cnn_{i}                   [1, width, char_dim, num], [num]
//   CNN_high_{k}/{W,b}_{transform,carry}           [d, d], [d]
//   CNN_proj/W_proj, CNN_proj/b_proj               [d, proj], [proj]
//   RNN_{dir}/RNN/MultiRNNCell/Cell{layer}/LSTMCell/
//       W_0                                        [input + proj, 4 × cell]
//       B                                          [4 × cell]
//       W_P_0                                      [cell, proj]
//
// TensorFlow stores dense kernels as [in, out], which is exactly
// Burn's Linear layout, so only the convolution kernels need a
// permutation. The character table gets a zero row prepended for
// the padding id 0.

use anyhow::{bail, Context, Result};
use burn::{module::Param, prelude::*};
use safetensors::{Dtype, SafeTensors};
use std::{fs, io::Read, path::Path};

use crate::ml::elmo::network::{Elmo, ProjectedLstm, CHAR_VOCAB};

/// First bytes of every HDF5 file without a user block.
const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

pub enum WeightFile {
    /// An in-memory safetensors file
    SafeTensors(Vec<u8>),
    #[cfg(feature = "hdf5")]
    Hdf5(hdf5::File),
}

impl WeightFile {
    /// Open `path`, telling the formats apart by content. Downloaded
    /// files sit in the cache under hashed names without extension.
    pub fn open(path: &Path) -> Result<Self> {
        if is_hdf5(path)? {
            return Self::open_hdf5(path);
        }
        let bytes = fs::read(path)
            .with_context(|| format!("Cannot read ELMo weights '{}'", path.display()))?;
        Ok(Self::SafeTensors(bytes))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::SafeTensors(bytes)
    }

    #[cfg(feature = "hdf5")]
    fn open_hdf5(path: &Path) -> Result<Self> {
        let file = hdf5::File::open(path)
            .map_err(|e| anyhow::anyhow!("Cannot open HDF5 weights '{}': {e}", path.display()))?;
        tracing::debug!("Reading HDF5 weights '{}'", path.display());
        Ok(Self::Hdf5(file))
    }

    #[cfg(not(feature = "hdf5"))]
    fn open_hdf5(path: &Path) -> Result<Self> {
        bail!(
            "'{}' is an HDF5 file; rebuild with `--features hdf5` to read it, \
             or pass the weights as safetensors",
            path.display()
        )
    }

    /// Shape and f32 values of the dataset or tensor called `name`.
    pub fn read(&self, name: &str) -> Result<(Vec<usize>, Vec<f32>)> {
        match self {
            Self::SafeTensors(bytes) => {
                let st = SafeTensors::deserialize(bytes)
                    .map_err(|e| anyhow::anyhow!("Invalid safetensors weight file: {e:?}"))?;
                let view = st
                    .tensor(name)
                    .map_err(|e| anyhow::anyhow!("Missing ELMo weight '{name}': {e:?}"))?;
                if view.dtype() != Dtype::F32 {
                    bail!("ELMo weight '{name}' is {:?}, expected F32", view.dtype());
                }
                let values = view
                    .data()
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect();
                Ok((view.shape().to_vec(), values))
            }
            #[cfg(feature = "hdf5")]
            Self::Hdf5(file) => {
                let dataset = file
                    .dataset(name)
                    .map_err(|e| anyhow::anyhow!("Missing ELMo weight '{name}': {e}"))?;
                let values = dataset
                    .read_raw::<f32>()
                    .map_err(|e| anyhow::anyhow!("Cannot read ELMo weight '{name}': {e}"))?;
                Ok((dataset.shape(), values))
            }
        }
    }
}

fn is_hdf5(path: &Path) -> Result<bool> {
    let mut head = Vec::with_capacity(HDF5_SIGNATURE.len());
    fs::File::open(path)
        .and_then(|f| f.take(HDF5_SIGNATURE.len() as u64).read_to_end(&mut head))
        .with_context(|| format!("Cannot read ELMo weights '{}'", path.display()))?;
    Ok(head == HDF5_SIGNATURE)
}

/// TF convolution kernel `[1, width, in, out]` as Burn's Conv1d
/// weight `[out, in, width]`.
fn conv_kernel<B: Backend>(kernel: Tensor<B, 4>) -> Tensor<B, 3> {
    let [_, width, in_dim, num] = kernel.dims();
    kernel.reshape([width, in_dim, num]).permute([2, 1, 0])
}

fn tensor<B: Backend, const D: usize>(
    file:   &WeightFile,
    name:   &str,
    want:   [usize; D],
    device: &B::Device,
) -> Result<Tensor<B, D>> {
    let (shape, values) = file.read(name)?;
    if shape != want {
        bail!("ELMo weight '{name}' has shape {shape:?}, model expects {want:?}");
    }
    Ok(Tensor::from_data(TensorData::new(values, want), device))
}

impl<B: Backend> Elmo<B> {
    /// Replace every pretrained parameter with the values in `file`.
    /// The scalar mix keeps its defaults.
    pub fn load_weights(mut self, file: &WeightFile, device: &B::Device) -> Result<Self> {
        let enc = &mut self.bilm.char_encoder;

        // ── Character table ──────────────────────────────────────────────────
        let [_, char_dim] = enc.char_embedding.weight.dims();
        let chars: Tensor<B, 2> = tensor(file, "char_embed", [CHAR_VOCAB - 1, char_dim], device)?;
        let table = Tensor::cat(vec![Tensor::zeros([1, char_dim], device), chars], 0);
        enc.char_embedding.weight = Param::from_tensor(table);

        // ── Convolutions ─────────────────────────────────────────────────────
        for (i, conv) in enc.convolutions.iter_mut().enumerate() {
            let [num, in_dim, width] = conv.weight.dims();
            let kernel: Tensor<B, 4> = tensor(file, &format!("CNN/W_cnn_{i}"), [1, width, in_dim, num], device)?;
            conv.weight = Param::from_tensor(conv_kernel(kernel));
            conv.bias   = Some(Param::from_tensor(tensor(file, &format!("CNN/b_cnn_{i}"), [num], device)?));
        }

        // ── Highways ─────────────────────────────────────────────────────────
        for (k, highway) in enc.highways.iter_mut().enumerate() {
            let [d, _] = highway.transform.weight.dims();
            let scope  = format!("CNN_high_{k}");
            highway.transform.weight = Param::from_tensor(tensor(file, &format!("{scope}/W_transform"), [d, d], device)?);
            highway.transform.bias   = Some(Param::from_tensor(tensor(file, &format!("{scope}/b_transform"), [d], device)?));
            highway.carry.weight     = Param::from_tensor(tensor(file, &format!("{scope}/W_carry"), [d, d], device)?);
            highway.carry.bias       = Some(Param::from_tensor(tensor(file, &format!("{scope}/b_carry"), [d], device)?));
        }

        // ── Projection ───────────────────────────────────────────────────────
        let [n_filters, proj] = enc.projection.weight.dims();
        enc.projection.weight = Param::from_tensor(tensor(file, "CNN_proj/W_proj", [n_filters, proj], device)?);
        enc.projection.bias   = Some(Param::from_tensor(tensor(file, "CNN_proj/b_proj", [proj], device)?));

        // ── LSTM stacks ──────────────────────────────────────────────────────
        for (direction, layers) in [&mut self.bilm.forward_layers, &mut self.bilm.backward_layers]
            .into_iter()
            .enumerate()
        {
            for (layer, lstm) in layers.iter_mut().enumerate() {
                let scope = format!("RNN_{direction}/RNN/MultiRNNCell/Cell{layer}/LSTMCell");
                load_lstm(lstm, file, &scope, device)?;
            }
        }

        tracing::info!("Loaded pretrained ELMo weights");
        Ok(self)
    }
}

fn load_lstm<B: Backend>(
    lstm:   &mut ProjectedLstm<B>,
    file:   &WeightFile,
    scope:  &str,
    device: &B::Device,
) -> Result<()> {
    let [rows, cols] = lstm.gates.weight.dims();
    lstm.gates.weight = Param::from_tensor(tensor(file, &format!("{scope}/W_0"), [rows, cols], device)?);
    lstm.gates.bias   = Some(Param::from_tensor(tensor(file, &format!("{scope}/B"), [cols], device)?));
    lstm.projection.weight = Param::from_tensor(
        tensor(file, &format!("{scope}/W_P_0"), [lstm.cell_dim, lstm.proj_dim], device)?,
    );
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::elmo::options::tiny_options;
    use burn::backend::NdArray;
    use safetensors::tensor::TensorView;
    use std::collections::HashMap;

    type TB = NdArray;

    /// Every tensor the tiny model needs; element `i` of tensor
    /// `name` is `fill(name, i)`.
    fn tiny_weights(fill: impl Fn(&str, usize) -> f32) -> Vec<u8> {
        let o = tiny_options();
        let (c, p, d) = (o.lstm.dim, o.lstm.projection_dim, o.n_filters());
        let mut shapes: Vec<(String, Vec<usize>)> = vec![
            ("char_embed".into(), vec![CHAR_VOCAB - 1, o.char_cnn.embedding.dim]),
            ("CNN_proj/W_proj".into(), vec![d, p]),
            ("CNN_proj/b_proj".into(), vec![p]),
            ("CNN_high_0/W_transform".into(), vec![d, d]),
            ("CNN_high_0/b_transform".into(), vec![d]),
            ("CNN_high_0/W_carry".into(), vec![d, d]),
            ("CNN_high_0/b_carry".into(), vec![d]),
        ];
        for (i, [w, n]) in o.char_cnn.filters.iter().enumerate() {
            shapes.push((format!("CNN/W_cnn_{i}"), vec![1, *w, o.char_cnn.embedding.dim, *n]));
            shapes.push((format!("CNN/b_cnn_{i}"), vec![*n]));
        }
        for dir in 0..2 {
            for layer in 0..o.lstm.n_layers {
                let s = format!("RNN_{dir}/RNN/MultiRNNCell/Cell{layer}/LSTMCell");
                shapes.push((format!("{s}/W_0"), vec![2 * p, 4 * c]));
                shapes.push((format!("{s}/B"), vec![4 * c]));
                shapes.push((format!("{s}/W_P_0"), vec![c, p]));
            }
        }

        let buffers: Vec<(String, Vec<usize>, Vec<u8>)> = shapes
            .into_iter()
            .map(|(name, shape)| {
                let n: usize = shape.iter().product();
                let bytes = (0..n).flat_map(|i| fill(&name, i).to_le_bytes()).collect();
                (name, shape, bytes)
            })
            .collect();
        let views: Vec<(String, TensorView<'_>)> = buffers
            .iter()
            .map(|(name, shape, bytes)| {
                (name.clone(), TensorView::new(Dtype::F32, shape.clone(), bytes).unwrap())
            })
            .collect();
        safetensors::serialize(views, &None::<HashMap<String, String>>).unwrap()
    }

    fn load(bytes: Vec<u8>) -> Elmo<TB> {
        let device = Default::default();
        Elmo::<TB>::new(&tiny_options(), &device)
            .load_weights(&WeightFile::from_bytes(bytes), &device)
            .unwrap()
    }

    #[test]
    fn test_loads_every_parameter() {
        let elmo = load(tiny_weights(|_, _| 0.5));

        let table: Vec<f32> = elmo.bilm.char_encoder.char_embedding.weight.val()
            .into_data().to_vec().unwrap();
        // Padding row is zero, the rest come from the file
        assert!(table[..4].iter().all(|&v| v == 0.0));
        assert!(table[4..].iter().all(|&v| v == 0.5));

        let w: Vec<f32> = elmo.bilm.backward_layers[1].projection.weight.val()
            .into_data().to_vec().unwrap();
        assert!(w.iter().all(|&v| v == 0.5));
    }

    #[test]
    fn test_conv_kernel_moves_every_index() {
        // W_cnn_1 is [1, width 2, in 4, out 5]; each element holds its flat index
        let elmo = load(tiny_weights(|name, i| if name.starts_with("CNN/W_cnn_") { i as f32 } else { 0.5 }));
        let conv = &elmo.bilm.char_encoder.convolutions[1];
        assert_eq!(conv.weight.dims(), [5, 4, 2]);

        let got: Vec<f32> = conv.weight.val().into_data().to_vec().unwrap();
        for out in 0..5 {
            for input in 0..4 {
                for w in 0..2 {
                    let loaded = got[(out * 4 + input) * 2 + w];
                    let stored = ((w * 4 + input) * 5 + out) as f32;
                    assert_eq!(loaded, stored, "out={out} in={input} w={w}");
                }
            }
        }
    }

    #[test]
    fn test_lstm_kernel_keeps_tf_layout() {
        // W_0 rows are [input; previous output], columns the i, j, f, o blocks
        let elmo  = load(tiny_weights(|name, i| if name.ends_with("/W_0") { i as f32 } else { 0.0 }));
        let gates = &elmo.bilm.forward_layers[0].gates;
        let got: Vec<f32> = gates.weight.val().into_data().to_vec().unwrap();
        let expected: Vec<f32> = (0..got.len()).map(|i| i as f32).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_rejects_missing_tensor() {
        let device = Default::default();
        let empty  = safetensors::serialize(
            Vec::<(String, TensorView<'_>)>::new(),
            &None::<HashMap<String, String>>,
        ).unwrap();
        let err = Elmo::<TB>::new(&tiny_options(), &device)
            .load_weights(&WeightFile::from_bytes(empty), &device)
            .err()
            .unwrap();
        assert!(err.to_string().contains("char_embed"));
    }

    #[test]
    fn test_safetensors_file_is_opened_by_content() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("8f3a1c");
        fs::write(&path, tiny_weights(|_, _| 0.25)).unwrap();

        let file = WeightFile::open(&path).unwrap();
        let (shape, values) = file.read("CNN_proj/b_proj").unwrap();
        assert_eq!(shape, vec![4]);
        assert_eq!(values, vec![0.25; 4]);
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_hdf5_needs_the_feature() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.hdf5");
        let mut bytes = HDF5_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0; 64]);
        fs::write(&path, bytes).unwrap();

        let err = WeightFile::open(&path).err().unwrap();
        assert!(err.to_string().contains("--features hdf5"));
    }

    #[cfg(feature = "hdf5")]
    #[test]
    fn test_reads_hdf5_datasets_by_path() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.hdf5");
        {
            let h5    = hdf5::File::create(&path).unwrap();
            let group = h5.create_group("CNN_proj").unwrap();
            let data  = group.new_dataset::<f32>().shape([2, 3]).create("W_proj").unwrap();
            let values = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
            data.write_raw(&values[..]).unwrap();
        }

        let file = WeightFile::open(&path).unwrap();
        assert!(matches!(file, WeightFile::Hdf5(_)));
        let (shape, values) = file.read("CNN_proj/W_proj").unwrap();
        assert_eq!(shape, vec![2, 3]);
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(file.read("CNN_proj/b_proj").is_err());
    }
}
