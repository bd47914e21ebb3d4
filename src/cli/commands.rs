// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands `embed`, `train`, `translate`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{
    embed_use_case::EmbedConfig,
    train_use_case::TrainConfig,
    translate_use_case::TranslateConfig,
};
use crate::infra::resources::{ELMO_OPTIONS_URL, ELMO_WEIGHTS_URL};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract ELMo embeddings for a tab-separated corpus
    Embed(EmbedArgs),

    /// Train the correction Transformer on lang8
    Train(TrainArgs),

    /// Correct a file line by line with a trained checkpoint
    Translate(TranslateArgs),
}

/// Arguments for the `embed` command
#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Tab-separated file: source<TAB>target per line
    #[arg(long, default_value = "CoNLL_data/train.txt")]
    pub corpus: PathBuf,

    /// Safetensors file receiving the embedding pairs
    #[arg(long, default_value = "CoNLL_data/train.elmo")]
    pub output: PathBuf,

    /// ELMo options JSON (URL or path)
    #[arg(long, default_value = ELMO_OPTIONS_URL)]
    pub options_file: String,

    /// ELMo weights, HDF5 (`hdf5` feature) or safetensors (URL or path)
    #[arg(long, default_value = ELMO_WEIGHTS_URL)]
    pub weight_file: String,

    /// Only embed the first N pairs
    #[arg(long)]
    pub limit: Option<usize>,

    /// Emit raw biLM layer K (0 = token layer) instead of the scalar mix
    #[arg(long)]
    pub layer: Option<usize>,
}

impl From<EmbedArgs> for EmbedConfig {
    fn from(a: EmbedArgs) -> Self {
        EmbedConfig {
            corpus:       a.corpus,
            output:       a.output,
            options_file: a.options_file,
            weight_file:  a.weight_file,
            limit:        a.limit,
            layer:        a.layer,
        }
    }
}

/// Arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Project root holding data/src, data/test, data/eval, data/models
    #[arg(long, default_value = ".")]
    pub root_dir: String,

    /// Embedding name, used in the checkpoint file name
    #[arg(long, default_value = "bow")]
    pub emb: String,

    /// Model width (d_model); replaced by the vector size with --vectors
    #[arg(long, default_value_t = 512)]
    pub emb_dim: usize,

    /// Token budget per batch: count × padded length
    #[arg(long, default_value_t = 2500)]
    pub batch_tokens: usize,

    #[arg(long, default_value_t = 3)]
    pub epochs: usize,

    /// Comma-separated GPU ordinals; the first holds the master weights
    #[arg(long, value_delimiter = ',', default_value = "0")]
    pub devices: Vec<usize>,

    /// Minimum source-token frequency kept in the vocabulary
    #[arg(long, default_value_t = 2)]
    pub min_freq: usize,

    /// Encoder and decoder depth
    #[arg(long, default_value_t = 6)]
    pub num_layers: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 2048)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Label smoothing mass spread over non-gold tokens
    #[arg(long, default_value_t = 0.1)]
    pub smoothing: f64,

    /// Noam warmup steps
    #[arg(long, default_value_t = 2000)]
    pub warmup: usize,

    /// Noam learning-rate factor
    #[arg(long, default_value_t = 1.0)]
    pub factor: f64,

    /// GloVe-format text vectors to initialise both embeddings
    #[arg(long)]
    pub vectors: Option<String>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            root_dir:     a.root_dir,
            emb:          a.emb,
            d_model:      a.emb_dim,
            batch_tokens: a.batch_tokens,
            epochs:       a.epochs,
            devices:      a.devices,
            min_freq:     a.min_freq,
            num_layers:   a.num_layers,
            num_heads:    a.num_heads,
            d_ff:         a.d_ff,
            dropout:      a.dropout,
            smoothing:    a.smoothing,
            warmup:       a.warmup,
            factor:       a.factor,
            vectors:      a.vectors,
            seed:         a.seed,
            vocab_size:   0,
        }
    }
}

/// Arguments for the `translate` command
#[derive(Args, Debug)]
pub struct TranslateArgs {
    #[arg(long, default_value = ".")]
    pub root_dir: String,

    /// Embedding name the model was trained with
    #[arg(long, default_value = "bow")]
    pub emb: String,

    /// One source sentence per line [default: <root-dir>/data/test/lang8.test.src]
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// [default: <root-dir>/data/eval/pred.txt]
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Maximum number of generated tokens per sentence
    #[arg(long, default_value_t = 60)]
    pub max_len: usize,
}

impl From<TranslateArgs> for TranslateConfig {
    fn from(a: TranslateArgs) -> Self {
        TranslateConfig {
            root_dir: a.root_dir,
            emb:      a.emb,
            input:    a.input,
            output:   a.output,
            max_len:  a.max_len,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use crate::cli::Cli;
    use clap::Parser;

    use super::*;

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["gec-transformer", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        let def = TrainConfig::default();
        assert_eq!(cfg.d_model, def.d_model);
        assert_eq!(cfg.batch_tokens, def.batch_tokens);
        assert_eq!(cfg.devices, def.devices);
        assert_eq!(cfg.warmup, def.warmup);
    }

    #[test]
    fn test_devices_comma_list() {
        let cli = Cli::try_parse_from(["gec-transformer", "train", "--devices", "0,1,3"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        assert_eq!(args.devices, vec![0, 1, 3]);
    }

    #[test]
    fn test_embed_optional_layer() {
        let cli = Cli::try_parse_from(["gec-transformer", "embed", "--limit", "10", "--layer", "1"]).unwrap();
        let Commands::Embed(args) = cli.command else { panic!("expected embed") };
        let cfg: EmbedConfig = args.into();
        assert_eq!(cfg.limit, Some(10));
        assert_eq!(cfg.layer, Some(1));
        assert_eq!(cfg.options_file, ELMO_OPTIONS_URL);
        assert_eq!(cfg.weight_file, ELMO_WEIGHTS_URL);
    }

    #[test]
    fn test_translate_paths_follow_root_dir() {
        let cli = Cli::try_parse_from(["gec-transformer", "translate", "--root-dir", "/work/gec"]).unwrap();
        let Commands::Translate(args) = cli.command else { panic!("expected translate") };
        let cfg: TranslateConfig = args.into();
        assert_eq!(cfg.input_path(), PathBuf::from("/work/gec/data/test/lang8.test.src"));
        assert_eq!(cfg.output_path(), PathBuf::from("/work/gec/data/eval/pred.txt"));
    }

    #[test]
    fn test_explicit_translate_paths_win() {
        let cli = Cli::try_parse_from([
            "gec-transformer", "translate", "--root-dir", "/work/gec",
            "--input", "in.txt", "--output", "out.txt",
        ]).unwrap();
        let Commands::Translate(args) = cli.command else { panic!("expected translate") };
        let cfg: TranslateConfig = args.into();
        assert_eq!(cfg.input_path(), PathBuf::from("in.txt"));
        assert_eq!(cfg.output_path(), PathBuf::from("out.txt"));
    }
}
