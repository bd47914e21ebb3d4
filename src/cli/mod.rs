// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `embed`     — ELMo embeddings for a tab-separated corpus
//   2. `train`     — trains the correction Transformer
//   3. `translate` — greedy corrections with a checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EmbedArgs, TrainArgs, TranslateArgs};

#[derive(Parser, Debug)]
#[command(
    name = "gec-transformer",
    version = "0.1.0",
    about = "Grammatical error correction: ELMo embeddings and a Transformer trained on lang8."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Embed(args)     => run_embed(args),
            Commands::Train(args)     => run_train(args),
            Commands::Translate(args) => run_translate(args),
        }
    }
}

fn run_embed(args: EmbedArgs) -> Result<()> {
    use crate::application::embed_use_case::EmbedUseCase;

    tracing::info!("Embedding pairs from: {}", args.corpus.display());
    let output  = args.output.clone();
    let written = EmbedUseCase::new(args.into()).execute()?;

    println!("Wrote {} embedding pairs to {}", written, output.display());
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training under: {}", args.root_dir);
    TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Checkpoint saved.");
    Ok(())
}

fn run_translate(args: TranslateArgs) -> Result<()> {
    use crate::application::translate_use_case::{TranslateConfig, TranslateUseCase};

    let config: TranslateConfig = args.into();
    let output  = config.output_path();
    let written = TranslateUseCase::new(config).execute()?;

    println!("Wrote {} predictions to {}", written, output.display());
    Ok(())
}
