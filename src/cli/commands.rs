// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the `train` subcommand and its flags.
//
// Every hyperparameter flag is optional: an unset flag keeps the
// value from the --config override file, or the built-in default
// when the file doesn't set it either.
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::config::TrainingArgs;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the browse-node/brand classifier on a CSV catalogue
    Train(TrainArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug, Default)]
pub struct TrainArgs {
    /// JSON file of config overrides, keyed by field name
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Model directory (config.json [+ encoder weights, tokenizer.json])
    /// or an encoder preset: bert-base-uncased, bert-small, bert-tiny
    #[arg(long)]
    pub base_model_id: Option<String>,

    /// Log train metrics and validate every N steps [default: 3000]
    #[arg(long)]
    pub logging_steps: Option<usize>,

    /// Save a checkpoint every N steps [default: 10500]
    #[arg(long)]
    pub save_steps: Option<usize>,

    /// Samples per device per step [default: 1]
    #[arg(long)]
    pub batch_size_per_device: Option<usize>,

    /// Number of full passes through the training data [default: 2]
    #[arg(long)]
    pub max_epochs: Option<usize>,

    /// Seed for the split and the shuffling [default: 42]
    #[arg(long)]
    pub seed: Option<u64>,

    /// Fraction of samples held out for validation [default: 0.05]
    #[arg(long)]
    pub val_split: Option<f64>,

    /// Maximum tokens per sequence, special tokens included [default: 4]
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Peak learning rate [default: 3e-5]
    #[arg(long)]
    pub lr: Option<f64>,

    /// Learning rate at step 0 [default: 0.0]
    #[arg(long)]
    pub init_lr: Option<f64>,

    /// Steps of linear warmup from init_lr to lr [default: 20000]
    #[arg(long)]
    pub warmup_steps: Option<usize>,

    /// AdamW decoupled weight decay [default: 0.0095]
    #[arg(long)]
    pub weight_decay: Option<f64>,

    /// Run directory for vocabularies, metrics and weights [default: training-expt]
    #[arg(long)]
    pub base_dir: Option<String>,

    /// Checkpoint directory, relative to base_dir [default: checkpoints]
    #[arg(long)]
    pub save_dir: Option<String>,

    /// CSV catalogue to train on [default: ../dataset/train-v2.csv]
    #[arg(long)]
    pub data_files: Option<String>,

    /// Only use the first N rows of the catalogue
    #[arg(long)]
    pub max_samples: Option<usize>,

    /// Checkpoint directory to resume training from
    #[arg(long)]
    pub resume_from: Option<String>,

    /// Final weights directory, relative to base_dir [default: final-weights]
    #[arg(long)]
    pub final_weights_dir: Option<String>,

    /// Dropout probability inside the encoder and before the heads [default: 0.1]
    #[arg(long)]
    pub dropout: Option<f64>,
}

/// Convert CLI TrainArgs into the application-layer TrainingArgs.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl TryFrom<TrainArgs> for TrainingArgs {
    type Error = anyhow::Error;

    fn try_from(a: TrainArgs) -> Result<Self> {
        let mut args = match &a.config {
            Some(path) => TrainingArgs::default().with_overrides(&TrainingArgs::load_overrides(path)?)?,
            None       => TrainingArgs::default(),
        };

        macro_rules! apply {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = a.$field { args.$field = v; })*
            };
        }
        apply!(
            base_model_id, logging_steps, save_steps, batch_size_per_device,
            max_epochs, seed, val_split, max_length, lr, init_lr, warmup_steps,
            weight_decay, base_dir, save_dir, data_files, final_weights_dir, dropout,
        );
        if a.max_samples.is_some() {
            args.max_samples = a.max_samples;
        }
        if a.resume_from.is_some() {
            args.resume_from = a.resume_from;
        }

        Ok(args)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_gives_defaults() {
        let args = TrainingArgs::try_from(TrainArgs::default()).unwrap();
        assert_eq!(args, TrainingArgs::default());
    }

    #[test]
    fn test_flags_beat_config_file_beats_defaults() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.json");
        std::fs::write(&path, r#"{ "max_epochs": 7, "seed": 1, "max_samples": 1010 }"#).unwrap();

        let args = TrainingArgs::try_from(TrainArgs {
            config: Some(path),
            seed:   Some(9),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(args.seed, 9);
        assert_eq!(args.max_epochs, 7);
        assert_eq!(args.max_samples, Some(1010));
        assert_eq!(args.lr, 3e-5);
    }

    #[test]
    fn test_bad_config_file_is_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.json");
        std::fs::write(&path, r#"{ "learning_rate": 0.1 }"#).unwrap();

        let res = TrainingArgs::try_from(TrainArgs { config: Some(path), ..Default::default() });
        assert!(res.is_err());
    }
}
