// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// Two stages:
//
//   TrainingArgs — every user-settable hyperparameter, with
//                  defaults. Serialisable so it can be
//                  overridden from a JSON file and recorded
//                  in run_config.json.
//   RunConfig    — the validated, immutable result of
//                  TrainingArgs::resolve(). Built once and
//                  passed by reference to every component.
//
// Precedence (lowest first):
//   built-in defaults  <  --config overrides.json  <  CLI flags
//
// Reference: Rust Book §5 (Structs), serde docs (field attributes)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ─── TrainingArgs ─────────────────────────────────────────────────────────────
// #[serde(default)] fills any missing key from Default;
// deny_unknown_fields turns a typo in an override file into an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingArgs {
    pub base_model_id:         String,
    pub logging_steps:         usize,
    pub save_steps:            usize,
    pub batch_size_per_device: usize,
    pub max_epochs:            usize,
    pub seed:                  u64,
    pub val_split:             f64,
    pub max_length:            usize,
    pub lr:                    f64,
    pub init_lr:               f64,
    pub warmup_steps:          usize,
    pub weight_decay:          f64,
    pub base_dir:              String,
    pub save_dir:              String,
    pub data_files:            String,
    pub max_samples:           Option<usize>,
    pub resume_from:           Option<String>,
    pub final_weights_dir:     String,
    pub dropout:               f64,
}

impl Default for TrainingArgs {
    fn default() -> Self {
        Self {
            base_model_id:         "bert-base-uncased".to_string(),
            logging_steps:         3000,
            save_steps:            10500,
            batch_size_per_device: 1,
            max_epochs:            2,
            seed:                  42,
            val_split:             0.05,
            max_length:            4,
            lr:                    3e-5,
            init_lr:               0.0,
            warmup_steps:          20000,
            weight_decay:          0.0095,
            base_dir:              "training-expt".to_string(),
            save_dir:              "checkpoints".to_string(),
            data_files:            "../dataset/train-v2.csv".to_string(),
            max_samples:           None,
            resume_from:           None,
            final_weights_dir:     "final-weights".to_string(),
            dropout:               0.1,
        }
    }
}

impl TrainingArgs {
    /// Read an override file: a JSON object keyed by field name.
    pub fn load_overrides(path: impl AsRef<Path>) -> Result<serde_json::Value> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config overrides '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid JSON in '{}'", path.display()))
    }

    /// Replace the fields named in `overrides`, keeping the rest.
    pub fn with_overrides(&self, overrides: &serde_json::Value) -> Result<Self> {
        let Some(entries) = overrides.as_object() else {
            bail!("Config overrides must be a JSON object, got: {overrides}");
        };

        let mut merged = serde_json::to_value(self)?;
        if let Some(fields) = merged.as_object_mut() {
            for (key, value) in entries {
                fields.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(merged).context("Invalid config override")
    }

    /// Validate and freeze. Creates `base_dir`.
    pub fn resolve(&self, device_count: usize) -> Result<RunConfig> {
        if device_count == 0 {
            bail!("No training device available");
        }
        if self.batch_size_per_device == 0 {
            bail!("batch_size_per_device must be at least 1");
        }
        if self.max_epochs == 0 {
            bail!("max_epochs must be at least 1");
        }
        if self.max_length == 0 {
            bail!("max_length must be at least 1");
        }
        if !(0.0..1.0).contains(&self.val_split) {
            bail!("val_split must be in [0, 1), got {}", self.val_split);
        }
        if !(0.0..1.0).contains(&self.dropout) {
            bail!("dropout must be in [0, 1), got {}", self.dropout);
        }
        if self.lr <= 0.0 || self.init_lr < 0.0 || self.weight_decay < 0.0 {
            bail!(
                "lr must be positive; init_lr and weight_decay non-negative (lr={}, init_lr={}, weight_decay={})",
                self.lr,
                self.init_lr,
                self.weight_decay
            );
        }
        if self.max_samples == Some(0) {
            bail!("max_samples must be at least 1 when set");
        }

        let base_dir = PathBuf::from(&self.base_dir);
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("Cannot create base dir '{}'", base_dir.display()))?;

        Ok(RunConfig {
            save_dir:          base_dir.join(&self.save_dir),
            vocab_dir:         base_dir.join("vocab"),
            final_weights_dir: base_dir.join(&self.final_weights_dir),
            data_files:        PathBuf::from(&self.data_files),
            resume_from:       self.resume_from.as_ref().map(PathBuf::from),
            batch_size:        self.batch_size_per_device * device_count,
            device_count,
            base_dir,
            args:              self.clone(),
        })
    }
}

// ─── RunConfig ────────────────────────────────────────────────────────────────
/// Resolved configuration of one run. Fields are private; nothing
/// downstream can change it.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    args:              TrainingArgs,
    base_dir:          PathBuf,
    save_dir:          PathBuf,
    vocab_dir:         PathBuf,
    final_weights_dir: PathBuf,
    data_files:        PathBuf,
    resume_from:       Option<PathBuf>,
    batch_size:        usize,
    device_count:      usize,
}

impl RunConfig {
    pub fn base_model_id(&self) -> &str           { &self.args.base_model_id }
    pub fn logging_steps(&self) -> usize          { self.args.logging_steps }
    pub fn save_steps(&self) -> usize             { self.args.save_steps }
    pub fn max_epochs(&self) -> usize             { self.args.max_epochs }
    pub fn seed(&self) -> u64                     { self.args.seed }
    pub fn val_split(&self) -> f64                { self.args.val_split }
    pub fn max_length(&self) -> usize             { self.args.max_length }
    pub fn lr(&self) -> f64                       { self.args.lr }
    pub fn init_lr(&self) -> f64                  { self.args.init_lr }
    pub fn warmup_steps(&self) -> usize           { self.args.warmup_steps }
    pub fn weight_decay(&self) -> f64             { self.args.weight_decay }
    pub fn max_samples(&self) -> Option<usize>    { self.args.max_samples }
    pub fn dropout(&self) -> f64                  { self.args.dropout }
    pub fn base_dir(&self) -> &Path               { &self.base_dir }
    pub fn save_dir(&self) -> &Path               { &self.save_dir }
    pub fn vocab_dir(&self) -> &Path              { &self.vocab_dir }
    pub fn final_weights_dir(&self) -> &Path      { &self.final_weights_dir }
    pub fn data_files(&self) -> &Path             { &self.data_files }
    pub fn resume_from(&self) -> Option<&Path>    { self.resume_from.as_deref() }
    /// Global batch size: per-device batch × device count
    pub fn batch_size(&self) -> usize             { self.batch_size }

    /// `(len(train) / batch_size) * max_epochs`, floored like the optimizer schedule expects.
    pub fn num_train_steps(&self, train_len: usize) -> usize {
        (train_len / self.batch_size) * self.args.max_epochs
    }
}
