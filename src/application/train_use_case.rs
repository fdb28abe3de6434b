// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Record the run config        (Layer 6 - infra)
//   Step 2: Load the CSV catalogue       (Layer 4 - data)
//   Step 3: Build/load label vocabularies(Layer 4 - data)
//   Step 4: Load/build the tokenizer     (Layer 6 - infra)
//   Step 5: Preprocess records → items   (Layer 4 - data)
//   Step 6: Split train/validation       (Layer 4 - data)
//   Step 7: Build model + AdamW/schedule (Layer 5 - ml)
//   Step 8: Create/resume train state    (Layer 5 - ml)
//   Step 9: Run training loop            (Layer 5 - ml)
//   Step 10: Save final weights — also after a keyboard
//            interrupt                   (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{bail, Result};
use burn::tensor::backend::AutodiffBackend;
use std::path::PathBuf;

use crate::application::config::RunConfig;
use crate::data::{
    dataset::ProductDataset,
    loader::CsvLoader,
    preprocessor::Preprocessor,
    splitter::split_train_val,
    vocab::Vocab,
};
use crate::domain::{
    product::{BRAND_COLUMN, BROWSE_NODE_COLUMN},
    traits::{ExampleSource, MetricSink},
};
use crate::infra::{
    checkpoint::CheckpointManager,
    shutdown::InterruptSignal,
    tokenizer_store::{self, TokenizerStore},
};
use crate::ml::{
    loss::MaskedCrossEntropy,
    model::{resolve_encoder, ClassifierModel},
    optim::build_tx,
    trainer::{SupervisedStep, Trainer, TrainerSettings},
};

/// What a finished (or interrupted) run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub steps:             usize,
    pub interrupted:       bool,
    pub train_examples:    usize,
    pub val_examples:      usize,
    pub num_browse_nodes:  usize,
    pub num_brands:        usize,
    pub final_weights_dir: PathBuf,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase<'a> {
    config:    &'a RunConfig,
    interrupt: InterruptSignal,
}

impl<'a> TrainUseCase<'a> {
    pub fn new(config: &'a RunConfig, interrupt: InterruptSignal) -> Self {
        Self { config, interrupt }
    }

    /// Execute the full training pipeline end to end on `device`.
    pub fn execute<B, M>(&self, device: B::Device, mut sink: M) -> Result<RunSummary>
    where
        B: AutodiffBackend,
        M: MetricSink,
    {
        let cfg = self.config;

        // ── Step 1: Push the resolved config ──────────────────────────────────
        sink.log_config(&serde_json::to_value(cfg)?)?;

        // ── Step 2: Load the catalogue ────────────────────────────────────────
        tracing::info!("Loading catalogue from '{}'", cfg.data_files().display());
        let records = CsvLoader::new(cfg.data_files())
            .with_limit(cfg.max_samples())
            .load_all()?;
        tracing::info!("Loaded {} records", records.len());
        for (i, sample) in records.iter().take(2).enumerate() {
            tracing::info!("Sample {}: {:?}", i, sample);
        }

        // ── Step 3: Label vocabularies ────────────────────────────────────────
        let browse_nodes = Vocab::build_or_load(&records, BROWSE_NODE_COLUMN, cfg.vocab_dir())?;
        let brands       = Vocab::build_or_load(&records, BRAND_COLUMN, cfg.vocab_dir())?;
        for vocab in [&browse_nodes, &brands] {
            tracing::info!("Vocab size {}: {}", vocab.column(), vocab.len());
            tracing::debug!("{} id 0 = {:?}", vocab.column(), vocab.value(0));
        }

        if browse_nodes.is_empty() {
            bail!("No {} values in '{}', nothing to train on", BROWSE_NODE_COLUMN, cfg.data_files().display());
        }
        if brands.is_empty() {
            tracing::warn!("No {} values found; every brand target will be ignored", BRAND_COLUMN);
        }

        // ── Step 4: Tokenizer ─────────────────────────────────────────────────
        let (encoder_cfg, _) = resolve_encoder(cfg.base_model_id())?;
        let tokenizer = TokenizerStore::new(cfg.base_dir()).load_or_build(
            cfg.base_model_id(),
            &Preprocessor::corpus(&records),
            encoder_cfg.vocab_size,
        )?;
        if tokenizer_store::id_space(&tokenizer) > encoder_cfg.vocab_size {
            bail!(
                "Tokenizer emits ids up to {} but the encoder only embeds {}",
                tokenizer_store::id_space(&tokenizer),
                encoder_cfg.vocab_size
            );
        }
        if cfg.max_length() > encoder_cfg.max_position_embeddings {
            bail!(
                "max_length {} exceeds the encoder's {} positions",
                cfg.max_length(),
                encoder_cfg.max_position_embeddings
            );
        }

        // ── Step 5: Preprocess ────────────────────────────────────────────────
        let preprocessor = Preprocessor::new(tokenizer_store::separator_token(&tokenizer)?);
        let items = preprocessor.process(&records, &browse_nodes, &brands, &tokenizer, cfg.max_length())?;

        // ── Step 6: Seeded split ──────────────────────────────────────────────
        let (train_items, val_items) = split_train_val(items, cfg.val_split(), cfg.seed());
        tracing::info!("Split: {} train, {} validation", train_items.len(), val_items.len());
        let train_examples = train_items.len();
        let val_examples   = val_items.len();

        // ── Step 7: Model, optimizer and schedule ─────────────────────────────
        // A zero-sized head cannot be built; keep one unused brand logit instead
        let num_brands = brands.len().max(1);
        let model = ClassifierModel::<B>::from_pretrained(
            cfg.base_model_id(),
            browse_nodes.len(),
            num_brands,
            &device,
        )?
        .with_dropout(cfg.dropout(), &device);

        let num_train_steps = cfg.num_train_steps(train_examples);
        let (optim, schedule) = build_tx::<B>(
            cfg.lr(),
            cfg.init_lr(),
            cfg.warmup_steps(),
            num_train_steps,
            cfg.weight_decay(),
        );
        tracing::info!("Planned {} optimisation steps", num_train_steps);

        // ── Step 8: Trainer and state ─────────────────────────────────────────
        let settings = TrainerSettings {
            batch_size:    cfg.batch_size(),
            max_epochs:    cfg.max_epochs(),
            seed:          cfg.seed(),
            logging_steps: cfg.logging_steps(),
            save_steps:    cfg.save_steps(),
            max_length:    cfg.max_length(),
            pad_id:        tokenizer_store::pad_id(&tokenizer),
        };
        let mut trainer = Trainer::<B, _, _>::new(
            settings,
            device,
            SupervisedStep::new(MaskedCrossEntropy::default()),
            &mut sink,
            CheckpointManager::new(cfg.save_dir()),
            self.interrupt.clone(),
            schedule,
        );
        let state = trainer.create_state(model, optim, num_train_steps, cfg.resume_from())?;

        // ── Step 9: Train ─────────────────────────────────────────────────────
        let outcome = trainer.train(
            state,
            ProductDataset::new(train_items),
            ProductDataset::new(val_items),
        )?;
        let interrupted = outcome.is_interrupted();
        if interrupted {
            tracing::warn!("Interrupting training from keyboard");
        }
        let state = outcome.into_state();

        // ── Step 10: Final weights ────────────────────────────────────────────
        tracing::info!("Saving final model");
        state.model.save_pretrained(cfg.final_weights_dir())?;
        tokenizer_store::save_to(&tokenizer, cfg.final_weights_dir())?;

        Ok(RunSummary {
            steps: state.step,
            interrupted,
            train_examples,
            val_examples,
            num_browse_nodes: browse_nodes.len(),
            num_brands,
            final_weights_dir: cfg.final_weights_dir().to_path_buf(),
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::TrainingArgs;
    use crate::ml::model::EncoderConfig;
    use burn::backend::{Autodiff, NdArray};
    use std::path::Path;

    type TestBackend = Autodiff<NdArray>;

    const NODES:  [&str; 5] = ["1045", "2210", "3307", "48", "5190"];
    const BRANDS: [&str; 3] = ["Acme", "Globex", "Initech"];
    const WORDS:  [&str; 8] = ["steel", "mug", "cable", "lamp", "red", "usb", "desk", "pack"];

    #[derive(Default)]
    struct RecordingSink {
        config:    Option<serde_json::Value>,
        scalars:   Vec<(usize, String, f64)>,
        interrupt: Option<InterruptSignal>,
    }

    impl MetricSink for RecordingSink {
        fn log_config(&mut self, config: &serde_json::Value) -> anyhow::Result<()> {
            self.config = Some(config.clone());
            Ok(())
        }

        fn log_scalar(&mut self, step: usize, _epoch: usize, name: &str, value: f64) -> anyhow::Result<()> {
            self.scalars.push((step, name.to_string(), value));
            if let Some(signal) = &self.interrupt {
                signal.raise();
            }
            Ok(())
        }
    }

    fn write_catalogue(path: &Path, rows: usize) {
        let mut w = csv::Writer::from_path(path).unwrap();
        w.write_record(["TITLE", "DESCRIPTION", "BULLET_POINTS", "BRAND", "BROWSE_NODE_ID"]).unwrap();
        for i in 0..rows {
            let title   = format!("{} {}", WORDS[i % 8], WORDS[(i / 8) % 8]);
            let desc    = if i % 3 == 0 { String::new() } else { format!("{} item", WORDS[(i + 3) % 8]) };
            let bullets = format!("[{}, {}]", WORDS[(i + 1) % 8], WORDS[(i + 5) % 8]);
            // Every seventh row has no brand
            let brand   = if i % 7 == 0 { "" } else { BRANDS[i % 3] };
            w.write_record([title.as_str(), desc.as_str(), bullets.as_str(), brand, NODES[i % 5]]).unwrap();
        }
        w.flush().unwrap();
    }

    fn write_tiny_encoder(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        let cfg = EncoderConfig::new(256, 8, 16, 2, 1, 32);
        std::fs::write(dir.join("config.json"), serde_json::to_string(&cfg).unwrap()).unwrap();
    }

    fn run_config(root: &Path, rows: usize, tweak: impl FnOnce(&mut TrainingArgs)) -> RunConfig {
        run_args(root, rows, tweak).resolve(1).unwrap()
    }

    fn run_args(root: &Path, rows: usize, tweak: impl FnOnce(&mut TrainingArgs)) -> TrainingArgs {
        let data  = root.join("train.csv");
        let model = root.join("tiny-encoder");
        write_catalogue(&data, rows);
        write_tiny_encoder(&model);

        let mut args = TrainingArgs {
            base_model_id: model.to_string_lossy().into_owned(),
            base_dir:      root.join("expt").to_string_lossy().into_owned(),
            data_files:    data.to_string_lossy().into_owned(),
            ..Default::default()
        };
        tweak(&mut args);
        args
    }

    #[test]
    fn test_end_to_end_writes_final_weights() {
        let dir  = tempfile::tempdir().unwrap();
        let cfg  = run_config(dir.path(), 1010, |a| a.dropout = 0.2);
        let mut sink = RecordingSink::default();

        let summary = TrainUseCase::new(&cfg, InterruptSignal::new())
            .execute::<TestBackend, _>(Default::default(), &mut sink)
            .unwrap();

        assert!(!summary.interrupted);
        assert_eq!(summary.val_examples, 51);
        assert_eq!(summary.train_examples, 959);
        assert_eq!(summary.steps, 959 * 2);
        assert_eq!(summary.num_browse_nodes, NODES.len());
        assert_eq!(summary.num_brands, BRANDS.len());

        let saved = ClassifierModel::<NdArray>::load(&summary.final_weights_dir, &Default::default()).unwrap();
        assert_eq!(saved.config().num_browse_nodes, NODES.len());
        assert_eq!(saved.config().num_brands, BRANDS.len());
        assert_eq!(saved.config().encoder.dropout, 0.2);
        assert!(summary.final_weights_dir.join("tokenizer.json").exists());

        // One validation per epoch end with default logging_steps
        let val_losses = sink.scalars.iter().filter(|(_, n, _)| n == "val/loss").count();
        assert_eq!(val_losses, 2);
        assert_eq!(sink.config.unwrap()["args"]["seed"], 42);
        assert!(cfg.vocab_dir().join("BRAND.json").exists());
    }

    #[test]
    fn test_interrupt_still_saves_final_weights() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = run_config(dir.path(), 200, |a| a.logging_steps = 10);

        let interrupt = InterruptSignal::new();
        let mut sink  = RecordingSink { interrupt: Some(interrupt.clone()), ..Default::default() };

        let summary = TrainUseCase::new(&cfg, interrupt)
            .execute::<TestBackend, _>(Default::default(), &mut sink)
            .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.steps, 10);
        assert!(summary.final_weights_dir.join("config.json").exists());
        assert!(summary.final_weights_dir.join("model.mpk.gz").exists());
    }

    #[test]
    fn test_resume_continues_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let args = run_args(dir.path(), 100, |a| {
            a.save_steps = 50;
            a.max_epochs = 1;
        });
        let cfg = args.resolve(1).unwrap();
        TrainUseCase::new(&cfg, InterruptSignal::new())
            .execute::<TestBackend, _>(Default::default(), RecordingSink::default())
            .unwrap();

        // 95 train items at batch 1: checkpoint at step 50, run ends at 95
        let mut args = args;
        args.resume_from = Some(cfg.save_dir().to_string_lossy().into_owned());
        args.max_epochs  = 2;
        let resumed_cfg  = args.resolve(1).unwrap();

        let summary = TrainUseCase::new(&resumed_cfg, InterruptSignal::new())
            .execute::<TestBackend, _>(Default::default(), RecordingSink::default())
            .unwrap();
        assert_eq!(summary.steps, 190);
    }

    #[test]
    fn test_missing_catalogue_is_error() {
        let dir  = tempfile::tempdir().unwrap();
        let args = TrainingArgs {
            base_dir:   dir.path().join("expt").to_string_lossy().into_owned(),
            data_files: dir.path().join("absent.csv").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let cfg = args.resolve(1).unwrap();
        let res = TrainUseCase::new(&cfg, InterruptSignal::new())
            .execute::<TestBackend, _>(Default::default(), RecordingSink::default());
        assert!(res.is_err());
    }
}
