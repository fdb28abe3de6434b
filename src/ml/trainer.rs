// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch/step loop over Burn DataLoaders with injected step
// functions:
//
//   TrainStepFn  — forward + loss + backward + optimizer update,
//                  consuming the TrainState and returning the next
//   ValStepFn    — forward + loss + accuracies on the inner
//                  (non-autodiff) backend
//   MetricSink   — where scalar metrics go
//
// Every `logging_steps` steps the running train loss and the
// learning rate are logged and the validation set is scored;
// validation also runs at the end of every epoch. Every
// `save_steps` steps a checkpoint is written. The interrupt
// signal is polled before each step; when raised, the loop
// returns the current state as TrainOutcome::Interrupted.
//
// Key Burn insight:
//   - Training uses B (Autodiff<...>) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - Validation batcher must also use B::InnerBackend
//
// Reference: Burn Book §5 (Custom Training Loop)

use anyhow::{Context, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::path::Path;

use crate::data::{batcher::{ProductBatch, ProductBatcher}, dataset::ProductDataset};
use crate::domain::traits::MetricSink;
use crate::infra::{checkpoint::CheckpointManager, shutdown::InterruptSignal};
use crate::ml::{
    loss::{masked_accuracy, LossFn},
    model::ClassifierModel,
    optim::WarmupSchedule,
};

// ─── TrainState ───────────────────────────────────────────────────────────────
/// Parameters, optimizer state and the number of updates applied so far.
/// Each train step consumes a state and returns the next one.
pub struct TrainState<B: AutodiffBackend, O> {
    pub model: ClassifierModel<B>,
    pub optim: O,
    pub step:  usize,
}

pub enum TrainOutcome<B: AutodiffBackend, O> {
    Completed(TrainState<B, O>),
    Interrupted(TrainState<B, O>),
}

impl<B: AutodiffBackend, O> TrainOutcome<B, O> {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, TrainOutcome::Interrupted(_))
    }

    pub fn into_state(self) -> TrainState<B, O> {
        match self {
            TrainOutcome::Completed(state) | TrainOutcome::Interrupted(state) => state,
        }
    }
}

// ─── Step functions ───────────────────────────────────────────────────────────
pub trait TrainStepFn<B: AutodiffBackend> {
    /// Apply one update; returns the new state and the batch loss.
    fn train_step<O: Optimizer<ClassifierModel<B>, B>>(
        &self,
        state: TrainState<B, O>,
        batch: ProductBatch<B>,
        lr:    f64,
    ) -> (TrainState<B, O>, f64);
}

pub trait ValStepFn<B: Backend> {
    fn val_step(&self, model: &ClassifierModel<B>, batch: ProductBatch<B>) -> ValStats;
}

/// Validation totals over one or more batches
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValStats {
    pub loss_sum:      f64,
    pub batches:       usize,
    pub node_correct:  usize,
    pub node_total:    usize,
    pub brand_correct: usize,
    pub brand_total:   usize,
}

impl ValStats {
    pub fn merge(self, other: ValStats) -> ValStats {
        ValStats {
            loss_sum:      self.loss_sum + other.loss_sum,
            batches:       self.batches + other.batches,
            node_correct:  self.node_correct + other.node_correct,
            node_total:    self.node_total + other.node_total,
            brand_correct: self.brand_correct + other.brand_correct,
            brand_total:   self.brand_total + other.brand_total,
        }
    }

    pub fn mean_loss(&self) -> f64 {
        if self.batches > 0 { self.loss_sum / self.batches as f64 } else { f64::NAN }
    }

    pub fn browse_node_acc(&self) -> f64 {
        ratio(self.node_correct, self.node_total)
    }

    pub fn brand_acc(&self) -> f64 {
        ratio(self.brand_correct, self.brand_total)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 { num as f64 / den as f64 } else { 0.0 }
}

/// Standard supervised step: the same loss for training and validation.
#[derive(Clone, Debug, Default)]
pub struct SupervisedStep<L> {
    loss_fn: L,
}

impl<L> SupervisedStep<L> {
    pub fn new(loss_fn: L) -> Self {
        Self { loss_fn }
    }
}

impl<B: AutodiffBackend, L: LossFn<B>> TrainStepFn<B> for SupervisedStep<L> {
    fn train_step<O: Optimizer<ClassifierModel<B>, B>>(
        &self,
        state: TrainState<B, O>,
        batch: ProductBatch<B>,
        lr:    f64,
    ) -> (TrainState<B, O>, f64) {
        let TrainState { model, mut optim, step } = state;

        let output = model.forward(batch.input_ids.clone(), batch.attention_mask.clone());
        let loss   = self.loss_fn.loss(&output, &batch);
        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        let model = optim.step(lr, model, grads);

        (TrainState { model, optim, step: step + 1 }, loss_val)
    }
}

impl<B: Backend, L: LossFn<B>> ValStepFn<B> for SupervisedStep<L> {
    fn val_step(&self, model: &ClassifierModel<B>, batch: ProductBatch<B>) -> ValStats {
        let ignore = self.loss_fn.ignore_index();
        let output = model.forward(batch.input_ids.clone(), batch.attention_mask.clone());
        let loss: f64 = self.loss_fn.loss(&output, &batch).into_scalar().elem::<f64>();

        let (node_correct, node_total) =
            masked_accuracy(output.browse_node_logits, batch.browse_nodes, ignore);
        let (brand_correct, brand_total) =
            masked_accuracy(output.brand_logits, batch.brands, ignore);

        ValStats {
            loss_sum: loss,
            batches:  1,
            node_correct,
            node_total,
            brand_correct,
            brand_total,
        }
    }
}

// ─── Trainer ──────────────────────────────────────────────────────────────────
/// Loop settings taken from the run configuration
#[derive(Debug, Clone)]
pub struct TrainerSettings {
    pub batch_size:    usize,
    pub max_epochs:    usize,
    pub seed:          u64,
    pub logging_steps: usize,
    pub save_steps:    usize,
    pub max_length:    usize,
    pub pad_id:        u32,
}

pub struct Trainer<B: AutodiffBackend, S, M> {
    settings:    TrainerSettings,
    device:      B::Device,
    step_fn:     S,
    sink:        M,
    checkpoints: CheckpointManager,
    interrupt:   InterruptSignal,
    schedule:    WarmupSchedule,
}

impl<B, S, M> Trainer<B, S, M>
where
    B: AutodiffBackend,
    S: TrainStepFn<B> + ValStepFn<B::InnerBackend>,
    M: MetricSink,
{
    pub fn new(
        settings:    TrainerSettings,
        device:      B::Device,
        step_fn:     S,
        sink:        M,
        checkpoints: CheckpointManager,
        interrupt:   InterruptSignal,
        schedule:    WarmupSchedule,
    ) -> Self {
        Self { settings, device, step_fn, sink, checkpoints, interrupt, schedule }
    }

    /// Initial state; resumes from the latest checkpoint in `checkpoint_dir` when given.
    pub fn create_state<O: Optimizer<ClassifierModel<B>, B>>(
        &self,
        model:          ClassifierModel<B>,
        optim:          O,
        total_steps:    usize,
        checkpoint_dir: Option<&Path>,
    ) -> Result<TrainState<B, O>> {
        let Some(dir) = checkpoint_dir else {
            tracing::info!("Starting fresh training state ({} steps planned)", total_steps);
            return Ok(TrainState { model, optim, step: 0 });
        };

        let state = CheckpointManager::new(dir)
            .load_latest(model, optim, &self.device)
            .with_context(|| format!("Cannot resume from '{}'", dir.display()))?;

        if state.step >= total_steps {
            tracing::warn!(
                "Checkpoint step {} is already past the {} planned steps",
                state.step,
                total_steps
            );
        }
        tracing::info!("Resumed training state at step {}", state.step);
        Ok(state)
    }

    /// Run the full training loop.
    pub fn train<O: Optimizer<ClassifierModel<B>, B>>(
        &mut self,
        state:      TrainState<B, O>,
        train_data: ProductDataset,
        val_data:   ProductDataset,
    ) -> Result<TrainOutcome<B, O>> {
        let cfg = self.settings.clone();

        let steps_per_epoch = train_data.item_count().div_ceil(cfg.batch_size).max(1);
        let start_epoch     = state.step / steps_per_epoch + 1;
        let resume_skip     = state.step % steps_per_epoch;

        let train_batcher = ProductBatcher::<B>::new(self.device.clone(), cfg.max_length, cfg.pad_id);
        // Single-threaded: each iter() reshuffles synchronously, so replaying
        // the completed epochs below reproduces the interrupted run's order
        let train_loader  = DataLoaderBuilder::new(train_batcher)
            .batch_size(cfg.batch_size)
            .shuffle(cfg.seed)
            .build(train_data);

        // Every iter() advances the shuffle RNG; catch up on finished epochs
        for _ in 1..start_epoch {
            drop(train_loader.iter());
        }

        // ── Validation data loader (InnerBackend — no autodiff overhead) ──────
        let val_batcher = ProductBatcher::<B::InnerBackend>::new(self.device.clone(), cfg.max_length, cfg.pad_id);
        let val_loader  = DataLoaderBuilder::new(val_batcher)
            .batch_size(cfg.batch_size)
            .num_workers(1)
            .build(val_data);

        let mut state        = state;
        let mut window_loss  = 0.0f64;
        let mut window_steps = 0usize;

        for epoch in start_epoch..=cfg.max_epochs {
            let skip = if epoch == start_epoch { resume_skip } else { 0 };

            for batch in train_loader.iter().skip(skip) {
                if self.interrupt.is_raised() {
                    tracing::debug!("Interrupt flag raised before step {}", state.step + 1);
                    return Ok(TrainOutcome::Interrupted(state));
                }

                let lr = self.schedule.lr(state.step);
                let (next, loss) = self.step_fn.train_step(state, batch, lr);
                state = next;

                window_loss  += loss;
                window_steps += 1;
                let step = state.step;

                if cfg.logging_steps > 0 && step % cfg.logging_steps == 0 {
                    self.sink.log_scalar(step, epoch, "train/loss", window_loss / window_steps as f64)?;
                    self.sink.log_scalar(step, epoch, "train/lr", lr)?;
                    window_loss  = 0.0;
                    window_steps = 0;
                    self.validate(&state.model, val_loader.iter(), step, epoch)?;
                }

                if cfg.save_steps > 0 && step % cfg.save_steps == 0 {
                    self.checkpoints.save(&state)?;
                }
            }

            self.validate(&state.model, val_loader.iter(), state.step, epoch)?;
            tracing::info!("Epoch {:>3}/{} finished at step {}", epoch, cfg.max_epochs, state.step);
        }

        tracing::info!("Training complete!");
        Ok(TrainOutcome::Completed(state))
    }

    fn validate(
        &mut self,
        model:   &ClassifierModel<B>,
        batches: impl Iterator<Item = ProductBatch<B::InnerBackend>>,
        step:    usize,
        epoch:   usize,
    ) -> Result<()> {
        // model.valid() → ClassifierModel<B::InnerBackend>, dropout disabled
        let model_valid = model.valid();

        let stats = batches
            .map(|batch| self.step_fn.val_step(&model_valid, batch))
            .fold(ValStats::default(), ValStats::merge);

        if stats.batches == 0 {
            tracing::debug!("Validation set is empty, skipping evaluation");
            return Ok(());
        }

        self.sink.log_scalar(step, epoch, "val/loss", stats.mean_loss())?;
        self.sink.log_scalar(step, epoch, "val/browse_node_acc", stats.browse_node_acc())?;
        self.sink.log_scalar(step, epoch, "val/brand_acc", stats.brand_acc())?;
        Ok(())
    }
}
