// ============================================================
// Layer 5 — Optimizer and Learning-Rate Schedule
// ============================================================
// AdamW (Adam with decoupled weight decay) driven by a linear
// warmup schedule:
//
//   lr
//   peak ┤        ╱╲
//        │      ╱    ╲
//        │    ╱        ╲
//   init ┤  ╱            ╲
//        └──┬─────┬────────┬──▶ step
//           0   warmup   total
//
//   step ≤ warmup:          init + (peak - init) · step / warmup
//   warmup < step < total:  peak · (total - step) / (total - warmup)
//   step ≥ total:           0
//
// When total ≤ warmup the rate holds at peak after warmup.
//
// Reference: Loshchilov & Hutter (2019) Decoupled Weight Decay

use burn::{
    optim::{AdamWConfig, Optimizer},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::ml::model::ClassifierModel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarmupSchedule {
    pub init_lr:      f64,
    pub peak_lr:      f64,
    pub warmup_steps: usize,
    pub total_steps:  usize,
}

impl WarmupSchedule {
    /// Learning rate to use for the update at `step` (0-based)
    pub fn lr(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            let progress = step as f64 / self.warmup_steps as f64;
            return self.init_lr + (self.peak_lr - self.init_lr) * progress;
        }
        if self.total_steps <= self.warmup_steps {
            return self.peak_lr;
        }
        if step >= self.total_steps {
            return 0.0;
        }
        let remaining = (self.total_steps - step) as f64;
        let decay_len = (self.total_steps - self.warmup_steps) as f64;
        self.peak_lr * remaining / decay_len
    }
}

/// Build the AdamW update rule and its learning-rate schedule.
pub fn build_tx<B: AutodiffBackend>(
    lr:           f64,
    init_lr:      f64,
    warmup_steps: usize,
    total_steps:  usize,
    weight_decay: f64,
) -> (impl Optimizer<ClassifierModel<B>, B>, WarmupSchedule) {
    let optim = AdamWConfig::new()
        .with_weight_decay(weight_decay as f32)
        .with_epsilon(1e-8)
        .init::<B, ClassifierModel<B>>();

    let schedule = WarmupSchedule {
        init_lr,
        peak_lr: lr,
        warmup_steps,
        total_steps,
    };

    tracing::debug!("Optimizer: AdamW(weight_decay={}), schedule: {:?}", weight_decay, schedule);
    (optim, schedule)
}
