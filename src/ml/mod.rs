// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Burn-specific code: the network, the loss, the optimizer
// and the training loop.
//
//   model.rs   — Transformer encoder + two linear heads
//                (browse node, brand) over the first token.
//                from_pretrained / save_pretrained / load.
//
//   loss.rs    — Masked cross-entropy (IGNORE_INDEX targets
//                are skipped), averaged over both heads, and
//                masked accuracy for validation.
//
//   optim.rs   — AdamW with decoupled weight decay and the
//                linear warmup → linear decay LR schedule.
//
//   trainer.rs — Epoch/step loop with injected train and
//                validation steps, periodic logging,
//                validation, checkpointing and interrupt.
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Devlin et al. (2019) BERT
//            Loshchilov & Hutter (2019) AdamW

/// Transformer encoder classifier
pub mod model;

/// Masked cross-entropy loss and accuracy
pub mod loss;

/// AdamW + warmup schedule builder
pub mod optim;

/// Training loop with validation and checkpointing
pub mod trainer;

#[cfg(feature = "wgpu")]
pub type InnerBackend = burn::backend::Wgpu;
#[cfg(not(feature = "wgpu"))]
pub type InnerBackend = burn::backend::NdArray;

/// Backend used for training: autodiff over the compute backend
pub type TrainBackend = burn::backend::Autodiff<InnerBackend>;

/// Devices training runs on. Always a single device.
pub fn devices() -> Vec<<TrainBackend as burn::prelude::Backend>::Device> {
    vec![Default::default()]
}
