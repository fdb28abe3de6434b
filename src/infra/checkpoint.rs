// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the full training state (model weights,
// optimizer moments and the step counter) using Burn's
// CompactRecorder.
//
// File naming convention:
//   checkpoints/
//     model-3000.mpk.gz   ← weights after step 3000
//     optim-3000.mpk.gz   ← AdamW state after step 3000
//     ...
//     latest.json         ← {"step": 3000}
//
// The record files are written first and the latest.json
// pointer is replaced last (write to a temp file + rename), so
// an interrupted save leaves the previous checkpoint usable.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    module::Module,
    optim::Optimizer,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ml::{model::ClassifierModel, trainer::TrainState};

const POINTER_FILE: &str = "latest.json";

#[derive(Debug, Serialize, Deserialize)]
struct LatestPointer {
    step: usize,
}

/// Manages the checkpoints of one training run.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Save model and optimizer records for `state.step`, then move the pointer.
    pub fn save<B, O>(&self, state: &TrainState<B, O>) -> Result<()>
    where
        B: AutodiffBackend,
        O: Optimizer<ClassifierModel<B>, B>,
    {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", self.dir.display()))?;

        let recorder   = CompactRecorder::new();
        let model_path = self.dir.join(format!("model-{}", state.step));
        let optim_path = self.dir.join(format!("optim-{}", state.step));

        recorder
            .record(state.model.clone().into_record(), model_path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", model_path.display()))?;
        recorder
            .record(state.optim.to_record(), optim_path.clone())
            .with_context(|| format!("Failed to save optimizer state to '{}'", optim_path.display()))?;

        self.write_pointer(state.step)?;
        tracing::info!("Saved checkpoint at step {} to '{}'", state.step, self.dir.display());
        Ok(())
    }

    /// Step number of the latest complete checkpoint.
    pub fn latest_step(&self) -> Result<usize> {
        let path = self.dir.join(POINTER_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot find '{}'. Is this a checkpoint directory?", path.display())
        })?;
        let pointer: LatestPointer = serde_json::from_str(&json)
            .with_context(|| format!("Malformed checkpoint pointer '{}'", path.display()))?;
        Ok(pointer.step)
    }

    /// Restore the latest checkpoint into freshly built model/optimizer.
    /// Both must have the architecture the checkpoint was saved with.
    pub fn load_latest<B, O>(
        &self,
        model:  ClassifierModel<B>,
        optim:  O,
        device: &B::Device,
    ) -> Result<TrainState<B, O>>
    where
        B: AutodiffBackend,
        O: Optimizer<ClassifierModel<B>, B>,
    {
        let step       = self.latest_step()?;
        let recorder   = CompactRecorder::new();
        let model_path = self.dir.join(format!("model-{step}"));
        let optim_path = self.dir.join(format!("optim-{step}"));

        tracing::info!("Loading checkpoint from step {}", step);

        let model_record = recorder
            .load(model_path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", model_path.display()))?;
        let optim_record = recorder
            .load(optim_path.clone(), device)
            .with_context(|| format!("Cannot load optimizer state '{}'", optim_path.display()))?;

        Ok(TrainState {
            model: model.load_record(model_record),
            optim: optim.load_record(optim_record),
            step,
        })
    }

    fn write_pointer(&self, step: usize) -> Result<()> {
        let path = self.dir.join(POINTER_FILE);
        let tmp  = self.dir.join(format!("{POINTER_FILE}.tmp"));
        let json = serde_json::to_string(&LatestPointer { step })?;

        fs::write(&tmp, json).with_context(|| format!("Cannot write '{}'", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("Cannot replace '{}'", path.display()))?;
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{
        model::{ClassifierConfig, EncoderConfig},
        optim::build_tx,
    };
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn model() -> ClassifierModel<TestBackend> {
        let encoder = EncoderConfig::new(50, 8, 8, 2, 1, 16);
        ClassifierConfig::new(encoder, 4, 3).init(&Default::default())
    }

    #[test]
    fn test_missing_pointer_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path());
        assert!(mgr.latest_step().is_err());
    }

    #[test]
    fn test_save_then_resume() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path().join("ckpt"));
        let (optim, _) = build_tx::<TestBackend>(1e-3, 0.0, 10, 100, 0.01);

        let saved = TrainState { model: model(), optim, step: 42 };
        mgr.save(&saved).unwrap();
        assert_eq!(mgr.latest_step().unwrap(), 42);

        // A differently initialised model gets the saved weights back
        let (optim, _) = build_tx::<TestBackend>(1e-3, 0.0, 10, 100, 0.01);
        let restored   = mgr.load_latest(model(), optim, &Default::default()).unwrap();
        assert_eq!(restored.step, 42);

        let before = saved.model.browse_node_head.weight.val().into_data();
        let after  = restored.model.browse_node_head.weight.val().into_data();
        before.assert_approx_eq(&after, 5);
    }

    #[test]
    fn test_pointer_moves_to_newest() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path());

        for step in [5, 10] {
            let (optim, _) = build_tx::<TestBackend>(1e-3, 0.0, 10, 100, 0.01);
            mgr.save(&TrainState { model: model(), optim, step }).unwrap();
        }
        assert_eq!(mgr.latest_step().unwrap(), 10);
        assert!(dir.path().join("model-5.mpk.gz").exists());
        assert!(!dir.path().join("latest.json.tmp").exists());
    }
}
