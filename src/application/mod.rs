// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish a goal.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No UI or printing here (that's Layer 1)
//   - Only configuration and workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

/// TrainingArgs (user input) → RunConfig (validated, immutable)
pub mod config;

/// The training workflow
pub mod train_use_case;
