// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   checkpoint.rs      — Training-state snapshots (model +
//                        optimizer records via CompactRecorder)
//                        with an atomically replaced pointer to
//                        the newest one, used for resuming.
//
//   tokenizer_store.rs — Tokenizer loading. Prefers the base
//                        model's tokenizer.json, then one saved
//                        by a previous run, and otherwise builds
//                        a word-level tokenizer from the corpus.
//
//   metrics.rs         — MetricSink writing metrics.csv and
//                        run_config.json under the run dir.
//
//   shutdown.rs        — Ctrl-C → InterruptSignal.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Training-state checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer loading, building and saving
pub mod tokenizer_store;

/// Scalar metrics CSV logger
pub mod metrics;

/// Keyboard interrupt flag
pub mod shutdown;
