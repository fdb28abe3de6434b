// ============================================================
// Layer 6 — Interrupt Signal
// ============================================================
// Shared flag raised by Ctrl-C (SIGINT/SIGTERM). The trainer
// polls it before each step and stops cleanly so the final
// weights still get written. A second Ctrl-C while the flag is
// already raised exits immediately.

use anyhow::{Context, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[derive(Debug, Clone, Default)]
pub struct InterruptSignal(Arc<AtomicBool>);

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the process-wide Ctrl-C handler. Can only be done once per process.
    pub fn install_ctrlc(&self) -> Result<()> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            if flag.is_raised() {
                eprintln!("\nSecond interrupt, exiting without saving");
                std::process::exit(130);
            }
            eprintln!("\nInterrupt received, finishing the current step and saving weights...");
            flag.raise();
        })
        .context("Failed to install Ctrl-C handler")
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let signal = InterruptSignal::new();
        let other  = signal.clone();
        assert!(!other.is_raised());
        signal.raise();
        assert!(other.is_raised());
    }
}
