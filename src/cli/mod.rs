// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, using `clap`.
// All business logic is delegated to Layer 2 (application).
//
//   browse-node-classifier train [--config overrides.json] [--flags]
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, TrainArgs};

use crate::application::{config::TrainingArgs, train_use_case::TrainUseCase};
use crate::infra::{metrics::MetricsLogger, shutdown::InterruptSignal};
use crate::ml::{devices, TrainBackend};

#[derive(Parser, Debug)]
#[command(
    name = "browse-node-classifier",
    version = "0.1.0",
    about = "Train a browse-node + brand product classifier on a CSV catalogue."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let devices = devices();
    tracing::info!("##########################");
    tracing::info!("DEVICES: {:?}", devices);
    tracing::info!("##########################");

    let config = TrainingArgs::try_from(args)?.resolve(devices.len())?;
    let device = devices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No training device available"))?;

    let interrupt = InterruptSignal::new();
    interrupt.install_ctrlc()?;

    let logger  = MetricsLogger::new(config.base_dir())?;
    tracing::info!("Writing metrics to '{}'", logger.csv_path().display());
    let summary = TrainUseCase::new(&config, interrupt).execute::<TrainBackend, _>(device, logger)?;

    println!(
        "Trained on {} examples ({} held out) with {} browse nodes and {} brands.",
        summary.train_examples,
        summary.val_examples,
        summary.num_browse_nodes,
        summary.num_brands,
    );
    if summary.interrupted {
        println!("Training interrupted at step {}.", summary.steps);
    } else {
        println!("Training complete after {} steps.", summary.steps);
    }
    println!("Final weights saved to '{}'.", summary.final_weights_dir.display());
    Ok(())
}
