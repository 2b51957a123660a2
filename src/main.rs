use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod config;
mod cpu_stress;
mod error;
mod interrupt;
mod sched;
mod stop_signal;
mod usage;

use config::{Cli, Configuration};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout belongs to the start and completion lines
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let config = Configuration::from_cli(&cli, config::available_processors());

    let outcome = cpu_stress::run(&config);
    if let Ok(report) = &outcome {
        debug!(
            requested = report.requested,
            started = report.spawned.len(),
            interrupted = report.interrupted,
            elapsed = ?report.elapsed,
            "run finished"
        );
    }

    match outcome {
        Ok(report) if report.stragglers == 0 => {
            println!("CPU stress test completed.");
            ExitCode::SUCCESS
        }
        Ok(report) => {
            error!(
                stragglers = report.stragglers,
                "workers still running after the join timeout"
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            error!(%err, "stress run aborted");
            ExitCode::FAILURE
        }
    }
}
