use anyhow::{Context, Result};
use pgdb_core::{Orchestrator, StopOutcome};
use tracing::debug;

pub fn start(orchestrator: &Orchestrator<'_>) -> Result<()> {
    let handles = orchestrator
        .start()
        .context("failed to start services")?;
    for handle in handles {
        println!("{}", handle.executable.display());
        match handle.pid {
            Some(pid) => println!("✓ {} started (pid {pid})", handle.component),
            None => println!("✓ {} started", handle.component),
        }
    }
    Ok(())
}

pub fn stop(orchestrator: &Orchestrator<'_>) -> Result<()> {
    for (component, outcome) in orchestrator.stop() {
        match outcome {
            StopOutcome::Stopped => println!("✓ {component} stopped"),
            StopOutcome::AlreadyStopped => println!("{component} is not running"),
            StopOutcome::NotInstalled => println!("{component} is not installed"),
            StopOutcome::Failed(message) => eprintln!("⚠ Could not stop {component}: {message}"),
        }
    }
    Ok(())
}

pub fn status(orchestrator: &Orchestrator<'_>) -> Result<()> {
    debug!(path = %orchestrator.data_dir().display(), "status reporting is not implemented");
    Ok(())
}
