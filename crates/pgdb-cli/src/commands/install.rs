use anyhow::{Context, Result};
use pgdb_cli::{progress::TerminalProgress, prompt::StdinPrompt, InstallArgs};
use pgdb_core::{
    Declined, FetchOutcome, HttpSource, InstallOptions, InstallOutcome, Orchestrator,
};
use tracing::info;

/// Returns the process exit code; declining a prompt is not an error but exits 1.
pub fn handle(orchestrator: &mut Orchestrator<'_>, args: &InstallArgs) -> Result<i32> {
    let options = InstallOptions {
        directory: args.directory.clone(),
        quiet: args.quiet,
        download: args.download,
    };
    let mut prompt = StdinPrompt::stdin();
    let mut progress = TerminalProgress::new();

    let outcome = orchestrator
        .install(&options, &mut prompt, &HttpSource, &mut progress)
        .context("installation failed")?;

    match outcome {
        InstallOutcome::Installed(report) => {
            for (component, fetched) in &report.components {
                match fetched {
                    FetchOutcome::ExistingUsed(_) => {
                        println!("Using existing {component} installation.")
                    }
                    FetchOutcome::Installed(path) => {
                        println!("✓ {component} installed to {}", path.display())
                    }
                }
            }
            for warning in &report.warnings {
                eprintln!("⚠ {warning}");
            }
            info!(path = %report.data_dir.display(), "installation complete");
            Ok(0)
        }
        InstallOutcome::Declined(Declined::Overwrite) => {
            println!("Aborting installation.");
            Ok(1)
        }
        InstallOutcome::Declined(Declined::DefaultDirectory) => {
            println!("Please specify an install directory.");
            Ok(1)
        }
    }
}
