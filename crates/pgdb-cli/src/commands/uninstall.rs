use anyhow::{Context, Result};
use pgdb_core::Orchestrator;

pub fn handle(orchestrator: &mut Orchestrator<'_>) -> Result<()> {
    let report = orchestrator.uninstall().context("uninstall failed")?;
    if report.data_dir_existed {
        println!("✓ Removed {}", report.data_dir.display());
    } else {
        println!(
            "Could not uninstall, data directory {} does not exist.",
            report.data_dir.display()
        );
    }
    for warning in &report.warnings {
        eprintln!("⚠ {warning}");
    }
    Ok(())
}
