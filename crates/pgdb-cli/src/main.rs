use anyhow::{Context, Result};
use clap::Parser;
use pgdb_cli::{build_cli_command, Cli, Commands};
use pgdb_core::{Orchestrator, RuntimeContext};
use tracing::debug;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let Some(command) = &cli.command else {
        let _ = build_cli_command().print_help();
        println!();
        return;
    };

    match run(command) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(command: &Commands) -> Result<i32> {
    let ctx = RuntimeContext::from_env().context("failed to resolve pgdb home")?;
    debug!(home = %ctx.config_home.display(), "using pgdb home");
    let mut orchestrator = Orchestrator::load(&ctx).context("failed to load settings")?;

    let code = match command {
        Commands::Install(args) => commands::install::handle(&mut orchestrator, args)?,
        Commands::Start => commands::service::start(&orchestrator).map(|_| 0)?,
        Commands::Stop => commands::service::stop(&orchestrator).map(|_| 0)?,
        Commands::Status => commands::service::status(&orchestrator).map(|_| 0)?,
        Commands::Uninstall => commands::uninstall::handle(&mut orchestrator).map(|_| 0)?,
    };

    orchestrator.finish().context("failed to save settings")?;
    Ok(code)
}
