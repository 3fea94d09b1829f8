use clap::{Args, CommandFactory, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pgdb", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download and configure Neo4j and InfluxDB
    Install(InstallArgs),
    /// Start both databases in the background
    Start,
    /// Stop both databases
    Stop,
    /// Reserved; currently does nothing
    Status,
    /// Remove the installation and the pgdb config home
    Uninstall,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct InstallArgs {
    /// Directory to install the databases into (defaults to $PGDB_HOME/data)
    #[arg(value_hint = ValueHint::DirPath)]
    pub directory: Option<PathBuf>,

    /// Suppress user input
    #[arg(short, long)]
    pub quiet: bool,

    /// Force download of new versions
    #[arg(short, long)]
    pub download: bool,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli_command().debug_assert();
    }

    #[test]
    fn test_install_flags() {
        let cli = Cli::try_parse_from(["pgdb", "install", "/tmp/pg", "-q", "--download"]).unwrap();
        match cli.command {
            Some(Commands::Install(args)) => {
                assert_eq!(args.directory, Some(PathBuf::from("/tmp/pg")));
                assert!(args.quiet);
                assert!(args.download);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_install_directory_is_optional() {
        let cli = Cli::try_parse_from(["pgdb", "install"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Install(InstallArgs { directory: None, quiet: false, download: false }))
        ));
    }

    #[test]
    fn test_log_level_default() {
        let cli = Cli::try_parse_from(["pgdb", "stop"]).unwrap();
        assert_eq!(cli.log_level, tracing::Level::WARN);
    }
}
