pub mod cli;
pub mod progress;
pub mod prompt;

pub use cli::{build_cli_command, Cli, Commands, InstallArgs};
