pub mod commands;
pub mod config;
pub mod output;

pub use commands::{execute, run_command, CliCommand, PostAction};
pub use config::{default_config_path, resolve_config};
