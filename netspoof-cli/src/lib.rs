//! CLI interface for netspoof
//!
//! Argument parsing, the command language and the interactive shell that
//! drives the spoofing modules.

pub mod args;
pub mod command;
pub mod shell;

pub use args::Cli;
pub use command::{Command, CommandParser};
pub use shell::Shell;
