//! CLI argument parsing and configuration

pub mod args;

pub use args::{ArchiveCommand, Args, Command};
