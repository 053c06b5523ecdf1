//! CLI module for awstools - command-line interface and handlers.

pub mod commands;
pub mod handlers;

pub use commands::Cli;
