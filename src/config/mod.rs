//! Configuration for awstools.
//!
//! The tool configuration (`awstools.yml`) points at the application
//! settings file and the template directory, and tunes the AWS calls and the
//! capacity migration.

use std::path::{Path, PathBuf};

pub use self::global::{AwsConfig, GlobalConfig, MigrationSettings};

mod global;

/// Expand a leading `~` against the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
