//! Command implementations.

pub mod config;
pub mod generate;
pub mod inspect;
pub mod plan;

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

/// The function a command operates on.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Python source file containing the function
    #[arg(short, long)]
    pub file: PathBuf,

    /// Name of the function to test
    #[arg(short = 'n', long)]
    pub function: String,
}

impl TargetArgs {
    /// Source path relative to the working directory.
    ///
    /// Absolute paths under the working directory are made relative so the
    /// output location can mirror them.
    pub fn source_path(&self) -> Result<PathBuf> {
        if self.file.is_relative() {
            return Ok(self.file.clone());
        }
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Ok(relative_to(&self.file, &cwd))
    }
}

fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map_or_else(|_| path.to_path_buf(), Path::to_path_buf)
}
