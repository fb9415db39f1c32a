//! Storage backends for recorded sequences
//!
//! - [`MemoryGateway`]: process-local, for tests and hosts with their own persistence
//! - [`JsonlGateway`]: one JSON-lines file per sequence
//! - [`SqliteGateway`]: one table per sequence in a SQLite database

mod jsonl;
mod memory;
mod sqlite;

pub use jsonl::JsonlGateway;
pub use memory::MemoryGateway;
pub use sqlite::SqliteGateway;

use anyhow::{Context, Result};
use std::path::PathBuf;

/// `~/.actionrec`, created on demand
pub fn default_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME not set")?;
    let dir = PathBuf::from(home).join(".actionrec");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
