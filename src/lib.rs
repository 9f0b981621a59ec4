//! Trademark register scraper.
//!
//! Splits a list of application numbers across workers. Each worker holds its own portal session
//! and captcha and writes its records to a private shard. The shards are merged into the combined
//! table only if every worker finished its chunk.

use std::path::{Path, PathBuf};

pub mod config;
mod error;
mod macros;
pub mod parse;
pub mod portal;
pub mod process;
pub mod record;
pub mod request;
pub mod session;
pub mod table;
pub mod worker;

pub use error::{Error, Result, WorkerFailure};

pub const WORKER_OUTPUT_PREFIX: &str = "trademark_data_worker_";
pub const WORKER_OUTPUT_EXT: &str = "csv";

/// Shard path of the worker with the given ordinal (starting at 1).
pub fn worker_output_path(dir: &Path, worker_id: usize) -> PathBuf {
    dir.join(format!("{WORKER_OUTPUT_PREFIX}{worker_id}.{WORKER_OUTPUT_EXT}"))
}

/// Whether a file name follows the worker shard naming, including an interrupted temporary write.
pub fn is_worker_output(file_name: &str) -> bool {
    let Some(rest) = file_name.strip_prefix(WORKER_OUTPUT_PREFIX) else {
        return false;
    };
    let rest = rest.strip_suffix(".tmp").unwrap_or(rest);
    rest.ends_with(&format!(".{WORKER_OUTPUT_EXT}"))
}
