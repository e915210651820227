/*!
The two batch jobs: ingestion writes the processed table that training reads
*/
use std::fs;
use std::path::Path;

pub mod ingest;
pub mod training;

pub use ingest::run_ingestion;
pub use training::{run_training, train_job, TrainReport};

/// Create the parent directory of an output file if it does not exist yet
pub(crate) fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
