use std::path::PathBuf;

use thiserror::Error;

use crate::plot::types::TILE_WIDTH;

/// Errors surfaced by the plotting pipeline.
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("could not open dataset {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{origin}:{line}: {reason}")]
    Format {
        origin: String,
        line: usize,
        reason: String,
    },
    #[error("dataset {dataset} has {rows} rows, fewer than one tile of {} particles", TILE_WIDTH)]
    EmptyDataset { dataset: String, rows: usize },
    #[error("presentation surface misuse: {0}")]
    Precondition(&'static str),
    #[error("record buffer of length {len} is not a positive multiple of {}", TILE_WIDTH)]
    Misaligned { len: usize },
    #[error("dataset {0} is not in the catalog")]
    UnknownDataset(String),
    #[error("no *.csv datasets found in {}", dir.display())]
    NoDatasets { dir: PathBuf },
    #[error("GPU error: {0}")]
    Gpu(String),
    #[error("invalid config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}
