use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowTagError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed reading flow log: {0}")]
    Read(#[source] io::Error),

    #[error("lookup table is not valid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("lookup table header is missing required column `{0}`")]
    MissingColumn(&'static str),

    #[error("cannot write report to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("a classification worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, FlowTagError>;
