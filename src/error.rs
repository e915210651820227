/*!
Error types shared by the ingestion and training jobs
*/
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A `Result` defaulting to this crate's [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can stop a job
#[derive(Debug, Error)]
pub enum Error {
    /// The market data source could not deliver a table
    #[error("failed to fetch market data: {0}")]
    Fetch(#[from] FetchError),
    /// No usable price column could be found in a downloaded table
    #[error(transparent)]
    ColumnResolution(#[from] ColumnResolutionError),
    /// The processed table could not be read, or lacks the target ticker
    #[error("failed to load {}: {reason}", path.display())]
    Load {
        /// The table that was being loaded
        path: PathBuf,
        /// What went wrong
        reason: String,
    },
    /// The series is too short to build a single sequence window
    #[error("insufficient data: {rows} rows available, but the sequence length is {sequence_length}")]
    InsufficientData {
        /// Number of usable rows in the series
        rows: usize,
        /// The requested window size
        sequence_length: usize,
    },
    /// A table index value which is not a calendar date
    #[error("cannot interpret {0:?} as a date")]
    BadDate(String),
    /// An invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Filesystem error
    #[error(transparent)]
    Io(#[from] io::Error),
    /// CSV encoding or decoding error
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// libtorch error
    #[error(transparent)]
    Torch(#[from] tch::TchError),
}

impl Error {
    /// Build a [`Error::Load`] for a given path
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Error {
        Error::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// A failed download from a market data source
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP request itself failed (DNS, connection, TLS, body decoding...)
    #[error("request for {ticker} failed: {source}")]
    Http {
        /// The ticker being requested
        ticker: String,
        /// The underlying client error
        source: reqwest::Error,
    },
    /// The server answered with a non-success status
    #[error("HTTP {status} for {ticker}")]
    Status {
        /// The ticker being requested
        ticker: String,
        /// The response status
        status: reqwest::StatusCode,
    },
    /// The source does not know this ticker, or has no rows for it in range
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
    /// The response did not have the expected shape
    #[error("unexpected response for {ticker}: {reason}")]
    Format {
        /// The ticker being requested
        ticker: String,
        /// What was wrong with it
        reason: String,
    },
    /// A replayed raw table could not be read
    #[error("failed to replay {}: {reason}", path.display())]
    Replay {
        /// The raw table file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },
    /// The source was asked for nothing, or for something it cannot produce
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Failure to pick a price column out of a raw table
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ColumnResolutionError {
    /// Not a single column label looks like a price
    #[error("couldn't locate 'Adj Close' or any close-like field in the {shape} column labels")]
    NoPriceColumn {
        /// The label shape that was searched
        shape: &'static str,
    },
    /// Price columns exist, but none of them belongs to this ticker
    #[error("no price column found for ticker {0}")]
    MissingTicker(String),
}
