use crate::types::{DataKind, RoundRef};
use thiserror::Error;

/// Transport failures while fetching a page or feed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no fixture registered for {0}")]
    NotFound(String),
}

impl FetchError {
    /// Connection problems, timeouts, throttling and server errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Io(_) => true,
            FetchError::NotFound(_) => false,
        }
    }
}

/// A block, row or token that does not match the expected shape.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("{team}: expected 4 quarter tokens, found {found}")]
    QuarterCount { team: String, found: usize },

    #[error("{team}: malformed goals.points token '{token}'")]
    QuarterToken { team: String, token: String },

    #[error("{team}: quarters total {quarters} but final score is {stated}")]
    ScoreMismatch { team: String, quarters: u32, stated: u32 },

    #[error("{field}: cannot parse '{value}'")]
    Number { field: &'static str, value: String },

    #[error("kickoff '{0}' does not match 'Day dd-Mon-YYYY hh:mm AM'")]
    Kickoff(String),

    #[error("block with {rows} rows is neither a match nor a bye")]
    BlockShape { rows: usize },

    #[error("row {row} is missing cell {cell}")]
    MissingCell { row: usize, cell: usize },

    #[error("ladder row {row}: {error}")]
    LadderRow { row: usize, error: Box<ExtractError> },

    #[error("odds feed column '{0}' not found")]
    MissingColumn(String),
}

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("staging I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("staging payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} artifact for {round} failed checksum verification")]
    Checksum { kind: DataKind, round: RoundRef },

    #[error("{kind} artifact for {round} has unreadable row {row}: {message}")]
    Row { kind: DataKind, round: RoundRef, row: usize, message: String },
}

/// Sink failures. Kept apart from "no rows" so callers never mistake an outage for an empty store.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored value in {table}.{column} is unreadable: {value}")]
    Corrupt { table: &'static str, column: &'static str, value: String },

    #[error("I/O error opening sink: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("task graph error: {0}")]
    Graph(String),
}

impl IngestError {
    /// Errors that end the whole run rather than one stage.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::Sink(_))
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
