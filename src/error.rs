use chrono::{DateTime, Utc};
use thiserror::Error;

/// Rejected user input. Raised before any generation work starts.
#[derive(Debug, Error)]
pub enum InvalidConfigError {
    #[error("failed to parse {field} {input:?}, please use format {expected}")]
    Timestamp {
        field: &'static str,
        input: String,
        expected: &'static str,
        #[source]
        source: chrono::ParseError,
    },
    #[error("end time {end} precedes start time {start}")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("frequency must be a positive integer number of hertz, got {0}")]
    Frequency(i64),
}

/// Failure reported by a batch sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database insert failed after {attempts} attempt(s)")]
    Database {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to write datapoints")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize datapoint")]
    Serialize(#[from] serde_json::Error),
    #[error("batch rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("sampling period of 1/{frequency} s does not advance the cursor")]
    NonAdvancingCursor { frequency: u32 },
    #[error("sink rejected batch #{batch} ({len} datapoints, {first} ..= {last})")]
    Sink {
        batch: u64,
        len: usize,
        first: DateTime<Utc>,
        last: DateTime<Utc>,
        #[source]
        source: SinkError,
    },
    #[error("generation cancelled after persisting {persisted} datapoints")]
    Cancelled { persisted: u64 },
}
