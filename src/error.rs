use snafu::Snafu;

/// Errors raised while assembling a [`crate::config::Config`] from the
/// environment. Fail-fast, non-zero exit.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("missing required environment variable {name}"))]
    MissingVar { name: &'static str },

    #[snafu(display("environment variable {name} has invalid value {value:?}: {source}"))]
    InvalidVar {
        name: &'static str,
        value: String,
        source: std::num::ParseIntError,
    },

    #[snafu(display("SCID_FILES must name at least one file"))]
    NoStreams,
}

/// Errors from a single tailer tick: source-file I/O.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TailError {
    #[snafu(display("stream {stream_id}: failed to open/read {path:?}: {source}"))]
    SourceFile {
        stream_id: String,
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

/// Errors from a single (date, symbol) front-contract marker transaction.
/// Callers roll back and continue with the next pair.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MarkerError {
    #[snafu(display("marker query failed for {date} / {symbol}: {source}"))]
    Query {
        date: chrono::NaiveDate,
        symbol: String,
        source: sqlx::Error,
    },
}

/// Errors from a single ingestion worker, scoped to the stream and the
/// window of record indices it was draining when it failed.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    #[snafu(display("stream {stream_id}: failed to connect to {endpoint}: {source}"))]
    Connect {
        stream_id: String,
        endpoint: String,
        source: std::io::Error,
    },

    #[snafu(display("stream {stream_id}: send failed for rows {offset_start}..{offset_end}: {source}"))]
    Send {
        stream_id: String,
        offset_start: usize,
        offset_end: usize,
        source: std::io::Error,
    },

    #[snafu(display("stream {stream_id}: flush failed for rows {offset_start}..{offset_end}: {source}"))]
    Flush {
        stream_id: String,
        offset_start: usize,
        offset_end: usize,
        source: std::io::Error,
    },

    #[snafu(display("stream {stream_id}: worker task panicked: {source}"))]
    WorkerPanicked {
        stream_id: String,
        source: tokio::task::JoinError,
    },
}
