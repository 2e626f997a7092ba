//! Error types for the seabird results pipeline.
//!
//! Fetch, configuration and snapshot errors end a run. Sink errors are
//! classified and logged by the job entry points instead of propagating.

use thiserror::Error;

/// Errors raised while loading the pipeline configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("environment variable {0} must be set")]
    MissingVar(&'static str),

    /// The configuration file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for `PipelineConfig`.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors that can arise when querying the remote feature service.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx HTTP response.
    #[error("HTTP error {status} from {url}")]
    Status { status: u16, url: String },

    /// The service answered 200 but with an `error` body.
    #[error("feature service error {code}: {message}")]
    Service { code: i64, message: String },

    /// The response body could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The portal item has no feature service URL.
    #[error("portal item {0} has no service url")]
    NoServiceUrl(String),

    /// The configured layer/table position does not exist in the service.
    #[error("feature service has no {kind} at index {index}")]
    MissingLayer { kind: &'static str, index: usize },
}

/// Errors that can arise when writing result tables.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Rows do not match the table schema. Nothing was written.
    #[error("table {table} failed validation: {message}")]
    Validation { table: String, message: String },

    /// The results database rejected the write or the connection failed.
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors returned by the job entry points in `pipeline`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    /// The historical snapshot could not be loaded.
    #[error("historical snapshot {path}: {message}")]
    Snapshot { path: String, message: String },

    #[error(transparent)]
    Sink(#[from] SinkError),
}
