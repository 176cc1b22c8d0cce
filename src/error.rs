//! Error types for the feature indexer.
//!
//! Each failure class has its own enum so callers can decide policy by kind:
//! admission errors skip one document, fetch errors are skippable in
//! non-strict mode, database errors always abort the current resolution.

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Rejection of a single candidate document.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("{path}: invalid identifier ({reason})")]
    InvalidIdentifier { path: String, reason: String },

    #[error("{path}: invalid geometry ({reason})")]
    InvalidGeometry { path: String, reason: String },

    #[error("{path}: malformed document: {reason}")]
    Malformed { path: String, reason: String },
}

/// Failure to fetch a related record from a reader.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {message}")]
    Http { url: String, message: String },

    #[error("unsupported reader URI: {0}")]
    UnsupportedReader(String),

    #[error("cannot derive a path for id {0}")]
    InvalidId(i64),
}

/// Database or connection failure.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("failed to set up table '{table}': {source}")]
    Setup {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to index record {id} in table '{table}': {source}")]
    Write {
        table: String,
        id: i64,
        #[source]
        source: sqlx::Error,
    },
}

/// Invalid flags, config file or URIs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("unsupported iterator URI: {0}")]
    UnsupportedIterator(String),

    #[error("{0}")]
    Invalid(String),
}

impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        Error::Db(DbError::Sqlx(error))
    }
}
