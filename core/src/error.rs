use std::path::PathBuf;
use thiserror::Error;

/// Failures while turning configured sources into a document set.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no sources configured")]
    NoSources,

    #[error("source {} is unreadable: {source}", origin.display())]
    SourceUnreadable {
        origin: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source {} is misconfigured: {reason}", origin.display())]
    InvalidDescriptor { origin: PathBuf, reason: String },

    #[error("source {} could not be parsed: {reason}", origin.display())]
    SourceParse { origin: PathBuf, reason: String },

    #[error("source {} is missing columns: {}", origin.display(), columns.join(", "))]
    MissingColumns { origin: PathBuf, columns: Vec<String> },

    #[error("no usable sources ({} failed)", failures.len())]
    NoUsableSources { failures: Vec<LoadError> },
}

/// Failures of a query against a built index.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SearchError {
    /// The index holds no documents; distinct from a query that matched nothing.
    #[error("index is unusable: no documents were loaded")]
    IndexUnusable,

    #[error("top-k must be at least 1, got {0}")]
    InvalidTopK(usize),
}

/// Failures of the downstream answer synthesizer. Never a retrieval failure.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis failed: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("synthesis failed: request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("synthesis failed: chat API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("synthesis failed: chat API returned no answer")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
