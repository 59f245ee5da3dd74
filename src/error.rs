use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LoaderError {
    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("ambiguous variant notation: {0}")]
    AmbiguousNotation(String),

    #[error("unable to parse variant notation: {0}")]
    Notation(String),

    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("missing {target} record where {filters}")]
    MissingRecord { target: String, filters: String },

    #[error("expected a single {target} record but found multiple: [{candidates}] where {filters}")]
    AmbiguousRecord {
        target: String,
        filters: String,
        candidates: String,
    },

    #[error("{target} record already exists: {message}")]
    Conflict { target: String, message: String },

    #[error("GraphKB request failed: {0}")]
    GraphKbHttp(String),

    #[error("GraphKB returned status {status}: {message}")]
    GraphKbStatus { status: u16, message: String },

    #[error("GraphKB authentication failed: {0}")]
    Authentication(String),

    #[error("variant record previously processed with errors: {0}")]
    PreviouslyFailed(String),

    #[error("missing config file kb-loader.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("missing GraphKB credentials: {0}")]
    MissingCredentials(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl LoaderError {
    /// Errors raised by the remote store itself rather than by the loader's own logic.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            LoaderError::GraphKbHttp(_)
                | LoaderError::GraphKbStatus { .. }
                | LoaderError::Authentication(_)
        )
    }
}
