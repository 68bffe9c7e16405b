use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the library.
///
/// Discovery, annotation and reference problems never show up here: those are logged and the
/// offending entity is left out of the document. Only configuration loading, manifests,
/// serialization and artifact IO can fail a run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("invalid route manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("document has not been generated yet: {}", .0.display())]
    NotGenerated(PathBuf),

    #[error("document at {} has invalid content: {message}", path.display())]
    InvalidContent { path: PathBuf, message: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON serialization error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML serialization error: {}", err))
    }
}
