//! Error types for lutra-transform

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while transforming module source.
#[derive(Error, Debug)]
pub enum TransformError {
    /// Source text could not be parsed. Always fatal for the module load.
    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// An AST pass failed.
    #[error("Transform error in {path}: {message}")]
    Transform { path: PathBuf, message: String },

    #[error("Codegen error: {0}")]
    Codegen(String),

    #[error("Invalid JSON module {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Source map error: {0}")]
    SourceMap(String),

    #[error("tsconfig error: {0}")]
    Tsconfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransformError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn tsconfig(message: impl Into<String>) -> Self {
        Self::Tsconfig(message.into())
    }
}

/// Result type alias for transform operations
pub type TransformResult<T> = Result<T, TransformError>;
