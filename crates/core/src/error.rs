use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShadowcastError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{}:{line}:{column}: source file could not be parsed", .path.display())]
    MalformedSource {
        path: PathBuf,
        line: usize,
        column: usize,
    },
    #[error("router `{router}`: `{symbol}` not found in {}", .path.display())]
    UnresolvedRouterDeclaration {
        router: String,
        symbol: String,
        path: PathBuf,
    },
    #[error("duplicate procedure `{procedure}` in merged router `{alias}`")]
    DuplicateProcedure { alias: String, procedure: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ShadowcastError>;
