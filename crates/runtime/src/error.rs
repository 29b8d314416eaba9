use crate::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// The model provider call failed. Shown to the user; not retried.
    #[error("transport error: {0}")]
    Transport(#[from] ModelError),

    /// The model answered with neither usable text nor a well-formed batch
    /// of tool calls.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    /// Blank user input; nothing was added to the history.
    #[error("user input is empty")]
    EmptyInput,

    #[error("invalid history: {0}")]
    InvalidHistory(String),

    #[error("tool already registered: {0}")]
    DuplicateTool(String),

    #[error("tool catalog mismatch: {0}")]
    CatalogMismatch(String),
}

pub type Result<T> = std::result::Result<T, Error>;
