//! Error taxonomy shared by the extractor, collaborators and session.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No chat is present on the page. Callers treat this as "nothing to do".
    #[error("chat container not found")]
    ContainerNotFound,

    /// A single message element could not be parsed; extraction skips it.
    #[error("failed to parse message {index}: {reason}")]
    ParseFailure { index: usize, reason: String },

    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("no conversation to export")]
    NoTargetChat,

    /// A stored chat reference matched nothing, or more than one chat.
    #[error("{0}")]
    UnknownChat(String),

    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive packaging failed: {0}")]
    Packaging(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, Error>;
