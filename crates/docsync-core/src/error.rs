use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocSyncError {
    #[error("Invalid pattern: {0}")]
    Pattern(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transport timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, DocSyncError>;
