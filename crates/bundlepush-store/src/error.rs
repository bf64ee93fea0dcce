use std::io;
use std::path::PathBuf;

/// Terminal failures of a download/install cycle. None of them are retried
/// inside the store.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("truncated transfer: received {received} bytes, expected {expected}")]
    TruncatedTransfer { expected: u64, received: u64 },
    #[error("invalid update: {0}")]
    InvalidUpdate(String),
    #[error("integrity check failed: expected content hash {expected}, computed {actual}")]
    Integrity { expected: String, actual: String },
    #[error("signature verification failed: {0}")]
    Signature(String),
    #[error("{context}")]
    Storage {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("corrupt state file {}: {reason}", path.display())]
    CorruptState { path: PathBuf, reason: String },
    #[error("transfer failed: {0}")]
    Transfer(String),
    #[error("no previous package to roll back to")]
    NoRollbackTarget,
}

pub type Result<T, E = UpdateError> = std::result::Result<T, E>;

/// Attaches a message to filesystem errors, mirroring `anyhow::Context`.
pub trait StorageContext<T> {
    fn storage_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> StorageContext<T> for io::Result<T> {
    fn storage_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| UpdateError::Storage {
            context: context().into(),
            source,
        })
    }
}

/// Renders an `anyhow` chain on one line for typed variants.
pub(crate) fn chain_message(err: &anyhow::Error) -> String {
    format!("{err:#}")
}

/// Keeps the underlying `io::Error` when an `anyhow` chain wraps one.
pub(crate) fn storage_error(context: String, err: anyhow::Error) -> UpdateError {
    let message = chain_message(&err);
    let source = err
        .downcast::<io::Error>()
        .unwrap_or_else(|_| io::Error::other(message));
    UpdateError::Storage { context, source }
}
