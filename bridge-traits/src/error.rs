use thiserror::Error;

/// Boxed engine error kept as the source of a [`BridgeError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to open connection: {0}")]
    ConnectionFailed(#[source] BoxError),

    #[error("Database error: {0}")]
    DatabaseError(#[source] BoxError),

    #[error("Unexpected query result: {0}")]
    UnexpectedResult(String),
}

impl BridgeError {
    /// Wrap an engine error raised while opening a connection.
    pub fn connection(error: impl Into<BoxError>) -> Self {
        Self::ConnectionFailed(error.into())
    }

    /// Wrap an engine error raised while executing a statement.
    pub fn database(error: impl Into<BoxError>) -> Self {
        Self::DatabaseError(error.into())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
