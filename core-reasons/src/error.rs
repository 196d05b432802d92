use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReasonError {
    #[error("Storage unavailable: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Mapping failed: {0}")]
    Mapping(String),

    #[error("Matching record count {0} does not fit the page total")]
    CountOverflow(u64),

    #[error("A reason with id {id} is already tracked by this context")]
    AlreadyTracked { id: i64 },
}

impl ReasonError {
    /// Whether the engine itself failed: unreachable file, locked database,
    /// constraint violation and the like. The engine error is available
    /// through [`std::error::Error::source`].
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, ReasonError::Storage(_) | ReasonError::Bridge(_))
    }

    /// Route row decoding failures to [`ReasonError::Mapping`] and everything
    /// else to [`ReasonError::Storage`].
    pub(crate) fn from_row_error(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_) => ReasonError::Mapping(error.to_string()),
            other => ReasonError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReasonError>;
