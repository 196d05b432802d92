use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Reason storage error: {0}")]
    Reasons(#[from] core_reasons::ReasonError),
}

impl CoreError {
    /// Whether wiring failed because of settings rather than storage.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CoreError::Configuration(_)
                | CoreError::Runtime(_)
                | CoreError::Reasons(core_reasons::ReasonError::Configuration(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
