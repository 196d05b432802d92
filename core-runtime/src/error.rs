use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown {setting} '{value}'")]
    UnknownSetting { setting: &'static str, value: String },

    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed settings: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
