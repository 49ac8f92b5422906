use thiserror::Error;

#[derive(Error, Debug)]
pub enum RippleError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Manifest load failed: {0}")]
    ManifestLoad(String),

    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Dependency check failed: {0}")]
    Check(String),

    #[error("Dependency declaration error: {0}")]
    Declaration(String),

    #[error("Command execution failed: {0}")]
    CommandExecution(String),

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("Review request failed: {0}")]
    ReviewRequest(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("No saved state for {module}@{version}")]
    StateNotFound { module: String, version: String },

    #[error("State store error: {0}")]
    State(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RippleError>;
