use crate::domain::cycle_list::CycleListError;
use crate::domain::timer::TimerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("State error: {0}")]
    State(String),
}

impl InfraError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<CycleListError> for InfraError {
    fn from(error: CycleListError) -> Self {
        match error {
            CycleListError::Validation(message) => Self::Validation(message),
            CycleListError::NotFound(id) => Self::NotFound(format!("cycle item {id}")),
        }
    }
}

impl From<TimerError> for InfraError {
    fn from(error: TimerError) -> Self {
        match error {
            TimerError::InvalidTransition(message) => Self::InvalidTransition(message),
            TimerError::Validation(message) => Self::Validation(message),
        }
    }
}
