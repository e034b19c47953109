use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArborError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IPC error: {0}")]
    Ipc(String),
}

impl ArborError {
    /// `NotFound`, `InvalidInput` and `Conflict` are raised to callers unchanged.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            ArborError::NotFound(_) | ArborError::InvalidInput(_) | ArborError::Conflict(_)
        )
    }

    /// Pass domain errors through; wrap everything else into `Internal` and log it
    /// with the failing operation and the ids involved.
    pub fn escalate(self, operation: &str, ids: &[&str]) -> ArborError {
        if self.is_domain() || matches!(self, ArborError::Internal(_)) {
            return self;
        }
        tracing::error!(operation, ids = ?ids, error = %self, "Store operation failed");
        ArborError::Internal(format!("Failed to {}", operation.replace('_', " ")))
    }

    /// Stable short code used by transports.
    pub fn code(&self) -> &'static str {
        match self {
            ArborError::NotFound(_) => "not_found",
            ArborError::InvalidInput(_) => "invalid_input",
            ArborError::Conflict(_) => "conflict",
            _ => "internal",
        }
    }
}
