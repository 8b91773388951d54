/// Errors raised by the scoring, clustering and ranking core
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Malformed or insufficient series data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Out-of-range threshold, weight or window value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced query or score does not exist
    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Configuration error: {0}")]
    Config(#[from] envy::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;
