use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Attempt to mutate frozen value: {0}")]
    Frozen(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Transaction nesting limit of {0} exceeded")]
    NestingLimit(usize),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl StoreError {
    /// True for errors caused by using a committed or rolled back scope.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, StoreError::InvalidState(_))
    }
}
