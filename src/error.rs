use thiserror::Error;

#[derive(Error, Debug)]
pub enum UnirangeError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, UnirangeError>;

// Helper conversions
impl From<rusqlite::Error> for UnirangeError {
    fn from(e: rusqlite::Error) -> Self { Self::Store(e.to_string()) }
}

impl From<config::ConfigError> for UnirangeError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}

impl<T> From<std::sync::PoisonError<T>> for UnirangeError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}
