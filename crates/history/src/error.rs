use beacon::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("failed to encode or decode stored value: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, HistoryError>;

impl From<deadpool::managed::PoolError<libsql::Error>> for HistoryError {
    fn from(error: deadpool::managed::PoolError<libsql::Error>) -> Self {
        match error {
            deadpool::managed::PoolError::Backend(e) => HistoryError::Database(e),
            other => HistoryError::Pool(other.to_string()),
        }
    }
}

impl From<HistoryError> for StoreError {
    fn from(error: HistoryError) -> Self {
        match error {
            HistoryError::Pool(reason) => StoreError::Unavailable(reason),
            other => StoreError::Backend(other.to_string()),
        }
    }
}
