//! Error type for `canteen-store-sqlite`.

use canteen_core::store::StoreError;
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("decimal parse error: {0}")]
  Decimal(#[from] bigdecimal::ParseBigDecimalError),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored enum column held a value this build does not know.
  #[error("unknown {column} value: {value:?}")]
  UnknownValue { column: &'static str, value: String },

  #[error("store invariant violated: {0}")]
  Inconsistent(&'static str),

  #[error("column {column} out of range: {value}")]
  OutOfRange { column: &'static str, value: i64 },
}

impl StoreError for Error {
  fn is_transient(&self) -> bool {
    match self {
      Error::Database(tokio_rusqlite::Error::ConnectionClosed) => true,
      Error::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
        e,
        _,
      ))) => matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked),
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
