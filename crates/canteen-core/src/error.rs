//! Error types for `canteen-core`.
//!
//! Admission denials are not errors; they are [`AdmissionResult`] values.
//! Only infrastructure and caller-input failures end up here.
//!
//! [`AdmissionResult`]: crate::admission::AdmissionResult

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
  /// A transient storage failure. The caller may retry the request.
  #[error("storage unavailable: {0}")]
  StorageUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("aggregation already running for period {0:?}")]
  AggregationConflict(String),

  #[error("invalid billing period label: {0:?}")]
  InvalidPeriodLabel(String),

  #[error("date out of range: {0}")]
  DateOutOfRange(String),

  #[error("invalid tariff: {0}")]
  InvalidTariff(String),
}

impl Error {
  /// Classify a backend error as transient or permanent.
  pub fn from_store<E: StoreError>(err: E) -> Self {
    if err.is_transient() {
      Self::StorageUnavailable(Box::new(err))
    } else {
      Self::Storage(Box::new(err))
    }
  }

  pub fn is_transient(&self) -> bool {
    matches!(self, Self::StorageUnavailable(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
