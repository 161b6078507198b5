//! Storage traits.
//!
//! Implemented by storage backends (e.g. `canteen-store-sqlite`). The
//! admission controller, the aggregator and the HTTP layer depend on these
//! abstractions, not on any concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};

use crate::{
  deduction::{DeductionRecord, Tariff},
  holder::{Contractor, Employee},
  period::BillingPeriod,
  visit::{AppendOutcome, NewVisit, VisitRecord},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Capability every backend error type exposes to the core.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// `true` for failures that may succeed on retry (busy database, dropped
  /// connection). Transient read failures are retried once by the core.
  fn is_transient(&self) -> bool;
}

/// Shared base of all storage traits; fixes a single error type per backend.
pub trait Store: Send + Sync {
  type Error: StoreError;
}

// ─── Badge directory ─────────────────────────────────────────────────────────

/// Read-only lookup of badge holders by their external code.
pub trait BadgeDirectory: Store {
  fn find_employee<'a>(
    &'a self,
    employee_id: &'a str,
  ) -> impl Future<Output = Result<Option<Employee>, Self::Error>> + Send + 'a;

  fn find_contractor<'a>(
    &'a self,
    qr_code_data: &'a str,
  ) -> impl Future<Output = Result<Option<Contractor>, Self::Error>> + Send + 'a;
}

/// Write side of the holder tables, used by administrative collaborators.
/// The admission and billing paths never call it.
pub trait HolderRegistry: Store {
  /// Insert or replace the employee with `employee.employee_id`.
  fn put_employee(
    &self,
    employee: Employee,
  ) -> impl Future<Output = Result<Employee, Self::Error>> + Send + '_;

  /// Insert or replace the contractor with `contractor.qr_code_data`.
  fn put_contractor(
    &self,
    contractor: Contractor,
  ) -> impl Future<Output = Result<Contractor, Self::Error>> + Send + '_;
}

// ─── Visit ledger ────────────────────────────────────────────────────────────

/// Append-only store of [`VisitRecord`]s.
///
/// No method updates or removes an existing visit.
pub trait VisitLedger: Store {
  /// The holder's latest visit by check-in time, if any.
  fn most_recent_for<'a>(
    &'a self,
    holder_key: &'a str,
  ) -> impl Future<Output = Result<Option<VisitRecord>, Self::Error>> + Send + 'a;

  /// Append `visit` unless the same holder already has a visit checked in
  /// after `visit.checkin_at - cooldown`.
  ///
  /// The check and the insert are atomic with respect to other appends, so
  /// two concurrent attempts for one holder cannot both succeed.
  fn append(
    &self,
    visit: NewVisit,
    cooldown: TimeDelta,
  ) -> impl Future<Output = Result<AppendOutcome, Self::Error>> + Send + '_;

  /// All visits with `from <= checkin_at < until`, ordered by holder key then
  /// check-in time.
  fn list_between(
    &self,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<VisitRecord>, Self::Error>> + Send + '_;

  /// A holder's visits, newest first.
  fn history<'a>(
    &'a self,
    holder_key: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<VisitRecord>, Self::Error>> + Send + 'a;
}

// ─── Deductions ──────────────────────────────────────────────────────────────

pub trait DeductionStore: Store {
  /// Insert or overwrite each record keyed by `(holder_key, period_label)`,
  /// and remember `tariff` as the one `period_label` was last priced at.
  ///
  /// Everything is written in one transaction: either the whole run is
  /// stored or none of it is.
  fn upsert_deductions<'a>(
    &'a self,
    period_label: &'a str,
    tariff: &'a Tariff,
    records: Vec<DeductionRecord>,
  ) -> impl Future<Output = Result<Vec<DeductionRecord>, Self::Error>> + Send + 'a;

  /// Stored deductions for one period, ordered by holder key.
  fn list_deductions<'a>(
    &'a self,
    period_label: &'a str,
  ) -> impl Future<Output = Result<Vec<DeductionRecord>, Self::Error>> + Send + 'a;

  /// The tariff of the last stored run for `period_label`.
  fn period_tariff<'a>(
    &'a self,
    period_label: &'a str,
  ) -> impl Future<Output = Result<Option<Tariff>, Self::Error>> + Send + 'a;
}

/// Everything the HTTP layer needs from a backend.
pub trait CanteenStore:
  BadgeDirectory + HolderRegistry + VisitLedger + DeductionStore
{
}

impl<T> CanteenStore for T where
  T: BadgeDirectory + HolderRegistry + VisitLedger + DeductionStore
{
}

/// Visits checked in during `period`, with day boundaries taken in the
/// facility time zone `tz`. Ordered by holder key, then check-in time.
pub async fn list_for_period<S: VisitLedger>(
  store: &S,
  period: &BillingPeriod,
  tz: &FixedOffset,
) -> crate::Result<Vec<VisitRecord>> {
  let (from, until) = period.bounds(tz)?;
  read_with_retry("list_between", move || store.list_between(from, until)).await
}

// ─── Retry helper ────────────────────────────────────────────────────────────

/// Run a read, retrying exactly once if the first failure is transient.
pub(crate) async fn read_with_retry<T, E, F, Fut>(
  operation: &'static str,
  mut read: F,
) -> crate::Result<T>
where
  E: StoreError,
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
{
  match read().await {
    Ok(value) => Ok(value),
    Err(err) if err.is_transient() => {
      tracing::warn!(operation, error = %err, "transient storage error, retrying once");
      read().await.map_err(crate::Error::from_store)
    }
    Err(err) => Err(crate::Error::from_store(err)),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;
  use crate::Error;

  #[derive(Debug, thiserror::Error)]
  #[error("fake store error (transient: {0})")]
  struct FakeError(bool);

  impl StoreError for FakeError {
    fn is_transient(&self) -> bool { self.0 }
  }

  #[tokio::test]
  async fn transient_read_is_retried_once() {
    let counter = AtomicUsize::new(0);
    let calls = &counter;
    let value = read_with_retry("probe", move || async move {
      match calls.fetch_add(1, Ordering::SeqCst) {
        0 => Err(FakeError(true)),
        _ => Ok(7),
      }
    })
    .await
    .unwrap();
    assert_eq!(value, 7);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn second_transient_failure_is_surfaced_as_unavailable() {
    let counter = AtomicUsize::new(0);
    let calls = &counter;
    let err = read_with_retry("probe", move || async move {
      calls.fetch_add(1, Ordering::SeqCst);
      Err::<(), _>(FakeError(true))
    })
    .await
    .unwrap_err();
    assert!(matches!(err, Error::StorageUnavailable(_)));
    assert!(err.is_transient());
    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn permanent_failure_is_not_retried() {
    let counter = AtomicUsize::new(0);
    let calls = &counter;
    let err = read_with_retry("probe", move || async move {
      calls.fetch_add(1, Ordering::SeqCst);
      Err::<(), _>(FakeError(false))
    })
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }
}
