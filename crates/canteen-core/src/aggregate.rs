//! The deduction aggregator: roll a billing period's visits into one
//! deduction per holder.

use std::{
  collections::{BTreeMap, HashSet},
  sync::{Arc, Mutex},
};

use chrono::FixedOffset;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
  Error, Result,
  deduction::{DeductionRecord, Tariff},
  period::BillingPeriod,
  store::{DeductionStore, VisitLedger, list_for_period, read_with_retry},
  visit::VisitRecord,
};

/// What one aggregation run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationSummary {
  pub period:             BillingPeriod,
  pub holders_aggregated: usize,
  pub deductions:         Vec<DeductionRecord>,
}

/// Batch job turning visits into [`DeductionRecord`]s.
///
/// Runs for the same period label are serialized: a second concurrent run is
/// refused with [`Error::AggregationConflict`]. Runs for different periods, and
/// check-ins, are never blocked.
pub struct Aggregator<S> {
  store:       Arc<S>,
  /// Facility time zone; decides which calendar day a visit falls on.
  tz:          FixedOffset,
  in_progress: Arc<Mutex<HashSet<String>>>,
}

impl<S> Clone for Aggregator<S> {
  fn clone(&self) -> Self {
    Self {
      store:       Arc::clone(&self.store),
      tz:          self.tz,
      in_progress: Arc::clone(&self.in_progress),
    }
  }
}

impl<S> Aggregator<S>
where
  S: VisitLedger + DeductionStore,
{
  pub fn new(store: Arc<S>, tz: FixedOffset) -> Self {
    Self { store, tz, in_progress: Arc::default() }
  }

  pub fn time_zone(&self) -> FixedOffset { self.tz }

  /// Aggregate every visit in `period` under `tariff` and upsert the result.
  ///
  /// Idempotent: with an unchanged ledger, rerunning yields identical records.
  /// The upsert is a single transaction, so a cancelled run either stored the
  /// whole period or nothing.
  pub async fn aggregate(
    &self,
    period: &BillingPeriod,
    tariff: &Tariff,
  ) -> Result<AggregationSummary> {
    let _guard = JobGuard::acquire(&self.in_progress, &period.label)?;
    self.run(period, tariff).await
  }

  /// Aggregate `period` again at the tariff its last run stored, or at
  /// `default` if it has never been aggregated.
  ///
  /// The stored tariff is read under the period's job guard, so a concurrent
  /// run at new rates cannot be overwritten with stale ones.
  pub async fn reaggregate(
    &self,
    period: &BillingPeriod,
    default: &Tariff,
  ) -> Result<AggregationSummary> {
    let _guard = JobGuard::acquire(&self.in_progress, &period.label)?;

    let store = self.store.as_ref();
    let label = period.label.as_str();
    let stored = read_with_retry("period_tariff", move || store.period_tariff(label)).await?;
    self.run(period, stored.as_ref().unwrap_or(default)).await
  }

  async fn run(&self, period: &BillingPeriod, tariff: &Tariff) -> Result<AggregationSummary> {
    let visits = list_for_period(self.store.as_ref(), period, &self.tz).await?;

    let records = build_deductions(period, tariff, &visits);
    let holders = records.len();

    let deductions = self
      .store
      .upsert_deductions(&period.label, tariff, records)
      .await
      .map_err(Error::from_store)?;

    info!(
      period = %period.label,
      visits = visits.len(),
      holders,
      currency = %tariff.currency,
      rate = %tariff.per_visit,
      "deductions aggregated"
    );

    Ok(AggregationSummary { period: period.clone(), holders_aggregated: holders, deductions })
  }
}

/// Group `visits` by holder key and price each group. Ordered by holder key.
pub fn build_deductions(
  period: &BillingPeriod,
  tariff: &Tariff,
  visits: &[VisitRecord],
) -> Vec<DeductionRecord> {
  let mut groups: BTreeMap<&str, (u32, u64)> = BTreeMap::new();
  for visit in visits {
    let entry = groups.entry(visit.holder_key.as_str()).or_default();
    entry.0 += 1;
    entry.1 += u64::from(visit.guest_count);
  }

  groups
    .into_iter()
    .map(|(key, (count, guests))| tariff.deduction(key.to_owned(), period, count, guests))
    .collect()
}

// ─── Job guard ───────────────────────────────────────────────────────────────

/// Marks a period label as being aggregated; released on drop, including when
/// the run's future is cancelled.
struct JobGuard {
  labels: Arc<Mutex<HashSet<String>>>,
  label:  String,
}

impl JobGuard {
  fn acquire(labels: &Arc<Mutex<HashSet<String>>>, label: &str) -> Result<Self> {
    let mut running = labels.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if !running.insert(label.to_owned()) {
      warn!(period = label, "aggregation already in progress");
      return Err(Error::AggregationConflict(label.to_owned()));
    }
    Ok(Self { labels: Arc::clone(labels), label: label.to_owned() })
  }
}

impl Drop for JobGuard {
  fn drop(&mut self) {
    let mut running = self.labels.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    running.remove(&self.label);
  }
}
