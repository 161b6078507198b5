//! Background deduction aggregation.
//!
//! Each tick re-aggregates the current billing period and the one before it.
//! Both runs are idempotent, so the previous period keeps picking up late
//! corrections until it falls out of the window, and its closing totals are
//! written on the first tick after the 20th.
//!
//! A tick prices each period at the tariff its last run stored, so rates an
//! administrator chose for a period survive later ticks. Only periods that
//! were never aggregated fall back to the configured default.

use std::{future::Future, time::Duration};

use canteen_api::AppState;
use canteen_core::{
  aggregate::AggregationSummary,
  deduction::Tariff,
  period::BillingPeriod,
  store::CanteenStore,
};
use tokio::time::MissedTickBehavior;

use crate::error::Error;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct AggregationStats {
  pub periods_aggregated: usize,
  pub holders_aggregated: usize,
  pub failures:           usize,
}

/// Aggregate `period` under `tariff`, giving up after `timeout`.
///
/// A run that times out is dropped mid-flight; the store's single-transaction
/// upsert leaves either the full previous result or the full new one.
pub async fn aggregate_once<S>(
  state: &AppState<S>,
  period: &BillingPeriod,
  tariff: &Tariff,
  timeout: Duration,
) -> Result<AggregationSummary, Error>
where
  S: CanteenStore + 'static,
{
  bounded(timeout, state.aggregator.aggregate(period, tariff)).await
}

async fn bounded<T>(
  timeout: Duration,
  run: impl Future<Output = canteen_core::Result<T>>,
) -> Result<T, Error> {
  tokio::time::timeout(timeout, run)
    .await
    .map_err(|_| Error::TimedOut(timeout))?
    .map_err(Error::from)
}

/// One scheduler tick: the previous period, then the current one.
pub async fn aggregate_recent<S>(state: &AppState<S>, timeout: Duration) -> AggregationStats
where
  S: CanteenStore + 'static,
{
  let mut stats = AggregationStats::default();

  let current = match canteen_core::period::period_for(state.today()) {
    Ok(period) => period,
    Err(e) => {
      tracing::error!(error = %e, "cannot resolve current billing period");
      stats.failures += 1;
      return stats;
    }
  };
  let mut periods = Vec::with_capacity(2);
  match current.previous() {
    Ok(previous) => periods.push(previous),
    Err(e) => tracing::warn!(error = %e, "no previous billing period"),
  }
  periods.push(current);

  for period in &periods {
    match bounded(timeout, state.aggregator.reaggregate(period, &state.tariff)).await {
      Ok(summary) => {
        stats.periods_aggregated += 1;
        stats.holders_aggregated += summary.holders_aggregated;
      }
      Err(e) => {
        tracing::error!(period = %period.label, error = %e, "scheduled aggregation failed");
        stats.failures += 1;
      }
    }
  }

  tracing::info!(?stats, "scheduled aggregation completed");
  stats
}

/// Run [`aggregate_recent`] every `every` until the task is dropped.
pub async fn run_scheduler<S>(state: AppState<S>, every: Duration, timeout: Duration)
where
  S: CanteenStore + 'static,
{
  let mut interval = tokio::time::interval(every);
  interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

  tracing::info!(every = ?every, "aggregation scheduler started");
  loop {
    interval.tick().await;
    aggregate_recent(&state, timeout).await;
  }
}
