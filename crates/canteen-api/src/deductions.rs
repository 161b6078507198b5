//! Handlers for `/deductions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/deductions/aggregate` | Body: [`AggregateBody`]; `409` if the period is already running |
//! | `GET`  | `/deductions` | `?period_label=...` or `?date=YYYY-MM-DD` |

use std::str::FromStr;

use axum::{
  Json,
  extract::{Query, State},
};
use bigdecimal::BigDecimal;
use canteen_core::{
  Error as CoreError,
  aggregate::AggregationSummary,
  deduction::{DeductionRecord, Tariff},
  period::{BillingPeriod, period_for},
  store::CanteenStore,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{AppState, error::ApiError};

/// Pick the period named by a label or containing a date, defaulting to the
/// period containing `today`.
pub(crate) fn select_period(
  label: Option<&str>,
  date: Option<NaiveDate>,
  today: NaiveDate,
) -> Result<BillingPeriod, ApiError> {
  match (label, date) {
    (Some(_), Some(_)) => Err(ApiError::BadRequest(
      "give either period_label or date, not both".into(),
    )),
    (Some(label), None) => Ok(BillingPeriod::from_label(label)?),
    (None, Some(date)) => Ok(period_for(date)?),
    (None, None) => Ok(period_for(today)?),
  }
}

// ─── Aggregate ────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /deductions/aggregate`. Every field is optional;
/// `{}` aggregates the current period at the configured rate.
#[derive(Debug, Default, Deserialize)]
pub struct AggregateBody {
  pub period_label:   Option<String>,
  pub date:           Option<NaiveDate>,
  /// Decimal string, e.g. `"25"` or `"27.50"`.
  pub rate_per_visit: Option<String>,
  pub currency:       Option<String>,
}

fn tariff_for(
  defaults: &Tariff,
  rate: Option<&str>,
  currency: Option<String>,
) -> Result<Tariff, ApiError> {
  let per_visit = match rate {
    Some(raw) => BigDecimal::from_str(raw.trim())
      .map_err(|e| ApiError::BadRequest(format!("invalid rate_per_visit {raw:?}: {e}")))?,
    None => defaults.per_visit.clone(),
  };
  let currency = currency.unwrap_or_else(|| defaults.currency.clone());
  Tariff::new(per_visit, defaults.per_guest.clone(), currency).map_err(ApiError::from)
}

/// `POST /deductions/aggregate`
pub async fn aggregate<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<AggregateBody>,
) -> Result<Json<AggregationSummary>, ApiError>
where
  S: CanteenStore + 'static,
{
  let period = select_period(body.period_label.as_deref(), body.date, state.today())?;
  let tariff = tariff_for(&state.tariff, body.rate_per_visit.as_deref(), body.currency)?;
  let summary = state.aggregator.aggregate(&period, &tariff).await?;
  Ok(Json(summary))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub period_label: Option<String>,
  pub date:         Option<NaiveDate>,
}

/// `GET /deductions[?period_label=...][&date=...]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<DeductionRecord>>, ApiError>
where
  S: CanteenStore + 'static,
{
  let period = select_period(params.period_label.as_deref(), params.date, state.today())?;
  let deductions = state
    .store
    .list_deductions(&period.label)
    .await
    .map_err(CoreError::from_store)?;
  Ok(Json(deductions))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn qar() -> Tariff { Tariff::per_visit(BigDecimal::from(25), "QAR").unwrap() }

  #[test]
  fn tariff_falls_back_to_defaults() {
    assert_eq!(tariff_for(&qar(), None, None).unwrap(), qar());

    let t = tariff_for(&qar(), Some("27.50"), Some("usd".into())).unwrap();
    assert_eq!(t.per_visit, BigDecimal::from_str("27.50").unwrap());
    assert_eq!(t.currency, "USD");
  }

  #[test]
  fn bad_rates_are_rejected() {
    assert!(matches!(
      tariff_for(&qar(), Some("twenty"), None),
      Err(ApiError::BadRequest(_))
    ));
    assert!(matches!(
      tariff_for(&qar(), Some("-1"), None),
      Err(ApiError::Core(CoreError::InvalidTariff(_)))
    ));
  }

  #[test]
  fn period_selection() {
    let today = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap();
    let current = select_period(None, None, today).unwrap();
    assert_eq!(current.label, "21 January 2024 - 20 February 2024");

    let by_label = select_period(Some("21 December 2024 - 20 January 2025"), None, today)
      .unwrap();
    assert_eq!(by_label.start, NaiveDate::from_ymd_opt(2024, 12, 21).unwrap());

    assert!(select_period(Some(current.label.as_str()), Some(today), today).is_err());
    assert!(select_period(Some("January 2024"), None, today).is_err());
  }
}
