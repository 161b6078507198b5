//! Handler for `GET /periods`.

use axum::{
  Json,
  extract::{Query, State},
};
use canteen_core::{
  period::{BillingPeriod, period_for},
  store::CanteenStore,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct PeriodParams {
  /// Defaults to today in the facility time zone.
  pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PeriodResponse {
  #[serde(flatten)]
  pub period:   BillingPeriod,
  pub days:     i64,
  pub previous: String,
}

/// `GET /periods[?date=YYYY-MM-DD]`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<PeriodParams>,
) -> Result<Json<PeriodResponse>, ApiError>
where
  S: CanteenStore + 'static,
{
  let period = period_for(params.date.unwrap_or_else(|| state.today()))?;
  let previous = period.previous()?.label;
  Ok(Json(PeriodResponse { days: period.days(), previous, period }))
}
