//! Handler for `GET /visits`: one holder's check-in history.

use axum::{
  Json,
  extract::{Query, State},
};
use canteen_core::{
  Error as CoreError,
  resolver::{Resolution, normalize_code, resolve},
  store::CanteenStore,
  visit::VisitRecord,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  pub holder_key: String,
  pub limit:      Option<usize>,
}

/// `GET /visits?holder_key=<code>[&limit=N]`: newest first, at most 500.
///
/// `404` for a code that matches no holder. A deactivated contractor still
/// has a history.
pub async fn history<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<VisitRecord>>, ApiError>
where
  S: CanteenStore + 'static,
{
  let key = normalize_code(&params.holder_key);
  if key.is_empty() {
    return Err(ApiError::BadRequest("holder_key must not be empty".into()));
  }
  if resolve(state.store.as_ref(), key).await? == Resolution::NotFound {
    return Err(ApiError::NotFound(format!("no badge holder with code {key:?}")));
  }
  let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

  let visits = state
    .store
    .history(key, limit)
    .await
    .map_err(CoreError::from_store)?;
  Ok(Json(visits))
}
