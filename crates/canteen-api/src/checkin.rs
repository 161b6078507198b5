//! Handler for `POST /checkin`, the kiosk endpoint.
//!
//! Every admission decision, including a denial, is a `200` with a
//! [`CheckInResponse`]. A body that cannot be read at all is a `400` with the
//! same shape. Only infrastructure failures produce an [`ApiError`].

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
};
use canteen_core::{
  admission::{AdmissionResult, CheckInRequest, DenialReason},
  store::CanteenStore,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

const UNREADABLE_MESSAGE: &str = "The check-in request could not be read.";

/// JSON body accepted by `POST /checkin`.
///
/// `source_type` and `guest_count` are kept loose so that a wrong type
/// becomes a typed denial instead of an extractor rejection.
#[derive(Debug, Deserialize)]
pub struct CheckInBody {
  #[serde(default)]
  pub code:        String,
  /// `"QR"` or `"manual"`.
  #[serde(default)]
  pub source_type: Option<Value>,
  /// Whole number; absent or `null` means no guests.
  #[serde(default)]
  pub guest_count: Option<Value>,
  #[serde(default)]
  pub check_only:  bool,
}

impl CheckInBody {
  /// Convert to a core request. `None` when `guest_count` is not a whole
  /// number.
  fn into_request(self) -> Option<CheckInRequest> {
    let guest_count = match self.guest_count {
      None | Some(Value::Null) => 0,
      Some(raw) => raw.as_i64()?,
    };
    // Anything but a string fails source validation in the controller.
    let source = match self.source_type {
      Some(Value::String(s)) => s,
      _ => String::new(),
    };
    Some(CheckInRequest {
      code: self.code,
      source,
      guest_count,
      check_only: self.check_only,
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInStatus {
  Admitted,
  AlreadyCheckedIn,
  CanCheckIn,
  Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInResponse {
  pub status:            CheckInStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub holder_name:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remaining_minutes: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason:            Option<DenialReason>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_visit_at:     Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub visit_id:          Option<Uuid>,
  pub message:           String,
}

impl From<AdmissionResult> for CheckInResponse {
  fn from(result: AdmissionResult) -> Self {
    let message = result.message();
    let holder_name = result.holder_name().map(str::to_owned);
    let remaining_minutes = result.remaining_minutes();

    let (status, reason, last_visit_at, visit_id) = match result {
      AdmissionResult::Admitted { visit } => {
        (CheckInStatus::Admitted, None, None, Some(visit.visit_id))
      }
      AdmissionResult::AlreadyCheckedIn { last_visit_time, .. } => {
        (CheckInStatus::AlreadyCheckedIn, None, Some(last_visit_time), None)
      }
      AdmissionResult::CanCheckIn { .. } => (CheckInStatus::CanCheckIn, None, None, None),
      AdmissionResult::Denied { reason } => {
        (CheckInStatus::Denied, Some(reason), None, None)
      }
    };

    CheckInResponse {
      status,
      holder_name,
      remaining_minutes,
      reason,
      last_visit_at,
      visit_id,
      message,
    }
  }
}

/// `POST /checkin` with a [`CheckInBody`].
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  body: Result<Json<CheckInBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CheckInResponse>), ApiError>
where
  S: CanteenStore + 'static,
{
  let body = match body {
    Ok(Json(body)) => body,
    Err(rejection) => {
      tracing::debug!(error = %rejection.body_text(), "unreadable check-in body");
      let response = CheckInResponse {
        status:            CheckInStatus::Denied,
        holder_name:       None,
        remaining_minutes: None,
        reason:            None,
        last_visit_at:     None,
        visit_id:          None,
        message:           UNREADABLE_MESSAGE.to_owned(),
      };
      return Ok((StatusCode::BAD_REQUEST, Json(response)));
    }
  };

  let Some(request) = body.into_request() else {
    let result = AdmissionResult::Denied { reason: DenialReason::InvalidGuestCount };
    return Ok((StatusCode::OK, Json(result.into())));
  };
  let result = state.admission.attempt_check_in(&request, state.now()).await?;
  Ok((StatusCode::OK, Json(result.into())))
}
