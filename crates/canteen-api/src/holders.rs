//! Handlers for `/holders` endpoints, used by administrators to maintain the
//! badge directory.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `PUT`  | `/holders/employees/{code}` | Body: [`EmployeeBody`] |
//! | `PUT`  | `/holders/contractors/{code}` | Body: [`ContractorBody`]; `active` defaults to `true` |

use axum::{
  Json,
  extract::{Path, State},
};
use canteen_core::{
  Error as CoreError,
  holder::{Contractor, Employee},
  resolver::normalize_code,
  store::CanteenStore,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

fn required(field: &str, value: &str) -> Result<String, ApiError> {
  let value = value.trim();
  if value.is_empty() {
    return Err(ApiError::BadRequest(format!("{field} must not be empty")));
  }
  Ok(value.to_owned())
}

fn optional(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

// ─── Employees ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EmployeeBody {
  pub name:        String,
  pub department:  Option<String>,
  pub nationality: Option<String>,
}

/// `PUT /holders/employees/{code}`
pub async fn put_employee<S>(
  State(state): State<AppState<S>>,
  Path(code): Path<String>,
  Json(body): Json<EmployeeBody>,
) -> Result<Json<Employee>, ApiError>
where
  S: CanteenStore + 'static,
{
  let employee = Employee {
    employee_id: required("employee id", normalize_code(&code))?,
    name:        required("name", &body.name)?,
    department:  optional(body.department),
    nationality: optional(body.nationality),
  };
  let stored = state
    .store
    .put_employee(employee)
    .await
    .map_err(CoreError::from_store)?;
  Ok(Json(stored))
}

// ─── Contractors ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ContractorBody {
  pub name:    String,
  pub company: Option<String>,
  pub contact: Option<String>,
  #[serde(default = "active_by_default")]
  pub active:  bool,
}

fn active_by_default() -> bool { true }

/// `PUT /holders/contractors/{code}`. Also how a badge is deactivated.
pub async fn put_contractor<S>(
  State(state): State<AppState<S>>,
  Path(code): Path<String>,
  Json(body): Json<ContractorBody>,
) -> Result<Json<Contractor>, ApiError>
where
  S: CanteenStore + 'static,
{
  let contractor = Contractor {
    qr_code_data: required("QR code", normalize_code(&code))?,
    name:         required("name", &body.name)?,
    company:      optional(body.company),
    contact:      optional(body.contact),
    active:       body.active,
  };
  let stored = state
    .store
    .put_contractor(contractor)
    .await
    .map_err(CoreError::from_store)?;
  Ok(Json(stored))
}
