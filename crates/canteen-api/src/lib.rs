//! JSON REST API for Canteen.
//!
//! Exposes two axum [`Router`]s backed by any [`CanteenStore`]: the open
//! kiosk surface and the administrative surface. Auth, TLS, and transport
//! concerns are the caller's responsibility; the server binary puts the admin
//! router behind basic auth.
//!
//! # Mounting
//!
//! ```rust,ignore
//! Router::new()
//!   .merge(canteen_api::kiosk_router(state.clone()))
//!   .merge(canteen_api::admin_router(state).layer(auth))
//! ```

pub mod checkin;
pub mod deductions;
pub mod error;
pub mod holders;
pub mod periods;
pub mod visits;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post, put},
};
use canteen_core::{
  admission::{AdmissionController, AdmissionPolicy},
  aggregate::Aggregator,
  deduction::Tariff,
  store::CanteenStore,
};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde_json::{Value, json};

pub use error::ApiError;

/// Source of "now" for check-ins and default periods.
pub type Clock = fn() -> DateTime<Utc>;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:      Arc<S>,
  pub admission:  AdmissionController<S>,
  pub aggregator: Aggregator<S>,
  /// Rates used when an aggregation request does not name its own.
  pub tariff:     Arc<Tariff>,
  pub clock:      Clock,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      admission:  self.admission.clone(),
      aggregator: self.aggregator.clone(),
      tariff:     Arc::clone(&self.tariff),
      clock:      self.clock,
    }
  }
}

impl<S: CanteenStore> AppState<S> {
  pub fn new(store: Arc<S>, policy: AdmissionPolicy, tz: FixedOffset, tariff: Tariff) -> Self {
    Self {
      admission: AdmissionController::new(Arc::clone(&store), policy),
      aggregator: Aggregator::new(Arc::clone(&store), tz),
      store,
      tariff: Arc::new(tariff),
      clock: Utc::now,
    }
  }

  /// Replace the wall clock, e.g. with a fixed instant in tests.
  pub fn with_clock(mut self, clock: Clock) -> Self {
    self.clock = clock;
    self
  }

  pub fn now(&self) -> DateTime<Utc> { (self.clock)() }

  /// Today's date in the facility time zone.
  pub fn today(&self) -> NaiveDate {
    self.now().with_timezone(&self.aggregator.time_zone()).date_naive()
  }
}

// ─── Routers ──────────────────────────────────────────────────────────────────

/// Routes used by kiosks: check-in, period lookup, health.
pub fn kiosk_router<S>(state: AppState<S>) -> Router<()>
where
  S: CanteenStore + 'static,
{
  Router::new()
    .route("/checkin", post(checkin::handler::<S>))
    .route("/periods", get(periods::handler::<S>))
    .route("/health", get(health))
    .with_state(state)
}

/// Routes for administrators: billing, history, and the badge directory.
pub fn admin_router<S>(state: AppState<S>) -> Router<()>
where
  S: CanteenStore + 'static,
{
  Router::new()
    // Billing
    .route("/deductions", get(deductions::list::<S>))
    .route("/deductions/aggregate", post(deductions::aggregate::<S>))
    // History
    .route("/visits", get(visits::history::<S>))
    // Holders
    .route("/holders/employees/{code}", put(holders::put_employee::<S>))
    .route("/holders/contractors/{code}", put(holders::put_contractor::<S>))
    .with_state(state)
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use bigdecimal::BigDecimal;
  use canteen_store_sqlite::SqliteStore;
  use chrono::TimeZone;
  use tower::ServiceExt as _;

  use crate::checkin::{CheckInResponse, CheckInStatus};

  fn qatar() -> FixedOffset { FixedOffset::east_opt(3 * 3600).unwrap() }

  /// 2024-02-05 09:00 facility time.
  fn nine_am() -> DateTime<Utc> {
    qatar()
      .with_ymd_and_hms(2024, 2, 5, 9, 0, 0)
      .unwrap()
      .with_timezone(&Utc)
  }

  /// 2024-02-05 09:30 facility time.
  fn half_past_nine() -> DateTime<Utc> { nine_am() + chrono::TimeDelta::minutes(30) }

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let tariff = Tariff::per_visit(BigDecimal::from(25), "QAR").unwrap();
    AppState::new(Arc::new(store), AdmissionPolicy::default(), qatar(), tariff)
      .with_clock(nine_am)
  }

  fn app(state: AppState<SqliteStore>) -> Router {
    Router::new()
      .merge(kiosk_router(state.clone()))
      .merge(admin_router(state))
  }

  async fn send(
    state: &AppState<SqliteStore>,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(json) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    app(state.clone()).oneshot(req).await.unwrap()
  }

  async fn body_json<T: serde::de::DeserializeOwned>(resp: Response) -> T {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn register_employee(state: &AppState<SqliteStore>, code: &str, name: &str) {
    let resp = send(
      state,
      "PUT",
      &format!("/holders/employees/{code}"),
      Some(json!({ "name": name, "department": "Kitchen" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  async fn check_in(state: &AppState<SqliteStore>, code: &str) -> CheckInResponse {
    let resp = send(
      state,
      "POST",
      "/checkin",
      Some(json!({ "code": code, "source_type": "QR" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await
  }

  // ── Health / periods ────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_is_ok() {
    let state = make_state().await;
    let resp = send(&state, "GET", "/health", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json::<Value>(resp).await, json!({ "status": "ok" }));
  }

  #[tokio::test]
  async fn periods_default_to_today() {
    let state = make_state().await;
    let resp = send(&state, "GET", "/periods", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["label"], "21 January 2024 - 20 February 2024");
    assert_eq!(body["start"], "2024-01-21");
    assert_eq!(body["end"], "2024-02-20");
    assert_eq!(body["days"], 31);
    assert_eq!(body["previous"], "21 December 2023 - 20 January 2024");
  }

  #[tokio::test]
  async fn periods_for_explicit_date() {
    let state = make_state().await;
    let resp = send(&state, "GET", "/periods?date=2024-12-25", None).await;
    let body: Value = body_json(resp).await;
    assert_eq!(body["label"], "21 December 2024 - 20 January 2025");

    let resp = send(&state, "GET", "/periods?date=not-a-date", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  // ── Check-in ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn check_in_then_cooldown() {
    let state = make_state().await;
    register_employee(&state, "EMP001", "Aisha Karim").await;

    let first = check_in(&state, "EMP001").await;
    assert_eq!(first.status, CheckInStatus::Admitted);
    assert_eq!(first.holder_name.as_deref(), Some("Aisha Karim"));
    assert!(first.visit_id.is_some());

    let later = state.clone().with_clock(half_past_nine);
    let second = check_in(&later, "EMP001").await;
    assert_eq!(second.status, CheckInStatus::AlreadyCheckedIn);
    assert_eq!(second.remaining_minutes, Some(30));
    assert_eq!(second.last_visit_at, Some(nine_am()));
    assert!(second.message.contains("30 minute(s)"));
  }

  #[tokio::test]
  async fn unknown_badge_is_denied_with_message() {
    let state = make_state().await;
    let resp = check_in(&state, "NOBODY").await;
    assert_eq!(resp.status, CheckInStatus::Denied);
    assert_eq!(
      resp.reason,
      Some(canteen_core::admission::DenialReason::HolderNotFound)
    );
    assert!(resp.holder_name.is_none());
    assert!(!resp.message.is_empty());
  }

  #[tokio::test]
  async fn malformed_fields_are_typed_denials() {
    use canteen_core::admission::DenialReason;

    let state = make_state().await;
    register_employee(&state, "EMP001", "Aisha Karim").await;

    let bad_guests = DenialReason::InvalidGuestCount;
    let bad_source = DenialReason::InvalidSource;
    let cases = [
      (json!({ "code": "EMP001", "source_type": "QR", "guest_count": 1.5 }), bad_guests),
      (json!({ "code": "EMP001", "source_type": "QR", "guest_count": "two" }), bad_guests),
      (json!({ "code": "EMP001", "source_type": "QR", "guest_count": -1 }), bad_guests),
      (json!({ "code": "EMP001" }), bad_source),
      (json!({ "code": "EMP001", "source_type": null }), bad_source),
      (json!({ "code": "EMP001", "source_type": 3 }), bad_source),
    ];
    for (body, reason) in cases {
      let resp = send(&state, "POST", "/checkin", Some(body.clone())).await;
      assert_eq!(resp.status(), StatusCode::OK, "{body}");
      let decided: CheckInResponse = body_json(resp).await;
      assert_eq!(decided.status, CheckInStatus::Denied, "{body}");
      assert_eq!(decided.reason, Some(reason), "{body}");
      assert!(!decided.message.is_empty());
    }

    // None of the denials wrote a visit.
    let resp = send(&state, "GET", "/visits?holder_key=EMP001", None).await;
    assert!(body_json::<Vec<Value>>(resp).await.is_empty());

    // A null guest count is the same as none.
    let resp = send(
      &state,
      "POST",
      "/checkin",
      Some(json!({ "code": "EMP001", "source_type": "QR", "guest_count": null })),
    )
    .await;
    let admitted: CheckInResponse = body_json(resp).await;
    assert_eq!(admitted.status, CheckInStatus::Admitted);
  }

  #[tokio::test]
  async fn unreadable_body_keeps_response_shape() {
    let state = make_state().await;
    let req = Request::builder()
      .method("POST")
      .uri("/checkin")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from("{not json"))
      .unwrap();
    let resp = app(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = body_json(resp).await;
    assert_eq!(body["status"], "denied");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    assert!(body.get("reason").is_none());
  }

  #[tokio::test]
  async fn probe_reports_without_recording() {
    let state = make_state().await;
    register_employee(&state, "EMP001", "Aisha Karim").await;

    let resp = send(
      &state,
      "POST",
      "/checkin",
      Some(json!({ "code": "EMP001", "source_type": "manual", "check_only": true })),
    )
    .await;
    let probe: CheckInResponse = body_json(resp).await;
    assert_eq!(probe.status, CheckInStatus::CanCheckIn);

    let resp = send(&state, "GET", "/visits?holder_key=EMP001", None).await;
    assert!(body_json::<Vec<Value>>(resp).await.is_empty());
  }

  #[tokio::test]
  async fn deactivated_contractor_is_denied() {
    let state = make_state().await;
    let resp = send(
      &state,
      "PUT",
      "/holders/contractors/CTR-9",
      Some(json!({ "name": "Omar", "company": "Gulf Facilities", "active": false })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let stored: Value = body_json(resp).await;
    assert_eq!(stored["active"], false);

    let resp = check_in(&state, "CTR-9").await;
    assert_eq!(
      resp.reason,
      Some(canteen_core::admission::DenialReason::InactiveBadge)
    );

    // Still a known holder for history purposes.
    let resp = send(&state, "GET", "/visits?holder_key=CTR-9", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_json::<Vec<Value>>(resp).await.is_empty());
  }

  #[tokio::test]
  async fn blank_holder_name_is_rejected() {
    let state = make_state().await;
    let resp = send(
      &state,
      "PUT",
      "/holders/employees/EMP001",
      Some(json!({ "name": "   " })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  // ── Deductions ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn aggregate_current_period_with_defaults() {
    let state = make_state().await;
    register_employee(&state, "EMP001", "Aisha Karim").await;
    register_employee(&state, "EMP002", "Ben Okafor").await;
    check_in(&state, "EMP001").await;
    check_in(&state, "EMP002").await;

    let resp = send(&state, "POST", "/deductions/aggregate", Some(json!({}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let summary: Value = body_json(resp).await;
    assert_eq!(summary["holders_aggregated"], 2);
    assert_eq!(summary["period"]["label"], "21 January 2024 - 20 February 2024");
    assert_eq!(summary["deductions"][0]["holder_key"], "EMP001");
    assert_eq!(summary["deductions"][0]["currency"], "QAR");
    assert_eq!(summary["deductions"][0]["visit_count"], 1);

    let resp = send(
      &state,
      "GET",
      "/deductions?period_label=21%20January%202024%20-%2020%20February%202024",
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let stored: Vec<Value> = body_json(resp).await;
    assert_eq!(stored.len(), 2);
  }

  #[tokio::test]
  async fn aggregate_with_explicit_rate_and_date() {
    let state = make_state().await;
    register_employee(&state, "EMP001", "Aisha Karim").await;
    check_in(&state, "EMP001").await;

    let resp = send(
      &state,
      "POST",
      "/deductions/aggregate",
      Some(json!({ "date": "2024-02-01", "rate_per_visit": "30", "currency": "usd" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&state, "GET", "/deductions?date=2024-02-01", None).await;
    let stored: Vec<canteen_core::deduction::DeductionRecord> = body_json(resp).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].amount, BigDecimal::from(30));
    assert_eq!(stored[0].currency, "USD");
  }

  #[tokio::test]
  async fn aggregate_rejects_bad_input() {
    let state = make_state().await;

    let resp = send(
      &state,
      "POST",
      "/deductions/aggregate",
      Some(json!({ "period_label": "sometime in spring" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(
      &state,
      "POST",
      "/deductions/aggregate",
      Some(json!({ "rate_per_visit": "-5" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("negative"));
  }

  // ── Visits ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn visit_history_requires_holder_key() {
    let state = make_state().await;
    let resp = send(&state, "GET", "/visits?holder_key=%20", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&state, "GET", "/visits?holder_key=NOBODY", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("NOBODY"));

    register_employee(&state, "EMP001", "Aisha Karim").await;
    check_in(&state, "EMP001").await;
    let resp = send(&state, "GET", "/visits?holder_key=EMP001&limit=5", None).await;
    let visits: Vec<Value> = body_json(resp).await;
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0]["holder_name"], "Aisha Karim");
    assert_eq!(visits[0]["source"], "QR");
  }
}
