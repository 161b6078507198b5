//! The Canteen server: configuration, admin authentication, scheduled
//! aggregation, and the assembled HTTP application.

pub mod auth;
pub mod config;
pub mod error;
pub mod jobs;

pub use config::ServerConfig;
pub use error::Error;

use std::sync::Arc;

use axum::{Router, middleware};
use canteen_api::{AppState, admin_router, kiosk_router};
use canteen_core::store::CanteenStore;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_admin};

/// Build application state for `store` from `config`.
pub fn app_state<S>(store: Arc<S>, config: &ServerConfig) -> Result<AppState<S>, Error>
where
  S: CanteenStore,
{
  Ok(AppState::new(
    store,
    config.admission_policy(),
    config.time_zone()?,
    config.tariff()?,
  ))
}

/// Kiosk routes open, admin routes behind basic auth, every request traced.
pub fn router<S>(state: AppState<S>, auth: AuthConfig) -> Router
where
  S: CanteenStore + 'static,
{
  let admin = admin_router(state.clone())
    .layer(middleware::from_fn_with_state(Arc::new(auth), require_admin));

  Router::new()
    .merge(kiosk_router(state))
    .merge(admin)
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use canteen_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  async fn make_app(password: &str) -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let config: ServerConfig = ::config::Config::builder()
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    let state = app_state(Arc::new(store), &config).unwrap();
    let auth = AuthConfig {
      username:      "admin".to_string(),
      password_hash: auth::hash_password(password).unwrap(),
    };
    router(state, auth)
  }

  fn request(method: &str, uri: &str, creds: Option<(&str, &str)>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json");
    if let Some((user, pass)) = creds {
      builder = builder.header(
        header::AUTHORIZATION,
        format!("Basic {}", B64.encode(format!("{user}:{pass}"))),
      );
    }
    builder.body(Body::from(body.to_string())).unwrap()
  }

  #[tokio::test]
  async fn kiosk_routes_are_open() {
    let app = make_app("secret").await;
    let resp = app
      .clone()
      .oneshot(request("GET", "/health", None, ""))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
      .oneshot(request("POST", "/checkin", None, r#"{"code":"X","source_type":"QR"}"#))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn admin_routes_require_credentials() {
    let app = make_app("secret").await;
    let resp = app
      .clone()
      .oneshot(request("POST", "/deductions/aggregate", None, "{}"))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let resp = app
      .clone()
      .oneshot(request(
        "PUT",
        "/holders/employees/EMP001",
        Some(("admin", "wrong")),
        r#"{"name":"Aisha"}"#,
      ))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
      .oneshot(request(
        "PUT",
        "/holders/employees/EMP001",
        Some(("admin", "secret")),
        r#"{"name":"Aisha"}"#,
      ))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }
}
