//! Runtime configuration: an optional TOML file layered with `CANTEEN_*`
//! environment variables.
//!
//! Nested keys use a double underscore, e.g. `CANTEEN_BILLING__RATE_PER_VISIT=30`
//! or `CANTEEN_ADMISSION__COOLDOWN_MINUTES=45`.

use std::{path::PathBuf, str::FromStr, time::Duration};

use bigdecimal::BigDecimal;
use canteen_core::{admission::AdmissionPolicy, deduction::Tariff};
use chrono::{FixedOffset, TimeDelta};
use serde::Deserialize;

use crate::{auth::AuthConfig, error::Error};

pub const ENV_PREFIX: &str = "CANTEEN";

/// Runtime server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  /// Required by `serve`; other commands never read them.
  pub admin_username:      Option<String>,
  /// PHC string produced by `canteen-server hash-password`.
  pub admin_password_hash: Option<String>,
  #[serde(default)]
  pub admission:           AdmissionConfig,
  #[serde(default)]
  pub billing:             BillingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
  pub cooldown_minutes:   u32,
  pub max_guests:         u32,
  /// Facility offset from UTC; decides which billing day a visit falls on.
  pub utc_offset_minutes: i32,
}

impl Default for AdmissionConfig {
  fn default() -> Self {
    Self { cooldown_minutes: 60, max_guests: 20, utc_offset_minutes: 180 }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
  /// Decimal string so no precision is lost on the way in.
  pub rate_per_visit:         String,
  pub per_guest:              String,
  pub currency:               String,
  /// Run the aggregator in the background this often. Off when unset.
  pub schedule_interval_secs: Option<u64>,
  pub timeout_secs:           u64,
}

impl Default for BillingConfig {
  fn default() -> Self {
    Self {
      rate_per_visit:         "25".into(),
      per_guest:              "0".into(),
      currency:               "QAR".into(),
      schedule_interval_secs: None,
      timeout_secs:           300,
    }
  }
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("canteen.db") }

impl ServerConfig {
  /// Layer the file at `path` (if it exists) under `CANTEEN_*` variables.
  pub fn load(path: impl Into<PathBuf>) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path.into()).required(false))
      .add_source(
        config::Environment::with_prefix(ENV_PREFIX)
          .prefix_separator("_")
          .separator("__"),
      )
      .build()?
      .try_deserialize()
  }

  pub fn admission_policy(&self) -> AdmissionPolicy {
    AdmissionPolicy {
      cooldown:   TimeDelta::minutes(i64::from(self.admission.cooldown_minutes)),
      max_guests: self.admission.max_guests,
    }
  }

  pub fn time_zone(&self) -> Result<FixedOffset, Error> {
    let minutes = self.admission.utc_offset_minutes;
    minutes
      .checked_mul(60)
      .and_then(FixedOffset::east_opt)
      .ok_or_else(|| Error::Config(format!("utc_offset_minutes {minutes} is out of range")))
  }

  pub fn tariff(&self) -> Result<Tariff, Error> {
    let rate = |field: &str, raw: &str| {
      BigDecimal::from_str(raw.trim())
        .map_err(|e| Error::Config(format!("billing.{field} {raw:?}: {e}")))
    };
    Ok(Tariff::new(
      rate("rate_per_visit", &self.billing.rate_per_visit)?,
      rate("per_guest", &self.billing.per_guest)?,
      self.billing.currency.as_str(),
    )?)
  }

  pub fn auth(&self) -> Result<AuthConfig, Error> {
    match (&self.admin_username, &self.admin_password_hash) {
      (Some(username), Some(password_hash)) if !username.is_empty() => Ok(AuthConfig {
        username:      username.clone(),
        password_hash: password_hash.clone(),
      }),
      _ => Err(Error::Config(
        "admin_username and admin_password_hash must both be set".into(),
      )),
    }
  }

  pub fn schedule_interval(&self) -> Option<Duration> {
    self
      .billing
      .schedule_interval_secs
      .filter(|secs| *secs > 0)
      .map(Duration::from_secs)
  }

  pub fn aggregation_timeout(&self) -> Duration {
    Duration::from_secs(self.billing.timeout_secs)
  }
}

#[cfg(test)]
mod tests {
  use config::{File, FileFormat};

  use super::*;

  fn from_toml(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_gives_defaults() {
    let cfg = from_toml("");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.admission_policy(), AdmissionPolicy::default());
    assert_eq!(cfg.time_zone().unwrap(), FixedOffset::east_opt(3 * 3600).unwrap());
    assert_eq!(cfg.schedule_interval(), None);
    assert_eq!(cfg.aggregation_timeout(), Duration::from_secs(300));

    let tariff = cfg.tariff().unwrap();
    assert_eq!(tariff.per_visit, BigDecimal::from(25));
    assert_eq!(tariff.currency, "QAR");
  }

  #[test]
  fn nested_sections_override_defaults() {
    let cfg = from_toml(
      r#"
      port = 9000
      admin_username = "admin"
      admin_password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"

      [admission]
      cooldown_minutes = 45
      utc_offset_minutes = -300

      [billing]
      rate_per_visit = "27.50"
      currency = "usd"
      schedule_interval_secs = 3600
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.admission_policy().cooldown, TimeDelta::minutes(45));
    assert_eq!(cfg.admission_policy().max_guests, 20);
    assert_eq!(cfg.time_zone().unwrap(), FixedOffset::west_opt(5 * 3600).unwrap());
    assert_eq!(cfg.schedule_interval(), Some(Duration::from_secs(3600)));
    assert_eq!(cfg.tariff().unwrap().currency, "USD");
    assert_eq!(cfg.auth().unwrap().username, "admin");
  }

  #[test]
  fn bad_values_are_reported() {
    let cfg = from_toml("[billing]\nrate_per_visit = \"lots\"");
    assert!(matches!(cfg.tariff(), Err(Error::Config(_))));

    let cfg = from_toml("[admission]\nutc_offset_minutes = 100000");
    assert!(matches!(cfg.time_zone(), Err(Error::Config(_))));

    assert!(matches!(from_toml("").auth(), Err(Error::Config(_))));
  }
}
