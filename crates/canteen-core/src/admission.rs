//! The admission controller: decide whether a badge may check in, and record
//! the visit when it may.
//!
//! The current time is always passed in by the caller; nothing here reads a
//! clock.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
  Error, Result,
  holder::BadgeHolder,
  resolver::{Resolution, resolve},
  store::{BadgeDirectory, VisitLedger, read_with_retry},
  visit::{AppendOutcome, NewVisit, VisitRecord, VisitSource},
};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Tunables for the admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
  /// Minimum time between two admitted check-ins of the same holder.
  pub cooldown:   TimeDelta,
  /// Largest accepted guest count per check-in.
  pub max_guests: u32,
}

impl Default for AdmissionPolicy {
  fn default() -> Self {
    Self { cooldown: TimeDelta::minutes(60), max_guests: 20 }
  }
}

// ─── Request / result ────────────────────────────────────────────────────────

/// A raw check-in attempt as received from a kiosk.
///
/// `source` and `guest_count` are validated here rather than at the edge so
/// that every caller gets the same typed denial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInRequest {
  pub code:        String,
  pub source:      String,
  #[serde(default)]
  pub guest_count: i64,
  /// Probe only: report whether a check-in would be admitted, never write.
  #[serde(default)]
  pub check_only:  bool,
}

/// Why an attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
  HolderNotFound,
  InactiveBadge,
  InvalidGuestCount,
  InvalidSource,
}

impl DenialReason {
  /// Text shown on the kiosk.
  pub fn message(self) -> &'static str {
    match self {
      Self::HolderNotFound => {
        "Badge not recognised. Please contact the facility administrator."
      }
      Self::InactiveBadge => {
        "This badge has been deactivated. Please contact the facility administrator."
      }
      Self::InvalidGuestCount => "The number of guests is not valid.",
      Self::InvalidSource => "Unknown check-in method.",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionResult {
  /// A visit was written.
  Admitted { visit: VisitRecord },
  /// The holder is inside the cool-down window. Nothing was written.
  AlreadyCheckedIn {
    holder_name:     String,
    last_visit_time: DateTime<Utc>,
    remaining:       TimeDelta,
  },
  /// `check_only` probe: a real attempt would be admitted.
  CanCheckIn { holder_name: String },
  Denied { reason: DenialReason },
}

impl AdmissionResult {
  pub fn holder_name(&self) -> Option<&str> {
    match self {
      Self::Admitted { visit } => Some(&visit.holder_name),
      Self::AlreadyCheckedIn { holder_name, .. } | Self::CanCheckIn { holder_name } => {
        Some(holder_name)
      }
      Self::Denied { .. } => None,
    }
  }

  /// Remaining cool-down rounded up to whole minutes.
  pub fn remaining_minutes(&self) -> Option<i64> {
    match self {
      Self::AlreadyCheckedIn { remaining, .. } => Some(ceil_minutes(*remaining)),
      _ => None,
    }
  }

  pub fn message(&self) -> String {
    match self {
      Self::Admitted { visit } if visit.guest_count > 0 => format!(
        "Welcome, {}! Checked in with {} guest(s).",
        visit.holder_name, visit.guest_count
      ),
      Self::Admitted { visit } => format!("Welcome, {}!", visit.holder_name),
      Self::AlreadyCheckedIn { holder_name, remaining, .. } => format!(
        "{holder_name} has already checked in. Please try again in {} minute(s).",
        ceil_minutes(*remaining)
      ),
      Self::CanCheckIn { holder_name } => format!("{holder_name} may check in."),
      Self::Denied { reason } => reason.message().to_owned(),
    }
  }
}

fn ceil_minutes(d: TimeDelta) -> i64 {
  let secs = d.num_seconds().max(0);
  (secs + 59) / 60
}

// ─── Controller ──────────────────────────────────────────────────────────────

/// Decides check-in attempts against a badge directory and visit ledger.
///
/// Holds no mutable state of its own; concurrent attempts for different
/// holders never contend here. Same-holder races are settled by the ledger's
/// conditional append.
pub struct AdmissionController<S> {
  store:  Arc<S>,
  policy: AdmissionPolicy,
}

impl<S> Clone for AdmissionController<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), policy: self.policy }
  }
}

impl<S> AdmissionController<S>
where
  S: BadgeDirectory + VisitLedger,
{
  pub fn new(store: Arc<S>, policy: AdmissionPolicy) -> Self { Self { store, policy } }

  pub fn policy(&self) -> &AdmissionPolicy { &self.policy }

  /// Decide `request` as of `now`, writing a visit only on a real admission.
  pub async fn attempt_check_in(
    &self,
    request: &CheckInRequest,
    now: DateTime<Utc>,
  ) -> Result<AdmissionResult> {
    let Ok(source) = request.source.trim().parse::<VisitSource>() else {
      return Ok(denied(DenialReason::InvalidSource, &request.code));
    };
    let guests = match u32::try_from(request.guest_count) {
      Ok(g) if g <= self.policy.max_guests => g,
      _ => return Ok(denied(DenialReason::InvalidGuestCount, &request.code)),
    };

    let holder = match resolve(self.store.as_ref(), &request.code).await? {
      Resolution::Holder(holder) => holder,
      Resolution::NotFound => return Ok(denied(DenialReason::HolderNotFound, &request.code)),
      Resolution::Inactive(_) => {
        return Ok(denied(DenialReason::InactiveBadge, &request.code));
      }
    };

    let store = self.store.as_ref();
    let key = holder.key();
    let last = read_with_retry("most_recent_for", move || store.most_recent_for(key)).await?;

    if let Some(last) = last
      && let Some(blocked) = self.cooling_down(&holder, &last, now)
    {
      debug!(holder = key, last_visit = %last.checkin_at, "check-in inside cool-down");
      return Ok(blocked);
    }

    if request.check_only {
      return Ok(AdmissionResult::CanCheckIn { holder_name: holder.name().to_owned() });
    }

    let visit = NewVisit::for_holder(&holder, now, source, guests);
    let outcome = self
      .store
      .append(visit, self.policy.cooldown)
      .await
      .map_err(Error::from_store)?;

    match outcome {
      AppendOutcome::Recorded(visit) => {
        info!(
          holder = %visit.holder_key,
          kind = %visit.holder_kind,
          source = %visit.source,
          guests = visit.guest_count,
          "check-in admitted"
        );
        Ok(AdmissionResult::Admitted { visit })
      }
      // Lost a race against a concurrent attempt for the same holder.
      AppendOutcome::Blocked(winner) => {
        debug!(holder = key, "concurrent check-in won the race");
        Ok(self.already_checked_in(&holder, &winner, now))
      }
    }
  }

  fn cooling_down(
    &self,
    holder: &BadgeHolder,
    last: &VisitRecord,
    now: DateTime<Utc>,
  ) -> Option<AdmissionResult> {
    let elapsed = now - last.checkin_at;
    (elapsed < self.policy.cooldown).then(|| self.already_checked_in(holder, last, now))
  }

  fn already_checked_in(
    &self,
    holder: &BadgeHolder,
    last: &VisitRecord,
    now: DateTime<Utc>,
  ) -> AdmissionResult {
    let remaining = (self.policy.cooldown - (now - last.checkin_at))
      .clamp(TimeDelta::zero(), self.policy.cooldown);
    AdmissionResult::AlreadyCheckedIn {
      holder_name: holder.name().to_owned(),
      last_visit_time: last.checkin_at,
      remaining,
    }
  }
}

fn denied(reason: DenialReason, code: &str) -> AdmissionResult {
  debug!(?reason, code = code.trim(), "check-in denied");
  AdmissionResult::Denied { reason }
}
