//! Visit records, one row per admitted check-in.
//!
//! Visits are immutable. The holder's display name is snapshotted at check-in
//! time so renaming a holder later never rewrites history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::holder::{BadgeHolder, HolderKind};

/// How the check-in was captured.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
pub enum VisitSource {
  /// Scanned from the badge's QR code at a kiosk.
  #[serde(rename = "QR")]
  #[strum(serialize = "QR")]
  Qr,
  /// Entered by hand by an attendant.
  #[serde(rename = "manual")]
  #[strum(serialize = "manual")]
  Manual,
}

/// A persisted visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
  pub visit_id:    Uuid,
  /// External badge code of the holder (not a row id).
  pub holder_key:  String,
  pub holder_kind: HolderKind,
  /// Display name as it was when the visit was recorded.
  pub holder_name: String,
  pub checkin_at:  DateTime<Utc>,
  pub source:      VisitSource,
  /// Guests accompanying the holder. Carried for reporting; not billed.
  pub guest_count: u32,
}

/// Input to [`VisitLedger::append`](crate::store::VisitLedger::append).
/// The `visit_id` is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewVisit {
  pub holder_key:  String,
  pub holder_kind: HolderKind,
  pub holder_name: String,
  pub checkin_at:  DateTime<Utc>,
  pub source:      VisitSource,
  pub guest_count: u32,
}

impl NewVisit {
  /// Snapshot `holder` into a new visit at `checkin_at`.
  pub fn for_holder(
    holder: &BadgeHolder,
    checkin_at: DateTime<Utc>,
    source: VisitSource,
    guest_count: u32,
  ) -> Self {
    Self {
      holder_key: holder.key().to_owned(),
      holder_kind: holder.kind(),
      holder_name: holder.name().to_owned(),
      checkin_at,
      source,
      guest_count,
    }
  }

  pub fn into_record(self, visit_id: Uuid) -> VisitRecord {
    VisitRecord {
      visit_id,
      holder_key: self.holder_key,
      holder_kind: self.holder_kind,
      holder_name: self.holder_name,
      checkin_at: self.checkin_at,
      source: self.source,
      guest_count: self.guest_count,
    }
  }
}

/// Result of a conditional append against the ledger.
#[derive(Debug, Clone)]
pub enum AppendOutcome {
  /// The visit was written.
  Recorded(VisitRecord),
  /// Another visit for the same holder already sits inside the cool-down
  /// window; nothing was written. Carries that visit.
  Blocked(VisitRecord),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn source_accepts_only_known_values() {
    assert_eq!("QR".parse::<VisitSource>().unwrap(), VisitSource::Qr);
    assert_eq!("manual".parse::<VisitSource>().unwrap(), VisitSource::Manual);
    assert!("qr-code".parse::<VisitSource>().is_err());
    assert!("".parse::<VisitSource>().is_err());
  }

  #[test]
  fn source_serialises_to_wire_names() {
    assert_eq!(serde_json::to_string(&VisitSource::Qr).unwrap(), "\"QR\"");
    assert_eq!(VisitSource::Manual.to_string(), "manual");
  }
}
