//! Badge holders: the people entitled to check in.
//!
//! Holders are identified by the external code printed on their badge, never
//! by a storage row id. Visit history references that code, so a holder
//! record can be edited without breaking the history that points at it.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Which variant of [`BadgeHolder`] a key belongs to.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HolderKind {
  Employee,
  Contractor,
}

/// A staff member. The `employee_id` is the badge code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
  pub employee_id: String,
  pub name:        String,
  pub department:  Option<String>,
  pub nationality: Option<String>,
}

/// An external contractor. `qr_code_data` is the badge code.
///
/// Contractors can be deactivated without being deleted; an inactive
/// contractor is always denied admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contractor {
  pub qr_code_data: String,
  pub name:         String,
  pub company:      Option<String>,
  pub contact:      Option<String>,
  pub active:       bool,
}

/// Anyone who can present a badge at a kiosk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BadgeHolder {
  Employee(Employee),
  Contractor(Contractor),
}

impl BadgeHolder {
  /// The external badge code that identifies this holder.
  pub fn key(&self) -> &str {
    match self {
      Self::Employee(e) => &e.employee_id,
      Self::Contractor(c) => &c.qr_code_data,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Self::Employee(e) => &e.name,
      Self::Contractor(c) => &c.name,
    }
  }

  pub fn kind(&self) -> HolderKind {
    match self {
      Self::Employee(_) => HolderKind::Employee,
      Self::Contractor(_) => HolderKind::Contractor,
    }
  }

  /// Employees have no active flag and are always admissible.
  pub fn is_active(&self) -> bool {
    match self {
      Self::Employee(_) => true,
      Self::Contractor(c) => c.active,
    }
  }
}

impl From<Employee> for BadgeHolder {
  fn from(e: Employee) -> Self { Self::Employee(e) }
}

impl From<Contractor> for BadgeHolder {
  fn from(c: Contractor) -> Self { Self::Contractor(c) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn contractor(active: bool) -> BadgeHolder {
    BadgeHolder::Contractor(Contractor {
      qr_code_data: "CTR-9".into(),
      name:         "Omar Haddad".into(),
      company:      Some("Gulf Facilities".into()),
      contact:      None,
      active,
    })
  }

  #[test]
  fn accessors_cover_both_variants() {
    let emp = BadgeHolder::from(Employee {
      employee_id: "EMP001".into(),
      name:        "Aisha Karim".into(),
      department:  Some("Finance".into()),
      nationality: None,
    });
    assert_eq!(emp.key(), "EMP001");
    assert_eq!(emp.name(), "Aisha Karim");
    assert_eq!(emp.kind(), HolderKind::Employee);
    assert!(emp.is_active());

    let ctr = contractor(false);
    assert_eq!(ctr.key(), "CTR-9");
    assert_eq!(ctr.kind(), HolderKind::Contractor);
    assert!(!ctr.is_active());
  }

  #[test]
  fn holder_kind_text_form() {
    assert_eq!(HolderKind::Contractor.as_ref(), "contractor");
    assert_eq!("employee".parse::<HolderKind>().unwrap(), HolderKind::Employee);
    assert!("vendor".parse::<HolderKind>().is_err());
  }

  #[test]
  fn serialises_with_kind_tag() {
    let json = serde_json::to_string(&contractor(true)).unwrap();
    assert!(json.contains("\"kind\":\"contractor\""), "{json}");
    assert!(json.contains("\"qr_code_data\":\"CTR-9\""), "{json}");
  }
}
