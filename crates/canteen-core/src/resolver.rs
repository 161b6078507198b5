//! Badge resolution: scanned text to badge holder.

use crate::{
  Result,
  holder::{BadgeHolder, Contractor},
  store::{BadgeDirectory, read_with_retry},
};

/// Outcome of looking up a scanned code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  Holder(BadgeHolder),
  NotFound,
  /// The code belongs to a contractor whose badge has been deactivated.
  Inactive(Contractor),
}

/// Strip scanner noise from a code. Kiosk scanners commonly append CR/LF.
pub fn normalize_code(raw: &str) -> &str { raw.trim() }

/// Look up `code` as an employee first, then as a contractor.
///
/// Codes are disjoint between the two tables by convention only; if both
/// match, the employee wins. Has no side effects.
pub async fn resolve<S: BadgeDirectory>(store: &S, code: &str) -> Result<Resolution> {
  let code = normalize_code(code);
  if code.is_empty() {
    return Ok(Resolution::NotFound);
  }

  if let Some(employee) =
    read_with_retry("find_employee", move || store.find_employee(code)).await?
  {
    return Ok(Resolution::Holder(employee.into()));
  }

  match read_with_retry("find_contractor", move || store.find_contractor(code)).await? {
    Some(contractor) if contractor.active => Ok(Resolution::Holder(contractor.into())),
    Some(contractor) => Ok(Resolution::Inactive(contractor)),
    None => Ok(Resolution::NotFound),
  }
}
