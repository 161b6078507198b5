//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with microsecond
//! precision, so lexical order in SQL equals chronological order. Dates are
//! `YYYY-MM-DD`. Amounts are decimal strings. UUIDs are hyphenated lowercase.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use canteen_core::{
  deduction::{DeductionRecord, Tariff},
  holder::{Contractor, Employee, HolderKind},
  visit::{VisitRecord, VisitSource},
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn decode_holder_kind(s: &str) -> Result<HolderKind> {
  HolderKind::from_str(s).map_err(|_| Error::UnknownValue {
    column: "holder_kind",
    value:  s.to_owned(),
  })
}

pub fn decode_source(s: &str) -> Result<VisitSource> {
  VisitSource::from_str(s).map_err(|_| Error::UnknownValue {
    column: "source",
    value:  s.to_owned(),
  })
}

// ─── Raw row types ────────────────────────────────────────────────────────────

/// A `visits` row as read from SQLite, before decoding.
pub struct RawVisit {
  pub visit_id:    String,
  pub holder_key:  String,
  pub holder_kind: String,
  pub holder_name: String,
  pub checkin_at:  String,
  pub source:      String,
  pub guest_count: i64,
}

/// Column list matching [`RawVisit::from_row`].
pub const VISIT_COLUMNS: &str =
  "visit_id, holder_key, holder_kind, holder_name, checkin_at, source, guest_count";

impl RawVisit {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      visit_id:    row.get(0)?,
      holder_key:  row.get(1)?,
      holder_kind: row.get(2)?,
      holder_name: row.get(3)?,
      checkin_at:  row.get(4)?,
      source:      row.get(5)?,
      guest_count: row.get(6)?,
    })
  }

  pub fn into_visit(self) -> Result<VisitRecord> {
    let guest_count = u32::try_from(self.guest_count).map_err(|_| Error::OutOfRange {
      column: "guest_count",
      value:  self.guest_count,
    })?;
    Ok(VisitRecord {
      visit_id: decode_uuid(&self.visit_id)?,
      holder_key: self.holder_key,
      holder_kind: decode_holder_kind(&self.holder_kind)?,
      holder_name: self.holder_name,
      checkin_at: decode_dt(&self.checkin_at)?,
      source: decode_source(&self.source)?,
      guest_count,
    })
  }
}

/// A `deductions` row as read from SQLite, before decoding.
pub struct RawDeduction {
  pub holder_key:   String,
  pub period_label: String,
  pub period_start: String,
  pub period_end:   String,
  pub amount:       String,
  pub currency:     String,
  pub visit_count:  i64,
}

pub const DEDUCTION_COLUMNS: &str =
  "holder_key, period_label, period_start, period_end, amount, currency, visit_count";

impl RawDeduction {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      holder_key:   row.get(0)?,
      period_label: row.get(1)?,
      period_start: row.get(2)?,
      period_end:   row.get(3)?,
      amount:       row.get(4)?,
      currency:     row.get(5)?,
      visit_count:  row.get(6)?,
    })
  }

  pub fn into_deduction(self) -> Result<DeductionRecord> {
    let visit_count = u32::try_from(self.visit_count).map_err(|_| Error::OutOfRange {
      column: "visit_count",
      value:  self.visit_count,
    })?;
    Ok(DeductionRecord {
      holder_key: self.holder_key,
      period_label: self.period_label,
      period_start: decode_date(&self.period_start)?,
      period_end: decode_date(&self.period_end)?,
      amount: BigDecimal::from_str(&self.amount)?,
      currency: self.currency,
      visit_count,
    })
  }
}

/// A `period_tariffs` row as read from SQLite, before decoding.
pub struct RawTariff {
  pub per_visit: String,
  pub per_guest: String,
  pub currency:  String,
}

impl RawTariff {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { per_visit: row.get(0)?, per_guest: row.get(1)?, currency: row.get(2)? })
  }

  /// Rows are only written from validated tariffs, so they are not
  /// re-validated here.
  pub fn into_tariff(self) -> Result<Tariff> {
    Ok(Tariff {
      per_visit: BigDecimal::from_str(&self.per_visit)?,
      per_guest: BigDecimal::from_str(&self.per_guest)?,
      currency:  self.currency,
    })
  }
}

pub fn employee_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Employee> {
  Ok(Employee {
    employee_id: row.get(0)?,
    name:        row.get(1)?,
    department:  row.get(2)?,
    nationality: row.get(3)?,
  })
}

pub fn contractor_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contractor> {
  Ok(Contractor {
    qr_code_data: row.get(0)?,
    name:         row.get(1)?,
    company:      row.get(2)?,
    contact:      row.get(3)?,
    active:       row.get(4)?,
  })
}
