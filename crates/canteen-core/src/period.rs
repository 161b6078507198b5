//! Billing periods.
//!
//! A billing cycle starts on the 21st of a month and ends on the 20th of the
//! following month, both days inclusive. The human-readable label (e.g.
//! `"21 January 2024 - 20 February 2024"`) is part of the deduction key, so its
//! format is fixed.

use chrono::{
  DateTime, Datelike, FixedOffset, Months, NaiveDate, NaiveTime, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// First day of every billing cycle.
pub const CYCLE_START_DAY: u32 = 21;
/// Last day of every billing cycle, in the month after it starts.
pub const CYCLE_END_DAY: u32 = 20;

const LABEL_DATE_FORMAT: &str = "%-d %B %Y";
const LABEL_SEPARATOR: &str = " - ";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
  pub start: NaiveDate,
  /// Inclusive.
  pub end:   NaiveDate,
  pub label: String,
}

/// Resolve the billing period that contains `date`.
pub fn period_for(date: NaiveDate) -> Result<BillingPeriod> {
  let anchor = if date.day() >= CYCLE_START_DAY {
    date
  } else {
    date
      .checked_sub_months(Months::new(1))
      .ok_or_else(|| out_of_range(date))?
  };

  let start = anchor
    .with_day(CYCLE_START_DAY)
    .ok_or_else(|| out_of_range(date))?;
  let end = start
    .checked_add_months(Months::new(1))
    .and_then(|d| d.with_day(CYCLE_END_DAY))
    .ok_or_else(|| out_of_range(date))?;

  Ok(BillingPeriod { start, end, label: format_label(start, end) })
}

fn out_of_range(date: NaiveDate) -> Error {
  Error::DateOutOfRange(date.to_string())
}

fn format_label(start: NaiveDate, end: NaiveDate) -> String {
  format!(
    "{}{LABEL_SEPARATOR}{}",
    start.format(LABEL_DATE_FORMAT),
    end.format(LABEL_DATE_FORMAT)
  )
}

impl BillingPeriod {
  /// Parse a label produced by [`period_for`].
  ///
  /// Only canonical labels are accepted: the span must be an actual billing
  /// cycle and the text must round-trip exactly.
  pub fn from_label(label: &str) -> Result<Self> {
    let invalid = || Error::InvalidPeriodLabel(label.to_owned());

    let (start_str, end_str) =
      label.split_once(LABEL_SEPARATOR).ok_or_else(invalid)?;
    let start = NaiveDate::parse_from_str(start_str.trim(), LABEL_DATE_FORMAT)
      .map_err(|_| invalid())?;
    let end = NaiveDate::parse_from_str(end_str.trim(), LABEL_DATE_FORMAT)
      .map_err(|_| invalid())?;

    let period = period_for(start)?;
    if period.start != start || period.end != end || period.label != label {
      return Err(invalid());
    }
    Ok(period)
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }

  /// Number of calendar days covered, both ends inclusive.
  pub fn days(&self) -> i64 { (self.end - self.start).num_days() + 1 }

  /// The UTC instants bounding this period in the facility time zone `tz`.
  ///
  /// Returns `(from, until)` with `from` inclusive (midnight starting the first
  /// day) and `until` exclusive (midnight after the last day), so the whole
  /// final day is covered.
  pub fn bounds(&self, tz: &FixedOffset) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let after_end = self
      .end
      .succ_opt()
      .ok_or_else(|| out_of_range(self.end))?;
    Ok((local_midnight(self.start, tz)?, local_midnight(after_end, tz)?))
  }

  /// The period immediately before this one.
  pub fn previous(&self) -> Result<Self> {
    let day_before = self
      .start
      .pred_opt()
      .ok_or_else(|| out_of_range(self.start))?;
    period_for(day_before)
  }
}

fn local_midnight(date: NaiveDate, tz: &FixedOffset) -> Result<DateTime<Utc>> {
  tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
    .single()
    .map(|dt| dt.with_timezone(&Utc))
    .ok_or_else(|| out_of_range(date))
}
