//! Deduction records and the tariff used to price them.

use bigdecimal::{BigDecimal, RoundingMode, Zero};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, period::BillingPeriod};

/// Fractional digits kept on every deduction amount.
pub const AMOUNT_SCALE: i64 = 2;

/// One holder's deduction for one billing period.
///
/// At most one record exists per `(holder_key, period_label)`; re-aggregating
/// a period overwrites it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionRecord {
  pub holder_key:   String,
  pub period_label: String,
  pub period_start: NaiveDate,
  pub period_end:   NaiveDate,
  pub amount:       BigDecimal,
  pub currency:     String,
  pub visit_count:  u32,
}

/// Rates applied by the aggregator.
///
/// `per_guest` is zero unless configured otherwise: guests are recorded on
/// visits but not billed under the current rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tariff {
  pub per_visit: BigDecimal,
  pub per_guest: BigDecimal,
  pub currency:  String,
}

impl Tariff {
  /// A per-visit tariff with guests free of charge.
  pub fn per_visit(rate: BigDecimal, currency: impl Into<String>) -> Result<Self> {
    Self::new(rate, BigDecimal::zero(), currency)
  }

  pub fn new(
    per_visit: BigDecimal,
    per_guest: BigDecimal,
    currency: impl Into<String>,
  ) -> Result<Self> {
    let currency = currency.into().trim().to_ascii_uppercase();
    if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_alphabetic()) {
      return Err(Error::InvalidTariff(format!(
        "currency must be a three-letter code, got {currency:?}"
      )));
    }
    if per_visit < BigDecimal::zero() || per_guest < BigDecimal::zero() {
      return Err(Error::InvalidTariff("rates must not be negative".into()));
    }
    Ok(Self { per_visit, per_guest, currency })
  }

  /// Price `visits` visits accompanied by `guests` guests in total.
  pub fn charge(&self, visits: u32, guests: u64) -> BigDecimal {
    let amount = &self.per_visit * BigDecimal::from(visits)
      + &self.per_guest * BigDecimal::from(guests);
    amount.with_scale_round(AMOUNT_SCALE, RoundingMode::HalfEven)
  }

  pub(crate) fn deduction(
    &self,
    holder_key: String,
    period: &BillingPeriod,
    visits: u32,
    guests: u64,
  ) -> DeductionRecord {
    DeductionRecord {
      holder_key,
      period_label: period.label.clone(),
      period_start: period.start,
      period_end: period.end,
      amount: self.charge(visits, guests),
      currency: self.currency.clone(),
      visit_count: visits,
    }
  }
}
