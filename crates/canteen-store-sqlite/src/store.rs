//! [`SqliteStore`]: the SQLite implementation of the Canteen storage traits.

use std::path::Path;

use canteen_core::{
  deduction::{DeductionRecord, Tariff},
  holder::{Contractor, Employee},
  store::{BadgeDirectory, DeductionStore, HolderRegistry, Store, VisitLedger},
  visit::{AppendOutcome, NewVisit, VisitRecord},
};
use chrono::{DateTime, SubsecRound as _, TimeDelta, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    DEDUCTION_COLUMNS, RawDeduction, RawTariff, RawVisit, VISIT_COLUMNS, contractor_from_row,
    encode_date, encode_dt, encode_uuid, employee_from_row,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Canteen store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls are
/// serialized on the connection's worker thread.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    debug!(path = %path.display(), "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Number of stored visits.
  pub async fn visit_count(&self) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM visits", [], |r| r.get(0))?))
      .await?;
    Ok(u64::try_from(n).unwrap_or_default())
  }
}

/// Latest visit for `holder_key`, run on the connection thread.
fn latest_visit(
  conn: &rusqlite::Connection,
  holder_key: &str,
) -> rusqlite::Result<Option<RawVisit>> {
  conn
    .query_row(
      &format!(
        "SELECT {VISIT_COLUMNS} FROM visits
         WHERE holder_key = ?1
         ORDER BY checkin_at DESC
         LIMIT 1"
      ),
      rusqlite::params![holder_key],
      RawVisit::from_row,
    )
    .optional()
}

impl Store for SqliteStore {
  type Error = Error;
}

// ─── Holders ─────────────────────────────────────────────────────────────────

impl BadgeDirectory for SqliteStore {
  async fn find_employee(&self, employee_id: &str) -> Result<Option<Employee>> {
    let id = employee_id.to_owned();
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT employee_id, name, department, nationality
                 FROM employees WHERE employee_id = ?1",
                rusqlite::params![id],
                employee_from_row,
              )
              .optional()?,
          )
        })
        .await?,
    )
  }

  async fn find_contractor(&self, qr_code_data: &str) -> Result<Option<Contractor>> {
    let code = qr_code_data.to_owned();
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT qr_code_data, name, company, contact, active
                 FROM contractors WHERE qr_code_data = ?1",
                rusqlite::params![code],
                contractor_from_row,
              )
              .optional()?,
          )
        })
        .await?,
    )
  }
}

impl HolderRegistry for SqliteStore {
  async fn put_employee(&self, employee: Employee) -> Result<Employee> {
    let row = employee.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO employees (employee_id, name, department, nationality)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (employee_id) DO UPDATE SET
             name        = excluded.name,
             department  = excluded.department,
             nationality = excluded.nationality",
          rusqlite::params![row.employee_id, row.name, row.department, row.nationality],
        )?;
        Ok(())
      })
      .await?;
    Ok(employee)
  }

  async fn put_contractor(&self, contractor: Contractor) -> Result<Contractor> {
    let row = contractor.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO contractors (qr_code_data, name, company, contact, active)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (qr_code_data) DO UPDATE SET
             name    = excluded.name,
             company = excluded.company,
             contact = excluded.contact,
             active  = excluded.active",
          rusqlite::params![row.qr_code_data, row.name, row.company, row.contact, row.active],
        )?;
        Ok(())
      })
      .await?;
    Ok(contractor)
  }
}

// ─── Visits ──────────────────────────────────────────────────────────────────

impl VisitLedger for SqliteStore {
  async fn most_recent_for(&self, holder_key: &str) -> Result<Option<VisitRecord>> {
    let key = holder_key.to_owned();
    let raw = self.conn.call(move |conn| Ok(latest_visit(conn, &key)?)).await?;
    raw.map(RawVisit::into_visit).transpose()
  }

  async fn append(&self, mut visit: NewVisit, cooldown: TimeDelta) -> Result<AppendOutcome> {
    // The ledger keeps microseconds; the returned record must match the row.
    visit.checkin_at = visit.checkin_at.trunc_subsecs(6);

    let visit_id    = Uuid::new_v4();
    let id_str      = encode_uuid(visit_id);
    let key         = visit.holder_key.clone();
    let kind_str    = visit.holder_kind.as_ref().to_owned();
    let name        = visit.holder_name.clone();
    let at_str      = encode_dt(visit.checkin_at);
    let source_str  = visit.source.as_ref().to_owned();
    let guests      = i64::from(visit.guest_count);
    let cutoff_str  = encode_dt(visit.checkin_at - cooldown);

    // Check and insert in one statement: SQLite runs it under a single write
    // lock, so a concurrent append for the same holder sees this row.
    let (inserted, blocker) = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO visits (
             visit_id, holder_key, holder_kind, holder_name,
             checkin_at, source, guest_count
           )
           SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
           WHERE NOT EXISTS (
             SELECT 1 FROM visits WHERE holder_key = ?2 AND checkin_at > ?8
           )",
          rusqlite::params![id_str, key, kind_str, name, at_str, source_str, guests, cutoff_str],
        )?;

        let blocker = if inserted == 0 { latest_visit(conn, &key)? } else { None };
        Ok((inserted, blocker))
      })
      .await?;

    if inserted == 1 {
      return Ok(AppendOutcome::Recorded(visit.into_record(visit_id)));
    }

    match blocker {
      Some(raw) => Ok(AppendOutcome::Blocked(raw.into_visit()?)),
      // Visits are never deleted, so the row that blocked the insert is
      // still there.
      None => Err(Error::Inconsistent("conditional append refused without a blocking visit")),
    }
  }

  async fn list_between(
    &self,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> Result<Vec<VisitRecord>> {
    let from_str  = encode_dt(from);
    let until_str = encode_dt(until);

    let raws: Vec<RawVisit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {VISIT_COLUMNS} FROM visits
           WHERE checkin_at >= ?1 AND checkin_at < ?2
           ORDER BY holder_key, checkin_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![from_str, until_str], RawVisit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVisit::into_visit).collect()
  }

  async fn history(&self, holder_key: &str, limit: usize) -> Result<Vec<VisitRecord>> {
    let key       = holder_key.to_owned();
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawVisit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {VISIT_COLUMNS} FROM visits
           WHERE holder_key = ?1
           ORDER BY checkin_at DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![key, limit_val], RawVisit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVisit::into_visit).collect()
  }
}

// ─── Deductions ──────────────────────────────────────────────────────────────

impl DeductionStore for SqliteStore {
  async fn upsert_deductions(
    &self,
    period_label: &str,
    tariff: &Tariff,
    records: Vec<DeductionRecord>,
  ) -> Result<Vec<DeductionRecord>> {
    let run = (
      period_label.to_owned(),
      tariff.per_visit.to_string(),
      tariff.per_guest.to_string(),
      tariff.currency.clone(),
    );
    let rows: Vec<_> = records
      .iter()
      .map(|r| {
        (
          r.holder_key.clone(),
          r.period_label.clone(),
          encode_date(r.period_start),
          encode_date(r.period_end),
          r.amount.to_string(),
          r.currency.clone(),
          i64::from(r.visit_count),
        )
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO deductions (
               holder_key, period_label, period_start, period_end,
               amount, currency, visit_count
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (holder_key, period_label) DO UPDATE SET
               period_start = excluded.period_start,
               period_end   = excluded.period_end,
               amount       = excluded.amount,
               currency     = excluded.currency,
               visit_count  = excluded.visit_count",
          )?;
          for (key, label, start, end, amount, currency, count) in &rows {
            stmt.execute(rusqlite::params![key, label, start, end, amount, currency, count])?;
          }
        }
        let (label, per_visit, per_guest, currency) = &run;
        tx.execute(
          "INSERT INTO period_tariffs (period_label, per_visit, per_guest, currency)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (period_label) DO UPDATE SET
             per_visit = excluded.per_visit,
             per_guest = excluded.per_guest,
             currency  = excluded.currency",
          rusqlite::params![label, per_visit, per_guest, currency],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(period = period_label, count = records.len(), "upserted deductions");
    Ok(records)
  }

  async fn list_deductions(&self, period_label: &str) -> Result<Vec<DeductionRecord>> {
    let label = period_label.to_owned();

    let raws: Vec<RawDeduction> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DEDUCTION_COLUMNS} FROM deductions
           WHERE period_label = ?1
           ORDER BY holder_key"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![label], RawDeduction::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDeduction::into_deduction).collect()
  }

  async fn period_tariff(&self, period_label: &str) -> Result<Option<Tariff>> {
    let label = period_label.to_owned();

    let raw: Option<RawTariff> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT per_visit, per_guest, currency FROM period_tariffs
               WHERE period_label = ?1",
              rusqlite::params![label],
              RawTariff::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTariff::into_tariff).transpose()
  }
}
