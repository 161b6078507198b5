//! SQL schema for the Canteen SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;

-- Holders are keyed by the external badge code, never a surrogate id.
CREATE TABLE IF NOT EXISTS employees (
    employee_id TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    department  TEXT,
    nationality TEXT
);

CREATE TABLE IF NOT EXISTS contractors (
    qr_code_data TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    company      TEXT,
    contact      TEXT,
    active       INTEGER NOT NULL DEFAULT 1
);

-- Visits are strictly append-only; the triggers below reject UPDATE and
-- DELETE. holder_key holds the badge code of either holder table.
CREATE TABLE IF NOT EXISTS visits (
    visit_id    TEXT PRIMARY KEY,
    holder_key  TEXT NOT NULL,
    holder_kind TEXT NOT NULL,      -- 'employee' | 'contractor'
    holder_name TEXT NOT NULL,      -- snapshot at check-in time
    checkin_at  TEXT NOT NULL,      -- fixed-width RFC 3339 UTC, microseconds
    source      TEXT NOT NULL,      -- 'QR' | 'manual'
    guest_count INTEGER NOT NULL DEFAULT 0 CHECK (guest_count >= 0)
);

CREATE INDEX IF NOT EXISTS visits_holder_idx  ON visits(holder_key, checkin_at);
CREATE INDEX IF NOT EXISTS visits_checkin_idx ON visits(checkin_at);

CREATE TRIGGER IF NOT EXISTS visits_no_update
BEFORE UPDATE ON visits
BEGIN
    SELECT RAISE(ABORT, 'visits are append-only');
END;

CREATE TRIGGER IF NOT EXISTS visits_no_delete
BEFORE DELETE ON visits
BEGIN
    SELECT RAISE(ABORT, 'visits are append-only');
END;

-- One deduction per holder per billing period.
CREATE TABLE IF NOT EXISTS deductions (
    holder_key   TEXT NOT NULL,
    period_label TEXT NOT NULL,
    period_start TEXT NOT NULL,     -- YYYY-MM-DD
    period_end   TEXT NOT NULL,     -- YYYY-MM-DD, inclusive
    amount       TEXT NOT NULL,     -- decimal string, two fractional digits
    currency     TEXT NOT NULL,
    visit_count  INTEGER NOT NULL CHECK (visit_count >= 0),
    PRIMARY KEY (holder_key, period_label)
);

-- Rates each period was last aggregated at; scheduled reruns reuse them.
CREATE TABLE IF NOT EXISTS period_tariffs (
    period_label TEXT PRIMARY KEY,
    per_visit    TEXT NOT NULL,     -- decimal string
    per_guest    TEXT NOT NULL,     -- decimal string
    currency     TEXT NOT NULL
);

PRAGMA user_version = 1;
";
