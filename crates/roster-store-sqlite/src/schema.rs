//! SQL schema for the Roster SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per person. History is limited to the old_* columns, which hold
-- the values from directly before the most recent accepted revision.
CREATE TABLE IF NOT EXISTS persons (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    name              TEXT NOT NULL,
    email             TEXT NOT NULL,
    date_of_birth     TEXT NOT NULL,   -- YYYY-MM-DD
    address           TEXT,
    phone_number      TEXT,
    gender            TEXT,
    last_modified     TEXT,            -- RFC 3339 UTC
    version           TEXT NOT NULL DEFAULT '1.0.0',
    created_at        TEXT NOT NULL,   -- RFC 3339 UTC; server-assigned
    old_name          TEXT,
    old_email         TEXT,
    old_date_of_birth TEXT,
    old_address       TEXT,
    old_phone_number  TEXT,
    old_gender        TEXT,
    old_modified_date TEXT,
    row_version       INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS persons_created_idx ON persons(created_at);

PRAGMA user_version = 1;
";

/// Column list shared by every `SELECT` that decodes into a `RawPerson`.
pub const PERSON_COLUMNS: &str = "
    id, name, email, date_of_birth, address, phone_number, gender,
    last_modified, version, created_at,
    old_name, old_email, old_date_of_birth, old_address, old_phone_number,
    old_gender, old_modified_date, row_version";
