//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar dates as
//! `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, Utc};
use roster_core::person::PersonRecord;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Counts ──────────────────────────────────────────────────────────────────

pub fn decode_count(n: i64) -> Result<u64> { u64::try_from(n).map_err(|_| Error::Count(n)) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `persons` row, in
/// [`crate::schema::PERSON_COLUMNS`] order.
pub struct RawPerson {
  pub id:                i64,
  pub name:              String,
  pub email:             String,
  pub date_of_birth:     String,
  pub address:           Option<String>,
  pub phone_number:      Option<String>,
  pub gender:            Option<String>,
  pub last_modified:     Option<String>,
  pub version:           String,
  pub created_at:        String,
  pub old_name:          Option<String>,
  pub old_email:         Option<String>,
  pub old_date_of_birth: Option<String>,
  pub old_address:       Option<String>,
  pub old_phone_number:  Option<String>,
  pub old_gender:        Option<String>,
  pub old_modified_date: Option<String>,
  pub row_version:       i64,
}

impl RawPerson {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      name:              row.get(1)?,
      email:             row.get(2)?,
      date_of_birth:     row.get(3)?,
      address:           row.get(4)?,
      phone_number:      row.get(5)?,
      gender:            row.get(6)?,
      last_modified:     row.get(7)?,
      version:           row.get(8)?,
      created_at:        row.get(9)?,
      old_name:          row.get(10)?,
      old_email:         row.get(11)?,
      old_date_of_birth: row.get(12)?,
      old_address:       row.get(13)?,
      old_phone_number:  row.get(14)?,
      old_gender:        row.get(15)?,
      old_modified_date: row.get(16)?,
      row_version:       row.get(17)?,
    })
  }

  pub fn into_record(self) -> Result<PersonRecord> {
    Ok(PersonRecord {
      id:                self.id,
      name:              self.name,
      email:             self.email,
      date_of_birth:     decode_date(&self.date_of_birth)?,
      address:           self.address,
      phone_number:      self.phone_number,
      gender:            self.gender,
      last_modified:     self.last_modified.as_deref().map(decode_dt).transpose()?,
      version:           self.version,
      created_at:        decode_dt(&self.created_at)?,
      old_name:          self.old_name,
      old_email:         self.old_email,
      old_date_of_birth: self
        .old_date_of_birth
        .as_deref()
        .map(decode_date)
        .transpose()?,
      old_address:       self.old_address,
      old_phone_number:  self.old_phone_number,
      old_gender:        self.old_gender,
      old_modified_date: self
        .old_modified_date
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      row_version:       self.row_version,
    })
  }
}
