//! Person records, the sole entity of the roster.
//!
//! A record carries its live fields plus one "shadow" copy of each tracked
//! field, holding the value from directly before the most recent accepted
//! revision. There is no multi-row history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::Result;

/// Store-assigned primary key.
pub type PersonId = i64;

/// The version string given to records created without one.
pub const DEFAULT_VERSION: &str = "1.0.0";

// ─── PersonRecord ────────────────────────────────────────────────────────────

/// A persisted person record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
  pub id:                PersonId,
  pub name:              String,
  pub email:             String,
  pub date_of_birth:     NaiveDate,
  pub address:           Option<String>,
  pub phone_number:      Option<String>,
  pub gender:            Option<String>,
  /// Unset only for rows written by something other than this crate.
  pub last_modified:     Option<DateTime<Utc>>,
  /// Display version; advanced on every accepted revision.
  pub version:           String,
  /// Server-assigned insertion timestamp; never changes after creation.
  pub created_at:        DateTime<Utc>,

  // ── Shadow fields ───────────────────────────────────────────────────────
  pub old_name:          Option<String>,
  pub old_email:         Option<String>,
  pub old_date_of_birth: Option<NaiveDate>,
  pub old_address:       Option<String>,
  pub old_phone_number:  Option<String>,
  pub old_gender:        Option<String>,
  pub old_modified_date: Option<DateTime<Utc>>,

  /// Opaque optimistic-concurrency token owned by the store. Not related to
  /// `version` and never exposed to clients.
  #[serde(skip)]
  pub row_version:       i64,
}

// ─── PersonInput ─────────────────────────────────────────────────────────────

/// A client-submitted person payload, used for both creation and revision.
///
/// Only client-controlled attributes are declared; anything else a client
/// sends (`oldName`, `lastModified`, `createdAt`, ...) is dropped during
/// deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PersonInput {
  /// Ignored on creation; must match the path id on update.
  pub id:            Option<PersonId>,
  #[validate(length(min = 1, max = 255))]
  pub name:          String,
  #[validate(email, length(max = 255))]
  pub email:         String,
  pub date_of_birth: NaiveDate,
  #[validate(length(max = 500))]
  pub address:       Option<String>,
  #[validate(length(max = 50))]
  pub phone_number:  Option<String>,
  #[validate(length(max = 10))]
  pub gender:        Option<String>,
  /// Honoured on creation only; revisions always compute their own.
  #[validate(length(max = 20))]
  pub version:       Option<String>,
}

impl PersonInput {
  /// Convenience constructor with all optional fields unset.
  pub fn new(
    name: impl Into<String>,
    email: impl Into<String>,
    date_of_birth: NaiveDate,
  ) -> Self {
    Self {
      id: None,
      name: name.into(),
      email: email.into(),
      date_of_birth,
      address: None,
      phone_number: None,
      gender: None,
      version: None,
    }
  }

  /// Run field validation, returning the input unchanged on success.
  pub fn validated(self) -> Result<Self> {
    self.validate()?;
    Ok(self)
  }
}

// ─── NewPerson ───────────────────────────────────────────────────────────────

/// Input to [`crate::store::PersonStore::insert`].
///
/// Produced by [`crate::revision::prepare_for_creation`]; carries no id and no
/// shadow fields, so a freshly inserted record always starts with an empty
/// history. `id` and `created_at` are always set by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPerson {
  pub name:          String,
  pub email:         String,
  pub date_of_birth: NaiveDate,
  pub address:       Option<String>,
  pub phone_number:  Option<String>,
  pub gender:        Option<String>,
  pub last_modified: DateTime<Utc>,
  pub version:       String,
}
