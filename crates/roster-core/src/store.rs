//! The `PersonStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `roster-store-sqlite`).
//! Higher layers (`roster-api`, the revision manager) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  person::{NewPerson, PersonId, PersonRecord},
};

// ─── Query type ──────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_SIZE: u32 = 5;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Parameters for [`PersonStore::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonQuery {
  /// Case-insensitive substring matched against name or email.
  pub search:      Option<String>,
  /// 1-based.
  pub page_number: u32,
  pub page_size:   u32,
}

impl Default for PersonQuery {
  fn default() -> Self {
    Self { search: None, page_number: 1, page_size: DEFAULT_PAGE_SIZE }
  }
}

impl PersonQuery {
  /// Build a query from optional request parameters, applying defaults and
  /// rejecting out-of-range paging. Blank search strings count as absent.
  pub fn new(
    search: Option<String>,
    page_number: Option<u32>,
    page_size: Option<u32>,
  ) -> Result<Self> {
    let page_number = page_number.unwrap_or(1);
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);

    if page_number == 0 {
      return Err(Error::InvalidQuery("pageNumber must be at least 1".into()));
    }
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
      return Err(Error::InvalidQuery(format!(
        "pageSize must be between 1 and {MAX_PAGE_SIZE}"
      )));
    }

    Ok(Self {
      search: search.filter(|s| !s.trim().is_empty()),
      page_number,
      page_size,
    })
  }

  pub fn offset(&self) -> u64 {
    u64::from(self.page_number - 1) * u64::from(self.page_size)
  }
}

/// One page of results plus the totals needed to render a pager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
  pub items:       Vec<T>,
  pub total_count: u64,
  pub page_number: u32,
  pub page_size:   u32,
  pub total_pages: u64,
}

impl<T> Page<T> {
  pub fn new(items: Vec<T>, total_count: u64, query: &PersonQuery) -> Self {
    Self {
      items,
      total_count,
      page_number: query.page_number,
      page_size: query.page_size,
      total_pages: total_count.div_ceil(u64::from(query.page_size)),
    }
  }
}

// ─── Replace outcome ─────────────────────────────────────────────────────────

/// Result of a row-version-guarded [`PersonStore::replace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
  /// The row was written; carries the record with its new row version.
  Replaced(PersonRecord),
  /// No row with this id exists any more.
  Missing,
  /// The row exists but was modified since it was read.
  Conflict,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Roster person store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait PersonStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Retrieve a record by id. Returns `None` if not found.
  fn find_by_id(
    &self,
    id: PersonId,
  ) -> impl Future<Output = Result<Option<PersonRecord>, Self::Error>> + Send + '_;

  /// Return one page of records matching `query`, ordered by id.
  fn search<'a>(
    &'a self,
    query: &'a PersonQuery,
  ) -> impl Future<Output = Result<Page<PersonRecord>, Self::Error>> + Send + 'a;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a new record. The store assigns `id`, `created_at` and the
  /// initial row version.
  fn insert(
    &self,
    input: NewPerson,
  ) -> impl Future<Output = Result<PersonRecord, Self::Error>> + Send + '_;

  /// Persist a batch of new records in a single transaction.
  fn insert_many(
    &self,
    inputs: Vec<NewPerson>,
  ) -> impl Future<Output = Result<Vec<PersonRecord>, Self::Error>> + Send + '_;

  /// Replace the stored row with `record`, provided the stored row version
  /// still equals `record.row_version`. `created_at` is never overwritten.
  fn replace(
    &self,
    record: PersonRecord,
  ) -> impl Future<Output = Result<ReplaceOutcome, Self::Error>> + Send + '_;

  /// Delete a record. Returns `false` if it did not exist.
  fn remove(
    &self,
    id: PersonId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every listed record in a single transaction. Ids that do not
  /// exist are skipped; returns the number of rows removed.
  fn remove_many(
    &self,
    ids: Vec<PersonId>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Aggregates ────────────────────────────────────────────────────────

  /// Record counts grouped by the raw `gender` column.
  fn gender_counts(
    &self,
  ) -> impl Future<Output = Result<Vec<(Option<String>, u64)>, Self::Error>> + Send + '_;

  /// The date of birth of every record.
  fn birth_dates(
    &self,
  ) -> impl Future<Output = Result<Vec<NaiveDate>, Self::Error>> + Send + '_;

  /// Record counts grouped by `created_at` month (`YYYY-MM`), ascending.
  fn registrations_by_month(
    &self,
  ) -> impl Future<Output = Result<Vec<(String, u64)>, Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn query_defaults() {
    let q = PersonQuery::new(None, None, None).unwrap();
    assert_eq!(q, PersonQuery::default());
    assert_eq!(q.offset(), 0);
  }

  #[test]
  fn blank_search_is_dropped() {
    let q = PersonQuery::new(Some("   ".into()), Some(3), Some(10)).unwrap();
    assert_eq!(q.search, None);
    assert_eq!(q.offset(), 20);
  }

  #[test]
  fn out_of_range_paging_is_rejected() {
    assert!(PersonQuery::new(None, Some(0), None).is_err());
    assert!(PersonQuery::new(None, None, Some(0)).is_err());
    assert!(PersonQuery::new(None, None, Some(MAX_PAGE_SIZE + 1)).is_err());
  }

  #[test]
  fn total_pages_rounds_up() {
    let q = PersonQuery::default();
    let page: Page<u8> = Page::new(vec![], 11, &q);
    assert_eq!(page.total_pages, 3);
    let empty: Page<u8> = Page::new(vec![], 0, &q);
    assert_eq!(empty.total_pages, 0);
  }
}
