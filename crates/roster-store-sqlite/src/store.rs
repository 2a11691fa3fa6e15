//! [`SqliteStore`]: the SQLite implementation of [`PersonStore`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension as _, functions::FunctionFlags};

use roster_core::{
  person::{NewPerson, PersonId, PersonRecord},
  store::{Page, PersonQuery, PersonStore, ReplaceOutcome},
};

use crate::{
  Result,
  encode::{RawPerson, decode_count, decode_date, encode_date, encode_dt},
  schema::{PERSON_COLUMNS, SCHEMA},
};

/// SQL name of the Unicode lowercase function registered on every connection.
/// SQLite's built-in `lower()` only folds ASCII.
const FOLD_FN: &str = "fold_case";

/// `WHERE` predicate for [`PersonStore::search`]; `?1` is the optional
/// search term.
const SEARCH_FILTER: &str = "?1 IS NULL
   OR instr(fold_case(name),  fold_case(?1)) > 0
   OR instr(fold_case(email), fold_case(?1)) > 0";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Roster person store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %path.display(), "person store opened");
    Ok(store)
  }

  /// Open an in-memory store.
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
        register_functions(conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn register_functions(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    FOLD_FN,
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
  )
}

// ─── Insert helpers ──────────────────────────────────────────────────────────

/// Column values for one `INSERT`, encoded ahead of the blocking call.
struct EncodedInsert {
  name:          String,
  email:         String,
  date_of_birth: String,
  address:       Option<String>,
  phone_number:  Option<String>,
  gender:        Option<String>,
  last_modified: String,
  version:       String,
  created_at:    String,
}

impl EncodedInsert {
  fn new(input: &NewPerson, created_at: DateTime<Utc>) -> Self {
    Self {
      name:          input.name.clone(),
      email:         input.email.clone(),
      date_of_birth: encode_date(input.date_of_birth),
      address:       input.address.clone(),
      phone_number:  input.phone_number.clone(),
      gender:        input.gender.clone(),
      last_modified: encode_dt(input.last_modified),
      version:       input.version.clone(),
      created_at:    encode_dt(created_at),
    }
  }

  /// Insert the row and return its assigned id.
  fn execute(&self, conn: &rusqlite::Connection) -> rusqlite::Result<PersonId> {
    conn.execute(
      "INSERT INTO persons (
         name, email, date_of_birth, address, phone_number, gender,
         last_modified, version, created_at, row_version
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)",
      rusqlite::params![
        self.name,
        self.email,
        self.date_of_birth,
        self.address,
        self.phone_number,
        self.gender,
        self.last_modified,
        self.version,
        self.created_at,
      ],
    )?;
    Ok(conn.last_insert_rowid())
  }
}

/// The record as it reads back immediately after insertion.
fn inserted_record(id: PersonId, input: NewPerson, created_at: DateTime<Utc>) -> PersonRecord {
  PersonRecord {
    id,
    name: input.name,
    email: input.email,
    date_of_birth: input.date_of_birth,
    address: input.address,
    phone_number: input.phone_number,
    gender: input.gender,
    last_modified: Some(input.last_modified),
    version: input.version,
    created_at,
    old_name: None,
    old_email: None,
    old_date_of_birth: None,
    old_address: None,
    old_phone_number: None,
    old_gender: None,
    old_modified_date: None,
    row_version: 0,
  }
}

// ─── PersonStore impl ────────────────────────────────────────────────────────

impl PersonStore for SqliteStore {
  type Error = crate::Error;

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn find_by_id(&self, id: PersonId) -> Result<Option<PersonRecord>> {
    let raw: Option<RawPerson> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PERSON_COLUMNS} FROM persons WHERE id = ?1"),
            rusqlite::params![id],
            RawPerson::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPerson::into_record).transpose()
  }

  async fn search(&self, query: &PersonQuery) -> Result<Page<PersonRecord>> {
    let search = query.search.clone();
    let limit  = i64::from(query.page_size);
    let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);

    let (total, raws): (i64, Vec<RawPerson>) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM persons WHERE {SEARCH_FILTER}"),
          rusqlite::params![search],
          |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {PERSON_COLUMNS} FROM persons
           WHERE {SEARCH_FILTER}
           ORDER BY id
           LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![search, limit, offset], RawPerson::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total, rows))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(RawPerson::into_record)
      .collect::<Result<Vec<_>>>()?;

    Ok(Page::new(items, decode_count(total)?, query))
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn insert(&self, input: NewPerson) -> Result<PersonRecord> {
    let created_at = Utc::now();
    let encoded    = EncodedInsert::new(&input, created_at);

    let id = self
      .conn
      .call(move |conn| Ok(encoded.execute(conn)?))
      .await?;

    Ok(inserted_record(id, input, created_at))
  }

  async fn insert_many(&self, inputs: Vec<NewPerson>) -> Result<Vec<PersonRecord>> {
    let created_at = Utc::now();
    let encoded: Vec<EncodedInsert> = inputs
      .iter()
      .map(|input| EncodedInsert::new(input, created_at))
      .collect();

    let ids: Vec<PersonId> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let ids = encoded
          .iter()
          .map(|row| row.execute(&tx))
          .collect::<rusqlite::Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(ids)
      })
      .await?;

    Ok(
      ids
        .into_iter()
        .zip(inputs)
        .map(|(id, input)| inserted_record(id, input, created_at))
        .collect(),
    )
  }

  async fn replace(&self, record: PersonRecord) -> Result<ReplaceOutcome> {
    let id                = record.id;
    let expected          = record.row_version;
    let name              = record.name.clone();
    let email             = record.email.clone();
    let date_of_birth     = encode_date(record.date_of_birth);
    let address           = record.address.clone();
    let phone_number      = record.phone_number.clone();
    let gender            = record.gender.clone();
    let last_modified     = record.last_modified.map(encode_dt);
    let version           = record.version.clone();
    let old_name          = record.old_name.clone();
    let old_email         = record.old_email.clone();
    let old_date_of_birth = record.old_date_of_birth.map(encode_date);
    let old_address       = record.old_address.clone();
    let old_phone_number  = record.old_phone_number.clone();
    let old_gender        = record.old_gender.clone();
    let old_modified_date = record.old_modified_date.map(encode_dt);

    let (changed, exists): (usize, bool) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE persons SET
             name = ?2, email = ?3, date_of_birth = ?4,
             address = ?5, phone_number = ?6, gender = ?7,
             last_modified = ?8, version = ?9,
             old_name = ?10, old_email = ?11, old_date_of_birth = ?12,
             old_address = ?13, old_phone_number = ?14, old_gender = ?15,
             old_modified_date = ?16,
             row_version = row_version + 1
           WHERE id = ?1 AND row_version = ?17",
          rusqlite::params![
            id,
            name,
            email,
            date_of_birth,
            address,
            phone_number,
            gender,
            last_modified,
            version,
            old_name,
            old_email,
            old_date_of_birth,
            old_address,
            old_phone_number,
            old_gender,
            old_modified_date,
            expected,
          ],
        )?;

        let exists = changed > 0
          || tx
            .query_row(
              "SELECT 1 FROM persons WHERE id = ?1",
              rusqlite::params![id],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        tx.commit()?;
        Ok((changed, exists))
      })
      .await?;

    Ok(match (changed, exists) {
      (0, false) => ReplaceOutcome::Missing,
      (0, true) => ReplaceOutcome::Conflict,
      _ => ReplaceOutcome::Replaced(PersonRecord { row_version: expected + 1, ..record }),
    })
  }

  async fn remove(&self, id: PersonId) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM persons WHERE id = ?1", rusqlite::params![id])?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn remove_many(&self, ids: Vec<PersonId>) -> Result<u64> {
    let removed: usize = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
          let mut stmt = tx.prepare("DELETE FROM persons WHERE id = ?1")?;
          for id in &ids {
            removed += stmt.execute(rusqlite::params![id])?;
          }
        }
        tx.commit()?;
        Ok(removed)
      })
      .await?;
    Ok(removed as u64)
  }

  // ── Aggregates ────────────────────────────────────────────────────────────

  async fn gender_counts(&self) -> Result<Vec<(Option<String>, u64)>> {
    let rows: Vec<(Option<String>, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT gender, COUNT(*) FROM persons GROUP BY gender ORDER BY gender",
        )?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(gender, n)| decode_count(n).map(|n| (gender, n)))
      .collect()
  }

  async fn birth_dates(&self) -> Result<Vec<NaiveDate>> {
    let rows: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT date_of_birth FROM persons")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows.iter().map(String::as_str).map(decode_date).collect()
  }

  async fn registrations_by_month(&self) -> Result<Vec<(String, u64)>> {
    // RFC 3339 UTC timestamps start with `YYYY-MM`.
    let rows: Vec<(String, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT substr(created_at, 1, 7) AS month, COUNT(*)
           FROM persons
           GROUP BY month
           ORDER BY month",
        )?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(month, n)| decode_count(n).map(|n| (month, n)))
      .collect()
  }
}
