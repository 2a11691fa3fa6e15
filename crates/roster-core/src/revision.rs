//! The record revision protocol.
//!
//! Every accepted update to a [`PersonRecord`] goes through [`revise`]:
//!
//! 1. Updates closer together than the configured minimum interval are
//!    throttled, measured from the *stored* `last_modified`.
//! 2. Each tracked field that changed has its previous value copied into the
//!    matching shadow field; unchanged fields keep their existing shadow.
//! 3. `old_modified_date` takes the previous `last_modified`, which becomes
//!    `now`.
//! 4. The display version advances by `0.01`.
//!
//! [`revise`] is pure. [`RevisionManager`] applies its decision through a
//! [`PersonStore`], whose row-version check is the only guard against two
//! updates racing past the throttle.

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::{
  person::{DEFAULT_VERSION, NewPerson, PersonId, PersonInput, PersonRecord},
  store::{PersonStore, ReplaceOutcome},
};

pub const DEFAULT_MIN_INTERVAL_SECS: u64 = 15;

/// Version assigned when the stored version cannot be parsed.
pub const RESET_VERSION: &str = "1.00";

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Tunables for the revision protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionPolicy {
  /// Minimum time between two accepted revisions of the same record.
  pub min_interval: TimeDelta,
}

impl RevisionPolicy {
  pub fn from_secs(secs: u64) -> Self {
    let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
    Self { min_interval: TimeDelta::seconds(secs) }
  }
}

impl Default for RevisionPolicy {
  fn default() -> Self { Self::from_secs(DEFAULT_MIN_INTERVAL_SECS) }
}

// ─── Pure decision ───────────────────────────────────────────────────────────

/// What [`revise`] decided for a single update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
  /// The update is accepted; carries the record to persist.
  Accept(PersonRecord),
  /// The record was modified too recently.
  Throttled {
    /// Whole seconds (rounded down) until the next revision is allowed.
    retry_after: u64,
  },
}

/// Decide how `incoming` applies on top of `existing` at time `now`.
///
/// The caller guarantees that `incoming.id` refers to `existing`; the result
/// always keeps `existing.id`, `existing.created_at` and
/// `existing.row_version`. Neither argument is modified.
pub fn revise(
  existing: &PersonRecord,
  incoming: &PersonInput,
  now: DateTime<Utc>,
  policy: &RevisionPolicy,
) -> Decision {
  if let Some(last) = existing.last_modified {
    let elapsed = now - last;
    if elapsed < policy.min_interval {
      let remaining = policy.min_interval - elapsed;
      return Decision::Throttled {
        retry_after: u64::try_from(remaining.num_seconds()).unwrap_or(0),
      };
    }
  }

  Decision::Accept(PersonRecord {
    id:                existing.id,
    name:              incoming.name.clone(),
    email:             incoming.email.clone(),
    date_of_birth:     incoming.date_of_birth,
    address:           incoming.address.clone(),
    phone_number:      incoming.phone_number.clone(),
    gender:            incoming.gender.clone(),
    last_modified:     Some(now),
    version:           next_version(&existing.version),
    created_at:        existing.created_at,
    old_name:          shadow(
      Some(&existing.name),
      Some(&incoming.name),
      &existing.old_name,
    ),
    old_email:         shadow(
      Some(&existing.email),
      Some(&incoming.email),
      &existing.old_email,
    ),
    old_date_of_birth: shadow(
      Some(&existing.date_of_birth),
      Some(&incoming.date_of_birth),
      &existing.old_date_of_birth,
    ),
    old_address:       shadow(
      existing.address.as_ref(),
      incoming.address.as_ref(),
      &existing.old_address,
    ),
    old_phone_number:  shadow(
      existing.phone_number.as_ref(),
      incoming.phone_number.as_ref(),
      &existing.old_phone_number,
    ),
    old_gender:        shadow(
      existing.gender.as_ref(),
      incoming.gender.as_ref(),
      &existing.old_gender,
    ),
    old_modified_date: existing.last_modified,
    row_version:       existing.row_version,
  })
}

/// The new shadow value for one tracked field: the value before the update if
/// the field changed, otherwise the shadow already on record.
fn shadow<T: PartialEq + Clone>(
  before: Option<&T>,
  after: Option<&T>,
  current_shadow: &Option<T>,
) -> Option<T> {
  if before != after {
    before.cloned()
  } else {
    current_shadow.clone()
  }
}

/// Advance a display version by `0.01`, formatted with two fractional digits.
///
/// The version is read from its leading decimal number, so the creation
/// default `"1.0.0"` is read as `1.0`. Digits past the second fractional place
/// round half up. A version with no leading digits resets to
/// [`RESET_VERSION`].
///
/// The arithmetic works on the decimal digits themselves, so the integer part
/// has no upper bound.
pub fn next_version(current: &str) -> String {
  let Some((int, frac)) = split_version(current) else {
    return RESET_VERSION.to_owned();
  };

  // Hundredths as a digit string: integer part followed by two fraction digits.
  let mut digits: Vec<u8> = int
    .bytes()
    .chain(frac.bytes().chain(std::iter::repeat(b'0')).take(2))
    .collect();
  let rounds_up = frac.as_bytes().get(2).is_some_and(|d| *d >= b'5');

  increment(&mut digits);
  if rounds_up {
    increment(&mut digits);
  }

  let (int, frac) = digits.split_at(digits.len() - 2);
  let int = match int.iter().position(|d| *d != b'0') {
    Some(first) => &int[first..],
    None => &int[int.len() - 1..],
  };
  let text = |ds: &[u8]| ds.iter().copied().map(char::from).collect::<String>();
  format!("{}.{}", text(int), text(frac))
}

/// Split the leading `digits[.digits]` prefix of `s` into its integer and
/// fractional digit runs.
fn split_version(s: &str) -> Option<(&str, &str)> {
  let s = s.trim();
  let int_len = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
  if int_len == 0 {
    return None;
  }
  let (int, rest) = s.split_at(int_len);
  let frac = rest
    .strip_prefix('.')
    .map(|f| &f[..f.find(|c: char| !c.is_ascii_digit()).unwrap_or(f.len())])
    .unwrap_or("");
  Some((int, frac))
}

/// Add one to a big-endian run of ASCII digits.
fn increment(digits: &mut Vec<u8>) {
  for d in digits.iter_mut().rev() {
    if *d == b'9' {
      *d = b'0';
    } else {
      *d += 1;
      return;
    }
  }
  digits.insert(0, b'1');
}

/// Normalise a client payload for insertion.
///
/// Any client-supplied id is dropped, `last_modified` becomes `now`, and the
/// version is kept only if present and non-blank. Shadow fields do not exist
/// on [`NewPerson`], so every new record starts with an empty history.
pub fn prepare_for_creation(incoming: &PersonInput, now: DateTime<Utc>) -> NewPerson {
  let version = incoming
    .version
    .as_deref()
    .filter(|v| !v.trim().is_empty())
    .unwrap_or(DEFAULT_VERSION)
    .to_owned();

  NewPerson {
    name: incoming.name.clone(),
    email: incoming.email.clone(),
    date_of_birth: incoming.date_of_birth,
    address: incoming.address.clone(),
    phone_number: incoming.phone_number.clone(),
    gender: incoming.gender.clone(),
    last_modified: now,
    version,
  }
}

// ─── Manager ─────────────────────────────────────────────────────────────────

/// The non-fatal results of a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  /// The revision was persisted.
  Updated(PersonRecord),
  /// Rejected without writing; retry after this many seconds.
  Throttled { retry_after: u64 },
  /// The record disappeared between read and write.
  NotFound,
}

/// Fatal revision failures, surfaced to the caller unchanged.
#[derive(Debug, Error)]
pub enum RevisionError<E: std::error::Error + Send + Sync + 'static> {
  #[error("person {0} was modified concurrently")]
  Conflict(PersonId),

  #[error("store error: {0}")]
  Store(#[source] E),
}

/// Applies [`revise`] decisions through a [`PersonStore`].
pub struct RevisionManager<'a, S> {
  store:  &'a S,
  policy: RevisionPolicy,
}

impl<'a, S: PersonStore> RevisionManager<'a, S> {
  pub fn new(store: &'a S, policy: RevisionPolicy) -> Self { Self { store, policy } }

  /// Revise `existing` with `incoming` as of the current time.
  pub async fn revise_record(
    &self,
    existing: &PersonRecord,
    incoming: &PersonInput,
  ) -> Result<Outcome, RevisionError<S::Error>> {
    self.revise_record_at(existing, incoming, Utc::now()).await
  }

  /// Revise `existing` with `incoming` as of `now`.
  pub async fn revise_record_at(
    &self,
    existing: &PersonRecord,
    incoming: &PersonInput,
    now: DateTime<Utc>,
  ) -> Result<Outcome, RevisionError<S::Error>> {
    let id = existing.id;

    let revised = match revise(existing, incoming, now, &self.policy) {
      Decision::Accept(record) => record,
      Decision::Throttled { retry_after } => {
        tracing::warn!(id, retry_after, "update rejected: record modified too recently");
        return Ok(Outcome::Throttled { retry_after });
      }
    };

    match self.store.replace(revised).await.map_err(RevisionError::Store)? {
      ReplaceOutcome::Replaced(record) => {
        tracing::info!(id, version = %record.version, "person updated");
        Ok(Outcome::Updated(record))
      }
      ReplaceOutcome::Missing => {
        tracing::warn!(id, "update target no longer exists");
        Ok(Outcome::NotFound)
      }
      ReplaceOutcome::Conflict => {
        tracing::error!(id, "concurrent modification detected");
        Err(RevisionError::Conflict(id))
      }
    }
  }
}
