//! Dashboard aggregates: gender, age, and monthly registration series.
//!
//! Stores supply raw counts and dates; the bucketing and labelling live here
//! so every backend produces identical series.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

/// Label for records whose bucket cannot be determined.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// A labelled chart series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
  pub labels: Vec<String>,
  pub data:   Vec<u64>,
}

impl Distribution {
  fn push(&mut self, label: impl Into<String>, count: u64) {
    self.labels.push(label.into());
    self.data.push(count);
  }

  /// Add `count` to `label`, appending it if not yet present.
  fn add(&mut self, label: &str, count: u64) {
    match self.labels.iter().position(|l| l == label) {
      Some(i) => self.data[i] += count,
      None => self.push(label, count),
    }
  }
}

impl FromIterator<(String, u64)> for Distribution {
  fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
    let mut dist = Self::default();
    for (label, count) in iter {
      dist.push(label, count);
    }
    dist
  }
}

// ─── Gender ──────────────────────────────────────────────────────────────────

/// One bucket per distinct gender, in input order. Missing and empty genders
/// share the [`UNKNOWN_LABEL`] bucket.
pub fn gender_distribution(
  counts: impl IntoIterator<Item = (Option<String>, u64)>,
) -> Distribution {
  let mut dist = Distribution::default();
  for (gender, count) in counts {
    let label = gender.as_deref().filter(|g| !g.is_empty()).unwrap_or(UNKNOWN_LABEL);
    dist.add(label, count);
  }
  dist
}

// ─── Age ─────────────────────────────────────────────────────────────────────

/// Fixed age buckets, listed in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum AgeBracket {
  #[strum(serialize = "0-18")]
  Minor,
  #[strum(serialize = "19-35")]
  YoungAdult,
  #[strum(serialize = "36-50")]
  MiddleAged,
  #[strum(serialize = "51+")]
  Senior,
}

impl AgeBracket {
  /// `None` for negative ages (birth dates in the future).
  pub fn for_age(age: i32) -> Option<Self> {
    match age {
      0..=18 => Some(Self::Minor),
      19..=35 => Some(Self::YoungAdult),
      36..=50 => Some(Self::MiddleAged),
      51.. => Some(Self::Senior),
      _ => None,
    }
  }
}

/// Completed years between `birth` and `today`. A 29 February birthday is
/// reached on 28 February in non-leap years.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
  let years = today.year() - birth.year();
  let Ok(whole) = u32::try_from(years) else {
    return years;
  };
  match birth.checked_add_months(Months::new(whole * 12)) {
    Some(anniversary) if today < anniversary => years - 1,
    _ => years,
  }
}

/// Every [`AgeBracket`] in order (zero counts included), followed by an
/// [`UNKNOWN_LABEL`] bucket only when some birth date lies in the future.
pub fn age_distribution(
  births: impl IntoIterator<Item = NaiveDate>,
  today: NaiveDate,
) -> Distribution {
  let mut dist: Distribution =
    AgeBracket::iter().map(|b| (b.to_string(), 0)).collect();
  let mut unknown = 0;

  for birth in births {
    match AgeBracket::for_age(age_on(birth, today)) {
      Some(bracket) => dist.add(&bracket.to_string(), 1),
      None => unknown += 1,
    }
  }

  if unknown > 0 {
    dist.push(UNKNOWN_LABEL, unknown);
  }
  dist
}

// ─── Registrations ───────────────────────────────────────────────────────────

/// Monthly registration counts as a series; the store already orders months.
pub fn registration_trend(months: impl IntoIterator<Item = (String, u64)>) -> Distribution {
  months.into_iter().collect()
}
