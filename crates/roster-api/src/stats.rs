//! Dashboard chart endpoints. Each returns a [`Distribution`] of
//! `{"labels": [...], "data": [...]}`.

use axum::{Json, extract::State};
use chrono::Local;
use roster_core::{
  stats::{self, Distribution},
  store::PersonStore,
};

use crate::{ApiState, error::ApiError};

/// `GET /persons/gender-distribution`
pub async fn gender<S: PersonStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Distribution>, ApiError> {
  let counts = state.store.gender_counts().await.map_err(ApiError::store)?;
  Ok(Json(stats::gender_distribution(counts)))
}

/// `GET /persons/age-distribution`
///
/// Ages are computed against the server's local date.
pub async fn age<S: PersonStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Distribution>, ApiError> {
  let births = state.store.birth_dates().await.map_err(ApiError::store)?;
  let today = Local::now().date_naive();
  Ok(Json(stats::age_distribution(births, today)))
}

/// `GET /persons/monthly-registration-trend`
pub async fn registrations<S: PersonStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Distribution>, ApiError> {
  let months = state.store.registrations_by_month().await.map_err(ApiError::store)?;
  Ok(Json(stats::registration_trend(months)))
}
