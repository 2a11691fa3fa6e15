//! Handlers for `/persons` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/persons` | Optional `?searchString=&pageNumber=&pageSize=` |
//! | `POST`   | `/persons` | Body: [`PersonInput`]; returns 201 + stored record |
//! | `POST`   | `/persons/bulk` | Body: `[PersonInput]`; one transaction |
//! | `POST`   | `/persons/bulk-delete` | Body: `[id]`; returns `{"deleted": n}` |
//! | `GET`    | `/persons/{id}` | 404 if not found |
//! | `PUT`    | `/persons/{id}` | 204, or 429 + `Retry-After` when throttled |
//! | `DELETE` | `/persons/{id}` | 204, 404 if not found |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use roster_core::{
  person::{PersonId, PersonInput, PersonRecord},
  revision::{Outcome, RevisionManager, prepare_for_creation},
  store::{Page, PersonQuery, PersonStore},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
  ApiState,
  error::ApiError,
  extract::{ApiJson, ApiPath, ApiQuery},
};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  /// Case-insensitive substring of name or email.
  pub search_string: Option<String>,
  pub page_number:   Option<u32>,
  pub page_size:     Option<u32>,
}

/// `GET /persons[?searchString=...][&pageNumber=...][&pageSize=...]`
pub async fn list<S: PersonStore>(
  State(state): State<ApiState<S>>,
  ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Page<PersonRecord>>, ApiError> {
  let query = PersonQuery::new(params.search_string, params.page_number, params.page_size)?;

  let page = state.store.search(&query).await.map_err(ApiError::store)?;
  tracing::debug!(
    total = page.total_count,
    page = page.page_number,
    pages = page.total_pages,
    "listed persons"
  );
  Ok(Json(page))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /persons/{id}`
pub async fn get_one<S: PersonStore>(
  State(state): State<ApiState<S>>,
  ApiPath(id): ApiPath<PersonId>,
) -> Result<Json<PersonRecord>, ApiError> {
  let person = state
    .store
    .find_by_id(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(person))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /persons`
pub async fn create<S: PersonStore>(
  State(state): State<ApiState<S>>,
  ApiJson(body): ApiJson<PersonInput>,
) -> Result<impl IntoResponse, ApiError> {
  let input = body.validated()?;

  let person = state
    .store
    .insert(prepare_for_creation(&input, Utc::now()))
    .await
    .map_err(ApiError::store)?;

  tracing::info!(id = person.id, "person created");
  Ok((StatusCode::CREATED, Json(person)))
}

/// `POST /persons/bulk`
///
/// Every entry is validated before anything is written; the batch is then
/// inserted in a single transaction.
pub async fn create_many<S: PersonStore>(
  State(state): State<ApiState<S>>,
  ApiJson(body): ApiJson<Vec<PersonInput>>,
) -> Result<impl IntoResponse, ApiError> {
  if body.is_empty() {
    return Err(ApiError::BadRequest("no persons supplied".into()));
  }

  let now = Utc::now();
  let batch = body
    .into_iter()
    .enumerate()
    .map(|(i, input)| {
      input
        .validated()
        .map(|input| prepare_for_creation(&input, now))
        .map_err(|e| ApiError::BadRequest(format!("entry {i}: {e}")))
    })
    .collect::<Result<Vec<_>, _>>()?;

  let persons = state.store.insert_many(batch).await.map_err(ApiError::store)?;

  tracing::info!(count = persons.len(), "persons created");
  Ok((StatusCode::CREATED, Json(persons)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /persons/{id}`; the body is a [`PersonInput`] whose `id` matches the path.
pub async fn update<S: PersonStore>(
  State(state): State<ApiState<S>>,
  ApiPath(id): ApiPath<PersonId>,
  ApiJson(body): ApiJson<PersonInput>,
) -> Result<StatusCode, ApiError> {
  tracing::debug!(id, "update requested");

  if body.id != Some(id) {
    tracing::warn!(id, body_id = ?body.id, "path id does not match payload id");
    return Err(ApiError::BadRequest(format!(
      "path id {id} does not match payload id"
    )));
  }
  let input = body.validated()?;

  let existing = state
    .store
    .find_by_id(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;

  let manager = RevisionManager::new(state.store.as_ref(), state.policy);
  match manager.revise_record(&existing, &input).await? {
    Outcome::Updated(_) => Ok(StatusCode::NO_CONTENT),
    Outcome::Throttled { retry_after } => Err(ApiError::Throttled { retry_after }),
    Outcome::NotFound => Err(not_found(id)),
  }
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /persons/{id}`
pub async fn delete_one<S: PersonStore>(
  State(state): State<ApiState<S>>,
  ApiPath(id): ApiPath<PersonId>,
) -> Result<StatusCode, ApiError> {
  if !state.store.remove(id).await.map_err(ApiError::store)? {
    tracing::warn!(id, "delete target not found");
    return Err(not_found(id));
  }
  tracing::info!(id, "person deleted");
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /persons/bulk-delete` with body `[id, ...]`
pub async fn delete_many<S: PersonStore>(
  State(state): State<ApiState<S>>,
  ApiJson(ids): ApiJson<Vec<PersonId>>,
) -> Result<impl IntoResponse, ApiError> {
  if ids.is_empty() {
    return Err(ApiError::BadRequest("no ids supplied".into()));
  }

  let requested = ids.len();
  let deleted = state.store.remove_many(ids).await.map_err(ApiError::store)?;

  tracing::info!(requested, deleted, "persons deleted");
  Ok(Json(json!({ "deleted": deleted })))
}

fn not_found(id: PersonId) -> ApiError { ApiError::NotFound(format!("person {id} not found")) }
