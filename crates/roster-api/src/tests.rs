//! Router tests driven through `tower::ServiceExt::oneshot` against an
//! in-memory SQLite store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use chrono::{NaiveDate, TimeDelta, Utc};
use roster_core::{
  person::PersonInput,
  revision::{RevisionPolicy, prepare_for_creation},
  store::PersonStore,
};
use roster_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{ApiState, api_router};

async fn app(policy: RevisionPolicy) -> Router {
  app_with_store(policy).await.0
}

async fn app_with_store(policy: RevisionPolicy) -> (Router, Arc<SqliteStore>) {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  (api_router(ApiState::new(Arc::clone(&store), policy)), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

fn alice() -> Value {
  json!({
    "name": "Alice",
    "email": "a@a.com",
    "dateOfBirth": "2000-01-01",
    "gender": "F"
  })
}

async fn create(app: &Router, body: Value) -> Value {
  let resp = send(app, "POST", "/persons", Some(body)).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  json_body(resp).await
}

// ── Create & read ───────────────────────────────────────────────────────────

#[tokio::test]
async fn create_returns_stored_record() {
  let app = app(RevisionPolicy::default()).await;

  let mut body = alice();
  body["id"] = json!(999);
  body["oldName"] = json!("forged");
  let created = create(&app, body).await;

  assert_ne!(created["id"], 999);
  assert_eq!(created["version"], "1.0.0");
  assert_eq!(created["oldName"], Value::Null);
  assert!(created["lastModified"].is_string());
  assert!(created.get("rowVersion").is_none());

  let uri = format!("/persons/{}", created["id"]);
  let resp = send(&app, "GET", &uri, None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await, created);
}

#[tokio::test]
async fn create_rejects_invalid_email() {
  let app = app(RevisionPolicy::default()).await;
  let mut body = alice();
  body["email"] = json!("not-an-email");

  let resp = send(&app, "POST", "/persons", Some(body)).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn create_without_birth_date_is_a_json_400() {
  let app = app(RevisionPolicy::default()).await;
  let body = json!({ "name": "A", "email": "a@a.com" });

  let resp = send(&app, "POST", "/persons", Some(body)).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let error = json_body(resp).await["error"].as_str().unwrap().to_owned();
  assert!(error.contains("dateOfBirth"), "error: {error}");
}

#[tokio::test]
async fn create_with_unparsable_date_is_a_json_400() {
  let app = app(RevisionPolicy::default()).await;
  let mut body = alice();
  body["dateOfBirth"] = json!("2000-13-40");

  let resp = send(&app, "POST", "/persons", Some(body)).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn wrongly_typed_bulk_body_is_a_json_400() {
  let app = app(RevisionPolicy::default()).await;
  let resp = send(&app, "POST", "/persons/bulk-delete", Some(json!(["one"]))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn non_numeric_id_is_a_json_400() {
  let app = app(RevisionPolicy::default()).await;
  let resp = send(&app, "GET", "/persons/abc", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn malformed_paging_is_a_json_400() {
  let app = app(RevisionPolicy::default()).await;
  let resp = send(&app, "GET", "/persons?pageSize=lots", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn get_missing_returns_404() {
  let app = app(RevisionPolicy::default()).await;
  let resp = send(&app, "GET", "/persons/42", None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── List ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_defaults_to_five_per_page() {
  let app = app(RevisionPolicy::default()).await;
  for i in 0..7 {
    let mut body = alice();
    body["name"] = json!(format!("P{i}"));
    create(&app, body).await;
  }

  let page = json_body(send(&app, "GET", "/persons", None).await).await;
  assert_eq!(page["items"].as_array().unwrap().len(), 5);
  assert_eq!(page["totalCount"], 7);
  assert_eq!(page["totalPages"], 2);
  assert_eq!(page["pageNumber"], 1);

  let page = json_body(send(&app, "GET", "/persons?pageNumber=2", None).await).await;
  assert_eq!(page["items"].as_array().unwrap().len(), 2);
  assert_eq!(page["items"][0]["name"], "P5");
}

#[tokio::test]
async fn list_filters_by_search_string() {
  let app = app(RevisionPolicy::default()).await;
  create(&app, alice()).await;
  let mut bob = alice();
  bob["name"] = json!("Bob");
  bob["email"] = json!("bob@example.org");
  create(&app, bob).await;

  let page = json_body(send(&app, "GET", "/persons?searchString=EXAMPLE", None).await).await;
  assert_eq!(page["totalCount"], 1);
  assert_eq!(page["items"][0]["name"], "Bob");
}

#[tokio::test]
async fn list_rejects_zero_page() {
  let app = app(RevisionPolicy::default()).await;
  let resp = send(&app, "GET", "/persons?pageNumber=0", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ── Update ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_within_interval_is_throttled() {
  let app = app(RevisionPolicy::default()).await;
  let created = create(&app, alice()).await;
  let id = created["id"].clone();

  let mut body = alice();
  body["id"] = id.clone();
  body["email"] = json!("b@a.com");
  let resp = send(&app, "PUT", &format!("/persons/{id}"), Some(body)).await;

  assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
  let retry: u64 = resp
    .headers()
    .get(header::RETRY_AFTER)
    .unwrap()
    .to_str()
    .unwrap()
    .parse()
    .unwrap();
  assert!(retry <= 15, "retry-after: {retry}");
  assert_eq!(json_body(resp).await["retryAfter"], retry);

  let stored = json_body(send(&app, "GET", &format!("/persons/{id}"), None).await).await;
  assert_eq!(stored, created);
}

#[tokio::test]
async fn update_advances_version_and_shadows_changes() {
  let app = app(RevisionPolicy::from_secs(0)).await;
  let created = create(&app, alice()).await;
  let id = created["id"].clone();

  let mut body = alice();
  body["id"] = id.clone();
  body["email"] = json!("b@a.com");
  body["version"] = json!("9.99");
  let resp = send(&app, "PUT", &format!("/persons/{id}"), Some(body)).await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);

  let stored = json_body(send(&app, "GET", &format!("/persons/{id}"), None).await).await;
  assert_eq!(stored["email"], "b@a.com");
  assert_eq!(stored["version"], "1.01");
  assert_eq!(stored["oldEmail"], "a@a.com");
  assert_eq!(stored["oldName"], Value::Null);
  assert_eq!(stored["oldModifiedDate"], created["lastModified"]);
  assert_eq!(stored["createdAt"], created["createdAt"]);
}

#[tokio::test]
async fn update_after_interval_is_accepted_under_default_policy() {
  let (app, store) = app_with_store(RevisionPolicy::default()).await;
  let dob = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
  let stale = Utc::now() - TimeDelta::seconds(16);
  let created = store
    .insert(prepare_for_creation(&PersonInput::new("Alice", "a@a.com", dob), stale))
    .await
    .unwrap();
  let id = created.id;

  let mut body = alice();
  body["id"] = json!(id);
  body["email"] = json!("b@a.com");
  let resp = send(&app, "PUT", &format!("/persons/{id}"), Some(body)).await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);

  let stored = store.find_by_id(id).await.unwrap().unwrap();
  assert_eq!(stored.version, "1.01");
  assert_eq!(stored.old_email.as_deref(), Some("a@a.com"));
  assert_eq!(stored.old_name, None);
  assert_eq!(stored.old_modified_date, Some(stale));
  assert!(stored.last_modified > Some(stale));
}

#[tokio::test]
async fn update_with_mismatched_id_is_rejected() {
  let app = app(RevisionPolicy::from_secs(0)).await;
  let created = create(&app, alice()).await;

  let mut body = alice();
  body["id"] = json!(created["id"].as_i64().unwrap() + 1);
  let uri = format!("/persons/{}", created["id"]);
  let resp = send(&app, "PUT", &uri, Some(body)).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_missing_returns_404() {
  let app = app(RevisionPolicy::from_secs(0)).await;
  let mut body = alice();
  body["id"] = json!(7);
  let resp = send(&app, "PUT", "/persons/7", Some(body)).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── Delete ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_then_get_is_404() {
  let app = app(RevisionPolicy::default()).await;
  let created = create(&app, alice()).await;
  let uri = format!("/persons/{}", created["id"]);

  assert_eq!(send(&app, "DELETE", &uri, None).await.status(), StatusCode::NO_CONTENT);
  assert_eq!(send(&app, "DELETE", &uri, None).await.status(), StatusCode::NOT_FOUND);
  assert_eq!(send(&app, "GET", &uri, None).await.status(), StatusCode::NOT_FOUND);
}

// ── Bulk ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bulk_create_and_delete() {
  let app = app(RevisionPolicy::default()).await;
  let mut bob = alice();
  bob["name"] = json!("Bob");

  let resp = send(&app, "POST", "/persons/bulk", Some(json!([alice(), bob]))).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let created = json_body(resp).await;
  let ids: Vec<i64> = created
    .as_array()
    .unwrap()
    .iter()
    .map(|p| p["id"].as_i64().unwrap())
    .collect();
  assert_eq!(ids.len(), 2);

  let resp = send(&app, "POST", "/persons/bulk-delete", Some(json!([ids[0], ids[1], 999]))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["deleted"], 2);

  let page = json_body(send(&app, "GET", "/persons", None).await).await;
  assert_eq!(page["totalCount"], 0);
}

#[tokio::test]
async fn bulk_create_is_all_or_nothing() {
  let app = app(RevisionPolicy::default()).await;
  let mut bad = alice();
  bad["email"] = json!("nope");

  let resp = send(&app, "POST", "/persons/bulk", Some(json!([alice(), bad]))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let page = json_body(send(&app, "GET", "/persons", None).await).await;
  assert_eq!(page["totalCount"], 0);
}

#[tokio::test]
async fn empty_bulk_requests_are_rejected() {
  let app = app(RevisionPolicy::default()).await;
  let resp = send(&app, "POST", "/persons/bulk", Some(json!([]))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let resp = send(&app, "POST", "/persons/bulk-delete", Some(json!([]))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ── Dashboards ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn gender_distribution_counts_unknown() {
  let app = app(RevisionPolicy::default()).await;
  create(&app, alice()).await;
  create(&app, alice()).await;
  let mut anon = alice();
  anon["gender"] = Value::Null;
  create(&app, anon).await;

  let dist = json_body(send(&app, "GET", "/persons/gender-distribution", None).await).await;
  let labels = dist["labels"].as_array().unwrap();
  let data = dist["data"].as_array().unwrap();
  let at = |label: &str| labels.iter().position(|l| l == label).map(|i| data[i].clone());
  assert_eq!(at("F"), Some(json!(2)));
  assert_eq!(at("Unknown"), Some(json!(1)));
}

#[tokio::test]
async fn age_distribution_lists_fixed_brackets() {
  let app = app(RevisionPolicy::default()).await;
  let mut elder = alice();
  elder["dateOfBirth"] = json!("1900-01-01");
  create(&app, elder).await;

  let dist = json_body(send(&app, "GET", "/persons/age-distribution", None).await).await;
  assert_eq!(dist["labels"], json!(["0-18", "19-35", "36-50", "51+"]));
  assert_eq!(dist["data"], json!([0, 0, 0, 1]));
}

#[tokio::test]
async fn registration_trend_groups_by_month() {
  let app = app(RevisionPolicy::default()).await;
  create(&app, alice()).await;
  create(&app, alice()).await;

  let dist =
    json_body(send(&app, "GET", "/persons/monthly-registration-trend", None).await).await;
  assert_eq!(dist["labels"].as_array().unwrap().len(), 1);
  assert_eq!(dist["data"], json!([2]));
}
