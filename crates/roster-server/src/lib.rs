//! HTTP server assembly for Roster.
//!
//! Mounts the [`roster_api`] router under `/api` and wraps it in the
//! middleware stack shared by the binary and the tests.

pub mod error;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  http::{HeaderName, HeaderValue, header},
};
use roster_api::{ApiState, api_router};
use roster_core::{revision::RevisionPolicy, store::PersonStore};
use serde::Deserialize;
use tower_http::{
  cors::{AllowOrigin, Any, CorsLayer},
  request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
  trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ROSTER_*` environment variables. Every field has a default.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                       String,
  pub port:                       u16,
  pub store_path:                 PathBuf,
  /// Minimum seconds between two accepted updates of one record.
  pub min_revision_interval_secs: u64,
  pub cors_origins:               Vec<String>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                       "127.0.0.1".to_string(),
      port:                       5098,
      store_path:                 PathBuf::from("roster.db"),
      min_revision_interval_secs: 15,
      cors_origins:               [
        "http://localhost:8080",
        "http://127.0.0.1:8080",
        "http://localhost:5500",
        "http://127.0.0.1:5500",
      ]
      .map(String::from)
      .to_vec(),
    }
  }
}

impl ServerConfig {
  pub fn revision_policy(&self) -> RevisionPolicy {
    RevisionPolicy::from_secs(self.min_revision_interval_secs)
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application [`Router`] with all middleware layers.
///
/// Layers apply bottom-up: CORS, request id assignment, tracing, then request
/// id propagation onto the response.
pub fn router<S>(store: Arc<S>, config: &ServerConfig) -> Result<Router>
where
  S: PersonStore + 'static,
{
  let cors = cors_layer(&config.cors_origins)?;
  let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);
  let state = ApiState::new(store, config.revision_policy());

  Ok(
    Router::new()
      .nest("/api", api_router(state))
      .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
      .layer(
        TraceLayer::new_for_http()
          .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
          .on_response(DefaultOnResponse::new().level(Level::INFO)),
      )
      .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
      .layer(cors),
  )
}

/// Build the CORS layer for `origins`, failing on any origin that is not a
/// valid header value.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
  let origins = origins
    .iter()
    .map(|o| {
      HeaderValue::from_str(o).map_err(|e| Error::InvalidOrigin {
        origin: o.clone(),
        reason: e.to_string(),
      })
    })
    .collect::<Result<Vec<_>>>()?;

  Ok(
    CorsLayer::new()
      .allow_origin(AllowOrigin::list(origins))
      .allow_methods(Any)
      .allow_headers(Any)
      .expose_headers([header::RETRY_AFTER, HeaderName::from_static(REQUEST_ID_HEADER)]),
  )
}

// ─── Integration tests ────────────────────────────────────────────────────────
