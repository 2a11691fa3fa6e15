//! JSON REST API for Roster.
//!
//! Exposes an axum [`Router`] backed by any [`roster_core::store::PersonStore`].
//! TLS, CORS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", roster_api::api_router(state))
//! ```

pub mod error;
pub mod extract;
pub mod persons;
pub mod stats;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use roster_core::{revision::RevisionPolicy, store::PersonStore};

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:  Arc<S>,
  pub policy: RevisionPolicy,
}

impl<S> ApiState<S> {
  pub fn new(store: Arc<S>, policy: RevisionPolicy) -> Self { Self { store, policy } }
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), policy: self.policy }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: PersonStore + 'static,
{
  Router::new()
    // Persons
    .route("/persons", get(persons::list::<S>).post(persons::create::<S>))
    .route("/persons/bulk", post(persons::create_many::<S>))
    .route("/persons/bulk-delete", post(persons::delete_many::<S>))
    .route(
      "/persons/{id}",
      get(persons::get_one::<S>)
        .put(persons::update::<S>)
        .delete(persons::delete_one::<S>),
    )
    // Dashboards
    .route("/persons/gender-distribution", get(stats::gender::<S>))
    .route("/persons/age-distribution", get(stats::age::<S>))
    .route("/persons/monthly-registration-trend", get(stats::registrations::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
