//! Server assembly errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid CORS origin {origin:?}: {reason}")]
  InvalidOrigin { origin: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
