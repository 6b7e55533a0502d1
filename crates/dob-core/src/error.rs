//! Error types for `dob-core`.
//!
//! The mending pipeline reports almost everything as conflict tuples for the
//! user to confirm; only structurally unrecoverable cases surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Adding a fact with no start to a completely empty store — there is no
  /// anchor to infer a start from, so the user must supply one.
  #[error("cannot infer a start for the first fact in an empty store; please specify one")]
  ZerothFactMustStart,

  /// A store query or save failed. The backend's own error crosses the
  /// trait seam boxed.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error for transport across the [`crate::store::FactStore`]
  /// seam.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
