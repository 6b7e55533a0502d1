//! Error type for `dob-store-mem`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// `save` was handed a fact whose times are still raw tokens or missing.
  /// Resolution must finish before persistence.
  #[error("fact has unresolved times and cannot be saved: {0}")]
  UnresolvedTimes(String),

  /// Saving a second ongoing fact would break the at-most-one-ongoing
  /// invariant.
  #[error("an ongoing fact already exists (pk {0})")]
  OngoingExists(i64),

  /// The fact's window overlaps a stored fact not listed in `ignore_pks`.
  #[error("fact overlaps stored fact {0}")]
  Overlap(i64),

  /// Deletion of a pk that is not in the store.
  #[error("fact not found: {0}")]
  FactNotFound(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
