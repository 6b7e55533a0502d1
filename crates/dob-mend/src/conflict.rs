//! Conflict reporting types.
//!
//! Nothing here is persisted. A [`Conflict`] drives the user-facing
//! confirmation prompt; an [`Edit`] is the copy-on-write mutation pair the
//! caller persists once the user confirms.

use std::fmt;

use dob_core::fact::Fact;

/// One reportable resolution finding: the fact in question, optionally the
/// other fact involved, and a human-readable message.
#[derive(Debug, Clone)]
pub struct Conflict {
  pub fact:    Fact,
  pub other:   Option<Fact>,
  pub message: String,
}

impl Conflict {
  pub fn new(fact: Fact, other: Option<Fact>, message: impl Into<String>) -> Self {
    Self { fact, other, message: message.into() }
  }
}

impl fmt::Display for Conflict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.other {
      Some(other) => {
        write!(f, "{}: {} (vs {})", self.fact.summary(), self.message, other.summary())
      }
      None => write!(f, "{}: {}", self.fact.summary(), self.message),
    }
  }
}

/// A proposed mutation of a stored fact.
///
/// `original` is the snapshot taken at detection time and is never mutated;
/// `edited` carries the new times, tombstone flag, and dirty reasons. The
/// pair enables diff display and a safe abort before anything is persisted.
#[derive(Debug, Clone)]
pub struct Edit {
  pub edited:   Fact,
  pub original: Fact,
}
