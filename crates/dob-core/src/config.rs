//! Mending configuration and the injected clock.
//!
//! The pipeline never reads the system clock directly; "now" always comes in
//! through a [`Clock`] so tests can pin it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Config ──────────────────────────────────────────────────────────────────

/// Configuration values the mending pipeline consumes. Loaded and merged by
/// the (out-of-scope) config layer; threaded explicitly through every call
/// rather than read from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MendConfig {
  /// Permit zero-length facts (`start == end`). Even when permitted, a
  /// momentaneous fact must carry a description.
  pub allow_momentaneous: bool,
  /// Separator inserted between the two descriptions when squashing a fact
  /// into the ongoing one.
  pub squash_separator:   String,
}

impl Default for MendConfig {
  fn default() -> Self {
    Self {
      allow_momentaneous: false,
      squash_separator:   ", ".to_string(),
    }
  }
}

// ─── Clock ───────────────────────────────────────────────────────────────────

/// Source of "now" for blank-fill and anchor-less resolution.
pub trait Clock {
  fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A clock frozen at a fixed instant — useful for testing.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> { self.0 }
}
