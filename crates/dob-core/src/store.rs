//! The `FactStore` trait — ordering queries and persistence.
//!
//! The trait is implemented by storage backends (e.g. `dob-store-mem` for
//! tests, a database-backed store in production). The mending pipeline
//! depends on this abstraction, not on any concrete backend.
//!
//! All methods are synchronous blocking calls: the pipeline issues them
//! sequentially (antecedent, then subsequent, then per-fact edge and
//! containment lookups) and is never driven concurrently. Callers must not
//! interleave two independent add/import/edit operations against the same
//! store without external serialization.

use chrono::{DateTime, Utc};

use crate::fact::Fact;

/// Abstraction over a dob fact store backend.
pub trait FactStore {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Ordering queries ──────────────────────────────────────────────────

  /// All facts whose `[start, end)` window contains `instant`. An ongoing
  /// fact's window extends to infinity.
  ///
  /// Under the store's own invariants this returns zero or one facts; more
  /// than one signals a pre-existing integrity problem, which the conflict
  /// detector logs and works around rather than failing on.
  fn surrounding(
    &self,
    instant: DateTime<Utc>,
  ) -> Result<Vec<Fact>, Self::Error>;

  /// The fact immediately preceding `before`: the latest fact ending at or
  /// before it, or the ongoing fact if it started at or before it. Callers
  /// must handle the ongoing case specially (squash, not truncate).
  fn antecedent(
    &self,
    before: DateTime<Utc>,
  ) -> Result<Option<Fact>, Self::Error>;

  /// The nearest fact starting at or after `after`.
  fn subsequent(
    &self,
    after: DateTime<Utc>,
  ) -> Result<Option<Fact>, Self::Error>;

  /// A stored fact (other than `fact` itself) starting exactly at `fact`'s
  /// start.
  fn starting_at(&self, fact: &Fact) -> Result<Option<Fact>, Self::Error>;

  /// A stored fact (other than `fact` itself) ending exactly at `fact`'s
  /// end.
  fn ending_at(&self, fact: &Fact) -> Result<Option<Fact>, Self::Error>;

  /// All facts whose windows lie strictly inside `(start, end)`.
  fn strictly_during(
    &self,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> Result<Vec<Fact>, Self::Error>;

  /// The ongoing facts — zero or one under the store invariant.
  fn endless(&self) -> Result<Vec<Fact>, Self::Error>;

  // ── Persistence ───────────────────────────────────────────────────────

  /// Persist `fact` and return the canonical stored copy with its assigned
  /// (positive) pk and transient state cleared.
  ///
  /// Overlap validation ignores stored facts whose pks appear in
  /// `ignore_pks` — the caller passes the pks its own mutation batch is
  /// about to replace.
  ///
  /// A `deleted` fact that was never persisted is dropped entirely; the
  /// store returns `None` for it instead of writing a tombstone.
  fn save(
    &mut self,
    fact: Fact,
    ignore_pks: &[i64],
  ) -> Result<Option<Fact>, Self::Error>;
}
