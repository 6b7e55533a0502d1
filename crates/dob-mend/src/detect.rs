//! Conflict detection — which stored facts a new fact's window touches.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use dob_core::{Error, Result, fact::Fact, store::FactStore};
use tracing::warn;

// ─── Match rules ─────────────────────────────────────────────────────────────

/// Why a stored fact was pulled into conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
  /// The stored fact's window contains the new fact's start.
  SurroundsStart,
  /// The stored fact's window contains the new fact's end.
  SurroundsEnd,
  /// The stored fact starts exactly at the new fact's start. Catches
  /// zero-length facts sitting on the edge, which no half-open
  /// surrounding query can see.
  StartsAt,
  /// The stored fact ends exactly at the new fact's end.
  EndsAt,
  /// The stored fact lies inside the new fact's window.
  Contained,
  /// The new fact has no start and the fact preceding it is the ongoing
  /// one — it must be squashed, not independently resolved.
  OngoingAntecedent,
}

/// A stored fact that may require adjustment, tagged by the rule that
/// matched it.
#[derive(Debug, Clone)]
pub struct Detected {
  pub fact: Fact,
  pub rule: MatchRule,
}

// ─── Detection ───────────────────────────────────────────────────────────────

/// Find every stored fact whose window interacts with `fact`'s: surrounding
/// either set boundary, contained in the window, or — for a start-less fact
/// — the ongoing fact it would continue. The result is ordered and
/// de-duplicated by pk; the first match for a pk wins.
pub fn detect_conflicts<S: FactStore>(
  store: &S,
  fact: &Fact,
  now: DateTime<Utc>,
) -> Result<Vec<Detected>> {
  let mut found: Vec<Detected> = Vec::new();

  if let Some(start) = fact.start_instant() {
    push_surrounding(
      &mut found,
      store.surrounding(start).map_err(Error::store)?,
      MatchRule::SurroundsStart,
      start,
    );
  } else {
    // No start boundary yet: the fact hangs off whatever precedes its
    // reference instant. Only an ongoing antecedent conflicts (squash);
    // a closed one merely anchors resolution.
    let reference = fact.end_instant().unwrap_or(now);
    if let Some(previous) = store.antecedent(reference).map_err(Error::store)?
    {
      if previous.is_ongoing() {
        found.push(Detected { fact: previous, rule: MatchRule::OngoingAntecedent });
      }
    }
  }

  if let Some(end) = fact.end_instant() {
    push_surrounding(
      &mut found,
      store.surrounding(end).map_err(Error::store)?,
      MatchRule::SurroundsEnd,
      end,
    );
  }

  if let Some(exact) = store.starting_at(fact).map_err(Error::store)? {
    found.push(Detected { fact: exact, rule: MatchRule::StartsAt });
  }
  if let Some(exact) = store.ending_at(fact).map_err(Error::store)? {
    found.push(Detected { fact: exact, rule: MatchRule::EndsAt });
  }

  if let Some((start, end)) = fact.time_window() {
    for inside in store.strictly_during(start, end).map_err(Error::store)? {
      found.push(Detected { fact: inside, rule: MatchRule::Contained });
    }
  }

  let mut seen = BTreeSet::new();
  found.retain(|detected| match detected.fact.pk {
    Some(pk) => seen.insert(pk),
    None => true,
  });
  Ok(found)
}

/// The store's own invariants make more than one surrounding fact
/// impossible; if it happens anyway the data is already damaged, so warn
/// and proceed deterministically with the first match.
fn push_surrounding(
  found: &mut Vec<Detected>,
  hits: Vec<Fact>,
  rule: MatchRule,
  instant: DateTime<Utc>,
) {
  if hits.len() > 1 {
    warn!(
      %instant,
      count = hits.len(),
      "multiple stored facts surround one instant; using the first",
    );
  }
  if let Some(first) = hits.into_iter().next() {
    found.push(Detected { fact: first, rule });
  }
}
