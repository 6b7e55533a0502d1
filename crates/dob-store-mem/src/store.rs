//! [`MemoryStore`] — the in-memory implementation of [`FactStore`].

use chrono::{DateTime, Utc};
use dob_core::{fact::Fact, store::FactStore};

use crate::{Error, Result};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A fact store held entirely in memory, ordered by start.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  facts:   Vec<Fact>,
  next_pk: i64,
}

/// An ongoing fact's window extends to infinity.
fn end_or_max(fact: &Fact) -> DateTime<Utc> {
  fact.end_instant().unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl MemoryStore {
  pub fn new() -> Self {
    Self { facts: Vec::new(), next_pk: 0 }
  }

  /// Number of live facts in the store.
  pub fn len(&self) -> usize { self.facts.len() }

  pub fn is_empty(&self) -> bool { self.facts.is_empty() }

  /// All stored facts in start order. Test-support accessor.
  pub fn all(&self) -> &[Fact] { &self.facts }

  /// Look up a stored fact by pk.
  pub fn get(&self, pk: i64) -> Option<&Fact> {
    self.facts.iter().find(|f| f.pk == Some(pk))
  }

  fn sort(&mut self) {
    // Every stored fact has a resolved start; `save` guarantees it.
    self.facts.sort_by_key(|f| f.start_instant());
  }

  fn validate(&self, fact: &Fact, ignore_pks: &[i64]) -> Result<()> {
    let Some(start) = fact.start_instant() else {
      return Err(Error::UnresolvedTimes(fact.summary()));
    };
    if fact.end.as_ref().is_some_and(|spec| spec.is_raw()) {
      return Err(Error::UnresolvedTimes(fact.summary()));
    }
    let end = end_or_max(fact);

    for stored in &self.facts {
      let pk = stored.pk.unwrap_or_default();
      if stored.pk == fact.pk || ignore_pks.contains(&pk) {
        continue;
      }
      if fact.end.is_none() && stored.end.is_none() {
        return Err(Error::OngoingExists(pk));
      }
      let s_start = stored.start_instant().unwrap_or(DateTime::<Utc>::MAX_UTC);
      let s_end = end_or_max(stored);
      // Half-open windows: touching edges do not overlap.
      if start < s_end && s_start < end {
        return Err(Error::Overlap(pk));
      }
    }
    Ok(())
  }
}

// ─── FactStore impl ──────────────────────────────────────────────────────────

impl FactStore for MemoryStore {
  type Error = Error;

  fn surrounding(&self, instant: DateTime<Utc>) -> Result<Vec<Fact>> {
    Ok(
      self
        .facts
        .iter()
        .filter(|f| {
          f.start_instant().is_some_and(|s| s <= instant)
            && instant < end_or_max(f)
        })
        .cloned()
        .collect(),
    )
  }

  fn antecedent(&self, before: DateTime<Utc>) -> Result<Option<Fact>> {
    // The latest fact ending at or before `before`; the ongoing fact counts
    // if it started by then (keyed by its start, since it has no end).
    Ok(
      self
        .facts
        .iter()
        .filter_map(|f| match f.end_instant() {
          Some(end) if end <= before => Some((end, f)),
          Some(_) => None,
          None => f.start_instant().filter(|s| *s <= before).map(|s| (s, f)),
        })
        .max_by_key(|(key, _)| *key)
        .map(|(_, f)| f.clone()),
    )
  }

  fn subsequent(&self, after: DateTime<Utc>) -> Result<Option<Fact>> {
    Ok(
      self
        .facts
        .iter()
        .filter(|f| f.start_instant().is_some_and(|s| s >= after))
        .min_by_key(|f| f.start_instant())
        .cloned(),
    )
  }

  fn starting_at(&self, fact: &Fact) -> Result<Option<Fact>> {
    let Some(start) = fact.start_instant() else { return Ok(None) };
    Ok(
      self
        .facts
        .iter()
        .find(|f| f.pk != fact.pk && f.start_instant() == Some(start))
        .cloned(),
    )
  }

  fn ending_at(&self, fact: &Fact) -> Result<Option<Fact>> {
    let Some(end) = fact.end_instant() else { return Ok(None) };
    Ok(
      self
        .facts
        .iter()
        .find(|f| f.pk != fact.pk && f.end_instant() == Some(end))
        .cloned(),
    )
  }

  fn strictly_during(
    &self,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> Result<Vec<Fact>> {
    // Start-strict, end-inclusive: a fact sharing the query's start edge is
    // already found by `surrounding(start)`.
    Ok(
      self
        .facts
        .iter()
        .filter(|f| {
          f.start_instant().is_some_and(|s| s > start)
            && f.end_instant().is_some_and(|e| e <= end)
        })
        .cloned()
        .collect(),
    )
  }

  fn endless(&self) -> Result<Vec<Fact>> {
    Ok(self.facts.iter().filter(|f| f.end.is_none()).cloned().collect())
  }

  fn save(&mut self, fact: Fact, ignore_pks: &[i64]) -> Result<Option<Fact>> {
    if fact.deleted {
      // Never-persisted tombstones are dropped, not written.
      let Some(pk) = fact.pk.filter(|pk| *pk > 0) else {
        return Ok(None);
      };
      let index = self
        .facts
        .iter()
        .position(|f| f.pk == Some(pk))
        .ok_or(Error::FactNotFound(pk))?;
      self.facts.remove(index);
      let mut gone = fact;
      gone.dirty_reasons.clear();
      return Ok(Some(gone));
    }

    self.validate(&fact, ignore_pks)?;

    let mut stored = fact;
    match stored.pk {
      Some(pk) if pk > 0 => {}
      // None or a negative placeholder: assign the next real pk.
      _ => {
        self.next_pk += 1;
        stored.pk = Some(self.next_pk);
      }
    }
    stored.dirty_reasons.clear();

    if let Some(slot) = self.facts.iter_mut().find(|f| f.pk == stored.pk) {
      *slot = stored.clone();
    } else {
      self.facts.push(stored.clone());
    }
    self.sort();
    Ok(Some(stored))
  }
}
