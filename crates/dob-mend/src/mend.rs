//! Conflict resolution and the pipeline entry points.
//!
//! `mend_times` resolves a batch's time expressions against its stored
//! neighbourhood; `resolve_conflicts` turns the detector's findings for one
//! new fact into reason-tagged [`Edit`]s; `commit_edits` persists a
//! confirmed mutation set as a unit. Originals are snapshotted at detection
//! time and never mutated, so an aborted confirmation simply discards the
//! edited copies.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use dob_core::{
  Error, Result,
  config::MendConfig,
  fact::{DirtyReason, Fact},
  store::FactStore,
};
use tracing::debug;

use crate::{
  conflict::{Conflict, Edit},
  detect::{Detected, MatchRule, detect_conflicts},
  resolve::TimeResolver,
  token::FriendlyParser,
};

// ─── Time hints ──────────────────────────────────────────────────────────────

/// How the invoking command verb frames the new fact's times. The string
/// forms match the CLI's `--time-hint` values.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  strum::Display,
  strum::EnumString,
)]
pub enum TimeHint {
  /// "Start now": no boundary given, fact begins open-ended.
  #[default]
  #[strum(serialize = "verify-none")]
  VerifyNone,
  /// "Start at X": start given, end stays open.
  #[strum(serialize = "verify-start")]
  VerifyStart,
  /// "Stop at X": end given, start inferred (often a squash).
  #[strum(serialize = "verify-end")]
  VerifyEnd,
  /// Both boundaries given or inferable; blanks are filled (imports).
  #[strum(serialize = "verify-both")]
  VerifyBoth,
  /// "Then": begins where the previous fact ended, open-ended.
  #[strum(serialize = "verify-then")]
  VerifyThen,
  /// "Still": like then, and carries the previous activity and tags over.
  #[strum(serialize = "verify-still")]
  VerifyStill,
  /// "After": begins where the previous fact ended, end given or open.
  #[strum(serialize = "verify-after")]
  VerifyAfter,
}

impl TimeHint {
  /// Single-add verbs leave the open edge blank; batch/import callers get
  /// every blank filled.
  pub fn leave_blanks(self) -> bool {
    !matches!(self, Self::VerifyBoth)
  }

  /// `still` continues the previous activity.
  pub fn carries_activity(self) -> bool {
    matches!(self, Self::VerifyStill)
  }

  /// Whether a start-less fact should begin at the previous fact's end.
  /// `verify-end` chains too: "stop at X" with no start means "since the
  /// previous fact ended". When the previous fact is still ongoing it has
  /// no end to chain from, and the fact falls through to the squash path.
  pub fn chains_to_previous(self) -> bool {
    matches!(
      self,
      Self::VerifyEnd | Self::VerifyThen | Self::VerifyStill | Self::VerifyAfter,
    )
  }
}

// ─── mend_times ──────────────────────────────────────────────────────────────

/// Resolve every raw or missing boundary in `facts` (a chronological batch)
/// against the store's neighbourhood and "now".
///
/// Returns the conflicts the resolver could not settle; the caller decides
/// whether to render them for confirmation or abort. With `skip_store` the
/// batch is resolved in isolation (no antecedent/subsequent anchors).
pub fn mend_times<S: FactStore>(
  store: &S,
  facts: &mut Vec<Fact>,
  hint: TimeHint,
  config: &MendConfig,
  friendly: &dyn FriendlyParser,
  now: DateTime<Utc>,
  skip_store: bool,
) -> Result<Vec<Conflict>> {
  let (antecedent, subsequent) = if skip_store {
    (None, None)
  } else {
    let first = earliest_known(facts).unwrap_or(now);
    let last = latest_known(facts).unwrap_or(now);
    (
      store.antecedent(first).map_err(Error::store)?,
      store.subsequent(last).map_err(Error::store)?,
    )
  };

  if let Some(previous) = antecedent.as_ref() {
    if let Some(fact) = facts.first_mut() {
      if hint.carries_activity() && fact.activity.is_none() {
        fact.activity = previous.activity.clone();
        fact.tags.extend(previous.tags.iter().cloned());
      }
      if hint.chains_to_previous() && fact.start.is_none() {
        if let Some(end) = previous.end_instant() {
          fact.set_start(end);
        }
      }
    }
  }

  let resolver = TimeResolver {
    config,
    friendly,
    now,
    antecedent: antecedent.as_ref(),
    subsequent: subsequent.as_ref(),
  };
  Ok(resolver.resolve_batch(facts, hint.leave_blanks()))
}

fn earliest_known(facts: &[Fact]) -> Option<DateTime<Utc>> {
  facts
    .iter()
    .flat_map(|f| [f.start_instant(), f.end_instant()])
    .flatten()
    .min()
}

fn latest_known(facts: &[Fact]) -> Option<DateTime<Utc>> {
  facts
    .iter()
    .flat_map(|f| [f.start_instant(), f.end_instant()])
    .flatten()
    .max()
}

// ─── resolve_conflicts ───────────────────────────────────────────────────────

/// Resolve one new fact against the store: detect interacting stored facts
/// and derive the minimal reason-tagged mutation set that removes every
/// overlap.
///
/// Resolves exactly one new fact at a time; batch callers feed their facts
/// through in chronological order, re-querying between facts.
///
/// The only raised error beyond store failures is
/// [`Error::ZerothFactMustStart`]: a start-less fact in an otherwise empty
/// store has nothing to infer a start from.
pub fn resolve_conflicts<S: FactStore>(
  store: &S,
  new_fact: &mut Fact,
  config: &MendConfig,
  now: DateTime<Utc>,
) -> Result<Vec<Edit>> {
  if new_fact.start_instant().is_none() {
    let reference = new_fact.end_instant().unwrap_or(now);
    let anchored =
      store.antecedent(reference).map_err(Error::store)?.is_some();
    if !anchored && store.endless().map_err(Error::store)?.is_empty() {
      return Err(Error::ZerothFactMustStart);
    }
  }

  let detected = detect_conflicts(store, new_fact, now)?;

  let mut edits = Vec::new();
  let mut resolved_pks = BTreeSet::new();
  // Fresh pks for right-hand split copies, pending until saved.
  let mut placeholder_pk = -1;

  for Detected { fact: existing, rule } in detected {
    if let Some(pk) = existing.pk {
      // First resolution wins when a fact matched via several rules.
      if !resolved_pks.insert(pk) {
        continue;
      }
    }
    edits.extend(resolve_one(
      new_fact,
      &existing,
      rule,
      config,
      &mut placeholder_pk,
    ));
  }
  Ok(edits)
}

/// Apply the per-conflict decision table to one stored fact. Returns zero
/// edits for touching-only matches, two for a split, one otherwise.
fn resolve_one(
  new_fact: &mut Fact,
  existing: &Fact,
  rule: MatchRule,
  config: &MendConfig,
  placeholder_pk: &mut i64,
) -> Vec<Edit> {
  if rule == MatchRule::OngoingAntecedent
    || (new_fact.start_instant().is_none() && existing.end.is_none())
  {
    return vec![squash(new_fact, existing, config)];
  }

  // Every remaining row compares concrete windows. An open new end covers
  // everything after the new start.
  let (Some(n_start), Some(c_start)) =
    (new_fact.start_instant(), existing.start_instant())
  else {
    return Vec::new();
  };
  let n_end = new_fact.end_instant().unwrap_or(DateTime::<Utc>::MAX_UTC);

  let original = existing.clone();
  let mut edited = existing.clone();

  match existing.end_instant() {
    // C is the ongoing fact.
    None => {
      if n_start <= c_start {
        edited.deleted = true;
        edited.mark_dirty(DirtyReason::DeletedStartsBefore);
        debug!(fact = %original.summary(), "deleting ongoing fact covered by new fact");
      } else {
        edited.set_end(n_start);
        edited.mark_dirty(DirtyReason::End);
        edited.mark_dirty(DirtyReason::Stopped);
        debug!(fact = %original.summary(), "stopping ongoing fact at new start");
      }
      vec![Edit { edited, original }]
    }

    Some(c_end) => {
      if n_start <= c_start && n_end >= c_end {
        // Momentaneous exception: a permitted zero-length fact sitting
        // exactly on the new fact's start edge is spared. Deliberately
        // asymmetric — the end-edge coincidence is not guarded.
        if config.allow_momentaneous
          && existing.is_momentaneous()
          && c_start == n_start
        {
          debug!(fact = %original.summary(), "sparing momentaneous fact on start edge");
          return Vec::new();
        }
        edited.deleted = true;
        edited.mark_dirty(DirtyReason::DeletedStartsBefore);
        edited.mark_dirty(DirtyReason::DeletedEndsAfter);
        vec![Edit { edited, original }]
      } else if n_start <= c_start {
        // New fact covers C's head: push C's start forward.
        if c_start == n_end {
          return Vec::new(); // touching, nothing to mend
        }
        edited.set_start(n_end);
        edited.mark_dirty(DirtyReason::Start);
        vec![Edit { edited, original }]
      } else if n_end >= c_end {
        // New fact covers C's tail: pull C's end back.
        if c_end == n_start {
          return Vec::new();
        }
        edited.set_end(n_start);
        edited.mark_dirty(DirtyReason::End);
        vec![Edit { edited, original }]
      } else {
        split(new_fact, existing, placeholder_pk)
      }
    }
  }
}

// ─── Squash ──────────────────────────────────────────────────────────────────

/// Fold `new_fact` into the ongoing fact it continues: the ongoing fact is
/// closed at the absorbed fact's end (or start), takes over its activity if
/// one was given, unions its tags, and joins the descriptions with the
/// configured separator. The absorbed fact is tombstoned in place.
pub fn squash(new_fact: &mut Fact, ongoing: &Fact, config: &MendConfig) -> Edit {
  let original = ongoing.clone();
  let mut edited = ongoing.clone();

  if let Some(end) = new_fact.end_instant().or(new_fact.start_instant()) {
    edited.set_end(end);
  }
  if new_fact.activity.is_some() {
    edited.activity = new_fact.activity.clone();
  }
  edited.tags.extend(new_fact.tags.iter().cloned());
  edited.description =
    original.squashed_description(new_fact, &config.squash_separator);
  edited.mark_dirty(DirtyReason::Squash);

  new_fact.deleted = true;
  new_fact.mark_dirty(DirtyReason::Squash);
  debug!(into = %original.summary(), "squashed new fact into ongoing fact");

  Edit { edited, original }
}

// ─── Split ───────────────────────────────────────────────────────────────────

/// The new fact lies strictly inside `existing`: divide the stored fact
/// into a left remainder (keeps the original pk) ending at the new start
/// and a right remainder (fresh pending pk, back-referenced via
/// `split_from`) beginning at the new end.
fn split(new_fact: &Fact, existing: &Fact, placeholder_pk: &mut i64) -> Vec<Edit> {
  // Callers guarantee both boundaries here.
  let (Some(n_start), Some(n_end)) =
    (new_fact.start_instant(), new_fact.end_instant())
  else {
    return Vec::new();
  };
  let original = existing.clone();

  let mut left = existing.clone();
  left.set_end(n_start);
  left.mark_dirty(DirtyReason::Lsplit);

  let mut right = existing.clone();
  right.pk = Some(*placeholder_pk);
  *placeholder_pk -= 1;
  right.split_from = existing.pk;
  right.set_start(n_end);
  right.mark_dirty(DirtyReason::Rsplit);

  debug!(
    fact = %original.summary(),
    left = %left.summary(),
    right = %right.summary(),
    "split stored fact around new fact",
  );
  vec![
    Edit { edited: left, original: original.clone() },
    Edit { edited: right, original },
  ]
}

// ─── Persistence boundary ────────────────────────────────────────────────────

/// Persist one confirmed mutation set as a unit: every edited stored fact,
/// then the new fact itself. Nothing here runs before the caller has
/// confirmed; an abort is simply never calling this.
///
/// Returns the canonical stored copies, the new fact last (absent if it was
/// squashed away before ever being persisted).
pub fn commit_edits<S: FactStore>(
  store: &mut S,
  new_fact: Fact,
  edits: Vec<Edit>,
) -> Result<Vec<Fact>> {
  let ignore_pks: Vec<i64> =
    edits.iter().filter_map(|edit| edit.original.pk).collect();

  let mut stored = Vec::new();
  for edit in edits {
    if let Some(fact) =
      store.save(edit.edited, &ignore_pks).map_err(Error::store)?
    {
      stored.push(fact);
    }
  }
  if let Some(fact) = store.save(new_fact, &ignore_pks).map_err(Error::store)? {
    stored.push(fact);
  }
  Ok(stored)
}
