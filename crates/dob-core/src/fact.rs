//! Fact types — the fundamental unit of the dob time tracker.
//!
//! A fact is a single tracked interval: an activity, optional category, tags,
//! and a free-text description, bounded by a start and an end. Exactly one
//! fact in the store may be "ongoing" (no end) at any time.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Time specification ──────────────────────────────────────────────────────

/// A fact boundary as entered by the user.
///
/// User input arrives as raw tokens ("12:34", "-30", "yesterday 3pm"); the
/// mending pipeline replaces each token in place with an absolute instant
/// once it has been resolved against its anchors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TimeSpec {
  /// A fully resolved absolute instant.
  At(DateTime<Utc>),
  /// An uninterpreted token string, owned by the fact until resolution.
  Raw(String),
}

impl TimeSpec {
  /// The absolute instant, if this spec has been resolved.
  pub fn instant(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::At(dt) => Some(*dt),
      Self::Raw(_) => None,
    }
  }

  pub fn is_raw(&self) -> bool { matches!(self, Self::Raw(_)) }
}

// ─── Activity ────────────────────────────────────────────────────────────────

/// What the user was doing: an activity name plus an optional category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
  pub name:     String,
  pub category: Option<String>,
}

impl Activity {
  pub fn named(name: impl Into<String>) -> Self {
    Self { name: name.into(), category: None }
  }
}

// ─── Dirty reasons ───────────────────────────────────────────────────────────

/// What kind of mutation produced this version of a fact.
///
/// Transient bookkeeping only — used for user-facing conflict reporting and
/// never persisted. The string forms (via `Display`/`FromStr`) match the
/// reason codes shown in confirmation prompts.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  strum::Display,
  strum::EnumString,
)]
pub enum DirtyReason {
  /// The fact's start was truncated forward.
  #[strum(serialize = "start")]
  Start,
  /// The fact's end was truncated backward.
  #[strum(serialize = "end")]
  End,
  /// The fact was the ongoing fact and has been closed.
  #[strum(serialize = "stopped")]
  Stopped,
  /// Deleted because the new fact starts at or before this one.
  #[strum(serialize = "deleted-starts_before")]
  DeletedStartsBefore,
  /// Deleted because the new fact ends at or after this one.
  #[strum(serialize = "deleted-ends_after")]
  DeletedEndsAfter,
  /// The left remainder of a split; keeps the original pk.
  #[strum(serialize = "lsplit")]
  Lsplit,
  /// The right remainder of a split; gets a fresh pending pk.
  #[strum(serialize = "rsplit")]
  Rsplit,
  /// Absorbed into (or absorbed) an adjacent fact.
  #[strum(serialize = "squash")]
  Squash,
}

// ─── Fact ────────────────────────────────────────────────────────────────────

/// A single tracked interval of time.
///
/// `pk` is `None` before any assignment, negative while pending (e.g. the
/// right half of a split that has not been saved yet), and positive once
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
  pub pk:            Option<i64>,
  pub start:         Option<TimeSpec>,
  /// `None` means "ongoing" once resolution is complete; before the
  /// blank-fill pass it may simply mean "not specified yet".
  pub end:           Option<TimeSpec>,
  pub activity:      Option<Activity>,
  #[serde(default)]
  pub tags:          BTreeSet<String>,
  pub description:   Option<String>,
  /// Tombstone flag. A deleted fact that was never persisted is dropped
  /// entirely rather than saved.
  #[serde(default)]
  pub deleted:       bool,
  /// Back-reference to the pk this fact was split from, if any.
  pub split_from:    Option<i64>,
  /// See [`DirtyReason`]. Never persisted.
  #[serde(skip)]
  pub dirty_reasons: BTreeSet<DirtyReason>,
}

impl Default for Fact {
  fn default() -> Self {
    Self {
      pk:            None,
      start:         None,
      end:           None,
      activity:      None,
      tags:          BTreeSet::new(),
      description:   None,
      deleted:       false,
      split_from:    None,
      dirty_reasons: BTreeSet::new(),
    }
  }
}

impl Fact {
  pub fn new() -> Self { Self::default() }

  // ── Time accessors ────────────────────────────────────────────────────

  /// The resolved start instant, if any.
  pub fn start_instant(&self) -> Option<DateTime<Utc>> {
    self.start.as_ref().and_then(TimeSpec::instant)
  }

  /// The resolved end instant, if any.
  pub fn end_instant(&self) -> Option<DateTime<Utc>> {
    self.end.as_ref().and_then(TimeSpec::instant)
  }

  pub fn set_start(&mut self, at: DateTime<Utc>) {
    self.start = Some(TimeSpec::At(at));
  }

  pub fn set_end(&mut self, at: DateTime<Utc>) {
    self.end = Some(TimeSpec::At(at));
  }

  /// Both bounds, when both are resolved.
  pub fn time_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    Some((self.start_instant()?, self.end_instant()?))
  }

  // ── Predicates ────────────────────────────────────────────────────────

  /// Has this fact ever been assigned a real (positive) store pk?
  pub fn is_persisted(&self) -> bool {
    matches!(self.pk, Some(pk) if pk > 0)
  }

  /// An ongoing fact has a resolved start and no end at all.
  pub fn is_ongoing(&self) -> bool {
    self.start_instant().is_some() && self.end.is_none()
  }

  /// A momentaneous fact starts and ends at the same instant.
  pub fn is_momentaneous(&self) -> bool {
    match self.time_window() {
      Some((start, end)) => start == end,
      None => false,
    }
  }

  pub fn has_description(&self) -> bool {
    self.description.as_deref().is_some_and(|d| !d.trim().is_empty())
  }

  // ── Mutation bookkeeping ──────────────────────────────────────────────

  pub fn mark_dirty(&mut self, reason: DirtyReason) {
    self.dirty_reasons.insert(reason);
  }

  pub fn is_dirty(&self, reason: DirtyReason) -> bool {
    self.dirty_reasons.contains(&reason)
  }

  /// Join this fact's description with `other`'s, separated by `separator`.
  /// Used when squashing two facts into one.
  pub fn squashed_description(
    &self,
    other: &Fact,
    separator: &str,
  ) -> Option<String> {
    match (self.description.as_deref(), other.description.as_deref()) {
      (Some(a), Some(b)) => Some(format!("{a}{separator}{b}")),
      (Some(a), None) => Some(a.to_string()),
      (None, Some(b)) => Some(b.to_string()),
      (None, None) => None,
    }
  }

  /// Short human-readable form for conflict messages, e.g.
  /// `"09:00–10:00 coding@dev"`.
  pub fn summary(&self) -> String {
    let bound = |spec: &Option<TimeSpec>| match spec {
      Some(TimeSpec::At(dt)) => dt.format("%Y-%m-%d %H:%M").to_string(),
      Some(TimeSpec::Raw(tok)) => format!("{tok:?}"),
      None => "…".to_string(),
    };
    let activity = match &self.activity {
      Some(Activity { name, category: Some(cat) }) => format!(" {name}@{cat}"),
      Some(Activity { name, category: None }) => format!(" {name}"),
      None => String::new(),
    };
    format!("{}–{}{activity}", bound(&self.start), bound(&self.end))
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use chrono::TimeZone;

  use super::*;

  fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 20, h, m, 0).unwrap()
  }

  #[test]
  fn dirty_reason_string_forms() {
    assert_eq!(DirtyReason::DeletedStartsBefore.to_string(), "deleted-starts_before");
    assert_eq!(DirtyReason::Lsplit.to_string(), "lsplit");
    assert_eq!(DirtyReason::from_str("squash").unwrap(), DirtyReason::Squash);
  }

  #[test]
  fn ongoing_requires_resolved_start() {
    let mut fact = Fact::new();
    assert!(!fact.is_ongoing());

    fact.start = Some(TimeSpec::Raw("-30".into()));
    assert!(!fact.is_ongoing());

    fact.set_start(at(9, 0));
    assert!(fact.is_ongoing());

    fact.set_end(at(10, 0));
    assert!(!fact.is_ongoing());
  }

  #[test]
  fn momentaneous_needs_both_bounds_equal() {
    let mut fact = Fact::new();
    fact.set_start(at(9, 0));
    assert!(!fact.is_momentaneous());
    fact.set_end(at(9, 0));
    assert!(fact.is_momentaneous());
    fact.set_end(at(9, 1));
    assert!(!fact.is_momentaneous());
  }

  #[test]
  fn squashed_description_joins_both_sides() {
    let mut a = Fact::new();
    a.description = Some("morning standup".into());
    let mut b = Fact::new();
    b.description = Some("code review".into());

    assert_eq!(
      a.squashed_description(&b, ", ").as_deref(),
      Some("morning standup, code review"),
    );
    b.description = None;
    assert_eq!(a.squashed_description(&b, ", ").as_deref(), Some("morning standup"));
  }

  #[test]
  fn dirty_reasons_not_serialized() {
    let mut fact = Fact::new();
    fact.set_start(at(9, 0));
    fact.mark_dirty(DirtyReason::Stopped);

    let json = serde_json::to_string(&fact).unwrap();
    assert!(!json.contains("stopped"));

    let back: Fact = serde_json::from_str(&json).unwrap();
    assert!(back.dirty_reasons.is_empty());
    assert_eq!(back.start_instant(), Some(at(9, 0)));
  }
}
