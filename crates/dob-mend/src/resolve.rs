//! Time-expression resolution — the three-pass algorithm.
//!
//! A batch of facts arrives in chronological order with some boundaries
//! absolute, some raw tokens, some missing. Three passes fill them in, each
//! carrying a running "previous absolute time" left to right across `start`
//! then `end` of each fact; a cleanup pass culls disallowed momentaneous
//! facts; a final sanity pass collects (never throws) ordering violations.
//!
//! Processing out of chronological order silently corrupts relative-time
//! inference, so callers must keep the batch sorted.

use chrono::{DateTime, Duration, Utc};
use dob_core::{
  config::MendConfig,
  fact::{Fact, TimeSpec},
};
use tracing::debug;

use crate::{
  conflict::Conflict,
  token::{FriendlyParser, ParseOutcome, Snap, TimeToken, classify, nearest_occurrence},
};

// ─── Field selector ──────────────────────────────────────────────────────────

/// Which boundary of a fact a pass is currently working on. Passes always
/// visit `Start` then `End`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Start,
  End,
}

impl Field {
  fn raw_token(self, fact: &Fact) -> Option<String> {
    let spec = match self {
      Self::Start => fact.start.as_ref(),
      Self::End => fact.end.as_ref(),
    };
    match spec {
      Some(TimeSpec::Raw(token)) => Some(token.clone()),
      _ => None,
    }
  }

  fn instant(self, fact: &Fact) -> Option<DateTime<Utc>> {
    match self {
      Self::Start => fact.start_instant(),
      Self::End => fact.end_instant(),
    }
  }

  /// The fact's other boundary, if already absolute.
  fn opposite_instant(self, fact: &Fact) -> Option<DateTime<Utc>> {
    match self {
      Self::Start => fact.end_instant(),
      Self::End => fact.start_instant(),
    }
  }

  fn set(self, fact: &mut Fact, at: DateTime<Utc>) {
    match self {
      Self::Start => fact.set_start(at),
      Self::End => fact.set_end(at),
    }
  }

  fn name(self) -> &'static str {
    match self {
      Self::Start => "start",
      Self::End => "end",
    }
  }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Resolves a chronological batch of facts against its neighbourhood: the
/// nearest stored fact before the batch, the nearest after, and "now".
pub struct TimeResolver<'a> {
  pub config:     &'a MendConfig,
  pub friendly:   &'a dyn FriendlyParser,
  pub now:        DateTime<Utc>,
  pub antecedent: Option<&'a Fact>,
  pub subsequent: Option<&'a Fact>,
}

impl TimeResolver<'_> {
  /// Run all passes over `facts`, mutating them in place. Returns the
  /// conflicts found; an empty result means every boundary resolved and the
  /// batch is consistent.
  ///
  /// With `leave_blanks` the blank-fill pass is skipped, so a trailing fact
  /// may legitimately stay open-ended (the single-add path relies on this).
  pub fn resolve_batch(
    &self,
    facts: &mut Vec<Fact>,
    leave_blanks: bool,
  ) -> Vec<Conflict> {
    self.pass_clock_times(facts);
    self.pass_relative_offsets(facts);
    if !leave_blanks {
      self.pass_fill_blanks(facts);
    }
    self.cull_momentaneous(facts);
    self.sanity_check(facts, leave_blanks)
  }

  /// The running anchor carried into the batch from the store side.
  fn lead_anchor(&self) -> Option<DateTime<Utc>> {
    self
      .antecedent
      .and_then(|f| f.end_instant().or(f.start_instant()))
  }

  // ── Pass 1: clock times ───────────────────────────────────────────────

  /// Give every bare clock-time token a date via the nearest-occurrence
  /// rule: at-or-before when anchored to the fact's own end, at-or-after
  /// when anchored to its start or to the running previous time, and
  /// at-or-before "now" when nothing else anchors it.
  fn pass_clock_times(&self, facts: &mut [Fact]) {
    let mut prev = self.lead_anchor();
    for fact in facts.iter_mut() {
      for field in [Field::Start, Field::End] {
        if let Some(token) = field.raw_token(fact) {
          match classify(&token, self.friendly, self.now) {
            ParseOutcome::Resolved(at) => field.set(fact, at),
            ParseOutcome::NeedsAnchor(TimeToken::Clock(time)) => {
              let resolved = match (field, field.opposite_instant(fact)) {
                (Field::Start, Some(end)) => {
                  nearest_occurrence(time, end, Snap::AtOrBefore)
                }
                (Field::End, Some(start)) => {
                  nearest_occurrence(time, start, Snap::AtOrAfter)
                }
                (_, None) => match prev {
                  Some(prev) => nearest_occurrence(time, prev, Snap::AtOrAfter),
                  None => nearest_occurrence(time, self.now, Snap::AtOrBefore),
                },
              };
              debug!(token = %token, %resolved, field = field.name(), "resolved clock time");
              field.set(fact, resolved);
            }
            // Relative offsets wait for pass 2; unparseable tokens surface
            // in the sanity pass.
            _ => {}
          }
        }
        if let Some(at) = field.instant(fact) {
          prev = Some(at);
        }
      }
    }
  }

  // ── Pass 2: relative offsets ──────────────────────────────────────────

  /// Resolve signed-offset tokens. A negative offset anchors to the field's
  /// own opposite boundary, falling back to the running previous time, then
  /// the next known time; a positive offset anchors to the running previous
  /// time, falling back to the next known time. Either way the resolution
  /// is `anchor + signed_delta`.
  fn pass_relative_offsets(&self, facts: &mut Vec<Fact>) {
    let mut prev = self.lead_anchor();
    for i in 0..facts.len() {
      for field in [Field::Start, Field::End] {
        if let Some(token) = field.raw_token(&facts[i]) {
          if let ParseOutcome::NeedsAnchor(TimeToken::Relative(delta)) =
            classify(&token, self.friendly, self.now)
          {
            let anchor = if delta < Duration::zero() {
              field
                .opposite_instant(&facts[i])
                .or(prev)
                .or_else(|| self.next_known(facts, i, field))
            } else {
              prev.or_else(|| self.next_known(facts, i, field))
            };
            match anchor {
              Some(anchor) => {
                let resolved = anchor + delta;
                debug!(token = %token, %resolved, field = field.name(), "resolved relative offset");
                field.set(&mut facts[i], resolved);
              }
              // Left raw; the sanity pass reports it.
              None => debug!(token = %token, "no anchor for relative offset"),
            }
          }
        }
        if let Some(at) = field.instant(&facts[i]) {
          prev = Some(at);
        }
      }
    }
  }

  /// The next absolute time at or after `facts[i]`'s `field`, scanning the
  /// rest of the batch in chronological field order, then the subsequent
  /// stored fact.
  fn next_known(
    &self,
    facts: &[Fact],
    i: usize,
    field: Field,
  ) -> Option<DateTime<Utc>> {
    if field == Field::Start {
      if let Some(end) = facts[i].end_instant() {
        return Some(end);
      }
    }
    for fact in &facts[i + 1..] {
      if let Some(at) = fact.start_instant().or(fact.end_instant()) {
        return Some(at);
      }
    }
    self.subsequent.and_then(|f| f.start_instant())
  }

  // ── Pass 3: blank fill ────────────────────────────────────────────────

  /// Fill boundaries that are still missing: starts from the running
  /// previous time, ends from the next known time, or "now" at the end of
  /// the batch.
  fn pass_fill_blanks(&self, facts: &mut Vec<Fact>) {
    let mut prev = self.lead_anchor();
    for i in 0..facts.len() {
      if facts[i].start.is_none() {
        if let Some(at) = prev {
          debug!(%at, "filled blank start");
          facts[i].set_start(at);
        }
        // A first fact with no start and no antecedent stays blank; the
        // sanity pass (or the zeroth-fact check downstream) reports it.
      }
      if let Some(at) = facts[i].start_instant() {
        prev = Some(at);
      }

      if facts[i].end.is_none() {
        let at = self
          .next_known(facts, i, Field::End)
          .unwrap_or(self.now);
        debug!(%at, "filled blank end");
        facts[i].set_end(at);
      }
      if let Some(at) = facts[i].end_instant() {
        prev = Some(at);
      }
    }
  }

  // ── Pass 4: momentaneous cull ─────────────────────────────────────────

  /// Drop zero-length facts without a description unless the store allows
  /// momentaneous facts.
  fn cull_momentaneous(&self, facts: &mut Vec<Fact>) {
    if self.config.allow_momentaneous {
      return;
    }
    facts.retain(|fact| {
      let cull = fact.is_momentaneous() && !fact.has_description();
      if cull {
        debug!(fact = %fact.summary(), "culled momentaneous fact");
      }
      !cull
    });
  }

  // ── Pass 5: sanity ────────────────────────────────────────────────────

  /// Verify the batch plus its anchors: every boundary resolved (unless
  /// blanks were left on purpose), `start <= end` per fact, and no fact
  /// overlapping its neighbours. Violations are collected, not thrown.
  fn sanity_check(&self, facts: &[Fact], leave_blanks: bool) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for fact in facts {
      for field in [Field::Start, Field::End] {
        if let Some(token) = field.raw_token(fact) {
          conflicts.push(Conflict::new(
            fact.clone(),
            None,
            format!("unable to resolve the {} time {token:?}", field.name()),
          ));
        } else if field.instant(fact).is_none() {
          // Only the end edge may legitimately stay open (an ongoing
          // fact); a missing start is tolerated only when an ongoing
          // antecedent is there to absorb the fact downstream.
          let open_ok = match field {
            Field::End => leave_blanks,
            Field::Start => {
              self.antecedent.is_some_and(|f| f.is_ongoing())
            }
          };
          if !open_ok {
            conflicts.push(Conflict::new(
              fact.clone(),
              None,
              format!("no {} time could be inferred", field.name()),
            ));
          }
        }
      }
      if let Some((start, end)) = fact.time_window() {
        if start > end {
          conflicts.push(Conflict::new(
            fact.clone(),
            None,
            "fact starts after it ends",
          ));
        }
      }
    }

    let chain: Vec<&Fact> = self
      .antecedent
      .into_iter()
      .chain(facts.iter())
      .chain(self.subsequent)
      .collect();
    for pair in chain.windows(2) {
      let (before, after) = (pair[0], pair[1]);
      if let (Some(before_end), Some(after_start)) =
        (before.end_instant(), after.start_instant())
      {
        if after_start < before_end {
          conflicts.push(Conflict::new(
            after.clone(),
            Some(before.clone()),
            "fact starts before the previous fact ends",
          ));
        }
      }
    }

    conflicts
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use dob_core::fact::Activity;

  use super::*;
  use crate::token::NoFriendly;

  fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, d, h, m, 0).unwrap()
  }

  fn raw(token: &str) -> Option<TimeSpec> {
    Some(TimeSpec::Raw(token.into()))
  }

  fn resolver<'a>(config: &'a MendConfig, now: DateTime<Utc>) -> TimeResolver<'a> {
    TimeResolver {
      config,
      friendly: &NoFriendly,
      now,
      antecedent: None,
      subsequent: None,
    }
  }

  fn fact_with(start: Option<TimeSpec>, end: Option<TimeSpec>) -> Fact {
    let mut fact = Fact::new();
    fact.start = start;
    fact.end = end;
    fact.activity = Some(Activity::named("coding"));
    fact
  }

  #[test]
  fn import_batch_relative_example() {
    // [{start:"09:00", end:"+1h"}, {start:"+0", end:"+1h"}] resolves to
    // [09:00,10:00) and [10:00,11:00): each "+1h" applies to its own
    // fact's start, carried via the running previous time.
    let config = MendConfig::default();
    let now = at(20, 12, 0);
    let mut facts = vec![
      fact_with(raw("09:00"), raw("+1h")),
      fact_with(raw("+0"), raw("+1h")),
    ];

    let conflicts = resolver(&config, now).resolve_batch(&mut facts, false);
    assert!(conflicts.is_empty(), "{conflicts:?}");
    assert_eq!(facts[0].time_window(), Some((at(20, 9, 0), at(20, 10, 0))));
    assert_eq!(facts[1].time_window(), Some((at(20, 10, 0), at(20, 11, 0))));
  }

  #[test]
  fn clock_start_anchors_before_now_without_other_anchors() {
    // Entered at 01:30, "23:00" means 23:00 yesterday.
    let config = MendConfig::default();
    let now = at(21, 1, 30);
    let mut facts = vec![fact_with(raw("23:00"), None)];

    let conflicts = resolver(&config, now).resolve_batch(&mut facts, true);
    assert!(conflicts.is_empty());
    assert_eq!(facts[0].start_instant(), Some(at(20, 23, 0)));
    assert!(facts[0].end.is_none());
  }

  #[test]
  fn clock_start_anchors_before_own_end() {
    let config = MendConfig::default();
    let now = at(21, 12, 0);
    let mut facts =
      vec![fact_with(raw("23:00"), Some(TimeSpec::At(at(21, 1, 0))))];

    let conflicts = resolver(&config, now).resolve_batch(&mut facts, false);
    assert!(conflicts.is_empty());
    assert_eq!(facts[0].time_window(), Some((at(20, 23, 0), at(21, 1, 0))));
  }

  #[test]
  fn clock_end_anchors_after_own_start() {
    let config = MendConfig::default();
    let now = at(21, 12, 0);
    let mut facts =
      vec![fact_with(Some(TimeSpec::At(at(20, 23, 0))), raw("1:00"))];

    let conflicts = resolver(&config, now).resolve_batch(&mut facts, false);
    assert!(conflicts.is_empty());
    assert_eq!(facts[0].end_instant(), Some(at(21, 1, 0)));
  }

  #[test]
  fn negative_start_offset_anchors_to_own_end() {
    let config = MendConfig::default();
    let now = at(20, 12, 0);
    let mut facts =
      vec![fact_with(raw("-45"), Some(TimeSpec::At(at(20, 10, 0))))];

    let conflicts = resolver(&config, now).resolve_batch(&mut facts, false);
    assert!(conflicts.is_empty());
    assert_eq!(facts[0].start_instant(), Some(at(20, 9, 15)));
  }

  #[test]
  fn negative_offset_falls_back_to_next_known_time() {
    // First fact in the batch, nothing before it: "-30" start leans on the
    // next absolute time in the batch.
    let config = MendConfig::default();
    let now = at(20, 12, 0);
    let mut facts = vec![
      fact_with(raw("-30"), None),
      fact_with(Some(TimeSpec::At(at(20, 10, 0))), raw("11:00")),
    ];

    let conflicts = resolver(&config, now).resolve_batch(&mut facts, false);
    assert!(conflicts.is_empty(), "{conflicts:?}");
    assert_eq!(facts[0].start_instant(), Some(at(20, 9, 30)));
    // Blank fill closes the first fact against the second's start.
    assert_eq!(facts[0].end_instant(), Some(at(20, 10, 0)));
  }

  #[test]
  fn blank_fill_chains_and_closes_at_now() {
    let config = MendConfig::default();
    let now = at(20, 12, 0);
    let mut facts = vec![
      fact_with(Some(TimeSpec::At(at(20, 9, 0))), None),
      fact_with(None, None),
    ];

    let conflicts = resolver(&config, now).resolve_batch(&mut facts, false);
    assert!(conflicts.is_empty(), "{conflicts:?}");
    // Fact 1 closes at now; fact 2 becomes a zero-length [now, now) fill
    // with no description, which the momentaneous cull then drops.
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].time_window(), Some((at(20, 9, 0), now)));

    // Same shape, passes run by hand to observe the intermediate fill.
    let mut facts = vec![
      fact_with(Some(TimeSpec::At(at(20, 9, 0))), None),
      fact_with(None, None),
    ];
    let resolver = resolver(&config, now);
    resolver.pass_fill_blanks(&mut facts);
    assert_eq!(facts[1].time_window(), Some((now, now)));
    resolver.cull_momentaneous(&mut facts);
    assert_eq!(facts.len(), 1);
  }

  #[test]
  fn missing_start_is_reported_even_when_blanks_allowed() {
    let config = MendConfig::default();
    let now = at(20, 12, 0);

    // No antecedent: nothing can ever supply the start, and a fact that
    // cannot start is not an "open edge" — it must be flagged.
    let mut facts = vec![fact_with(None, Some(TimeSpec::At(at(20, 10, 0))))];
    let conflicts = resolver(&config, now).resolve_batch(&mut facts, true);
    assert_eq!(conflicts.len(), 1);
    assert!(conflicts[0].message.contains("no start time"));

    // An ongoing antecedent will absorb the start-less fact downstream,
    // so its open start edge is legitimate.
    let mut ongoing = Fact::new();
    ongoing.set_start(at(20, 8, 0));
    let resolver = TimeResolver {
      config:     &config,
      friendly:   &NoFriendly,
      now,
      antecedent: Some(&ongoing),
      subsequent: None,
    };
    let mut facts = vec![fact_with(None, Some(TimeSpec::At(at(20, 10, 0))))];
    let conflicts = resolver.resolve_batch(&mut facts, true);
    assert!(conflicts.is_empty(), "{conflicts:?}");
  }

  #[test]
  fn leave_blanks_skips_fill() {
    let config = MendConfig::default();
    let now = at(20, 12, 0);
    let mut facts = vec![fact_with(Some(TimeSpec::At(at(20, 9, 0))), None)];

    let conflicts = resolver(&config, now).resolve_batch(&mut facts, true);
    assert!(conflicts.is_empty());
    assert!(facts[0].is_ongoing());
  }

  #[test]
  fn momentaneous_cull_respects_config_and_description() {
    let now = at(20, 12, 0);
    let window = || {
      fact_with(
        Some(TimeSpec::At(at(20, 9, 0))),
        Some(TimeSpec::At(at(20, 9, 0))),
      )
    };

    let config = MendConfig::default();
    let mut facts = vec![window()];
    resolver(&config, now).resolve_batch(&mut facts, true);
    assert!(facts.is_empty());

    // A described momentaneous fact survives even when disallowed — the
    // cull only drops the meaningless ones.
    let mut described = window();
    described.description = Some("phone call".into());
    let mut facts = vec![described];
    resolver(&config, now).resolve_batch(&mut facts, true);
    assert_eq!(facts.len(), 1);

    let config = MendConfig { allow_momentaneous: true, ..Default::default() };
    let mut facts = vec![window()];
    resolver(&config, now).resolve_batch(&mut facts, true);
    assert_eq!(facts.len(), 1);
  }

  #[test]
  fn sanity_reports_unresolvable_and_misordered() {
    let config = MendConfig::default();
    let now = at(20, 12, 0);
    let mut facts = vec![
      fact_with(raw("whenever"), Some(TimeSpec::At(at(20, 10, 0)))),
      fact_with(
        Some(TimeSpec::At(at(20, 9, 0))),
        Some(TimeSpec::At(at(20, 8, 0))),
      ),
    ];

    let conflicts = resolver(&config, now).resolve_batch(&mut facts, false);
    let messages: Vec<&str> =
      conflicts.iter().map(|c| c.message.as_str()).collect();
    assert!(messages.iter().any(|m| m.contains("whenever")));
    assert!(messages.iter().any(|m| m.contains("starts after it ends")));
    // Fact 2 starts (09:00) before fact 1 ends (10:00).
    assert!(
      messages.iter().any(|m| m.contains("before the previous fact ends")),
    );
  }

  #[test]
  fn sanity_checks_against_anchor_facts() {
    let config = MendConfig::default();
    let now = at(20, 12, 0);
    let mut antecedent = Fact::new();
    antecedent.set_start(at(20, 8, 0));
    antecedent.set_end(at(20, 9, 30));

    let resolver = TimeResolver {
      config:     &config,
      friendly:   &NoFriendly,
      now,
      antecedent: Some(&antecedent),
      subsequent: None,
    };
    let mut facts = vec![fact_with(
      Some(TimeSpec::At(at(20, 9, 0))),
      Some(TimeSpec::At(at(20, 10, 0))),
    )];

    let conflicts = resolver.resolve_batch(&mut facts, false);
    assert_eq!(conflicts.len(), 1);
    assert!(conflicts[0].other.is_some());
  }

  #[test]
  fn fully_resolved_batch_is_untouched() {
    // Idempotence: absolute, consistent times produce no conflicts and no
    // mutation.
    let config = MendConfig::default();
    let now = at(20, 12, 0);
    let mut facts = vec![fact_with(
      Some(TimeSpec::At(at(20, 9, 0))),
      Some(TimeSpec::At(at(20, 10, 0))),
    )];
    let before = facts.clone();

    let conflicts = resolver(&config, now).resolve_batch(&mut facts, false);
    assert!(conflicts.is_empty());
    assert_eq!(facts, before);
  }
}
