//! Time-token classification.
//!
//! User-entered time strings come in four shapes: full absolute
//! date+time, bare clock time ("12:34", "3:30pm"), signed relative offsets
//! ("+90", "-1h", "+1h30"), and free-form friendly expressions ("yesterday
//! noon") which are delegated to an external parser. Classification is a
//! plain sum type, not exception-driven: the resolver's passes branch on
//! [`ParseOutcome`] directly.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

// ─── Token shapes ────────────────────────────────────────────────────────────

/// A parsed but not necessarily anchored time specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeToken {
  /// A time of day with no date; needs an anchor to pick the date.
  Clock(NaiveTime),
  /// A signed offset; needs an anchor to add it to.
  Relative(Duration),
}

/// The result of classifying one raw token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
  /// A complete absolute instant; nothing left to do.
  Resolved(DateTime<Utc>),
  /// Parsed, but the date or base instant must come from an anchor.
  NeedsAnchor(TimeToken),
  /// Not a time expression this crate (or the friendly parser) understands.
  Unparseable(String),
}

// ─── Friendly-expression collaborator ────────────────────────────────────────

/// External natural-language date parser. The mending core only defines the
/// seam; the CLI layer plugs in a real implementation.
pub trait FriendlyParser {
  fn parse(&self, token: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

/// The default collaborator: understands nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFriendly;

impl FriendlyParser for NoFriendly {
  fn parse(&self, _token: &str, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    None
  }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Classify one raw token. Relative and clock shapes win over friendly
/// parsing so "+1h" can never be misread by an eager natural-language parser.
pub fn classify(
  token: &str,
  friendly: &dyn FriendlyParser,
  now: DateTime<Utc>,
) -> ParseOutcome {
  let token = token.trim();
  if let Some(delta) = parse_relative(token) {
    return ParseOutcome::NeedsAnchor(TimeToken::Relative(delta));
  }
  if let Some(time) = parse_clock(token) {
    return ParseOutcome::NeedsAnchor(TimeToken::Clock(time));
  }
  if let Some(at) = parse_absolute(token) {
    return ParseOutcome::Resolved(at);
  }
  if let Some(at) = friendly.parse(token, now) {
    return ParseOutcome::Resolved(at);
  }
  ParseOutcome::Unparseable(token.to_string())
}

/// `±N` (minutes), `±Nm`, `±Nh`, or `±NhMM[m]`.
pub fn parse_relative(token: &str) -> Option<Duration> {
  let sign: i64 = match token.chars().next()? {
    '+' => 1,
    '-' => -1,
    _ => return None,
  };
  let rest = &token[1..];
  if rest.is_empty() {
    return None;
  }

  let minutes: i64 = if let Some((hours, mins)) = rest.split_once(['h', 'H'])
  {
    let hours: i64 = hours.parse().ok()?;
    let mins = mins.strip_suffix(['m', 'M']).unwrap_or(mins);
    let mins: i64 = if mins.is_empty() { 0 } else { mins.parse().ok()? };
    hours.checked_mul(60)?.checked_add(mins)?
  } else {
    let mins = rest.strip_suffix(['m', 'M']).unwrap_or(rest);
    mins.parse().ok()?
  };

  // Absurd offsets are no more a time expression than garbage text is.
  Duration::try_minutes(sign * minutes)
}

/// `H:MM`, `HH:MM[:SS]`, with an optional `am`/`pm` suffix.
pub fn parse_clock(token: &str) -> Option<NaiveTime> {
  let lower = token.to_ascii_lowercase();
  let (body, meridiem) = if let Some(body) = lower.strip_suffix("am") {
    (body.trim_end(), Some(false))
  } else if let Some(body) = lower.strip_suffix("pm") {
    (body.trim_end(), Some(true))
  } else {
    (lower.as_str(), None)
  };

  let mut parts = body.split(':');
  let hour: u32 = parts.next()?.parse().ok()?;
  let minute: u32 = parts.next()?.parse().ok()?;
  let second: u32 = match parts.next() {
    Some(s) => s.parse().ok()?,
    None => 0,
  };
  if parts.next().is_some() {
    return None;
  }

  let hour = match meridiem {
    Some(true) if hour < 12 => hour + 12,
    Some(false) if hour == 12 => 0,
    _ => hour,
  };
  NaiveTime::from_hms_opt(hour, minute, second)
}

/// RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, or a bare `YYYY-MM-DD` (midnight).
pub fn parse_absolute(token: &str) -> Option<DateTime<Utc>> {
  if let Ok(at) = DateTime::parse_from_rfc3339(token) {
    return Some(at.with_timezone(&Utc));
  }
  for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
    if let Ok(naive) = NaiveDateTime::parse_from_str(token, format) {
      return Some(naive.and_utc());
    }
  }
  if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
    return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
  }
  None
}

// ─── Nearest occurrence ──────────────────────────────────────────────────────

/// Which side of the anchor a clock time may land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snap {
  AtOrBefore,
  AtOrAfter,
}

/// Give `time` a date: the occurrence nearest to `anchor` on the permitted
/// side. At most one day away by construction.
pub fn nearest_occurrence(
  time: NaiveTime,
  anchor: DateTime<Utc>,
  snap: Snap,
) -> DateTime<Utc> {
  let same_day = anchor.date_naive().and_time(time).and_utc();
  match snap {
    Snap::AtOrBefore if same_day <= anchor => same_day,
    Snap::AtOrBefore => same_day - Duration::days(1),
    Snap::AtOrAfter if same_day >= anchor => same_day,
    Snap::AtOrAfter => same_day + Duration::days(1),
  }
}
