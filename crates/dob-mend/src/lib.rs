//! The dob mending pipeline.
//!
//! Given a newly entered or imported fact (or chronological batch), this
//! crate resolves relative and partial time expressions against neighbouring
//! facts and "now", finds stored facts the new window collides with, and
//! derives the reason-tagged mutation set — deletions, truncations, splits,
//! squashes — that keeps the timeline free of overlaps.
//!
//! Control flow: build candidate facts → [`mend_times`] fills the blanks →
//! [`resolve_conflicts`] turns collisions into [`Edit`]s → the caller
//! confirms (interactively or via `--yes`/`--dry`) → [`commit_edits`]
//! persists the set as a unit. Anomalies travel as [`Conflict`] values, not
//! exceptions; the one hard error is
//! [`dob_core::Error::ZerothFactMustStart`].

pub mod conflict;
pub mod detect;
pub mod mend;
pub mod resolve;
pub mod token;

pub use conflict::{Conflict, Edit};
pub use detect::{Detected, MatchRule, detect_conflicts};
pub use mend::{TimeHint, commit_edits, mend_times, resolve_conflicts, squash};
pub use resolve::TimeResolver;
pub use token::{FriendlyParser, NoFriendly, ParseOutcome, TimeToken};
