//! In-memory backend for the dob fact store.
//!
//! Holds all facts in a start-sorted `Vec` and implements every
//! [`FactStore`] ordering query over a linear scan. This is the backend the
//! test suites exercise the mending pipeline through; a database-backed
//! store implements the same trait in production.

mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::MemoryStore;
