//! Core types and trait definitions for the dob time tracker.
//!
//! This crate is deliberately free of storage and presentation dependencies.
//! The mending pipeline (`dob-mend`) and storage backends depend on it; it
//! depends on nothing proprietary.

pub mod config;
pub mod error;
pub mod fact;
pub mod store;

pub use error::{Error, Result};
