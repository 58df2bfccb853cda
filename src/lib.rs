//! Feedwatch - An RSS Feed Monitor
//!
//! This crate ingests configured RSS/Atom feeds into a sqlite-backed
//! article store, deduplicating articles by link, tagging each one with
//! deterministic keywords and serving time-windowed digests of what
//! arrived.

pub mod config;
pub mod digest;
pub mod error;
pub mod fetcher;
pub mod store;
pub mod sync;
pub mod tagger;

pub use error::{Error, Result};
