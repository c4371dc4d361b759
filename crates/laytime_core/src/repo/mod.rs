//! Store adapters for lay time activity chains.
//!
//! # Responsibility
//! - Define the read/write contract edit operations commit through.
//! - Provide an in-memory store for tests and a SQLite store for the CLI.
//!
//! # Invariants
//! - `write` replaces the whole chain and its violation set together.
//! - Reads return `None` for unregistered lay times, never an error.

pub mod activity_store;
pub mod memory_store;
pub mod sqlite_store;
