//! Edit operations over lay time activity chains.
//!
//! # Responsibility
//! - Turn user edits into read, compute, write cycles against a store.
//! - Keep callers decoupled from relink and validation details.

pub mod activity_service;
