//! Block editing core.
//!
//! # Responsibility
//! - Own the ordered block collection of one open page and every operation
//!   that changes it.
//! - Provide the input-side helpers that turn keystrokes into mutations:
//!   autoformat detection, focus navigation and the command palette.
//!
//! # Invariants
//! - Only `engine::MutationEngine` mutates a `store::BlockStore`.
//! - A document is never empty after any mutation.

pub mod autoformat;
pub mod engine;
pub mod focus;
pub mod palette;
pub mod store;
