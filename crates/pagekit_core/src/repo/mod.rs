//! Page document persistence.
//!
//! # Responsibility
//! - Define the persistence adapter boundary consumed by the editing core.
//! - Keep SQL and wire-format details out of the editor and services.
//!
//! # Invariants
//! - Page ids are passed explicitly on every call; adapters hold no notion
//!   of a "current" page.

pub mod memory_repo;
pub mod page_repo;
