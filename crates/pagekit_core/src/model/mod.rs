//! Block document domain model.
//!
//! # Responsibility
//! - Define canonical data structures shared by the editing core, the
//!   persistence layer and host renderers.
//!
//! # Invariants
//! - Every block is identified by a stable `BlockId`.
//! - A block's `type` is a closed enum; string dispatch happens only at the
//!   wire boundary.

pub mod block;
