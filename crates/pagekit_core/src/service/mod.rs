//! Editing use-case services.
//!
//! # Responsibility
//! - Compose the editing core with persistence into a host-facing session.
//! - Keep UI/FFI layers decoupled from storage details and save timing.

pub mod editor_session;
pub mod save_scheduler;
