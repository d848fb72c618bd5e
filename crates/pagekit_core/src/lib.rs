//! Core domain logic for PageKit block documents.
//! This crate is the single source of truth for editing invariants.

pub mod config;
pub mod db;
pub mod editor;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, EditorConfig, TeardownPolicy};
pub use editor::engine::{Mutation, MutationEngine, MutationKind};
pub use editor::focus::Direction;
pub use editor::palette::{PaletteAnchor, PaletteKey, PaletteOutcome};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::block::{Block, BlockId, BlockPatch, BlockType, BlockView, PageId, Properties};
pub use repo::memory_repo::MemoryPageStore;
pub use repo::page_repo::{
    PersistError, PersistResult, PersistenceAdapter, SqlitePageStore, PAGE_FORMAT_VERSION,
};
pub use service::editor_session::{ContentOutcome, EditorSession, EditorSnapshot};
pub use service::save_scheduler::SaveState;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
