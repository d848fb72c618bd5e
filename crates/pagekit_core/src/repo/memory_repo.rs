//! In-process page store.
//!
//! # Responsibility
//! - Provide a `PersistenceAdapter` without SQLite for hosts and tests.
//! - Store the same JSON wire payload the SQLite store writes, so load/save
//!   round-trips exercise the real codec.
//! - Support fault injection for save-failure paths.

use crate::model::block::Block;
use crate::repo::page_repo::{
    decode_blocks, encode_blocks, normalize_page_id, PersistError, PersistResult,
    PersistenceAdapter,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    pages: BTreeMap<String, String>,
    failing_saves: u32,
    save_calls: u32,
}

/// Mutex-guarded map of page id -> encoded document.
#[derive(Debug, Default)]
pub struct MemoryPageStore {
    state: Mutex<MemoryState>,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PersistResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| PersistError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Makes the next `count` saves fail with `PersistError::Unavailable`.
    pub fn fail_next_saves(&self, count: u32) {
        if let Ok(mut state) = self.lock() {
            state.failing_saves = count;
        }
    }

    /// Number of `save` calls received, including failed ones.
    pub fn save_calls(&self) -> u32 {
        self.lock().map_or(0, |state| state.save_calls)
    }

    /// Stores a raw payload as-is, bypassing encoding.
    pub fn put_raw(&self, page_id: &str, raw: impl Into<String>) {
        if let Ok(mut state) = self.lock() {
            state.pages.insert(page_id.trim().to_string(), raw.into());
        }
    }

    /// Raw stored payload for a page.
    pub fn raw(&self, page_id: &str) -> Option<String> {
        self.lock()
            .ok()
            .and_then(|state| state.pages.get(page_id.trim()).cloned())
    }
}

impl PersistenceAdapter for MemoryPageStore {
    fn load(&self, page_id: &str) -> PersistResult<Vec<Block>> {
        let page_id = normalize_page_id(page_id)?;
        let state = self.lock()?;
        Ok(state
            .pages
            .get(page_id)
            .map(|raw| decode_blocks(raw.as_str()))
            .unwrap_or_default())
    }

    fn save(&self, page_id: &str, blocks: &[Block]) -> PersistResult<()> {
        let page_id = normalize_page_id(page_id)?;
        let mut state = self.lock()?;
        state.save_calls += 1;
        if state.failing_saves > 0 {
            state.failing_saves -= 1;
            return Err(PersistError::Unavailable("injected save failure".to_string()));
        }
        let raw = encode_blocks(blocks)?;
        state.pages.insert(page_id.to_string(), raw);
        Ok(())
    }
}
