//! Single-block focus tracking.
//!
//! # Responsibility
//! - Hold at most one focused block id for the open document.
//! - Compute focus targets for keyboard navigation and after mutations.
//! - Model focus-after-insert as a two-phase handoff: the store mutation
//!   commits first, then a pending signal is resolved on the next UI frame.
//!
//! # Invariants
//! - `focused` is either `None` or an id that existed when it was set.
//! - A pending signal is resolved at most once and is dropped by `cancel`
//!   (page switch / teardown) so focus never bleeds across documents.

use crate::editor::engine::{Mutation, MutationKind};
use crate::editor::store::BlockStore;
use crate::model::block::BlockId;
use log::debug;

/// Keyboard navigation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Focus request waiting for the next UI frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFocus {
    pub target: BlockId,
    /// Monotonic counter; a newer request supersedes an older one.
    pub generation: u64,
}

/// Focus state for one open document.
#[derive(Debug, Clone, Default)]
pub struct FocusController {
    focused: Option<BlockId>,
    pending: Option<PendingFocus>,
    generation: u64,
}

impl FocusController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focused(&self) -> Option<BlockId> {
        self.focused
    }

    pub fn pending(&self) -> Option<PendingFocus> {
        self.pending
    }

    /// Focuses a block immediately (e.g. the user clicked it).
    pub fn focus(&mut self, store: &BlockStore, id: BlockId) -> bool {
        if !store.contains(id) {
            return false;
        }
        self.focused = Some(id);
        true
    }

    pub fn clear(&mut self) {
        self.focused = None;
    }

    /// Moves focus one block up or down from `current`, clamped at the
    /// document edges without wraparound. Unknown `current` is a no-op.
    pub fn move_focus(
        &mut self,
        store: &BlockStore,
        current: BlockId,
        direction: Direction,
    ) -> Option<BlockId> {
        let position = store.index_of(current)?;
        let last = store.len().saturating_sub(1);
        let target_position = match direction {
            Direction::Up => position.saturating_sub(1),
            Direction::Down => (position + 1).min(last),
        };
        let target = store.get_at(target_position)?.id;
        self.focused = Some(target);
        Some(target)
    }

    /// Phase two of insert: records a focus signal for the new block.
    pub fn request_after_insert(&mut self, target: BlockId) -> PendingFocus {
        self.generation += 1;
        let pending = PendingFocus {
            target,
            generation: self.generation,
        };
        self.pending = Some(pending);
        pending
    }

    /// Resolves the pending signal once the new block's input surface
    /// exists. Targets deleted in the meantime are dropped.
    pub fn resolve_pending(&mut self, store: &BlockStore) -> Option<BlockId> {
        let pending = self.pending.take()?;
        if !store.contains(pending.target) {
            debug!(
                "event=focus_resolve module=focus status=dropped generation={}",
                pending.generation
            );
            return None;
        }
        self.focused = Some(pending.target);
        Some(pending.target)
    }

    /// Retargets focus after a delete: previous block, else next block,
    /// else unset. A pending signal for the removed block is dropped.
    pub fn retarget_after_delete(&mut self, mutation: &Mutation) -> Option<BlockId> {
        if mutation.kind != MutationKind::Deleted {
            return self.focused;
        }
        if self
            .pending
            .is_some_and(|pending| pending.target == mutation.block_id)
        {
            self.pending = None;
        }
        self.focused = mutation.previous_id.or(mutation.next_id);
        self.focused
    }

    /// Drops focus and any pending signal.
    pub fn cancel(&mut self) {
        self.focused = None;
        self.pending = None;
    }
}
