//! Ordered block collection for one open document.
//!
//! # Responsibility
//! - Hold blocks in document order with O(1) lookup by id.
//! - Expose read access to everyone, structural writes only to the engine.
//!
//! # Invariants
//! - `index[id] == position of id in blocks` for every block.
//! - Ids are unique; the document never stays empty after a public mutation.

use crate::model::block::{Block, BlockId};
use std::collections::HashMap;

/// Arena + index storage for one document.
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    blocks: Vec<Block>,
    index: HashMap<BlockId, usize>,
}

/// Structural invariant violation reported by `BlockStore::check_invariants`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreInvariantViolation {
    Empty,
    DuplicateId(BlockId),
    IndexMismatch { id: BlockId, expected: usize },
    IndexSize { blocks: usize, index: usize },
}

impl BlockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Builds a store from already-unique blocks.
    pub(crate) fn from_blocks(blocks: Vec<Block>) -> Self {
        let mut store = Self {
            blocks,
            index: HashMap::new(),
        };
        store.reindex_from(0);
        store
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn index_of(&self, id: BlockId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.index_of(id).map(|position| &self.blocks[position])
    }

    pub fn get_at(&self, position: usize) -> Option<&Block> {
        self.blocks.get(position)
    }

    /// Block ids in document order.
    pub fn ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|block| block.id).collect()
    }

    pub(crate) fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        let position = self.index_of(id)?;
        self.blocks.get_mut(position)
    }

    /// Inserts at `position` (clamped to `len`) and returns the final index.
    pub(crate) fn insert_at(&mut self, position: usize, block: Block) -> usize {
        let position = position.min(self.blocks.len());
        self.blocks.insert(position, block);
        self.reindex_from(position);
        position
    }

    pub(crate) fn push(&mut self, block: Block) -> usize {
        let position = self.blocks.len();
        self.index.insert(block.id, position);
        self.blocks.push(block);
        position
    }

    /// Removes one block, returning it with its former index.
    pub(crate) fn remove(&mut self, id: BlockId) -> Option<(usize, Block)> {
        let position = self.index.remove(&id)?;
        let block = self.blocks.remove(position);
        self.reindex_from(position);
        Some((position, block))
    }

    /// Moves a block to `target` (clamped) preserving relative order of the
    /// rest. Returns `(from, to)`.
    pub(crate) fn relocate(&mut self, id: BlockId, target: usize) -> Option<(usize, usize)> {
        let from = self.index_of(id)?;
        let to = target.min(self.blocks.len().saturating_sub(1));
        if from == to {
            return Some((from, to));
        }
        let block = self.blocks.remove(from);
        self.blocks.insert(to, block);
        self.reindex_from(from.min(to));
        Some((from, to))
    }

    fn reindex_from(&mut self, start: usize) {
        for (position, block) in self.blocks.iter().enumerate().skip(start) {
            self.index.insert(block.id, position);
        }
    }

    /// Verifies non-empty, unique ids, and index consistency.
    pub fn check_invariants(&self) -> Result<(), StoreInvariantViolation> {
        if self.blocks.is_empty() {
            return Err(StoreInvariantViolation::Empty);
        }
        if self.index.len() != self.blocks.len() {
            let mut seen = std::collections::HashSet::new();
            for block in &self.blocks {
                if !seen.insert(block.id) {
                    return Err(StoreInvariantViolation::DuplicateId(block.id));
                }
            }
            return Err(StoreInvariantViolation::IndexSize {
                blocks: self.blocks.len(),
                index: self.index.len(),
            });
        }
        for (position, block) in self.blocks.iter().enumerate() {
            if self.index.get(&block.id) != Some(&position) {
                return Err(StoreInvariantViolation::IndexMismatch {
                    id: block.id,
                    expected: position,
                });
            }
        }
        Ok(())
    }
}
