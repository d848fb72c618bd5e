//! Mutation engine: the single write path into a page's `BlockStore`.
//!
//! # Responsibility
//! - Implement insert/update/delete/duplicate/transform/move and the
//!   keyboard-level helpers built on them (split, indent, check toggle).
//! - Describe every applied change as a `Mutation` so observers (focus,
//!   persistence, host UI) can react.
//!
//! # Invariants
//! - Unknown target ids are silent no-ops (`None`), never errors.
//! - After every call the store is non-empty, ids are unique and the index
//!   matches document order.
//! - `transform` never touches `content`.

use crate::editor::store::BlockStore;
use crate::model::block::{
    merge_properties, Block, BlockId, BlockPatch, BlockType, PageId, Properties, MAX_INDENT,
    PROP_CHECKED, PROP_INDENT, PROP_NUMBER,
};
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashSet;

/// Kind of an applied mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Inserted,
    Updated,
    Deleted,
    Duplicated,
    Transformed,
    Moved,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Duplicated => "duplicated",
            Self::Transformed => "transformed",
            Self::Moved => "moved",
        }
    }
}

/// Record of one applied change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub kind: MutationKind,
    /// Block the change applied to. For inserts/duplicates this is the new
    /// block; for deletes the removed one.
    pub block_id: BlockId,
    /// Delete only: neighbor before the removed block, if any.
    pub previous_id: Option<BlockId>,
    /// Delete only: neighbor after the removed block, if any.
    pub next_id: Option<BlockId>,
    /// Delete only: default block created because the document became empty.
    pub replacement_id: Option<BlockId>,
}

impl Mutation {
    fn simple(kind: MutationKind, block_id: BlockId) -> Self {
        Self {
            kind,
            block_id,
            previous_id: None,
            next_id: None,
            replacement_id: None,
        }
    }

    /// Whether the mutation created a new block that should take focus.
    pub fn created_block(&self) -> Option<BlockId> {
        match self.kind {
            MutationKind::Inserted | MutationKind::Duplicated => Some(self.block_id),
            _ => None,
        }
    }
}

/// Owner of one page's block collection.
#[derive(Debug, Clone)]
pub struct MutationEngine {
    page_id: PageId,
    store: BlockStore,
}

impl MutationEngine {
    /// Creates an engine holding a single default text block.
    pub fn new(page_id: impl Into<PageId>) -> Self {
        let mut store = BlockStore::new();
        store.push(Block::default_text());
        Self {
            page_id: page_id.into(),
            store,
        }
    }

    /// Creates an engine with no blocks, for documents assembled block by
    /// block. The first `insert` makes it non-empty; until then every other
    /// operation finds no target and is a no-op.
    pub fn blank(page_id: impl Into<PageId>) -> Self {
        Self {
            page_id: page_id.into(),
            store: BlockStore::new(),
        }
    }

    /// Creates an engine from loaded blocks, repairing what would violate
    /// document invariants.
    ///
    /// - Empty input yields one default text block.
    /// - Repeated ids are re-keyed with fresh ids, keeping order.
    pub fn from_loaded(page_id: impl Into<PageId>, blocks: Vec<Block>) -> Self {
        let page_id = page_id.into();
        if blocks.is_empty() {
            return Self::new(page_id);
        }

        let mut seen = HashSet::with_capacity(blocks.len());
        let mut repaired = 0_usize;
        let blocks = blocks
            .into_iter()
            .map(|mut block| {
                if !seen.insert(block.id) {
                    block.id = uuid::Uuid::new_v4();
                    seen.insert(block.id);
                    repaired += 1;
                }
                block
            })
            .collect::<Vec<_>>();
        if repaired > 0 {
            warn!(
                "event=document_load module=editor status=repaired duplicate_ids={} block_count={}",
                repaired,
                blocks.len()
            );
        }

        Self {
            page_id,
            store: BlockStore::from_blocks(blocks),
        }
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// Read-only view of the collection.
    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn blocks(&self) -> &[Block] {
        self.store.blocks()
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.store.get(id)
    }

    /// Inserts a new block after `after_id`, or appends when `after_id` is
    /// `None` or unknown. Always succeeds.
    pub fn insert(
        &mut self,
        after_id: Option<BlockId>,
        block_type: BlockType,
        content: impl Into<String>,
        properties: Properties,
    ) -> Mutation {
        let block = Block::new(block_type, content).with_properties(properties);
        let id = block.id;
        let position = match after_id.and_then(|after| self.store.index_of(after)) {
            Some(anchor) => self.store.insert_at(anchor + 1, block),
            None => self.store.push(block),
        };
        debug!(
            "event=block_insert module=editor status=ok type={} position={}",
            block_type, position
        );
        Mutation::simple(MutationKind::Inserted, id)
    }

    /// Shallow-merges `patch` into the target block.
    pub fn update(&mut self, id: BlockId, patch: &BlockPatch) -> Option<Mutation> {
        let block = self.store.get_mut(id)?;
        block.apply_patch(patch);
        Some(Mutation::simple(MutationKind::Updated, id))
    }

    /// Removes a block; an emptied document gets a fresh default block.
    pub fn delete(&mut self, id: BlockId) -> Option<Mutation> {
        let position = self.store.index_of(id)?;
        let previous_id = position
            .checked_sub(1)
            .and_then(|before| self.store.get_at(before))
            .map(|block| block.id);
        let next_id = self.store.get_at(position + 1).map(|block| block.id);

        self.store.remove(id)?;
        let replacement_id = if self.store.is_empty() {
            let replacement = Block::default_text();
            let replacement_id = replacement.id;
            self.store.push(replacement);
            debug!("event=block_delete module=editor status=ok synthesized_default=true");
            Some(replacement_id)
        } else {
            None
        };

        Some(Mutation {
            kind: MutationKind::Deleted,
            block_id: id,
            previous_id,
            next_id,
            replacement_id,
        })
    }

    /// Clones the block with a fresh id directly after the source.
    pub fn duplicate(&mut self, id: BlockId) -> Option<Mutation> {
        let position = self.store.index_of(id)?;
        let copy = self.store.get_at(position)?.duplicate();
        let copy_id = copy.id;
        self.store.insert_at(position + 1, copy);
        Some(Mutation::simple(MutationKind::Duplicated, copy_id))
    }

    /// Changes the type and merges `extra` into properties. Content is left
    /// untouched; callers wanting it cleared issue a separate `update`.
    pub fn transform(
        &mut self,
        id: BlockId,
        block_type: BlockType,
        extra: Option<&Properties>,
    ) -> Option<Mutation> {
        let block = self.store.get_mut(id)?;
        block.block_type = block_type;
        if let Some(extra) = extra {
            merge_properties(&mut block.properties, extra);
        }
        debug!(
            "event=block_transform module=editor status=ok type={}",
            block_type
        );
        Some(Mutation::simple(MutationKind::Transformed, id))
    }

    /// Repositions a block; out-of-range targets are clamped. Moving a block
    /// onto its own position reports no change.
    pub fn move_to(&mut self, id: BlockId, target_index: usize) -> Option<Mutation> {
        let (from, to) = self.store.relocate(id, target_index)?;
        if from == to {
            return None;
        }
        debug!(
            "event=block_move module=editor status=ok from={} to={}",
            from, to
        );
        Some(Mutation::simple(MutationKind::Moved, id))
    }

    pub fn move_up(&mut self, id: BlockId) -> Option<Mutation> {
        let position = self.store.index_of(id)?;
        self.move_to(id, position.saturating_sub(1))
    }

    pub fn move_down(&mut self, id: BlockId) -> Option<Mutation> {
        let position = self.store.index_of(id)?;
        self.move_to(id, position + 1)
    }

    /// Increases indentation by one level, up to `MAX_INDENT`.
    pub fn indent(&mut self, id: BlockId) -> Option<Mutation> {
        let level = self.store.get(id)?.indent();
        self.set_indent(id, level.saturating_add(1).min(MAX_INDENT))
    }

    /// Decreases indentation by one level, down to 0.
    pub fn outdent(&mut self, id: BlockId) -> Option<Mutation> {
        let level = self.store.get(id)?.indent();
        self.set_indent(id, level.saturating_sub(1))
    }

    fn set_indent(&mut self, id: BlockId, level: u8) -> Option<Mutation> {
        let patch = BlockPatch::default().with_property(PROP_INDENT, Value::from(level));
        self.update(id, &patch)
    }

    /// Flips the checked flag of a todo block. Other types are left alone.
    pub fn toggle_checked(&mut self, id: BlockId) -> Option<Mutation> {
        let block = self.store.get(id)?;
        if block.block_type != BlockType::Todo {
            return None;
        }
        let checked = !block.is_checked();
        let patch = BlockPatch::default().with_property(PROP_CHECKED, Value::from(checked));
        self.update(id, &patch)
    }

    /// "Enter" on a block.
    ///
    /// A non-empty list item continues its list in a new block (numbered
    /// items advance the ordinal, todos start unchecked). An empty list item
    /// converts back to text in place. Anything else opens a text block.
    pub fn split_after(&mut self, id: BlockId) -> Option<Mutation> {
        let source = self.store.get(id)?;
        let source_type = source.block_type;
        let indent = source.indent();
        let number = source.number();

        if source_type.is_list() && source.is_empty() {
            return self.transform(id, BlockType::Text, None);
        }

        let mut properties = Properties::new();
        if indent > 0 {
            properties.insert(PROP_INDENT.to_string(), Value::from(indent));
        }
        let next_type = match source_type {
            BlockType::Numbered => {
                properties.insert(PROP_NUMBER.to_string(), Value::from(number + 1));
                BlockType::Numbered
            }
            BlockType::Todo => {
                properties.insert(PROP_CHECKED.to_string(), Value::from(false));
                BlockType::Todo
            }
            BlockType::Bullet => BlockType::Bullet,
            _ => BlockType::Text,
        };
        Some(self.insert(Some(id), next_type, "", properties))
    }
}
