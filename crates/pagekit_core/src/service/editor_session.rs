//! Editing session use-case service for one open page.
//!
//! # Responsibility
//! - Be the host-facing entry point for block editing: route input through
//!   the mutation engine, autoformat detector and command palette.
//! - After every applied mutation: notify subscribers, update focus and
//!   restart the debounced save.
//! - Own page lifecycle: load on open, flush or discard on teardown, and
//!   switch pages without leaking focus or saves across documents.
//!
//! # Invariants
//! - Every entry point takes the page id explicitly; a mismatch with the
//!   open page is a logged no-op.
//! - Engine faults (unknown ids, empty palette selections) are absorbed;
//!   only the save status crosses to the host as an outcome.
//! - Subscribers see the document after the mutation has been committed.

use crate::config::{EditorConfig, TeardownPolicy};
use crate::editor::autoformat::AutoformatDetector;
use crate::editor::engine::{Mutation, MutationEngine, MutationKind};
use crate::editor::focus::{Direction, FocusController, PendingFocus};
use crate::editor::palette::{
    CommandPalette, PaletteAnchor, PaletteKey, PaletteOutcome, PaletteSelection,
};
use crate::model::block::{Block, BlockId, BlockPatch, BlockType, PageId, Properties};
use crate::repo::page_repo::PersistenceAdapter;
use crate::service::save_scheduler::{PersistenceScheduler, SaveState};
use log::{error, info, warn};

/// Change notification delivered to subscribers.
#[derive(Debug, Clone, Copy)]
pub struct DocumentChange<'a> {
    pub page_id: &'a str,
    pub kind: MutationKind,
    pub block_id: BlockId,
    /// Full ordered document after the change.
    pub blocks: &'a [Block],
}

/// Subscriber callback.
pub type ChangeListener = Box<dyn FnMut(&DocumentChange<'_>) + Send>;

/// Handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Result of a content update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOutcome {
    /// Wrong page or unknown block.
    Ignored,
    /// Content stored as typed.
    Updated,
    /// Trigger recognized: block converted and its content cleared.
    Autoformatted(BlockType),
}

/// Palette state for host rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteSnapshot {
    pub target: BlockId,
    pub anchor: PaletteAnchor,
    pub query: String,
    pub selected_index: usize,
    /// `(type, label)` of matching commands in display order.
    pub items: Vec<(BlockType, String)>,
}

/// Everything a host needs to render one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorSnapshot {
    pub page_id: PageId,
    pub blocks: Vec<Block>,
    pub focused: Option<BlockId>,
    pub pending_focus: Option<PendingFocus>,
    pub palette: Option<PaletteSnapshot>,
    pub save_state: SaveState,
}

/// Host-facing editor for one open page.
pub struct EditorSession<A: PersistenceAdapter> {
    config: EditorConfig,
    adapter: A,
    engine: MutationEngine,
    focus: FocusController,
    palette: CommandPalette,
    autoformat: AutoformatDetector,
    scheduler: PersistenceScheduler,
    listeners: Vec<(SubscriptionId, ChangeListener)>,
    next_subscription: u64,
    now_ms: u64,
}

impl<A: PersistenceAdapter> EditorSession<A> {
    /// Loads `page_id` through `adapter` and opens an editing session.
    ///
    /// Load failures are absorbed: the session starts from a default
    /// document and saving is blocked so stored data is never overwritten.
    pub fn open(page_id: impl Into<PageId>, adapter: A, config: EditorConfig) -> Self {
        let page_id = page_id.into();
        let mut scheduler = PersistenceScheduler::new(&config);
        let engine = load_engine(&adapter, page_id, &mut scheduler);
        info!(
            "event=session_open module=session status=ok block_count={} save_blocked={}",
            engine.blocks().len(),
            scheduler.is_blocked()
        );

        Self {
            config,
            adapter,
            engine,
            focus: FocusController::new(),
            palette: CommandPalette::default(),
            autoformat: AutoformatDetector::new(),
            scheduler,
            listeners: Vec::new(),
            next_subscription: 0,
            now_ms: 0,
        }
    }

    pub fn page_id(&self) -> &str {
        self.engine.page_id()
    }

    pub fn blocks(&self) -> &[Block] {
        self.engine.blocks()
    }

    pub fn engine(&self) -> &MutationEngine {
        &self.engine
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn focused(&self) -> Option<BlockId> {
        self.focus.focused()
    }

    pub fn pending_focus(&self) -> Option<PendingFocus> {
        self.focus.pending()
    }

    pub fn save_state(&self) -> SaveState {
        self.scheduler.state()
    }

    pub fn scheduler(&self) -> &PersistenceScheduler {
        &self.scheduler
    }

    pub fn palette(&self) -> &CommandPalette {
        &self.palette
    }

    /// Advances the logical clock. Earlier timestamps are ignored.
    pub fn set_time(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Registers a change callback fired after every applied mutation.
    pub fn subscribe(&mut self, listener: ChangeListener) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    fn is_open_page(&self, page_id: &str, operation: &'static str) -> bool {
        if page_id == self.engine.page_id() {
            return true;
        }
        warn!(
            "event=page_mismatch module=session status=ignored operation={}",
            operation
        );
        false
    }

    fn commit(&mut self, mutation: Option<Mutation>) -> Option<Mutation> {
        let mutation = mutation?;
        if let Some(created) = mutation.created_block() {
            self.focus.request_after_insert(created);
        }
        if mutation.kind == MutationKind::Deleted {
            self.focus.retarget_after_delete(&mutation);
            if self.palette.target() == Some(mutation.block_id) {
                self.palette.close();
            }
        }
        self.scheduler.record_mutation(self.now_ms);

        let change = DocumentChange {
            page_id: self.engine.page_id(),
            kind: mutation.kind,
            block_id: mutation.block_id,
            blocks: self.engine.blocks(),
        };
        for (_, listener) in &mut self.listeners {
            listener(&change);
        }
        Some(mutation)
    }

    /// Inserts a block after `after_id` (or appends) and schedules focus
    /// onto it for the next frame.
    pub fn insert(
        &mut self,
        page_id: &str,
        after_id: Option<BlockId>,
        block_type: BlockType,
        content: impl Into<String>,
        properties: Properties,
    ) -> Option<Mutation> {
        if !self.is_open_page(page_id, "insert") {
            return None;
        }
        let mutation = self
            .engine
            .insert(after_id, block_type, content, properties);
        self.commit(Some(mutation))
    }

    /// Shallow-merges `patch` without autoformat detection.
    pub fn update(&mut self, page_id: &str, id: BlockId, patch: &BlockPatch) -> Option<Mutation> {
        if !self.is_open_page(page_id, "update") {
            return None;
        }
        let mutation = self.engine.update(id, patch);
        self.commit(mutation)
    }

    /// Stores typed content and runs autoformat detection on it.
    pub fn update_content(
        &mut self,
        page_id: &str,
        id: BlockId,
        content: impl Into<String>,
    ) -> ContentOutcome {
        if !self.is_open_page(page_id, "update_content") {
            return ContentOutcome::Ignored;
        }
        let Some(block) = self.engine.get(id) else {
            return ContentOutcome::Ignored;
        };
        let content = content.into();
        let detected = self
            .autoformat
            .observe(block.content.as_str(), content.as_str(), block.block_type);

        match detected {
            // The trigger text is consumed, never stored or broadcast.
            Some(block_type) => {
                let mutation = self.engine.transform(id, block_type, None);
                self.commit(mutation);
                let mutation = self.engine.update(id, &BlockPatch::content(""));
                self.commit(mutation);
                ContentOutcome::Autoformatted(block_type)
            }
            None => {
                let mutation = self.engine.update(id, &BlockPatch::content(content));
                self.commit(mutation);
                ContentOutcome::Updated
            }
        }
    }

    pub fn delete(&mut self, page_id: &str, id: BlockId) -> Option<Mutation> {
        if !self.is_open_page(page_id, "delete") {
            return None;
        }
        let mutation = self.engine.delete(id);
        self.commit(mutation)
    }

    pub fn duplicate(&mut self, page_id: &str, id: BlockId) -> Option<Mutation> {
        if !self.is_open_page(page_id, "duplicate") {
            return None;
        }
        let mutation = self.engine.duplicate(id);
        self.commit(mutation)
    }

    pub fn transform(
        &mut self,
        page_id: &str,
        id: BlockId,
        block_type: BlockType,
        extra: Option<&Properties>,
    ) -> Option<Mutation> {
        if !self.is_open_page(page_id, "transform") {
            return None;
        }
        let mutation = self.engine.transform(id, block_type, extra);
        self.commit(mutation)
    }

    pub fn move_block(
        &mut self,
        page_id: &str,
        id: BlockId,
        target_index: usize,
    ) -> Option<Mutation> {
        if !self.is_open_page(page_id, "move") {
            return None;
        }
        let mutation = self.engine.move_to(id, target_index);
        self.commit(mutation)
    }

    pub fn move_up(&mut self, page_id: &str, id: BlockId) -> Option<Mutation> {
        if !self.is_open_page(page_id, "move_up") {
            return None;
        }
        let mutation = self.engine.move_up(id);
        self.commit(mutation)
    }

    pub fn move_down(&mut self, page_id: &str, id: BlockId) -> Option<Mutation> {
        if !self.is_open_page(page_id, "move_down") {
            return None;
        }
        let mutation = self.engine.move_down(id);
        self.commit(mutation)
    }

    pub fn indent(&mut self, page_id: &str, id: BlockId) -> Option<Mutation> {
        if !self.is_open_page(page_id, "indent") {
            return None;
        }
        let mutation = self.engine.indent(id);
        self.commit(mutation)
    }

    pub fn outdent(&mut self, page_id: &str, id: BlockId) -> Option<Mutation> {
        if !self.is_open_page(page_id, "outdent") {
            return None;
        }
        let mutation = self.engine.outdent(id);
        self.commit(mutation)
    }

    pub fn toggle_checked(&mut self, page_id: &str, id: BlockId) -> Option<Mutation> {
        if !self.is_open_page(page_id, "toggle_checked") {
            return None;
        }
        let mutation = self.engine.toggle_checked(id);
        self.commit(mutation)
    }

    /// "Enter" on a block: continue lists, exit empty list items, or open a
    /// new text block.
    pub fn split_after(&mut self, page_id: &str, id: BlockId) -> Option<Mutation> {
        if !self.is_open_page(page_id, "split_after") {
            return None;
        }
        let mutation = self.engine.split_after(id);
        self.commit(mutation)
    }

    /// Focuses a block directly (click / tap).
    pub fn focus_block(&mut self, page_id: &str, id: BlockId) -> bool {
        if !self.is_open_page(page_id, "focus_block") {
            return false;
        }
        self.focus.focus(self.engine.store(), id)
    }

    /// Arrow-key navigation between blocks.
    pub fn move_focus(
        &mut self,
        page_id: &str,
        current: BlockId,
        direction: Direction,
    ) -> Option<BlockId> {
        if !self.is_open_page(page_id, "move_focus") {
            return None;
        }
        self.focus.move_focus(self.engine.store(), current, direction)
    }

    /// Opens the palette on a blank block. Returns whether it opened.
    pub fn open_palette(&mut self, page_id: &str, target: BlockId, anchor: PaletteAnchor) -> bool {
        if !self.is_open_page(page_id, "open_palette") {
            return false;
        }
        let Some(block) = self.engine.get(target) else {
            return false;
        };
        self.palette.open(target, block.content.as_str(), anchor)
    }

    /// Replaces the palette query.
    pub fn palette_input(&mut self, page_id: &str, query: &str) {
        if self.is_open_page(page_id, "palette_input") {
            self.palette.set_query(query);
        }
    }

    /// Routes a navigation key to the palette and applies a selection.
    pub fn palette_key(&mut self, page_id: &str, key: PaletteKey) -> PaletteOutcome {
        if !self.is_open_page(page_id, "palette_key") {
            return PaletteOutcome::Pending;
        }
        let outcome = self.palette.handle_key(key);
        if let PaletteOutcome::Selected(selection) = &outcome {
            self.apply_palette_selection(selection);
        }
        outcome
    }

    /// Interaction outside the palette bounds.
    pub fn palette_click_outside(&mut self, page_id: &str) {
        if self.is_open_page(page_id, "palette_click_outside") {
            self.palette.click_outside();
        }
    }

    fn apply_palette_selection(&mut self, selection: &PaletteSelection) {
        let command = &selection.command;
        let mutation = self.engine.transform(
            selection.target,
            command.block_type,
            command.properties.as_ref(),
        );
        if self.commit(mutation).is_none() {
            return;
        }
        if let Some(content) = command.default_content {
            let mutation = self
                .engine
                .update(selection.target, &BlockPatch::content(content));
            self.commit(mutation);
        }
    }

    /// Per-frame host hook: resolves pending focus and runs a due save.
    pub fn on_frame(&mut self, now_ms: u64) -> Option<BlockId> {
        self.set_time(now_ms);
        let focused = self.focus.resolve_pending(self.engine.store());
        self.run_due_save();
        focused
    }

    /// Saves immediately if anything is unsaved.
    pub fn flush(&mut self, page_id: &str) -> SaveState {
        if self.is_open_page(page_id, "flush") {
            self.scheduler.flush(self.now_ms);
            self.run_due_save();
        }
        self.scheduler.state()
    }

    fn run_due_save(&mut self) {
        let Some(ticket) = self.scheduler.begin_save(self.now_ms) else {
            return;
        };
        let outcome = self
            .adapter
            .save(self.engine.page_id(), self.engine.blocks())
            .map_err(|err| {
                error!(
                    "event=page_save module=session status=error attempt={} error={}",
                    ticket.attempt, err
                );
                err.to_string()
            });
        self.scheduler.finish_save(ticket, outcome, self.now_ms);
    }

    fn teardown(&mut self) -> SaveState {
        self.palette.close();
        self.focus.cancel();
        if self.config.teardown_policy == TeardownPolicy::Flush {
            self.scheduler.flush(self.now_ms);
            self.run_due_save();
        }
        let state = self.scheduler.state();
        if self.scheduler.cancel() {
            warn!(
                "event=session_teardown module=session status=unsaved policy={}",
                self.config.teardown_policy.as_str()
            );
        }
        state
    }

    /// Tears down the current page and opens `page_id` in its place.
    ///
    /// Returns the final save state of the page being left.
    pub fn switch_page(&mut self, page_id: impl Into<PageId>) -> SaveState {
        let left = self.teardown();
        let mut scheduler = PersistenceScheduler::new(&self.config);
        self.engine = load_engine(&self.adapter, page_id.into(), &mut scheduler);
        self.scheduler = scheduler;
        info!(
            "event=session_switch module=session status=ok previous_save_state={} block_count={}",
            left.as_str(),
            self.engine.blocks().len()
        );
        left
    }

    /// Closes the session, applying the teardown policy.
    pub fn close(mut self) -> SaveState {
        let state = self.teardown();
        info!(
            "event=session_close module=session status=ok save_state={}",
            state.as_str()
        );
        state
    }

    /// Render state for the host.
    pub fn snapshot(&self) -> EditorSnapshot {
        let palette = self.palette.target().zip(self.palette.anchor()).map(
            |(target, anchor)| PaletteSnapshot {
                target,
                anchor,
                query: self.palette.query().unwrap_or_default().to_string(),
                selected_index: self.palette.selected_index().unwrap_or(0),
                items: self
                    .palette
                    .matches()
                    .into_iter()
                    .map(|command| (command.block_type, command.label.to_string()))
                    .collect(),
            },
        );
        EditorSnapshot {
            page_id: self.engine.page_id().to_string(),
            blocks: self.engine.blocks().to_vec(),
            focused: self.focus.focused(),
            pending_focus: self.focus.pending(),
            palette,
            save_state: self.scheduler.state(),
        }
    }
}

fn load_engine<A: PersistenceAdapter>(
    adapter: &A,
    page_id: PageId,
    scheduler: &mut PersistenceScheduler,
) -> MutationEngine {
    match adapter.load(page_id.as_str()) {
        Ok(blocks) => MutationEngine::from_loaded(page_id, blocks),
        Err(err) => {
            error!(
                "event=page_load module=session status=error fallback=default_block error={}",
                err
            );
            scheduler.mark_blocked(err.to_string());
            MutationEngine::new(page_id)
        }
    }
}
