use pagekit_core::config::{EditorConfig, TeardownPolicy};
use pagekit_core::editor::focus::Direction;
use pagekit_core::editor::palette::{PaletteAnchor, PaletteKey, PaletteOutcome};
use pagekit_core::model::block::{BlockPatch, BlockType, Properties, PROP_CHECKED, PROP_EMOJI};
use pagekit_core::service::editor_session::ContentOutcome;
use pagekit_core::{
    EditorSession, MemoryPageStore, MutationEngine, MutationKind, PersistenceAdapter, SaveState,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

const PAGE: &str = "page-1";

fn session_with<'a>(store: &'a MemoryPageStore, contents: &[&str]) -> EditorSession<&'a MemoryPageStore> {
    let mut session = EditorSession::open(PAGE, store, EditorConfig::default());
    let first = session.blocks()[0].id;
    session.update(
        PAGE,
        first,
        &BlockPatch::content(contents[0]),
    );
    let mut after = first;
    for content in &contents[1..] {
        let mutation = session
            .insert(PAGE, Some(after), BlockType::Text, *content, Properties::new())
            .unwrap();
        after = mutation.block_id;
    }
    session
}

fn contents<A: PersistenceAdapter>(session: &EditorSession<A>) -> Vec<String> {
    session
        .blocks()
        .iter()
        .map(|block| block.content.clone())
        .collect()
}

#[test]
fn insert_into_blank_document_creates_single_text_block() {
    let mut engine = MutationEngine::blank(PAGE);
    engine.insert(None, BlockType::Text, "", Properties::new());

    assert_eq!(engine.blocks().len(), 1);
    assert_eq!(engine.blocks()[0].block_type, BlockType::Text);
    assert_eq!(engine.blocks()[0].content, "");
    assert!(engine.store().check_invariants().is_ok());
}

#[test]
fn typed_heading_trigger_converts_and_clears_block() {
    let store = MemoryPageStore::new();
    let mut session = EditorSession::open(PAGE, &store, EditorConfig::default());
    let block = session.blocks()[0].id;

    let outcome = session.update_content(PAGE, block, "## ");

    assert_eq!(outcome, ContentOutcome::Autoformatted(BlockType::Heading2));
    let converted = &session.blocks()[0];
    assert_eq!(converted.block_type, BlockType::Heading2);
    assert_eq!(converted.content, "");
}

#[test]
fn subscribers_never_see_the_trigger_text() {
    let store = MemoryPageStore::new();
    let mut session = EditorSession::open(PAGE, &store, EditorConfig::default());
    let block = session.blocks()[0].id;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    session.subscribe(Box::new(move |change| {
        let changed = change
            .blocks
            .iter()
            .find(|candidate| candidate.id == change.block_id)
            .unwrap();
        sink.lock()
            .unwrap()
            .push((change.kind, changed.block_type, changed.content.clone()));
    }));

    session.update_content(PAGE, block, "## ");

    let seen = seen.lock().unwrap();
    assert!(seen.iter().all(|(_, _, content)| content != "## "));
    assert_eq!(
        *seen,
        vec![
            (MutationKind::Transformed, BlockType::Heading2, String::new()),
            (MutationKind::Updated, BlockType::Heading2, String::new()),
        ]
    );
}

#[test]
fn trigger_only_fires_on_empty_to_non_empty_transition() {
    let store = MemoryPageStore::new();
    let mut session = session_with(&store, &["draft"]);
    let block = session.blocks()[0].id;

    assert_eq!(session.update_content(PAGE, block, "# "), ContentOutcome::Updated);
    assert_eq!(session.blocks()[0].block_type, BlockType::Text);
    assert_eq!(session.blocks()[0].content, "# ");
}

#[test]
fn trigger_inside_longer_text_is_kept_as_typed() {
    let store = MemoryPageStore::new();
    let mut session = EditorSession::open(PAGE, &store, EditorConfig::default());
    let block = session.blocks()[0].id;

    assert_eq!(
        session.update_content(PAGE, block, "# Title"),
        ContentOutcome::Updated
    );
    assert_eq!(session.blocks()[0].block_type, BlockType::Text);
}

#[test]
fn delete_middle_block_focuses_previous() {
    let store = MemoryPageStore::new();
    let mut session = session_with(&store, &["A", "B", "C"]);
    let ids = session.engine().store().ids();

    session.delete(PAGE, ids[1]);

    assert_eq!(contents(&session), vec!["A", "C"]);
    assert_eq!(session.focused(), Some(ids[0]));
}

#[test]
fn delete_first_block_focuses_next() {
    let store = MemoryPageStore::new();
    let mut session = session_with(&store, &["A", "B"]);
    let ids = session.engine().store().ids();

    session.delete(PAGE, ids[0]);
    assert_eq!(session.focused(), Some(ids[1]));
}

#[test]
fn deleting_only_block_synthesizes_fresh_default() {
    let store = MemoryPageStore::new();
    let mut session = session_with(&store, &["X"]);
    let only = session.blocks()[0].id;

    let mutation = session.delete(PAGE, only).unwrap();

    assert_eq!(session.blocks().len(), 1);
    let replacement = &session.blocks()[0];
    assert_ne!(replacement.id, only);
    assert_eq!(replacement.block_type, BlockType::Text);
    assert_eq!(replacement.content, "");
    assert_eq!(mutation.replacement_id, Some(replacement.id));
    assert_eq!(session.focused(), None);
}

#[test]
fn duplicate_lands_directly_after_source() {
    let store = MemoryPageStore::new();
    let mut session = session_with(&store, &["A", "B"]);
    let ids = session.engine().store().ids();

    let mutation = session.duplicate(PAGE, ids[0]).unwrap();

    assert_eq!(mutation.kind, MutationKind::Duplicated);
    assert_eq!(contents(&session), vec!["A", "A", "B"]);
    let copy = &session.blocks()[1];
    assert_ne!(copy.id, ids[0]);
    assert_eq!(copy.id, mutation.block_id);
}

#[test]
fn saves_once_after_quiet_period_with_latest_state() {
    let store = MemoryPageStore::new();
    let mut session = EditorSession::open(PAGE, &store, EditorConfig::default());
    let block = session.blocks()[0].id;

    for (at, content) in [(0, "a"), (200, "ab"), (400, "abc")] {
        session.set_time(at);
        session.update(PAGE, block, &BlockPatch::content(content));
    }

    session.on_frame(1_000);
    session.on_frame(1_399);
    assert_eq!(store.save_calls(), 0);

    session.on_frame(1_400);
    assert_eq!(store.save_calls(), 1);
    assert_eq!(session.save_state(), SaveState::Saved);
    assert_eq!(store.load(PAGE).unwrap()[0].content, "abc");

    session.on_frame(5_000);
    assert_eq!(store.save_calls(), 1);
}

#[test]
fn failed_save_surfaces_error_state() {
    let store = MemoryPageStore::new();
    let mut session = EditorSession::open(PAGE, &store, EditorConfig::default());
    let block = session.blocks()[0].id;
    store.fail_next_saves(1);

    session.update(PAGE, block, &BlockPatch::content("x"));
    session.on_frame(1_000);

    assert_eq!(session.save_state(), SaveState::Error);
    assert!(store.raw(PAGE).is_none());

    session.set_time(2_000);
    session.update(PAGE, block, &BlockPatch::content("xy"));
    session.on_frame(3_000);
    assert_eq!(session.save_state(), SaveState::Saved);
}

#[test]
fn configured_retries_recover_from_transient_failure() {
    let store = MemoryPageStore::new();
    let config = EditorConfig::default().with_retries(2, 100).unwrap();
    let mut session = EditorSession::open(PAGE, &store, config);
    let block = session.blocks()[0].id;
    store.fail_next_saves(1);

    session.update(PAGE, block, &BlockPatch::content("x"));
    session.on_frame(1_000);
    assert_eq!(session.save_state(), SaveState::Saving);

    session.on_frame(1_100);
    assert_eq!(session.save_state(), SaveState::Saved);
    assert_eq!(store.save_calls(), 2);
}

#[test]
fn transform_twice_is_idempotent() {
    let store = MemoryPageStore::new();
    let mut session = EditorSession::open(PAGE, &store, EditorConfig::default());
    let block = session.blocks()[0].id;
    let mut extra = Properties::new();
    extra.insert(PROP_CHECKED.to_string(), json!(false));

    session.transform(PAGE, block, BlockType::Todo, Some(&extra));
    let once = session.blocks()[0].clone();
    session.transform(PAGE, block, BlockType::Todo, Some(&extra));

    assert_eq!(session.blocks()[0], once);
}

#[test]
fn move_clamps_and_preserves_relative_order() {
    let store = MemoryPageStore::new();
    let mut session = session_with(&store, &["A", "B", "C", "D"]);
    let ids = session.engine().store().ids();

    session.move_block(PAGE, ids[0], 99);
    assert_eq!(contents(&session), vec!["B", "C", "D", "A"]);

    session.move_block(PAGE, ids[3], 1);
    assert_eq!(contents(&session), vec!["B", "D", "C", "A"]);

    assert!(session.move_block(PAGE, ids[1], 0).is_none());
}

#[test]
fn unknown_ids_are_silent_noops() {
    let store = MemoryPageStore::new();
    let mut session = session_with(&store, &["A"]);
    let ghost = uuid::Uuid::new_v4();

    assert!(session.delete(PAGE, ghost).is_none());
    assert!(session.duplicate(PAGE, ghost).is_none());
    assert!(session.transform(PAGE, ghost, BlockType::Quote, None).is_none());
    assert!(session.move_block(PAGE, ghost, 0).is_none());
    assert_eq!(
        session.update_content(PAGE, ghost, "# "),
        ContentOutcome::Ignored
    );
    assert_eq!(contents(&session), vec!["A"]);
}

#[test]
fn focus_moves_clamped_without_wraparound() {
    let store = MemoryPageStore::new();
    let mut session = session_with(&store, &["A", "B", "C"]);
    let ids = session.engine().store().ids();

    assert_eq!(session.move_focus(PAGE, ids[0], Direction::Up), Some(ids[0]));
    assert_eq!(session.move_focus(PAGE, ids[2], Direction::Down), Some(ids[2]));
    assert_eq!(session.move_focus(PAGE, ids[1], Direction::Down), Some(ids[2]));
    assert_eq!(
        session.move_focus(PAGE, uuid::Uuid::new_v4(), Direction::Up),
        None
    );
    assert_eq!(session.focused(), Some(ids[2]));
}

#[test]
fn inserted_block_takes_focus_on_next_frame() {
    let store = MemoryPageStore::new();
    let mut session = session_with(&store, &["A"]);
    let first = session.blocks()[0].id;

    let inserted = session
        .insert(PAGE, Some(first), BlockType::Text, "", Properties::new())
        .unwrap();
    assert_eq!(session.pending_focus().map(|p| p.target), Some(inserted.block_id));

    assert_eq!(session.on_frame(10), Some(inserted.block_id));
    assert_eq!(session.focused(), Some(inserted.block_id));
    assert!(session.pending_focus().is_none());
}

#[test]
fn duplicated_block_takes_focus_on_next_frame() {
    let store = MemoryPageStore::new();
    let mut session = session_with(&store, &["A", "B"]);
    let source = session.blocks()[0].id;

    let copy = session.duplicate(PAGE, source).unwrap().block_id;
    assert_eq!(session.pending_focus().map(|p| p.target), Some(copy));

    assert_eq!(session.on_frame(10), Some(copy));
    assert_eq!(session.focused(), Some(copy));
}

#[test]
fn palette_apply_transforms_and_sets_default_content() {
    let store = MemoryPageStore::new();
    let mut session = EditorSession::open(PAGE, &store, EditorConfig::default());
    let block = session.blocks()[0].id;

    assert!(session.open_palette(PAGE, block, PaletteAnchor { x: 4.0, y: 8.0 }));
    session.palette_input(PAGE, "CALLOUT");
    let snapshot = session.snapshot();
    assert_eq!(snapshot.palette.as_ref().unwrap().items.len(), 1);

    let outcome = session.palette_key(PAGE, PaletteKey::Enter);
    assert!(matches!(outcome, PaletteOutcome::Selected(_)));
    let converted = &session.blocks()[0];
    assert_eq!(converted.block_type, BlockType::Callout);
    assert_eq!(converted.properties.get(PROP_EMOJI), Some(&json!("💡")));
    assert!(!session.palette().is_open());

    session.transform(PAGE, block, BlockType::Text, None);
    session.update(PAGE, block, &BlockPatch::content("keep me"));
    assert!(!session.open_palette(PAGE, block, PaletteAnchor::default()));
}

#[test]
fn palette_divider_applies_default_content() {
    let store = MemoryPageStore::new();
    let mut session = EditorSession::open(PAGE, &store, EditorConfig::default());
    let block = session.blocks()[0].id;
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    session.subscribe(Box::new(move |change| {
        sink.lock().unwrap().push(change.kind);
    }));

    session.open_palette(PAGE, block, PaletteAnchor::default());
    session.palette_input(PAGE, "---");
    session.palette_key(PAGE, PaletteKey::Enter);

    assert_eq!(session.blocks()[0].block_type, BlockType::Divider);
    assert_eq!(
        *changes.lock().unwrap(),
        vec![MutationKind::Transformed, MutationKind::Updated]
    );
}

#[test]
fn palette_escape_and_outside_click_leave_document_untouched() {
    let store = MemoryPageStore::new();
    let mut session = EditorSession::open(PAGE, &store, EditorConfig::default());
    let block = session.blocks()[0].id;

    session.open_palette(PAGE, block, PaletteAnchor::default());
    assert_eq!(
        session.palette_key(PAGE, PaletteKey::Escape),
        PaletteOutcome::Dismissed
    );
    session.open_palette(PAGE, block, PaletteAnchor::default());
    session.palette_click_outside(PAGE);

    assert!(session.snapshot().palette.is_none());
    assert_eq!(session.blocks()[0].block_type, BlockType::Text);
    assert!(!session.scheduler().has_unsaved_changes());
}

#[test]
fn deleting_palette_target_closes_palette() {
    let store = MemoryPageStore::new();
    let mut session = session_with(&store, &["A", ""]);
    let target = session.blocks()[1].id;

    assert!(session.open_palette(PAGE, target, PaletteAnchor::default()));
    session.delete(PAGE, target);
    assert!(!session.palette().is_open());
}

#[test]
fn close_flushes_pending_edits_by_default() {
    let store = MemoryPageStore::new();
    let mut session = EditorSession::open(PAGE, &store, EditorConfig::default());
    let block = session.blocks()[0].id;
    session.update(PAGE, block, &BlockPatch::content("unsaved"));

    assert_eq!(session.close(), SaveState::Saved);
    assert_eq!(store.load(PAGE).unwrap()[0].content, "unsaved");
}

#[test]
fn discard_policy_drops_pending_edits_on_close() {
    let store = MemoryPageStore::new();
    let config = EditorConfig::default().with_teardown_policy(TeardownPolicy::Discard);
    let mut session = EditorSession::open(PAGE, &store, config);
    let block = session.blocks()[0].id;
    session.update(PAGE, block, &BlockPatch::content("lost"));

    assert_eq!(session.close(), SaveState::Idle);
    assert_eq!(store.save_calls(), 0);
}

#[test]
fn switching_pages_flushes_and_isolates_state() {
    let store = MemoryPageStore::new();
    let mut session = EditorSession::open(PAGE, &store, EditorConfig::default());
    let block = session.blocks()[0].id;
    session
        .insert(PAGE, Some(block), BlockType::Text, "second", Properties::new())
        .unwrap();

    assert_eq!(session.switch_page("page-2"), SaveState::Saved);
    assert_eq!(session.page_id(), "page-2");
    assert_eq!(session.blocks().len(), 1);
    assert!(session.pending_focus().is_none());
    assert!(session.focused().is_none());

    assert!(session
        .insert(PAGE, None, BlockType::Text, "stale", Properties::new())
        .is_none());
    assert_eq!(store.load(PAGE).unwrap().len(), 2);

    session.switch_page(PAGE);
    assert_eq!(contents(&session), vec!["", "second"]);
}

#[test]
fn load_failure_opens_default_document_without_overwriting() {
    let failing = FailingLoad;
    let mut session = EditorSession::open(PAGE, &failing, EditorConfig::default());

    assert_eq!(session.blocks().len(), 1);
    assert_eq!(session.save_state(), SaveState::Error);

    let block = session.blocks()[0].id;
    session.update(PAGE, block, &BlockPatch::content("x"));
    session.on_frame(10_000);
    assert_eq!(session.close(), SaveState::Error);
}

#[test]
fn malformed_stored_payload_loads_default_block() {
    let store = MemoryPageStore::new();
    store.put_raw(PAGE, "{\"blocks\": []}");

    let session = EditorSession::open(PAGE, &store, EditorConfig::default());
    assert_eq!(session.blocks().len(), 1);
    assert_eq!(session.blocks()[0].block_type, BlockType::Text);
    assert_eq!(session.save_state(), SaveState::Idle);
}

#[test]
fn list_enter_continues_and_exits_list() {
    let store = MemoryPageStore::new();
    let mut session = EditorSession::open(PAGE, &store, EditorConfig::default());
    let first = session.blocks()[0].id;
    session.update_content(PAGE, first, "1. ");
    session.update_content(PAGE, first, "one");

    let next = session.split_after(PAGE, first).unwrap().block_id;
    assert_eq!(session.blocks()[1].block_type, BlockType::Numbered);
    assert_eq!(session.blocks()[1].number(), 2);

    session.split_after(PAGE, next);
    assert_eq!(session.blocks()[1].block_type, BlockType::Text);
    assert_eq!(session.blocks().len(), 2);
}

struct FailingLoad;

impl PersistenceAdapter for FailingLoad {
    fn load(&self, _page_id: &str) -> pagekit_core::PersistResult<Vec<pagekit_core::Block>> {
        Err(pagekit_core::PersistError::Unavailable("offline".to_string()))
    }

    fn save(
        &self,
        _page_id: &str,
        _blocks: &[pagekit_core::Block],
    ) -> pagekit_core::PersistResult<()> {
        panic!("save must not run after a failed load");
    }
}
