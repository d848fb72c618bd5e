//! FFI use-case API for Flutter-facing editor calls.
//!
//! # Responsibility
//! - Expose the block editor session to Dart via FRB as flat, sync calls.
//! - Hold open sessions in-process, keyed by page id.
//! - Persist documents to the entry SQLite file.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Failures come back as envelopes with `ok=false` and a message.
//! - The logical clock fed to sessions is monotonic process time.

use log::warn;
use once_cell::sync::Lazy;
use pagekit_core::db::open_db;
use pagekit_core::service::editor_session::PaletteSnapshot;
use pagekit_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Block, BlockId, BlockType, ContentOutcome, Direction, EditorConfig, EditorSession,
    EditorSnapshot, Mutation, PaletteAnchor, PaletteKey, PaletteOutcome, PersistResult,
    PersistenceAdapter, Properties, SqlitePageStore,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;
use uuid::Uuid;

const ENTRY_DB_FILE_NAME: &str = "pagekit_entry.sqlite3";
const ENTRY_DB_PATH_ENV: &str = "PAGEKIT_DB_PATH";
static ENTRY_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static CLOCK_ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);
static SESSIONS: Lazy<Mutex<BTreeMap<String, EditorSession<EntryDbStore>>>> =
    Lazy::new(|| Mutex::new(BTreeMap::new()));

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
/// - Idempotent for identical arguments.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One block as seen by Dart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDto {
    pub id: String,
    /// Wire type name (`text|heading1|...`).
    pub block_type: String,
    pub content: String,
    /// `properties` object encoded as JSON.
    pub properties_json: String,
}

/// One palette row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteItemDto {
    pub block_type: String,
    pub label: String,
}

/// Open palette state.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteDto {
    pub target_id: String,
    pub anchor_x: f64,
    pub anchor_y: f64,
    pub query: String,
    pub selected_index: u32,
    pub items: Vec<PaletteItemDto>,
}

/// Full render state for one open page.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorSnapshotDto {
    pub ok: bool,
    pub page_id: String,
    pub blocks: Vec<BlockDto>,
    pub focused_id: Option<String>,
    pub palette: Option<PaletteDto>,
    /// `idle|saving|saved|error`.
    pub save_state: String,
    pub message: String,
}

impl EditorSnapshotDto {
    fn failure(page_id: String, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            page_id,
            blocks: Vec::new(),
            focused_id: None,
            palette: None,
            save_state: "idle".to_string(),
            message: message.into(),
        }
    }
}

/// Generic action response envelope for editor commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorActionResponse {
    /// Whether the command changed anything.
    pub ok: bool,
    /// Block the command produced or affected.
    pub block_id: Option<String>,
    pub save_state: String,
    pub message: String,
}

impl EditorActionResponse {
    fn applied(block_id: Option<BlockId>, save_state: &str, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            block_id: block_id.map(|id| id.to_string()),
            save_state: save_state.to_string(),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            block_id: None,
            save_state: String::new(),
            message: message.into(),
        }
    }
}

/// Opens (or re-attaches to) the editor for `page_id`.
///
/// # FFI contract
/// - Sync call, DB-backed load on first open.
/// - Load failures still open a session with one empty block; saving stays
///   disabled and `save_state` reports `error`.
#[flutter_rust_bridge::frb(sync)]
pub fn editor_open(page_id: String) -> EditorSnapshotDto {
    let page_id = page_id.trim().to_string();
    if page_id.is_empty() {
        return EditorSnapshotDto::failure(page_id, "editor_open failed: page id is empty");
    }
    let mut sessions = match SESSIONS.lock() {
        Ok(sessions) => sessions,
        Err(_) => return EditorSnapshotDto::failure(page_id, "editor_open failed: lock poisoned"),
    };
    let session = sessions.entry(page_id.clone()).or_insert_with(|| {
        let mut session = EditorSession::open(page_id.clone(), EntryDbStore, entry_config());
        session.set_time(now_ms());
        session
    });
    to_snapshot_dto(&session.snapshot(), "Opened.")
}

/// Current render state without advancing anything.
#[flutter_rust_bridge::frb(sync)]
pub fn editor_snapshot(page_id: String) -> EditorSnapshotDto {
    let page_id = page_id.trim().to_string();
    match with_session(&page_id, |session| session.snapshot()) {
        Ok(snapshot) => to_snapshot_dto(&snapshot, "Snapshot."),
        Err(err) => EditorSnapshotDto::failure(page_id, format!("editor_snapshot failed: {err}")),
    }
}

/// Per-frame hook: resolves deferred focus and runs due saves.
///
/// # FFI contract
/// - Call once per rendered frame while the page is visible.
/// - May perform one SQLite write when a save is due.
#[flutter_rust_bridge::frb(sync)]
pub fn editor_tick(page_id: String) -> EditorSnapshotDto {
    let page_id = page_id.trim().to_string();
    let result = with_session(&page_id, |session| {
        session.on_frame(now_ms());
        session.snapshot()
    });
    match result {
        Ok(snapshot) => to_snapshot_dto(&snapshot, "Tick."),
        Err(err) => EditorSnapshotDto::failure(page_id, format!("editor_tick failed: {err}")),
    }
}

/// Inserts a block after `after_id` (or at the end).
#[flutter_rust_bridge::frb(sync)]
pub fn editor_insert(
    page_id: String,
    after_id: Option<String>,
    block_type: String,
    content: String,
) -> EditorActionResponse {
    let request = (|| -> Result<(Option<BlockId>, BlockType), String> {
        let after = after_id.as_deref().map(parse_block_id).transpose()?;
        Ok((after, parse_block_type(block_type.as_str())?))
    })();
    let (after, block_type) = match request {
        Ok(request) => request,
        Err(err) => return EditorActionResponse::failure(format!("editor_insert failed: {err}")),
    };
    run_mutation(&page_id, "editor_insert", |session, page| {
        session.insert(page, after, block_type, content, Properties::new())
    })
}

/// Replaces block content; may autoformat an empty text block.
#[flutter_rust_bridge::frb(sync)]
pub fn editor_update_content(
    page_id: String,
    block_id: String,
    content: String,
) -> EditorActionResponse {
    let page_id = page_id.trim().to_string();
    let id = match parse_block_id(block_id.as_str()) {
        Ok(id) => id,
        Err(err) => {
            return EditorActionResponse::failure(format!("editor_update_content failed: {err}"))
        }
    };
    let result = with_session(&page_id, |session| {
        let outcome = session.update_content(page_id.as_str(), id, content);
        (outcome, session.save_state().as_str())
    });
    match result {
        Ok((ContentOutcome::Updated, state)) => {
            EditorActionResponse::applied(Some(id), state, "Updated.")
        }
        Ok((ContentOutcome::Autoformatted(block_type), state)) => {
            EditorActionResponse::applied(Some(id), state, format!("Autoformatted to {block_type}."))
        }
        Ok((ContentOutcome::Ignored, _)) => {
            EditorActionResponse::failure("editor_update_content ignored: unknown block")
        }
        Err(err) => EditorActionResponse::failure(format!("editor_update_content failed: {err}")),
    }
}

/// Deletes a block; the last block is replaced by an empty text block.
#[flutter_rust_bridge::frb(sync)]
pub fn editor_delete(page_id: String, block_id: String) -> EditorActionResponse {
    run_block_mutation(&page_id, &block_id, "editor_delete", |session, page, id| {
        session.delete(page, id)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn editor_duplicate(page_id: String, block_id: String) -> EditorActionResponse {
    run_block_mutation(&page_id, &block_id, "editor_duplicate", |session, page, id| {
        session.duplicate(page, id)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn editor_transform(
    page_id: String,
    block_id: String,
    block_type: String,
) -> EditorActionResponse {
    let block_type = match parse_block_type(block_type.as_str()) {
        Ok(block_type) => block_type,
        Err(err) => return EditorActionResponse::failure(format!("editor_transform failed: {err}")),
    };
    run_block_mutation(&page_id, &block_id, "editor_transform", |session, page, id| {
        session.transform(page, id, block_type, None)
    })
}

/// Moves a block to `target_index` (clamped to the document).
#[flutter_rust_bridge::frb(sync)]
pub fn editor_move(page_id: String, block_id: String, target_index: u32) -> EditorActionResponse {
    let target_index = usize::try_from(target_index).unwrap_or(usize::MAX);
    run_block_mutation(&page_id, &block_id, "editor_move", |session, page, id| {
        session.move_block(page, id, target_index)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn editor_indent(page_id: String, block_id: String) -> EditorActionResponse {
    run_block_mutation(&page_id, &block_id, "editor_indent", |session, page, id| {
        session.indent(page, id)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn editor_outdent(page_id: String, block_id: String) -> EditorActionResponse {
    run_block_mutation(&page_id, &block_id, "editor_outdent", |session, page, id| {
        session.outdent(page, id)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn editor_toggle_checked(page_id: String, block_id: String) -> EditorActionResponse {
    run_block_mutation(
        &page_id,
        &block_id,
        "editor_toggle_checked",
        |session, page, id| session.toggle_checked(page, id),
    )
}

/// "Enter" key on a block.
#[flutter_rust_bridge::frb(sync)]
pub fn editor_split(page_id: String, block_id: String) -> EditorActionResponse {
    run_block_mutation(&page_id, &block_id, "editor_split", |session, page, id| {
        session.split_after(page, id)
    })
}

/// Arrow-key focus navigation. `direction` is `up` or `down`.
#[flutter_rust_bridge::frb(sync)]
pub fn editor_move_focus(
    page_id: String,
    current_id: String,
    direction: String,
) -> EditorActionResponse {
    let page_id = page_id.trim().to_string();
    let direction = match direction.trim().to_ascii_lowercase().as_str() {
        "up" => Direction::Up,
        "down" => Direction::Down,
        other => {
            return EditorActionResponse::failure(format!(
                "editor_move_focus failed: unknown direction `{other}`"
            ))
        }
    };
    let current = match parse_block_id(current_id.as_str()) {
        Ok(id) => id,
        Err(err) => return EditorActionResponse::failure(format!("editor_move_focus failed: {err}")),
    };
    let result = with_session(&page_id, |session| {
        let focused = session.move_focus(page_id.as_str(), current, direction);
        (focused, session.save_state().as_str())
    });
    match result {
        Ok((Some(focused), state)) => EditorActionResponse::applied(Some(focused), state, "Focused."),
        Ok((None, _)) => EditorActionResponse::failure("editor_move_focus: no block in direction"),
        Err(err) => EditorActionResponse::failure(format!("editor_move_focus failed: {err}")),
    }
}

/// Opens the command palette on an empty block.
#[flutter_rust_bridge::frb(sync)]
pub fn editor_palette_open(
    page_id: String,
    block_id: String,
    anchor_x: f64,
    anchor_y: f64,
) -> EditorSnapshotDto {
    let page_id = page_id.trim().to_string();
    let target = match parse_block_id(block_id.as_str()) {
        Ok(id) => id,
        Err(err) => {
            return EditorSnapshotDto::failure(page_id, format!("editor_palette_open failed: {err}"))
        }
    };
    let result = with_session(&page_id, |session| {
        let anchor = PaletteAnchor {
            x: anchor_x,
            y: anchor_y,
        };
        let opened = session.open_palette(page_id.as_str(), target, anchor);
        (opened, session.snapshot())
    });
    match result {
        Ok((true, snapshot)) => to_snapshot_dto(&snapshot, "Palette opened."),
        Ok((false, snapshot)) => {
            let mut dto = to_snapshot_dto(&snapshot, "Palette requires an empty block.");
            dto.ok = false;
            dto
        }
        Err(err) => EditorSnapshotDto::failure(page_id, format!("editor_palette_open failed: {err}")),
    }
}

/// Replaces the palette filter query.
#[flutter_rust_bridge::frb(sync)]
pub fn editor_palette_input(page_id: String, query: String) -> EditorSnapshotDto {
    let page_id = page_id.trim().to_string();
    let result = with_session(&page_id, |session| {
        session.palette_input(page_id.as_str(), query.as_str());
        session.snapshot()
    });
    match result {
        Ok(snapshot) => to_snapshot_dto(&snapshot, "Filtered."),
        Err(err) => EditorSnapshotDto::failure(page_id, format!("editor_palette_input failed: {err}")),
    }
}

/// Palette navigation key: `up|down|enter|escape`.
#[flutter_rust_bridge::frb(sync)]
pub fn editor_palette_key(page_id: String, key: String) -> EditorSnapshotDto {
    let page_id = page_id.trim().to_string();
    let key = match key.trim().to_ascii_lowercase().as_str() {
        "up" => PaletteKey::Up,
        "down" => PaletteKey::Down,
        "enter" => PaletteKey::Enter,
        "escape" | "esc" => PaletteKey::Escape,
        other => {
            return EditorSnapshotDto::failure(
                page_id,
                format!("editor_palette_key failed: unknown key `{other}`"),
            )
        }
    };
    let result = with_session(&page_id, |session| {
        let outcome = session.palette_key(page_id.as_str(), key);
        (outcome, session.snapshot())
    });
    match result {
        Ok((PaletteOutcome::Selected(selection), snapshot)) => to_snapshot_dto(
            &snapshot,
            format!("Applied {}.", selection.command.block_type),
        ),
        Ok((PaletteOutcome::Dismissed, snapshot)) => to_snapshot_dto(&snapshot, "Dismissed."),
        Ok((PaletteOutcome::Pending, snapshot)) => to_snapshot_dto(&snapshot, "Pending."),
        Err(err) => EditorSnapshotDto::failure(page_id, format!("editor_palette_key failed: {err}")),
    }
}

/// Interaction outside the palette overlay.
#[flutter_rust_bridge::frb(sync)]
pub fn editor_palette_dismiss(page_id: String) -> EditorSnapshotDto {
    let page_id = page_id.trim().to_string();
    let result = with_session(&page_id, |session| {
        session.palette_click_outside(page_id.as_str());
        session.snapshot()
    });
    match result {
        Ok(snapshot) => to_snapshot_dto(&snapshot, "Dismissed."),
        Err(err) => {
            EditorSnapshotDto::failure(page_id, format!("editor_palette_dismiss failed: {err}"))
        }
    }
}

/// Saves now if anything is unsaved.
#[flutter_rust_bridge::frb(sync)]
pub fn editor_flush(page_id: String) -> EditorActionResponse {
    let page_id = page_id.trim().to_string();
    match with_session(&page_id, |session| session.flush(page_id.as_str())) {
        Ok(state) => EditorActionResponse::applied(None, state.as_str(), "Flushed."),
        Err(err) => EditorActionResponse::failure(format!("editor_flush failed: {err}")),
    }
}

/// Closes the page session, flushing or discarding per `PAGEKIT_TEARDOWN`.
#[flutter_rust_bridge::frb(sync)]
pub fn editor_close(page_id: String) -> EditorActionResponse {
    let page_id = page_id.trim().to_string();
    let mut sessions = match SESSIONS.lock() {
        Ok(sessions) => sessions,
        Err(_) => return EditorActionResponse::failure("editor_close failed: lock poisoned"),
    };
    let Some(mut session) = sessions.remove(page_id.as_str()) else {
        return EditorActionResponse::failure("editor_close failed: page is not open");
    };
    drop(sessions);
    session.set_time(now_ms());
    let state = session.close();
    EditorActionResponse::applied(None, state.as_str(), "Closed.")
}

/// Adapter opening the entry database for each load/save.
struct EntryDbStore;

impl PersistenceAdapter for EntryDbStore {
    fn load(&self, page_id: &str) -> PersistResult<Vec<Block>> {
        let conn = open_db(resolve_entry_db_path())?;
        SqlitePageStore::try_new(&conn)?.load(page_id)
    }

    fn save(&self, page_id: &str, blocks: &[Block]) -> PersistResult<()> {
        let conn = open_db(resolve_entry_db_path())?;
        SqlitePageStore::try_new(&conn)?.save(page_id, blocks)
    }
}

fn entry_config() -> EditorConfig {
    EditorConfig::from_env().unwrap_or_else(|err| {
        warn!(
            "event=config_load module=ffi status=fallback error={}",
            err
        );
        EditorConfig::default()
    })
}

fn now_ms() -> u64 {
    u64::try_from(CLOCK_ORIGIN.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn resolve_entry_db_path() -> PathBuf {
    ENTRY_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(ENTRY_DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(ENTRY_DB_FILE_NAME)
        })
        .clone()
}

fn with_session<R>(
    page_id: &str,
    f: impl FnOnce(&mut EditorSession<EntryDbStore>) -> R,
) -> Result<R, String> {
    let mut sessions = SESSIONS
        .lock()
        .map_err(|_| "session registry lock poisoned".to_string())?;
    let session = sessions
        .get_mut(page_id)
        .ok_or_else(|| format!("page `{page_id}` is not open"))?;
    session.set_time(now_ms());
    Ok(f(session))
}

fn run_mutation(
    page_id: &str,
    operation: &str,
    f: impl FnOnce(&mut EditorSession<EntryDbStore>, &str) -> Option<Mutation>,
) -> EditorActionResponse {
    let page = page_id.trim();
    let result = with_session(page, |session| {
        let mutation = f(session, page);
        (mutation, session.save_state().as_str())
    });
    match result {
        Ok((Some(mutation), state)) => EditorActionResponse::applied(
            Some(mutation.created_block().unwrap_or(mutation.block_id)),
            state,
            format!("{}.", mutation.kind.as_str()),
        ),
        Ok((None, _)) => EditorActionResponse::failure(format!("{operation}: nothing changed")),
        Err(err) => EditorActionResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn run_block_mutation(
    page_id: &str,
    block_id: &str,
    operation: &str,
    f: impl FnOnce(&mut EditorSession<EntryDbStore>, &str, BlockId) -> Option<Mutation>,
) -> EditorActionResponse {
    match parse_block_id(block_id) {
        Ok(id) => run_mutation(page_id, operation, |session, page| f(session, page, id)),
        Err(err) => EditorActionResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn parse_block_id(raw: &str) -> Result<BlockId, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("invalid block id `{}`", raw.trim()))
}

fn parse_block_type(raw: &str) -> Result<BlockType, String> {
    BlockType::parse(raw).ok_or_else(|| format!("unknown block type `{}`", raw.trim()))
}

fn to_block_dto(block: &Block) -> BlockDto {
    BlockDto {
        id: block.id.to_string(),
        block_type: block.block_type.as_str().to_string(),
        content: block.content.clone(),
        properties_json: serde_json::to_string(&block.properties)
            .unwrap_or_else(|_| "{}".to_string()),
    }
}

fn to_palette_dto(palette: &PaletteSnapshot) -> PaletteDto {
    PaletteDto {
        target_id: palette.target.to_string(),
        anchor_x: palette.anchor.x,
        anchor_y: palette.anchor.y,
        query: palette.query.clone(),
        selected_index: u32::try_from(palette.selected_index).unwrap_or(u32::MAX),
        items: palette
            .items
            .iter()
            .map(|(block_type, label)| PaletteItemDto {
                block_type: block_type.as_str().to_string(),
                label: label.clone(),
            })
            .collect(),
    }
}

fn to_snapshot_dto(snapshot: &EditorSnapshot, message: impl Into<String>) -> EditorSnapshotDto {
    EditorSnapshotDto {
        ok: true,
        page_id: snapshot.page_id.clone(),
        blocks: snapshot.blocks.iter().map(to_block_dto).collect(),
        focused_id: snapshot.focused.map(|id| id.to_string()),
        palette: snapshot.palette.as_ref().map(to_palette_dto),
        save_state: snapshot.save_state.as_str().to_string(),
        message: message.into(),
    }
}
