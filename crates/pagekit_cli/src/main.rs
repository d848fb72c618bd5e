//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `pagekit_core` linkage with a deterministic probe.
//! - With `--demo`, drive one scripted editing session against an
//!   in-memory SQLite store and print the stored document as JSON.

use pagekit_core::db::open_db_in_memory;
use pagekit_core::{
    BlockType, EditorConfig, EditorSession, PaletteAnchor, PaletteKey, PersistenceAdapter,
    Properties, SqlitePageStore,
};
use std::process::ExitCode;

const DEMO_PAGE_ID: &str = "demo";

fn main() -> ExitCode {
    println!("pagekit_core ping={}", pagekit_core::ping());
    println!("pagekit_core version={}", pagekit_core::core_version());

    if std::env::args().skip(1).any(|arg| arg == "--demo") {
        if let Err(err) = run_demo() {
            eprintln!("demo failed: {err}");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_db_in_memory()?;
    let store = SqlitePageStore::try_new(&conn)?;
    let mut session = EditorSession::open(DEMO_PAGE_ID, &store, EditorConfig::from_env()?);

    let title = session.blocks()[0].id;
    session.update_content(DEMO_PAGE_ID, title, "# ");
    session.update_content(DEMO_PAGE_ID, title, "Weekly plan");

    let Some(item) = session.split_after(DEMO_PAGE_ID, title) else {
        return Err("split produced no block".into());
    };
    session.on_frame(10);
    session.update_content(DEMO_PAGE_ID, item.block_id, "[] ");
    session.update_content(DEMO_PAGE_ID, item.block_id, "Ship the editor core");
    session.split_after(DEMO_PAGE_ID, item.block_id);

    let note = session.insert(DEMO_PAGE_ID, None, BlockType::Text, "", Properties::new());
    if let Some(note) = note {
        session.on_frame(20);
        session.open_palette(DEMO_PAGE_ID, note.block_id, PaletteAnchor::default());
        session.palette_input(DEMO_PAGE_ID, "callout");
        session.palette_key(DEMO_PAGE_ID, PaletteKey::Enter);
        session.update_content(DEMO_PAGE_ID, note.block_id, "Saves are debounced.");
    }

    session.on_frame(5_000);
    println!("save_state={}", session.close().as_str());

    let stored = store.load(DEMO_PAGE_ID)?;
    println!("{}", serde_json::to_string_pretty(&stored)?);
    Ok(())
}
