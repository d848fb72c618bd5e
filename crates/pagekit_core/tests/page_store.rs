use pagekit_core::db::{open_db, open_db_in_memory};
use pagekit_core::model::block::{Block, BlockType, PROP_CHECKED};
use pagekit_core::repo::page_repo::{PersistError, PAGE_FORMAT_VERSION};
use pagekit_core::{MemoryPageStore, PersistenceAdapter, SqlitePageStore};
use rusqlite::Connection;
use serde_json::json;

fn sample_blocks() -> Vec<Block> {
    let mut todo = Block::new(BlockType::Todo, "write tests");
    todo.properties.insert(PROP_CHECKED.to_string(), json!(true));
    vec![
        Block::new(BlockType::Heading1, "Plan"),
        todo,
        Block::new(BlockType::Divider, ""),
    ]
}

#[test]
fn sqlite_store_round_trips_document_order_and_properties() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePageStore::try_new(&conn).unwrap();
    let blocks = sample_blocks();

    store.save("page-1", &blocks).unwrap();
    assert_eq!(store.load("page-1").unwrap(), blocks);
}

#[test]
fn sqlite_store_save_replaces_previous_document() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePageStore::try_new(&conn).unwrap();

    store.save("page-1", &sample_blocks()).unwrap();
    let shorter = vec![Block::new(BlockType::Quote, "only")];
    store.save("page-1", &shorter).unwrap();

    assert_eq!(store.load("page-1").unwrap(), shorter);
    let pages = store.list_pages().unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].block_count, 1);
}

#[test]
fn missing_page_loads_as_empty() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePageStore::try_new(&conn).unwrap();
    assert!(store.load("never-saved").unwrap().is_empty());
}

#[test]
fn blank_page_id_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePageStore::try_new(&conn).unwrap();
    let err = store.save("  ", &sample_blocks()).unwrap_err();
    assert!(matches!(err, PersistError::InvalidPageId(_)));
}

#[test]
fn newer_format_version_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePageStore::try_new(&conn).unwrap();
    store.save("page-1", &sample_blocks()).unwrap();
    conn.execute(
        "UPDATE page_documents SET format_version = ?1 WHERE page_id = 'page-1';",
        [PAGE_FORMAT_VERSION + 1],
    )
    .unwrap();

    match store.load("page-1").unwrap_err() {
        PersistError::UnsupportedFormat { found, supported } => {
            assert_eq!(found, PAGE_FORMAT_VERSION + 1);
            assert_eq!(supported, PAGE_FORMAT_VERSION);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn corrupt_payload_loads_as_empty() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePageStore::try_new(&conn).unwrap();
    conn.execute(
        "INSERT INTO page_documents (page_id, blocks_json) VALUES ('broken', '{not json');",
        [],
    )
    .unwrap();
    assert!(store.load("broken").unwrap().is_empty());
}

#[test]
fn store_requires_migrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqlitePageStore::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        PersistError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn remove_page_reports_existence() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePageStore::try_new(&conn).unwrap();
    store.save("page-1", &sample_blocks()).unwrap();

    assert!(store.remove_page("page-1").unwrap());
    assert!(!store.remove_page("page-1").unwrap());
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pages.db");
    let blocks = sample_blocks();

    {
        let conn = open_db(&path).unwrap();
        SqlitePageStore::try_new(&conn)
            .unwrap()
            .save("page-1", &blocks)
            .unwrap();
    }

    let conn = open_db(&path).unwrap();
    let loaded = SqlitePageStore::try_new(&conn)
        .unwrap()
        .load("page-1")
        .unwrap();
    assert_eq!(loaded, blocks);
}

#[test]
fn memory_store_matches_sqlite_wire_format() {
    let memory = MemoryPageStore::new();
    let blocks = sample_blocks();
    memory.save("page-1", &blocks).unwrap();

    let raw = memory.raw("page-1").unwrap();
    let value: serde_json::Value = serde_json::from_str(raw.as_str()).unwrap();
    assert_eq!(value[1]["type"], "todo");
    assert_eq!(value[1]["properties"]["checked"], true);
    assert_eq!(memory.load("page-1").unwrap(), blocks);
}
