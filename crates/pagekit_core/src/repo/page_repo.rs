//! Page document persistence contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the `PersistenceAdapter` boundary consumed by the editing core.
//! - Encode/decode the persisted representation: one ordered JSON array of
//!   `{id, type, content, properties}` records per page id.
//! - Store documents in SQLite with an explicit format version tag.
//!
//! # Invariants
//! - Malformed payloads never surface as errors from `decode_blocks`; they
//!   decode to an empty list and the engine substitutes a default block.
//! - Rows tagged with a newer `format_version` are rejected, not guessed at.
//! - `save` replaces the whole document for a page atomically.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::block::{Block, PageId};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Format version written with every stored document.
pub const PAGE_FORMAT_VERSION: u32 = 1;

pub type PersistResult<T> = Result<T, PersistError>;

/// Errors from persistence adapters.
#[derive(Debug)]
pub enum PersistError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Blocks could not be serialized.
    Encode(serde_json::Error),
    /// Page id is blank after trim.
    InvalidPageId(String),
    /// Stored document was written by a newer format.
    UnsupportedFormat { found: u32, supported: u32 },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Adapter cannot serve requests right now (I/O, injected faults, ...).
    Unavailable(String),
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "failed to encode page blocks: {err}"),
            Self::InvalidPageId(value) => write!(f, "invalid page id: `{value}`"),
            Self::UnsupportedFormat { found, supported } => write!(
                f,
                "page document format {found} is newer than supported {supported}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "page store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::Unavailable(message) => write!(f, "page store unavailable: {message}"),
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for PersistError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PersistError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Storage boundary for page documents.
///
/// Implementations may be slow or fail; callers treat failures as data,
/// never as panics.
pub trait PersistenceAdapter {
    /// Returns stored blocks, or an empty list when nothing usable exists.
    fn load(&self, page_id: &str) -> PersistResult<Vec<Block>>;
    /// Replaces the stored document for `page_id`.
    fn save(&self, page_id: &str, blocks: &[Block]) -> PersistResult<()>;
}

impl<T: PersistenceAdapter + ?Sized> PersistenceAdapter for &T {
    fn load(&self, page_id: &str) -> PersistResult<Vec<Block>> {
        (**self).load(page_id)
    }

    fn save(&self, page_id: &str, blocks: &[Block]) -> PersistResult<()> {
        (**self).save(page_id, blocks)
    }
}

/// Serializes blocks into the persisted JSON array.
pub fn encode_blocks(blocks: &[Block]) -> PersistResult<String> {
    Ok(serde_json::to_string(blocks)?)
}

/// Decodes a persisted JSON array.
///
/// Non-array or unparsable payloads yield an empty list. Individual records
/// that do not decode are skipped.
pub fn decode_blocks(raw: &str) -> Vec<Block> {
    let records = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(records)) => records,
        Ok(_) => {
            warn!("event=page_decode module=repo status=fallback reason=not_array");
            return Vec::new();
        }
        Err(_) => {
            warn!("event=page_decode module=repo status=fallback reason=invalid_json");
            return Vec::new();
        }
    };

    let total = records.len();
    let blocks = records
        .into_iter()
        .filter_map(|record| serde_json::from_value::<Block>(record).ok())
        .collect::<Vec<_>>();
    if blocks.len() != total {
        warn!(
            "event=page_decode module=repo status=partial skipped={} kept={}",
            total - blocks.len(),
            blocks.len()
        );
    }
    blocks
}

pub(crate) fn normalize_page_id(page_id: &str) -> PersistResult<&str> {
    let trimmed = page_id.trim();
    if trimmed.is_empty() {
        return Err(PersistError::InvalidPageId(page_id.to_string()));
    }
    Ok(trimmed)
}

/// Summary row for stored pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPageSummary {
    pub page_id: PageId,
    pub block_count: u32,
    /// Epoch ms of the last save.
    pub updated_at: i64,
}

/// SQLite-backed page store.
pub struct SqlitePageStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePageStore<'conn> {
    /// Creates the store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> PersistResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(PersistError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Lists stored pages, most recently saved first.
    pub fn list_pages(&self) -> PersistResult<Vec<StoredPageSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT page_id, block_count, updated_at
             FROM page_documents
             ORDER BY updated_at DESC, page_id ASC;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredPageSummary {
                page_id: row.get(0)?,
                block_count: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;
        let mut pages = Vec::new();
        for row in rows {
            pages.push(row?);
        }
        Ok(pages)
    }

    /// Removes a stored page. Returns whether a row existed.
    pub fn remove_page(&self, page_id: &str) -> PersistResult<bool> {
        let page_id = normalize_page_id(page_id)?;
        let changed = self
            .conn
            .execute("DELETE FROM page_documents WHERE page_id = ?1;", [page_id])?;
        Ok(changed > 0)
    }
}

impl PersistenceAdapter for SqlitePageStore<'_> {
    fn load(&self, page_id: &str) -> PersistResult<Vec<Block>> {
        let page_id = normalize_page_id(page_id)?;
        let row: Option<(u32, String)> = self
            .conn
            .query_row(
                "SELECT format_version, blocks_json
                 FROM page_documents
                 WHERE page_id = ?1;",
                [page_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((format_version, blocks_json)) = row else {
            return Ok(Vec::new());
        };
        if format_version > PAGE_FORMAT_VERSION {
            return Err(PersistError::UnsupportedFormat {
                found: format_version,
                supported: PAGE_FORMAT_VERSION,
            });
        }
        Ok(decode_blocks(blocks_json.as_str()))
    }

    fn save(&self, page_id: &str, blocks: &[Block]) -> PersistResult<()> {
        let page_id = normalize_page_id(page_id)?;
        let blocks_json = encode_blocks(blocks)?;
        let block_count = u32::try_from(blocks.len()).unwrap_or(u32::MAX);
        self.conn.execute(
            "INSERT INTO page_documents (page_id, format_version, blocks_json, block_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(page_id) DO UPDATE SET
                format_version = excluded.format_version,
                blocks_json = excluded.blocks_json,
                block_count = excluded.block_count,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![page_id, PAGE_FORMAT_VERSION, blocks_json, block_count],
        )?;
        info!(
            "event=page_save module=repo status=ok block_count={}",
            block_count
        );
        Ok(())
    }
}
