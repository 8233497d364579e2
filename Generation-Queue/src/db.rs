use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use image_normalizer::AspectRatio;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::error::GenerationError;
use crate::store::{HistoryEntry, ResultStore};
use crate::types::{GenerationResult, ImageModel, Resolution};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS generation_history (
    id              TEXT PRIMARY KEY,
    prompt          TEXT NOT NULL,
    negative_prompt TEXT NOT NULL DEFAULT '',
    aspect_ratio    TEXT NOT NULL,
    seed            INTEGER NOT NULL,
    model           TEXT NOT NULL,
    resolution      TEXT NOT NULL,
    width           INTEGER NOT NULL,
    height          INTEGER NOT NULL,
    mime_type       TEXT NOT NULL,
    thumbnail       BLOB NOT NULL,
    favorite        INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_created ON generation_history(created_at);

CREATE TABLE IF NOT EXISTS generation_images (
    id      TEXT PRIMARY KEY REFERENCES generation_history(id) ON DELETE CASCADE,
    data    BLOB NOT NULL
);
"#;

const ENTRY_COLUMNS: &str = "id, prompt, negative_prompt, aspect_ratio, seed, model, resolution, \
                             width, height, mime_type, thumbnail, favorite, created_at";

/// Open (or create) the history database. Pass `None` for an in-memory database.
pub fn open_database(path: Option<&Path>) -> Result<Connection> {
    let conn = match path {
        Some(p) => Connection::open(p).context("Failed to open history database")?,
        None => Connection::open_in_memory().context("Failed to open in-memory database")?,
    };

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
    .context("Failed to set PRAGMA options")?;

    conn.execute_batch(SCHEMA)
        .context("Failed to create history schema")?;

    Ok(conn)
}

/// Insert or replace a result and its image blob.
pub fn insert_result(conn: &mut Connection, result: &GenerationResult) -> Result<()> {
    let tx = conn.transaction().context("Failed to begin transaction")?;
    tx.execute(
        "INSERT OR REPLACE INTO generation_history
            (id, prompt, negative_prompt, aspect_ratio, seed, model, resolution,
             width, height, mime_type, thumbnail, favorite, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            result.id,
            result.prompt,
            result.negative_prompt,
            result.aspect_ratio.to_string(),
            result.seed as i64,
            result.model.as_str(),
            result.resolution.as_str(),
            result.width as i64,
            result.height as i64,
            result.mime_type,
            result.thumbnail,
            result.favorite,
            result.created_at,
        ],
    )
    .context("Failed to insert history row")?;
    tx.execute(
        "INSERT OR REPLACE INTO generation_images (id, data) VALUES (?1, ?2)",
        params![result.id, result.image],
    )
    .context("Failed to insert image blob")?;
    tx.commit().context("Failed to commit result")?;
    Ok(())
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<(HistoryEntry, String, String, String)> {
    let seed: i64 = row.get(4)?;
    let width: i64 = row.get(7)?;
    let height: i64 = row.get(8)?;
    let entry = HistoryEntry {
        id: row.get(0)?,
        prompt: row.get(1)?,
        negative_prompt: row.get(2)?,
        aspect_ratio: AspectRatio::Auto,
        seed: seed as u32,
        model: ImageModel::Standard,
        resolution: Resolution::OneK,
        width: width as u32,
        height: height as u32,
        mime_type: row.get(9)?,
        thumbnail: row.get(10)?,
        favorite: row.get(11)?,
        created_at: row.get(12)?,
    };
    Ok((entry, row.get(3)?, row.get(5)?, row.get(6)?))
}

/// Text columns are parsed outside the row closure so failures carry context.
fn finish_entry(raw: (HistoryEntry, String, String, String)) -> Result<HistoryEntry> {
    let (mut entry, ratio, model, resolution) = raw;
    entry.aspect_ratio = ratio
        .parse::<AspectRatio>()
        .with_context(|| format!("Invalid aspect ratio '{}' for {}", ratio, entry.id))?;
    entry.model = ImageModel::parse(&model)
        .with_context(|| format!("Unknown model '{}' for {}", model, entry.id))?;
    entry.resolution = resolution
        .parse::<Resolution>()
        .map_err(|e: GenerationError| anyhow::anyhow!("{} for {}", e, entry.id))?;
    Ok(entry)
}

/// Get one history entry by id.
pub fn get_entry(conn: &Connection, id: &str) -> Result<Option<HistoryEntry>> {
    let raw = conn
        .query_row(
            &format!("SELECT {} FROM generation_history WHERE id = ?1", ENTRY_COLUMNS),
            params![id],
            entry_from_row,
        )
        .optional()
        .context("Failed to query history entry")?;
    raw.map(finish_entry).transpose()
}

/// Get the full-size image bytes for a result.
pub fn get_image(conn: &Connection, id: &str) -> Result<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT data FROM generation_images WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()
    .context("Failed to query image blob")
}

/// List entries newest first.
pub fn list_recent(conn: &Connection, limit: usize) -> Result<Vec<HistoryEntry>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM generation_history
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
            ENTRY_COLUMNS
        ))
        .context("Failed to prepare list_recent query")?;

    let rows = stmt
        .query_map(params![limit as i64], entry_from_row)
        .context("Failed to execute list_recent query")?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(finish_entry(row.context("Failed to read history row")?)?);
    }
    Ok(entries)
}

/// Set the favorite flag. Returns `false` if the id is unknown.
pub fn set_favorite(conn: &Connection, id: &str, favorite: bool) -> Result<bool> {
    let count = conn
        .execute(
            "UPDATE generation_history SET favorite = ?1 WHERE id = ?2",
            params![favorite, id],
        )
        .context("Failed to update favorite flag")?;
    Ok(count > 0)
}

/// Delete results by id. Image blobs go with them via the foreign key.
pub fn delete_many(conn: &Connection, ids: &[String]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let count = conn
        .execute(
            &format!(
                "DELETE FROM generation_history WHERE id IN ({})",
                placeholders
            ),
            params_from_iter(ids.iter()),
        )
        .context("Failed to delete history rows")?;
    Ok(count)
}

/// Delete non-favorite results outside the newest `keep`.
pub fn prune(conn: &Connection, keep: usize) -> Result<usize> {
    let count = conn
        .execute(
            "DELETE FROM generation_history
             WHERE favorite = 0
               AND id NOT IN (
                   SELECT id FROM generation_history
                   ORDER BY created_at DESC, rowid DESC
                   LIMIT ?1
               )",
            params![keep as i64],
        )
        .context("Failed to prune history")?;
    Ok(count)
}

/// SQLite-backed [`ResultStore`].
///
/// Metadata and thumbnails live in `generation_history`; full-size images
/// live in `generation_images` so listings never load them.
pub struct SqliteResultStore {
    conn: Mutex<Connection>,
}

impl SqliteResultStore {
    /// Open (or create) a store. Pass `None` for an in-memory database.
    pub fn open(path: Option<&Path>) -> Result<Self, GenerationError> {
        let conn = open_database(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultStore for SqliteResultStore {
    fn put(&self, result: &GenerationResult) -> Result<(), GenerationError> {
        insert_result(&mut self.conn(), result)?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<GenerationResult>, GenerationError> {
        let conn = self.conn();
        let Some(entry) = get_entry(&conn, id)? else {
            return Ok(None);
        };
        let image = get_image(&conn, id)?.unwrap_or_default();
        Ok(Some(GenerationResult {
            id: entry.id,
            image,
            mime_type: entry.mime_type,
            width: entry.width,
            height: entry.height,
            thumbnail: entry.thumbnail,
            prompt: entry.prompt,
            negative_prompt: entry.negative_prompt,
            aspect_ratio: entry.aspect_ratio,
            seed: entry.seed,
            model: entry.model,
            resolution: entry.resolution,
            created_at: entry.created_at,
            favorite: entry.favorite,
        }))
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, GenerationError> {
        Ok(list_recent(&self.conn(), limit)?)
    }

    fn set_favorite(&self, id: &str, favorite: bool) -> Result<bool, GenerationError> {
        Ok(set_favorite(&self.conn(), id, favorite)?)
    }

    fn delete_many(&self, ids: &[String]) -> Result<usize, GenerationError> {
        Ok(delete_many(&self.conn(), ids)?)
    }

    fn prune(&self, keep: usize) -> Result<usize, GenerationError> {
        Ok(prune(&self.conn(), keep)?)
    }
}
