//! Searchable target catalog.
//!
//! `CatalogSearch` is the seam the resolver talks through. `SqliteCatalog`
//! is the local implementation: a `tracks` table plus an external-content
//! FTS5 index, queried with the same field-qualified syntax the remote
//! catalog understands (`track:"..." artist:...`).

use std::path::Path;
use std::sync::Mutex;

use indicatif::ProgressBar;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::CatalogError;
use crate::models::CatalogResult;

pub trait CatalogSearch: Send + Sync {
    /// Run one query. An empty result is not an error.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<CatalogResult>, CatalogError>;
}

const WRITE_BATCH_SIZE: usize = 10_000;

static QUALIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(track|artist|album):").unwrap());
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]*)""#).unwrap());

// ============================================================================
// Query translation
// ============================================================================

/// Keep letters and digits only; everything else separates tokens.
fn fts_tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn phrase(tokens: &[String]) -> String {
    format!("\"{}\"", tokens.join(" "))
}

/// Translate one value (quoted phrases and bare words) into FTS5 terms.
fn value_terms(value: &str, column: Option<&str>) -> Vec<String> {
    let mut terms = Vec::new();
    let prefix = column.map(|c| format!("{c} : ")).unwrap_or_default();

    let mut rest = String::new();
    let mut last = 0;
    for cap in QUOTED.captures_iter(value) {
        let (Some(whole), Some(inner)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        rest.push_str(&value[last..whole.start()]);
        rest.push(' ');
        last = whole.end();
        let tokens = fts_tokens(inner.as_str());
        if !tokens.is_empty() {
            terms.push(format!("{prefix}{}", phrase(&tokens)));
        }
    }
    rest.push_str(&value[last..]);

    for token in fts_tokens(&rest) {
        terms.push(format!("{prefix}{}", phrase(&[token])));
    }
    terms
}

/// `track:"shape of you" artist:ed sheeran` →
/// `title : "shape of you" artist : "ed" artist : "sheeran"`
pub fn to_fts_query(query: &str) -> Option<String> {
    let mut terms = Vec::new();
    let mut column: Option<&str> = None;
    let mut last = 0;

    for found in QUALIFIER.find_iter(query) {
        terms.extend(value_terms(&query[last..found.start()], column));
        column = Some(match found.as_str().to_lowercase().as_str() {
            "track:" => "title",
            "artist:" => "artist",
            _ => "album",
        });
        last = found.end();
    }
    terms.extend(value_terms(&query[last..], column));

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

// ============================================================================
// SQLite catalog
// ============================================================================

pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            CREATE TABLE IF NOT EXISTS tracks (
                id INTEGER PRIMARY KEY,
                track_id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                artist TEXT NOT NULL,
                album TEXT,
                label TEXT
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS tracks_fts USING fts5(
                title, artist, album,
                content='tracks',
                content_rowid='id',
                tokenize='porter unicode61 remove_diacritics 2'
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Query("catalog connection lock poisoned".into()))
    }

    /// Insert or replace tracks in batched transactions, then rebuild the index.
    pub fn insert_tracks(&self, tracks: &[CatalogResult], pb: &ProgressBar) -> Result<(), CatalogError> {
        let mut conn = self.lock()?;
        for chunk in tracks.chunks(WRITE_BATCH_SIZE) {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO tracks (track_id, title, artist, album, label)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(track_id) DO UPDATE SET
                        title = excluded.title,
                        artist = excluded.artist,
                        album = excluded.album,
                        label = excluded.label",
                )?;
                for track in chunk {
                    stmt.execute(params![
                        track.target_track_id,
                        track.title,
                        track.artist,
                        track.album,
                        track.label,
                    ])?;
                    pb.inc(1);
                }
            }
            tx.commit()?;
        }
        conn.execute("INSERT INTO tracks_fts(tracks_fts) VALUES('rebuild')", [])?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize, CatalogError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl CatalogSearch for SqliteCatalog {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<CatalogResult>, CatalogError> {
        let Some(fts_query) = to_fts_query(query) else {
            return Ok(Vec::new());
        };
        debug!(query, fts = %fts_query, "catalog search");

        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT t.track_id, t.title, t.artist, t.album, t.label
             FROM tracks_fts fts
             JOIN tracks t ON fts.rowid = t.id
             WHERE tracks_fts MATCH ?1
             ORDER BY fts.rank, t.id
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![fts_query, limit as i64], |row| {
            Ok(CatalogResult {
                target_track_id: row.get(0)?,
                title: row.get(1)?,
                artist: row.get(2)?,
                album: row.get(3)?,
                label: row.get(4)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}
