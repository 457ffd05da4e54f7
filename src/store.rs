//! SQLite-backed repository, playlist log and trust persistence.
//!
//! Pending entries and feedback records are stored as JSON payloads next to
//! the columns they are queried by.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::ResolveError;
use crate::feedback::TrustState;
use crate::models::{FeedbackRecord, PendingEntry};
use crate::queue::{PlaylistMutation, Repository};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, ResolveError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, ResolveError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ResolveError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS pending (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                entry_id TEXT NOT NULL UNIQUE,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                payload TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS pending_user ON pending(user_id, created_at, seq);

            CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                exact_match INTEGER NOT NULL,
                recorded_at TEXT NOT NULL,
                payload TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS playlist_tracks (
                id INTEGER PRIMARY KEY,
                playlist_ref TEXT NOT NULL,
                track_id TEXT NOT NULL,
                added_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS trust (
                user_id TEXT PRIMARY KEY,
                exact_streak INTEGER NOT NULL,
                trust_exact_matches INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ResolveError> {
        self.conn
            .lock()
            .map_err(|_| ResolveError::Storage("store connection lock poisoned".into()))
    }

    fn insert_entry(conn: &Connection, user_id: &str, entry: &PendingEntry) -> Result<(), ResolveError> {
        conn.execute(
            "INSERT INTO pending (entry_id, user_id, created_at, payload) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.entry_id.to_string(),
                user_id,
                entry.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                serde_json::to_string(entry)?,
            ],
        )?;
        Ok(())
    }

    /// Track ids added to a playlist, oldest first.
    pub fn playlist_tracks(&self, playlist_ref: &str) -> Result<Vec<String>, ResolveError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT track_id FROM playlist_tracks WHERE playlist_ref = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([playlist_ref], |row| row.get(0))?;
        let mut tracks = Vec::new();
        for row in rows {
            tracks.push(row?);
        }
        Ok(tracks)
    }

    pub fn feedback_for(&self, user_id: &str) -> Result<Vec<FeedbackRecord>, ResolveError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached("SELECT payload FROM feedback WHERE user_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map([user_id], |row| row.get::<_, String>(0))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(serde_json::from_str(&row?)?);
        }
        Ok(records)
    }

    pub fn load_trust(&self) -> Result<Vec<(String, TrustState)>, ResolveError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT user_id, exact_streak, trust_exact_matches FROM trust ORDER BY user_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                TrustState {
                    exact_streak: row.get(1)?,
                    trust_exact_matches: row.get(2)?,
                },
            ))
        })?;
        let mut states = Vec::new();
        for row in rows {
            states.push(row?);
        }
        Ok(states)
    }

    pub fn load_trust_for(&self, user_id: &str) -> Result<TrustState, ResolveError> {
        let conn = self.lock()?;
        let state = conn
            .query_row(
                "SELECT exact_streak, trust_exact_matches FROM trust WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(TrustState {
                        exact_streak: row.get(0)?,
                        trust_exact_matches: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(state.unwrap_or_default())
    }

    pub fn save_trust(&self, user_id: &str, state: TrustState) -> Result<(), ResolveError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO trust (user_id, exact_streak, trust_exact_matches) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                exact_streak = excluded.exact_streak,
                trust_exact_matches = excluded.trust_exact_matches",
            params![user_id, state.exact_streak, state.trust_exact_matches],
        )?;
        Ok(())
    }
}

impl Repository for SqliteStore {
    fn get(&self, user_id: &str) -> Result<Vec<PendingEntry>, ResolveError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT payload FROM pending WHERE user_id = ?1 ORDER BY created_at, seq",
        )?;
        let rows = stmt.query_map([user_id], |row| row.get::<_, String>(0))?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(serde_json::from_str(&row?)?);
        }
        Ok(entries)
    }

    fn append(&self, user_id: &str, entry: PendingEntry) -> Result<(), ResolveError> {
        let conn = self.lock()?;
        Self::insert_entry(&conn, user_id, &entry)
    }

    fn remove_by_id(&self, user_id: &str, entry_id: Uuid) -> Result<Option<PendingEntry>, ResolveError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let payload: Option<String> = tx
            .query_row(
                "SELECT payload FROM pending WHERE user_id = ?1 AND entry_id = ?2",
                params![user_id, entry_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(payload) = payload else {
            return Ok(None);
        };
        tx.execute(
            "DELETE FROM pending WHERE user_id = ?1 AND entry_id = ?2",
            params![user_id, entry_id.to_string()],
        )?;
        tx.commit()?;
        Ok(Some(serde_json::from_str(&payload)?))
    }

    fn append_feedback(&self, record: FeedbackRecord) -> Result<(), ResolveError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO feedback (user_id, kind, exact_match, recorded_at, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.user_id,
                record.kind.as_str(),
                record.exact_match,
                record.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
                serde_json::to_string(&record)?,
            ],
        )?;
        Ok(())
    }
}

impl PlaylistMutation for SqliteStore {
    fn add_track(&self, playlist_ref: &str, track_id: &str) -> Result<(), ResolveError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO playlist_tracks (playlist_ref, track_id, added_at) VALUES (?1, ?2, ?3)",
            params![playlist_ref, track_id, Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)],
        )
        .map_err(|e| ResolveError::PlaylistMutationFailure {
            playlist_ref: playlist_ref.to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeedbackKind, PendingKind, SourceDescriptor};

    fn entry(user: &str, title: &str) -> PendingEntry {
        PendingEntry::new(user, SourceDescriptor::new(title, None), Vec::new(), "pl", PendingKind::NoMatch)
    }

    #[test]
    fn test_pending_round_trip_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("state.db")).unwrap();
        let a = entry("u1", "a");
        let b = entry("u1", "b");
        let (a_id, b_id) = (a.entry_id, b.entry_id);
        store.append("u1", a).unwrap();
        store.append("u1", b).unwrap();
        store.append("u2", entry("u2", "other")).unwrap();

        let ids: Vec<_> = store.get("u1").unwrap().into_iter().map(|e| e.entry_id).collect();
        assert_eq!(ids, vec![a_id, b_id]);

        let removed = store.remove_by_id("u1", a_id).unwrap().unwrap();
        assert_eq!(removed.descriptor.raw_title, "a");
        assert!(store.remove_by_id("u1", a_id).unwrap().is_none());
        // Wrong owner cannot claim
        assert!(store.remove_by_id("u2", b_id).unwrap().is_none());

        store.restore("u1", removed).unwrap();
        let ids: Vec<_> = store.get("u1").unwrap().into_iter().map(|e| e.entry_id).collect();
        assert_eq!(ids, vec![a_id, b_id]);
    }

    #[test]
    fn test_feedback_and_playlist() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .append_feedback(FeedbackRecord {
                user_id: "u1".into(),
                descriptor: SourceDescriptor::new("a", None),
                chosen_candidate: None,
                confidence: 0.4,
                kind: FeedbackKind::Rejection,
                exact_match: false,
                timestamp: Utc::now(),
            })
            .unwrap();
        assert_eq!(store.feedback_for("u1").unwrap().len(), 1);
        assert!(store.feedback_for("u2").unwrap().is_empty());

        store.add_track("pl", "sp:1").unwrap();
        store.add_track("pl", "sp:2").unwrap();
        assert_eq!(store.playlist_tracks("pl").unwrap(), vec!["sp:1", "sp:2"]);
    }

    #[test]
    fn test_trust_persistence() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.load_trust_for("u1").unwrap(), TrustState::default());
        let state = TrustState {
            exact_streak: 5,
            trust_exact_matches: true,
        };
        store.save_trust("u1", state).unwrap();
        store.save_trust("u1", state).unwrap();
        assert_eq!(store.load_trust_for("u1").unwrap(), state);
        assert_eq!(store.load_trust().unwrap(), vec![("u1".to_string(), state)]);
    }
}
