pub mod models;
pub mod store;

use models::{PersistedSessions, UserProfile, SCHEMA_VERSION};
use rusqlite::{params, Connection};
use std::sync::Mutex;
use tracing::warn;

/// Durable-storage key holding the full serialized session list.
pub const SESSIONS_KEY: &str = "sessions";
/// Durable-storage key holding the local profile stub.
pub const PROFILE_KEY: &str = "profile";

pub const SETTING_API_KEY: &str = "api_key";
pub const SETTING_BASE_URL: &str = "base_url";
pub const SETTING_DEFAULT_MODEL: &str = "default_model";

pub struct Database {
    pub conn: Mutex<Connection>,
}

impl Database {
    pub fn new(app_dir: &std::path::Path) -> rusqlite::Result<Self> {
        std::fs::create_dir_all(app_dir).ok();
        let db_path = app_dir.join("arlo.db");
        let conn = Connection::open(db_path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ── Settings ──

    pub fn get_setting(&self, key: &str) -> rusqlite::Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );
        match result {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set_setting(&self, key: &str, value: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── Sessions ──

    /// Load the persisted session list. Accepts the versioned envelope or a
    /// bare array (the pre-versioning shape, read as version 1). A version
    /// from the future loads as empty rather than erroring.
    pub fn load_sessions(&self) -> crate::Result<Vec<models::Session>> {
        let Some(raw) = self.get_setting(SESSIONS_KEY)? else {
            return Ok(Vec::new());
        };
        if let Ok(envelope) = serde_json::from_str::<PersistedSessions>(&raw) {
            if envelope.version > SCHEMA_VERSION {
                warn!(
                    version = envelope.version,
                    "persisted sessions written by a newer schema; starting empty"
                );
                return Ok(Vec::new());
            }
            return Ok(envelope.sessions);
        }
        let sessions: Vec<models::Session> = serde_json::from_str(&raw)?;
        Ok(sessions)
    }

    /// Mirror the full session list under the single durable key.
    pub fn save_sessions(&self, sessions: &[models::Session]) -> crate::Result<()> {
        let envelope = PersistedSessions {
            version: SCHEMA_VERSION,
            sessions: sessions.to_vec(),
        };
        let raw = serde_json::to_string(&envelope)?;
        self.set_setting(SESSIONS_KEY, &raw)?;
        Ok(())
    }

    pub fn clear_sessions(&self) -> crate::Result<()> {
        self.delete_setting(SESSIONS_KEY)?;
        Ok(())
    }

    // ── Profile ──

    pub fn load_profile(&self) -> crate::Result<Option<UserProfile>> {
        let Some(raw) = self.get_setting(PROFILE_KEY)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub fn save_profile(&self, profile: &UserProfile) -> crate::Result<()> {
        let raw = serde_json::to_string(profile)?;
        self.set_setting(PROFILE_KEY, &raw)?;
        Ok(())
    }

    pub fn delete_profile(&self) -> crate::Result<()> {
        self.delete_setting(PROFILE_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{Message, Session};

    fn temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn test_settings_roundtrip() {
        let (_dir, db) = temp_db();
        assert_eq!(db.get_setting("api_key").unwrap(), None);
        db.set_setting("api_key", "secret").unwrap();
        assert_eq!(db.get_setting("api_key").unwrap().as_deref(), Some("secret"));
        db.delete_setting("api_key").unwrap();
        assert_eq!(db.get_setting("api_key").unwrap(), None);
    }

    #[test]
    fn test_sessions_roundtrip() {
        let (_dir, db) = temp_db();
        let mut session = Session::new("First", "model-x");
        session.upsert(Message::user("hello"));
        db.save_sessions(&[session.clone()]).unwrap();

        let loaded = db.load_sessions().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, session.id);
        assert_eq!(loaded[0].message_count(), 1);
    }

    #[test]
    fn test_load_accepts_bare_array() {
        let (_dir, db) = temp_db();
        let session = Session::new("Legacy", "model-x");
        let raw = serde_json::to_string(&vec![session.clone()]).unwrap();
        db.set_setting(SESSIONS_KEY, &raw).unwrap();

        let loaded = db.load_sessions().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "Legacy");
    }

    #[test]
    fn test_load_future_version_is_empty() {
        let (_dir, db) = temp_db();
        db.set_setting(SESSIONS_KEY, "{\"version\": 99, \"sessions\": []}")
            .unwrap();
        assert!(db.load_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_profile_roundtrip() {
        let (_dir, db) = temp_db();
        assert!(db.load_profile().unwrap().is_none());
        let profile = UserProfile {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            avatar: None,
        };
        db.save_profile(&profile).unwrap();
        assert_eq!(db.load_profile().unwrap(), Some(profile));
        db.delete_profile().unwrap();
        assert!(db.load_profile().unwrap().is_none());
    }
}
