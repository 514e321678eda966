//! In-memory session list mirrored to durable storage on every change.
//!
//! All mutations run as a functional update over the latest in-memory value
//! under the mutex and are persisted before returning, so a mutation never
//! acts on a snapshot captured across a suspension point.

use super::models::{Message, Session, UserProfile};
use super::Database;
use std::sync::Mutex;

struct StoreState {
    sessions: Vec<Session>,
    selected: Option<String>,
}

pub struct SessionStore {
    db: Database,
    state: Mutex<StoreState>,
}

impl SessionStore {
    /// Load persisted sessions and select the most recent one, if any.
    pub fn new(db: Database) -> crate::Result<Self> {
        let sessions = db.load_sessions()?;
        let selected = sessions.first().map(|s| s.id.clone());
        Ok(Self {
            db,
            state: Mutex::new(StoreState { sessions, selected }),
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // ── Reads ──

    pub fn sessions(&self) -> Vec<Session> {
        self.state.lock().unwrap().sessions.clone()
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    pub fn selected_id(&self) -> Option<String> {
        self.state.lock().unwrap().selected.clone()
    }

    // ── Session CRUD ──

    /// Create a session at the front of the list (newest first) and select it.
    pub fn create(&self, title: &str, model: &str) -> crate::Result<Session> {
        let session = Session::new(title, model);
        let mut state = self.state.lock().unwrap();
        state.sessions.insert(0, session.clone());
        state.selected = Some(session.id.clone());
        self.persist(&state)?;
        Ok(session)
    }

    pub fn select(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        if state.sessions.iter().any(|s| s.id == id) {
            state.selected = Some(id.to_string());
        }
    }

    pub fn delete(&self, id: &str) -> crate::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.sessions.retain(|s| s.id != id);
        if state.selected.as_deref() == Some(id) {
            state.selected = state.sessions.first().map(|s| s.id.clone());
        }
        self.persist(&state)
    }

    pub fn clear(&self) -> crate::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.sessions.clear();
        state.selected = None;
        self.db.clear_sessions()
    }

    pub fn rename(&self, id: &str, title: &str) -> crate::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(session) = state.sessions.iter_mut().find(|s| s.id == id) {
            session.title = title.to_string();
            session.touch();
        }
        self.persist(&state)
    }

    // ── Messages ──

    /// Append a message and bump the session's `last_updated`. Returns false
    /// when the session no longer exists (deleted while an operation was in
    /// flight), which callers treat as a quiet no-op.
    pub fn append_message(&self, session_id: &str, message: Message) -> crate::Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(session) = state.sessions.iter_mut().find(|s| s.id == session_id) else {
            return Ok(false);
        };
        session.upsert(message);
        session.touch();
        self.persist(&state)?;
        Ok(true)
    }

    /// Upsert a message by its identifier without touching `last_updated`.
    /// Idempotent and order-preserving; see `Session::upsert`.
    pub fn upsert_message(&self, session_id: &str, message: Message) -> crate::Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(session) = state.sessions.iter_mut().find(|s| s.id == session_id) else {
            return Ok(false);
        };
        session.upsert(message);
        self.persist(&state)?;
        Ok(true)
    }

    // ── Profile ──

    pub fn profile(&self) -> crate::Result<Option<UserProfile>> {
        self.db.load_profile()
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self.db.load_profile(), Ok(Some(_)))
    }

    pub fn sign_in(&self, profile: &UserProfile) -> crate::Result<()> {
        self.db.save_profile(profile)
    }

    /// Remove the profile and clear local history with it.
    pub fn sign_out(&self) -> crate::Result<()> {
        self.db.delete_profile()?;
        self.clear()
    }

    fn persist(&self, state: &StoreState) -> crate::Result<()> {
        self.db.save_sessions(&state.sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::MessageKind;

    fn temp_store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path()).unwrap();
        (dir, SessionStore::new(db).unwrap())
    }

    #[test]
    fn test_create_selects_and_orders_newest_first() {
        let (_dir, store) = temp_store();
        let a = store.create("A", "m").unwrap();
        let b = store.create("B", "m").unwrap();
        assert_eq!(store.selected_id(), Some(b.id.clone()));
        let titles: Vec<String> = store.sessions().iter().map(|s| s.title.clone()).collect();
        assert_eq!(titles, vec!["B", "A"]);
        assert!(store.get(&a.id).is_some());
    }

    #[test]
    fn test_delete_fixes_selection() {
        let (_dir, store) = temp_store();
        let a = store.create("A", "m").unwrap();
        let b = store.create("B", "m").unwrap();
        store.delete(&b.id).unwrap();
        assert_eq!(store.selected_id(), Some(a.id));
    }

    #[test]
    fn test_select_ignores_unknown_ids() {
        let (_dir, store) = temp_store();
        let a = store.create("A", "m").unwrap();
        let b = store.create("B", "m").unwrap();
        store.select(&a.id);
        assert_eq!(store.selected_id(), Some(a.id.clone()));
        store.select("no-such-session");
        assert_eq!(store.selected_id(), Some(a.id));
        store.select(&b.id);
        assert_eq!(store.selected_id(), Some(b.id));
    }

    #[test]
    fn test_append_to_missing_session_is_noop() {
        let (_dir, store) = temp_store();
        let appended = store
            .append_message("no-such-id", Message::user("hi"))
            .unwrap();
        assert!(!appended);
    }

    #[test]
    fn test_mutations_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let session_id = {
            let store = SessionStore::new(Database::new(dir.path()).unwrap()).unwrap();
            let session = store.create("Chat", "model-x").unwrap();
            store
                .append_message(&session.id, Message::user("hello"))
                .unwrap();
            store
                .append_message(&session.id, Message::model(MessageKind::Text, "hi there"))
                .unwrap();
            session.id
        };

        let store = SessionStore::new(Database::new(dir.path()).unwrap()).unwrap();
        let session = store.get(&session_id).unwrap();
        assert_eq!(session.message_count(), 2);
        assert_eq!(store.selected_id(), Some(session_id));
    }

    #[test]
    fn test_clear_removes_durable_copy() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SessionStore::new(Database::new(dir.path()).unwrap()).unwrap();
            store.create("Chat", "m").unwrap();
            store.clear().unwrap();
        }
        let store = SessionStore::new(Database::new(dir.path()).unwrap()).unwrap();
        assert!(store.sessions().is_empty());
        assert_eq!(store.selected_id(), None);
    }

    #[test]
    fn test_sign_out_clears_history() {
        let (_dir, store) = temp_store();
        store.create("Chat", "m").unwrap();
        store
            .sign_in(&UserProfile {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                avatar: None,
            })
            .unwrap();
        assert!(store.is_signed_in());

        store.sign_out().unwrap();
        assert!(!store.is_signed_in());
        assert!(store.sessions().is_empty());
    }

    #[test]
    fn test_rename_updates_title() {
        let (_dir, store) = temp_store();
        let session = store.create("Old", "m").unwrap();
        store.rename(&session.id, "New").unwrap();
        assert_eq!(store.get(&session.id).unwrap().title, "New");
    }
}
