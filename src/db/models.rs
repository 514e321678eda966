use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Version tag written into the persisted session envelope.
pub const SCHEMA_VERSION: u32 = 1;

/// Author of a message. There are exactly two; system instructions are
/// request configuration, never stored turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
}

/// A web source the model cited while grounding a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    pub title: String,
}

impl Citation {
    /// Drop entries with an empty `uri` and collapse duplicate uris,
    /// keeping the first occurrence. Runs once, before citations are
    /// attached to a finalized message.
    pub fn sanitize(raw: Vec<Citation>) -> Vec<Citation> {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for citation in raw {
            if citation.uri.is_empty() || seen.contains(&citation.uri) {
                continue;
            }
            seen.push(citation.uri.clone());
            out.push(citation);
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub kind: MessageKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self::new(Role::User, MessageKind::Text, content)
    }

    pub fn model(kind: MessageKind, content: &str) -> Self {
        Self::new(Role::Model, kind, content)
    }

    fn new(role: Role, kind: MessageKind, content: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            kind,
            content: content.to_string(),
            attachments: Vec::new(),
            citations: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_attachment(mut self, url: String) -> Self {
        self.attachments.push(url);
        self
    }
}

/// One conversation thread. Messages live in a keyed map so that upserts
/// during streaming are idempotent by construction: inserting an existing
/// key replaces the value but keeps its position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    messages: IndexMap<String, Message>,
    pub last_updated: DateTime<Utc>,
    pub model: String,
}

impl Session {
    pub fn new(title: &str, model: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            messages: IndexMap::new(),
            last_updated: Utc::now(),
            model: model.to_string(),
        }
    }

    /// Insert-or-update keyed by `message.id`. An existing message keeps its
    /// position and creation timestamp; only the remaining fields change.
    pub fn upsert(&mut self, mut message: Message) {
        if let Some(existing) = self.messages.get(&message.id) {
            message.timestamp = existing.timestamp;
        }
        self.messages.insert(message.id.clone(), message);
    }

    /// Messages in insertion order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    pub fn get_message(&self, id: &str) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

/// Derive a session title from the first user input (30 chars max).
pub fn title_from_input(input: &str) -> String {
    input.chars().take(30).collect()
}

/// Local profile stub. Presence gates "signed in" display state only;
/// nothing is verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Envelope written under the durable `sessions` key.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedSessions {
    pub version: u32,
    pub sessions: Vec<Session>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaming_reply(id: &str, content: &str) -> Message {
        Message {
            id: id.to_string(),
            ..Message::model(MessageKind::Text, content)
        }
    }

    #[test]
    fn test_upsert_is_idempotent_and_order_preserving() {
        let mut session = Session::new("t", "m");
        session.upsert(Message::user("hello"));
        session.upsert(streaming_reply("r1", "He"));
        session.upsert(Message::user("interleaved"));
        session.upsert(streaming_reply("r1", "Hello"));
        session.upsert(streaming_reply("r1", "Hello there"));

        assert_eq!(session.message_count(), 3);
        let contents: Vec<&str> = session.messages().map(|m| m.content.as_str()).collect();
        // "r1" stays at its first-insertion position with the last content.
        assert_eq!(contents, vec!["hello", "Hello there", "interleaved"]);
    }

    #[test]
    fn test_upsert_keeps_creation_timestamp() {
        let mut session = Session::new("t", "m");
        session.upsert(streaming_reply("r1", "a"));
        let first = session.get_message("r1").unwrap().timestamp;
        session.upsert(streaming_reply("r1", "ab"));
        assert_eq!(session.get_message("r1").unwrap().timestamp, first);
    }

    #[test]
    fn test_append_order_is_insertion_order() {
        let mut session = Session::new("t", "m");
        for i in 0..5 {
            session.upsert(Message::user(&format!("msg {i}")));
        }
        let contents: Vec<&str> = session.messages().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 0", "msg 1", "msg 2", "msg 3", "msg 4"]);
    }

    #[test]
    fn test_citation_sanitize_filters_empty_and_duplicates() {
        let raw = vec![
            Citation { uri: "https://a".into(), title: "A".into() },
            Citation { uri: String::new(), title: "empty".into() },
            Citation { uri: "https://a".into(), title: "A again".into() },
            Citation { uri: "https://b".into(), title: "B".into() },
        ];
        let clean = Citation::sanitize(raw);
        assert_eq!(clean.len(), 2);
        assert_eq!(clean[0].uri, "https://a");
        assert_eq!(clean[0].title, "A");
        assert_eq!(clean[1].uri, "https://b");
    }

    #[test]
    fn test_title_from_input_truncates_on_char_boundary() {
        assert_eq!(title_from_input("Hi"), "Hi");
        let long = "héllo wörld ".repeat(10);
        let title = title_from_input(&long);
        assert_eq!(title.chars().count(), 30);
    }

    #[test]
    fn test_role_and_kind_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), "\"model\"");
        assert_eq!(serde_json::to_string(&MessageKind::Image).unwrap(), "\"image\"");
    }

    #[test]
    fn test_session_roundtrip_preserves_message_order() {
        let mut session = Session::new("t", "m");
        session.upsert(Message::user("one"));
        session.upsert(Message::model(MessageKind::Text, "two"));
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        let contents: Vec<&str> = back.messages().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }
}
