//! Headless core of the Arlo AI chat client.
//!
//! Wraps a hosted generative-AI API (streaming chat, image, speech, video)
//! behind [`Gateway`], persists chat sessions through [`SessionStore`], and
//! drives the send-message reconciliation in [`ChatController`]. Tool panels
//! under [`tools`] run their own request/response cycles against the same
//! Gateway. Rendering and any UI shell are the embedder's concern.

pub mod chat;
pub mod db;
pub mod gateway;
pub mod inflight;
pub mod tools;

pub use chat::{ChatController, SendOutcome};
pub use db::models::{Citation, Message, MessageKind, Role, Session, UserProfile};
pub use db::store::SessionStore;
pub use db::Database;
pub use gateway::{Gateway, GatewayConfig, GatewayError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
