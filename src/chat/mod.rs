pub mod classifier;

use crate::db::models::{self as models, Message, MessageKind, Session};
use crate::db::store::SessionStore;
use crate::gateway::{models as model_ids, ChatOptions, ChatTurn, Gateway, ImageOptions};
use crate::inflight::InFlight;
use classifier::Intent;
use std::sync::Mutex;
use tracing::{debug, error, warn};

/// Fixed acknowledgement used for in-chat image replies.
pub const IMAGE_ACK: &str = "I've generated this for you:";

/// Visible reply appended when a send fails. Failures are surfaced, never
/// swallowed, so the history always explains what happened.
pub const SEND_FAILURE_REPLY: &str =
    "Sorry, something went wrong while generating a response. Please try again.";

const DEFAULT_SESSION_TITLE: &str = "New Discussion";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Input was empty or whitespace.
    Empty,
    /// Another send already holds the in-flight slot.
    Busy,
    /// Reply finalized into the session.
    Replied {
        session_id: String,
        message_id: String,
    },
    /// Gateway failure; a visible error reply was appended.
    Failed { session_id: String },
}

/// Owns one "send message" interaction end to end: classify, call the
/// Gateway, fold incremental and final results into the store.
pub struct ChatController {
    store: SessionStore,
    gateway: Gateway,
    selected_model: Mutex<String>,
    in_flight: InFlight,
}

impl ChatController {
    pub fn new(store: SessionStore, gateway: Gateway) -> Self {
        let model = store
            .database()
            .get_setting(crate::db::SETTING_DEFAULT_MODEL)
            .ok()
            .flatten()
            .unwrap_or_else(|| model_ids::LITE.to_string());
        Self {
            store,
            gateway,
            selected_model: Mutex::new(model),
            in_flight: InFlight::new(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// True while a send is in flight anywhere in the application.
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_active()
    }

    pub fn selected_model(&self) -> String {
        self.selected_model.lock().unwrap().clone()
    }

    pub fn set_model(&self, model: &str) {
        *self.selected_model.lock().unwrap() = model.to_string();
    }

    /// Start an empty session and select it.
    pub fn new_chat(&self) -> crate::Result<Session> {
        self.store.create(DEFAULT_SESSION_TITLE, &self.selected_model())
    }

    /// Drive one full send operation. At most one runs at a time; while one
    /// is in flight any further send is a no-op returning `Busy`.
    pub async fn send_message(&self, input: &str) -> crate::Result<SendOutcome> {
        let text = input.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Empty);
        }
        let Some(_guard) = self.in_flight.try_begin() else {
            warn!("send rejected: another operation is in flight");
            return Ok(SendOutcome::Busy);
        };

        // Ensure a live target session; a stale selection (deleted id)
        // counts as no selection.
        let session_id = match self.store.selected_id() {
            Some(id) if self.store.get(&id).is_some() => id,
            _ => {
                let title = models::title_from_input(text);
                self.store.create(&title, &self.selected_model())?.id
            }
        };
        self.store.append_message(&session_id, Message::user(text))?;

        match classifier::classify(text) {
            Intent::ImageGeneration => self.send_image(&session_id, text).await,
            Intent::Conversational => self.send_conversational(&session_id).await,
        }
    }

    async fn send_image(&self, session_id: &str, prompt: &str) -> crate::Result<SendOutcome> {
        debug!(session_id, "dispatching image generation");
        match self
            .gateway
            .generate_image(prompt, &ImageOptions::default())
            .await
        {
            Ok(url) => {
                let message = Message::model(MessageKind::Image, IMAGE_ACK).with_attachment(url);
                let message_id = message.id.clone();
                self.store.append_message(session_id, message)?;
                Ok(SendOutcome::Replied {
                    session_id: session_id.to_string(),
                    message_id,
                })
            }
            Err(e) => {
                error!(error = %e, session_id, "image generation failed");
                self.surface_failure(session_id)?;
                Ok(SendOutcome::Failed {
                    session_id: session_id.to_string(),
                })
            }
        }
    }

    async fn send_conversational(&self, session_id: &str) -> crate::Result<SendOutcome> {
        // Re-read current state: the user turn just appended is part of the
        // projection, and nothing older than this read is trusted.
        let Some(session) = self.store.get(session_id) else {
            return Ok(SendOutcome::Failed {
                session_id: session_id.to_string(),
            });
        };
        let history: Vec<ChatTurn> = session
            .messages()
            .map(|m| ChatTurn {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();

        // The reply identity exists before the first chunk arrives, so every
        // chunk handler is the same upsert with no first-chunk special case.
        let reply_id = uuid::Uuid::new_v4().to_string();
        let model = self.selected_model();
        let options = ChatOptions {
            use_search: true,
            ..Default::default()
        };

        debug!(session_id, %model, "opening chat stream");
        let mut accumulator = String::new();
        let result = self
            .gateway
            .stream_chat(&model, &history, &options, |chunk| {
                accumulator.push_str(chunk);
                let reply = Message {
                    id: reply_id.clone(),
                    ..Message::model(MessageKind::Text, &accumulator)
                };
                // Persistence hiccups mid-stream are logged, not fatal; the
                // finalize upsert writes the authoritative state.
                if let Err(e) = self.store.upsert_message(session_id, reply) {
                    error!(error = %e, session_id, "chunk upsert failed");
                }
            })
            .await;

        match result {
            Ok(outcome) => {
                // The Gateway's full text supersedes the accumulator; the
                // accumulator is discarded, never merged.
                let mut reply = Message {
                    id: reply_id.clone(),
                    ..Message::model(MessageKind::Text, &outcome.text)
                };
                reply.citations = models::Citation::sanitize(outcome.citations);
                self.store.upsert_message(session_id, reply)?;
                Ok(SendOutcome::Replied {
                    session_id: session_id.to_string(),
                    message_id: reply_id,
                })
            }
            Err(e) => {
                error!(error = %e, session_id, "chat stream failed");
                self.surface_failure(session_id)?;
                Ok(SendOutcome::Failed {
                    session_id: session_id.to_string(),
                })
            }
        }
    }

    fn surface_failure(&self, session_id: &str) -> crate::Result<()> {
        self.store
            .append_message(session_id, Message::model(MessageKind::Text, SEND_FAILURE_REPLY))?;
        Ok(())
    }
}
