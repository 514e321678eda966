pub mod chat;
pub mod image;
pub mod speech;
pub mod video;

use crate::db::models::{Citation, Role};
use crate::db::Database;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use chat::{ChatOptions, ChatOutcome};
pub use image::{AspectRatio, ImageOptions};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Known model identifiers on the hosted API.
pub mod models {
    pub const FLASH: &str = "gemini-3-flash-preview";
    pub const PRO: &str = "gemini-3-pro-preview";
    pub const LITE: &str = "gemini-flash-lite-latest";
    pub const IMAGE: &str = "gemini-2.5-flash-image";
    pub const IMAGE_PRO: &str = "gemini-3-pro-image-preview";
    pub const TTS: &str = "gemini-2.5-flash-preview-tts";
    pub const VIDEO: &str = "veo-3.1-fast-generate-preview";

    /// Thinking budgets are only honored by the 3.x and 2.5 series.
    pub fn supports_thinking(model: &str) -> bool {
        model.contains("gemini-3") || model.contains("gemini-2.5")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub tier: String,
}

/// Chat model catalog for UI pickers.
pub fn available_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: models::LITE.into(),
            name: "Arlo Lite".into(),
            tier: "fast".into(),
        },
        ModelInfo {
            id: models::FLASH.into(),
            name: "Arlo Flash".into(),
            tier: "balanced".into(),
        },
        ModelInfo {
            id: models::PRO.into(),
            name: "Arlo Pro".into(),
            tier: "quality".into(),
        },
    ]
}

/// Polling schedule for long-running video operations: exponential backoff
/// from `initial` capped at `max_interval`, at most `max_attempts` polls.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub initial: Duration,
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(8),
            max_interval: Duration::from_secs(60),
            max_attempts: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub video_poll: PollPolicy,
}

impl GatewayConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            video_poll: PollPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Resolve the config from runtime settings in the database.
    pub fn from_database(db: &Database) -> crate::Result<Self> {
        let api_key = db
            .get_setting(crate::db::SETTING_API_KEY)?
            .ok_or_else(|| crate::Error::Config("API key not configured".into()))?;
        let base_url = db
            .get_setting(crate::db::SETTING_BASE_URL)?
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(&api_key).with_base_url(&base_url))
    }
}

/// Client for the hosted generative-AI API.
pub struct Gateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn model_url(&self, model: &str, action: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.base_url, model, action
        )
    }

    /// Streaming chat completion. `on_chunk` fires once per arriving text
    /// fragment; the returned outcome carries the authoritative full text
    /// and the raw citation list.
    pub async fn stream_chat(
        &self,
        model: &str,
        turns: &[ChatTurn],
        options: &ChatOptions,
        on_chunk: impl FnMut(&str),
    ) -> Result<ChatOutcome, GatewayError> {
        chat::stream(self, model, turns, options, on_chunk).await
    }

    /// Single-shot text completion.
    pub async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        options: &ChatOptions,
    ) -> Result<String, GatewayError> {
        chat::generate(self, model, prompt, options).await
    }

    /// Single-shot image generation; returns a `data:` URI.
    pub async fn generate_image(
        &self,
        prompt: &str,
        options: &ImageOptions,
    ) -> Result<String, GatewayError> {
        image::generate(self, prompt, options).await
    }

    /// Text-to-speech; returns raw 16-bit 24kHz mono PCM bytes.
    pub async fn text_to_speech(&self, text: &str) -> Result<Vec<u8>, GatewayError> {
        speech::synthesize(self, text).await
    }

    /// Long-running video generation; polls until done and returns an
    /// authenticated download URL. `on_status` receives progress messages.
    pub async fn generate_video(
        &self,
        prompt: &str,
        on_status: impl FnMut(&str),
    ) -> Result<String, GatewayError> {
        video::generate(self, prompt, on_status).await
    }

    /// Fetch a generated binary payload (e.g. the video behind a download
    /// reference returned by `generate_video`).
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, GatewayError> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

/// One turn of the request history projection.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("quota or billing rejection: {0}")]
    Quota(String),
    #[error("content blocked by safety filters")]
    SafetyBlocked,
    #[error("API credential expired or invalid")]
    CredentialExpired,
    #[error("parse error: {0}")]
    Parse(String),
    #[error("expected payload missing from response: {0}")]
    MissingPayload(&'static str),
    #[error("operation timed out after {0} polls")]
    Timeout(u32),
}

const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

/// Map a non-2xx response onto the error taxonomy.
pub(crate) async fn error_from_response(resp: reqwest::Response) -> GatewayError {
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    if message.contains(ENTITY_NOT_FOUND) {
        return GatewayError::CredentialExpired;
    }
    if status == 429 {
        return GatewayError::Quota(message);
    }
    GatewayError::Api { status, message }
}

// ── Shared wire types ──

#[derive(Serialize)]
pub(crate) struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    pub parts: Vec<WirePart>,
}

#[derive(Serialize)]
pub(crate) struct WirePart {
    pub text: String,
}

impl WireContent {
    pub fn turn(role: Role, text: &str) -> Self {
        Self {
            role: Some(role.as_str()),
            parts: vec![WirePart {
                text: text.to_string(),
            }],
        }
    }

    pub fn prompt(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![WirePart {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Deserialize, Default)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize, Default)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<InlineData>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    #[serde(default)]
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize, Default)]
pub(crate) struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebSource>,
}

#[derive(Deserialize, Default)]
pub(crate) struct WebSource {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl GroundingMetadata {
    /// Project the grounding block into citations, dropping sourceless
    /// entries. A chunk without a title keeps a generic label.
    pub fn citations(&self) -> Vec<Citation> {
        self.grounding_chunks
            .iter()
            .filter_map(|c| c.web.as_ref())
            .map(|web| Citation {
                uri: web.uri.clone().unwrap_or_default(),
                title: web
                    .title
                    .clone()
                    .unwrap_or_else(|| "Search Source".to_string()),
            })
            .filter(|c| !c.uri.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_thinking() {
        assert!(models::supports_thinking(models::FLASH));
        assert!(models::supports_thinking(models::IMAGE));
        assert!(!models::supports_thinking(models::LITE));
    }

    #[test]
    fn test_grounding_citations_drop_empty_uris() {
        let metadata = GroundingMetadata {
            grounding_chunks: vec![
                GroundingChunk {
                    web: Some(WebSource {
                        uri: Some("https://a".into()),
                        title: None,
                    }),
                },
                GroundingChunk {
                    web: Some(WebSource {
                        uri: None,
                        title: Some("no uri".into()),
                    }),
                },
                GroundingChunk { web: None },
            ],
        };
        let citations = metadata.citations();
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].title, "Search Source");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = GatewayConfig::new("k").with_base_url("http://localhost:9/");
        assert_eq!(config.base_url, "http://localhost:9");
    }

    #[test]
    fn test_model_catalog_ids_are_unique() {
        let catalog = available_models();
        assert!(!catalog.is_empty());
        let mut ids: Vec<&str> = catalog.iter().map(|m| m.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());
    }

    #[test]
    fn test_config_resolves_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path()).unwrap();

        let missing = GatewayConfig::from_database(&db);
        assert!(matches!(missing, Err(crate::Error::Config(_))));

        db.set_setting(crate::db::SETTING_API_KEY, "secret").unwrap();
        let config = GatewayConfig::from_database(&db).unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);

        db.set_setting(crate::db::SETTING_BASE_URL, "http://proxy.local/")
            .unwrap();
        let config = GatewayConfig::from_database(&db).unwrap();
        assert_eq!(config.base_url, "http://proxy.local");
    }
}
