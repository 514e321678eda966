use super::{
    error_from_response, models, Candidate, ChatTurn, Gateway, GatewayError, GenerateResponse,
    GroundingMetadata, WireContent,
};
use crate::db::models::Citation;
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;

/// Persona applied to the main chat stream when the caller supplies none.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are Arlo AI, a high-performance assistant. You are exceptionally fast, concise, and smart.";

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub system_instruction: Option<String>,
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub use_search: bool,
    pub thinking_budget: Option<i32>,
    pub response_mime_type: Option<String>,
    pub response_schema: Option<serde_json::Value>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            system_instruction: None,
            temperature: 1.0,
            top_p: None,
            use_search: false,
            thinking_budget: None,
            response_mime_type: None,
            response_schema: None,
        }
    }
}

/// Final accounting for one streamed reply. `text` is the Gateway's
/// authoritative full text; callers use it in preference to anything they
/// accumulated chunk by chunk.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub text: String,
    pub citations: Vec<Citation>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: i32,
}

fn build_request(
    model: &str,
    contents: Vec<WireContent>,
    options: &ChatOptions,
    default_system: Option<&str>,
) -> GenerateRequest {
    let system = options
        .system_instruction
        .as_deref()
        .or(default_system)
        .map(WireContent::prompt);

    // Thinking budgets are silently dropped for models that ignore them.
    let thinking_config = options
        .thinking_budget
        .filter(|_| models::supports_thinking(model))
        .map(|thinking_budget| ThinkingConfig { thinking_budget });

    let tools = options
        .use_search
        .then(|| vec![json!({ "googleSearch": {} })]);

    GenerateRequest {
        contents,
        system_instruction: system,
        generation_config: GenerationConfig {
            temperature: options.temperature,
            top_p: options.top_p,
            thinking_config,
            response_mime_type: options.response_mime_type.clone(),
            response_schema: options.response_schema.clone(),
        },
        tools,
    }
}

fn candidate_text(candidate: &Candidate) -> String {
    candidate
        .content
        .as_ref()
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) async fn stream(
    gateway: &Gateway,
    model: &str,
    turns: &[ChatTurn],
    options: &ChatOptions,
    mut on_chunk: impl FnMut(&str),
) -> Result<ChatOutcome, GatewayError> {
    let contents = turns
        .iter()
        .map(|t| WireContent::turn(t.role, &t.content))
        .collect();
    let body = build_request(model, contents, options, Some(DEFAULT_SYSTEM_INSTRUCTION));

    let url = format!(
        "{}?alt=sse",
        gateway.model_url(model, "streamGenerateContent")
    );
    let resp = gateway
        .client()
        .post(&url)
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", &gateway.config().api_key)
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }

    let mut full_text = String::new();
    // Latest non-null grounding block observed during the stream wins.
    let mut grounding: Option<GroundingMetadata> = None;
    let mut stream = resp.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buffer.find('\n') {
            let line = buffer[..pos].trim().to_string();
            buffer = buffer[pos + 1..].to_string();

            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };

            if let Ok(parsed) = serde_json::from_str::<GenerateResponse>(data) {
                if let Some(candidate) = parsed.candidates.into_iter().next() {
                    let text = candidate_text(&candidate);
                    if !text.is_empty() {
                        full_text.push_str(&text);
                        on_chunk(&text);
                    }
                    if candidate.grounding_metadata.is_some() {
                        grounding = candidate.grounding_metadata;
                    }
                }
            }
        }
    }

    Ok(ChatOutcome {
        text: full_text,
        citations: grounding.map(|g| g.citations()).unwrap_or_default(),
    })
}

pub(crate) async fn generate(
    gateway: &Gateway,
    model: &str,
    prompt: &str,
    options: &ChatOptions,
) -> Result<String, GatewayError> {
    let body = build_request(model, vec![WireContent::prompt(prompt)], options, None);

    let resp = gateway
        .client()
        .post(gateway.model_url(model, "generateContent"))
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", &gateway.config().api_key)
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }

    let data: GenerateResponse = resp
        .json()
        .await
        .map_err(|e| GatewayError::Parse(e.to_string()))?;
    let text = data
        .candidates
        .first()
        .map(candidate_text)
        .unwrap_or_default();
    if text.is_empty() {
        return Err(GatewayError::MissingPayload("no text returned"));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_value(req: &GenerateRequest) -> serde_json::Value {
        serde_json::to_value(req).unwrap()
    }

    #[test]
    fn test_default_system_instruction_applied() {
        let req = build_request(
            models::LITE,
            vec![WireContent::prompt("hi")],
            &ChatOptions::default(),
            Some(DEFAULT_SYSTEM_INSTRUCTION),
        );
        let value = to_value(&req);
        assert_eq!(
            value["systemInstruction"]["parts"][0]["text"],
            DEFAULT_SYSTEM_INSTRUCTION
        );
    }

    #[test]
    fn test_thinking_budget_only_for_supported_models() {
        let options = ChatOptions {
            thinking_budget: Some(1024),
            ..Default::default()
        };
        let supported = to_value(&build_request(
            models::FLASH,
            vec![WireContent::prompt("hi")],
            &options,
            None,
        ));
        assert_eq!(
            supported["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            1024
        );

        let unsupported = to_value(&build_request(
            models::LITE,
            vec![WireContent::prompt("hi")],
            &options,
            None,
        ));
        assert!(unsupported["generationConfig"].get("thinkingConfig").is_none());
    }

    #[test]
    fn test_search_tool_attached_when_grounding() {
        let options = ChatOptions {
            use_search: true,
            ..Default::default()
        };
        let value = to_value(&build_request(
            models::LITE,
            vec![WireContent::prompt("hi")],
            &options,
            None,
        ));
        assert!(value["tools"][0].get("googleSearch").is_some());

        let without = to_value(&build_request(
            models::LITE,
            vec![WireContent::prompt("hi")],
            &ChatOptions::default(),
            None,
        ));
        assert!(without.get("tools").is_none());
    }

    #[test]
    fn test_sse_chunk_parses_text_and_grounding() {
        let data = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Hello"}, {"text": " world"}]},
                "groundingMetadata": {"groundingChunks": [{"web": {"uri": "https://a", "title": "A"}}]}
            }]
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(data).unwrap();
        let candidate = &parsed.candidates[0];
        assert_eq!(candidate_text(candidate), "Hello world");
        let citations = candidate
            .grounding_metadata
            .as_ref()
            .unwrap()
            .citations();
        assert_eq!(citations[0].uri, "https://a");
    }
}
