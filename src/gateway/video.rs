use super::{error_from_response, models, Gateway, GatewayError};
use serde::{Deserialize, Serialize};
use tracing::debug;

const RESOLUTION: &str = "720p";
const ASPECT_RATIO: &str = "16:9";

/// Rotated through the status callback while the operation is pending.
const STATUS_MESSAGES: [&str; 5] = [
    "Initiating...",
    "Synthesizing...",
    "Optimizing...",
    "Finalizing...",
    "Wrapping up...",
];

#[derive(Serialize)]
struct StartRequest {
    instances: Vec<Instance>,
    parameters: Parameters,
}

#[derive(Serialize)]
struct Instance {
    prompt: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters {
    resolution: &'static str,
    aspect_ratio: &'static str,
    sample_count: u32,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Operation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    response: Option<OperationResponse>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    #[serde(default)]
    generated_videos: Vec<GeneratedVideo>,
}

#[derive(Deserialize, Default)]
struct GeneratedVideo {
    #[serde(default)]
    video: Option<VideoRef>,
}

#[derive(Deserialize, Default)]
struct VideoRef {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Deserialize, Default)]
struct OperationError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

/// Kick off a video generation operation and poll until it completes.
/// Returns the download URL with the API key appended for the follow-up
/// authenticated fetch.
pub(crate) async fn generate(
    gateway: &Gateway,
    prompt: &str,
    mut on_status: impl FnMut(&str),
) -> Result<String, GatewayError> {
    let body = StartRequest {
        instances: vec![Instance {
            prompt: prompt.to_string(),
        }],
        parameters: Parameters {
            resolution: RESOLUTION,
            aspect_ratio: ASPECT_RATIO,
            sample_count: 1,
        },
    };

    let resp = gateway
        .client()
        .post(gateway.model_url(models::VIDEO, "predictLongRunning"))
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", &gateway.config().api_key)
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }

    let mut operation: Operation = resp
        .json()
        .await
        .map_err(|e| GatewayError::Parse(e.to_string()))?;

    let policy = &gateway.config().video_poll;
    let mut interval = policy.initial;
    let mut attempts: u32 = 0;

    while !operation.done {
        if attempts >= policy.max_attempts {
            return Err(GatewayError::Timeout(attempts));
        }
        on_status(STATUS_MESSAGES[attempts as usize % STATUS_MESSAGES.len()]);
        tokio::time::sleep(interval).await;
        interval = (interval * 2).min(policy.max_interval);
        attempts += 1;

        debug!(operation = %operation.name, attempts, "polling video operation");
        let resp = gateway
            .client()
            .get(format!(
                "{}/v1beta/{}",
                gateway.config().base_url,
                operation.name
            ))
            .header("x-goog-api-key", &gateway.config().api_key)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        operation = resp
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
    }

    if let Some(error) = operation.error {
        return Err(GatewayError::Api {
            status: error.code,
            message: error.message,
        });
    }

    let uri = operation
        .response
        .and_then(|r| r.generated_videos.into_iter().next())
        .and_then(|v| v.video)
        .and_then(|v| v.uri)
        .ok_or(GatewayError::MissingPayload("no video download reference"))?;

    Ok(format!("{uri}&key={}", gateway.config().api_key))
}
