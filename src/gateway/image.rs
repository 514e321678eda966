use super::{error_from_response, models, Gateway, GatewayError, GenerateResponse, WireContent};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "16:9")]
    Wide,
}

#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub aspect_ratio: AspectRatio,
    /// Pro tier routes to the pro image model and requests 1K output.
    pub pro: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageRequest {
    contents: Vec<WireContent>,
    generation_config: ImageGenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageGenerationConfig {
    image_config: ImageConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: AspectRatio,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<&'static str>,
}

pub(crate) async fn generate(
    gateway: &Gateway,
    prompt: &str,
    options: &ImageOptions,
) -> Result<String, GatewayError> {
    let model = if options.pro {
        models::IMAGE_PRO
    } else {
        models::IMAGE
    };

    let body = ImageRequest {
        contents: vec![WireContent::prompt(prompt)],
        generation_config: ImageGenerationConfig {
            image_config: ImageConfig {
                aspect_ratio: options.aspect_ratio,
                image_size: options.pro.then_some("1K"),
            },
        },
    };

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

    let Some(candidate) = data.candidates.first() else {
        return Err(GatewayError::MissingPayload("no candidates returned"));
    };
    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(GatewayError::SafetyBlocked);
    }

    let parts = candidate
        .content
        .as_ref()
        .map(|c| c.parts.as_slice())
        .unwrap_or_default();
    for part in parts {
        if let Some(inline) = &part.inline_data {
            let mime = inline.mime_type.as_deref().unwrap_or("image/png");
            return Ok(format!("data:{};base64,{}", mime, inline.data));
        }
    }

    Err(GatewayError::MissingPayload("no image data in response"))
}
