use super::{error_from_response, models, Gateway, GatewayError, GenerateResponse, WireContent};
use base64::Engine;
use serde::Serialize;

/// PCM format returned by the speech endpoint: 16-bit little-endian samples.
pub const SAMPLE_RATE: u32 = 24_000;
pub const CHANNELS: u16 = 1;

const VOICE: &str = "Kore";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechRequest {
    contents: Vec<WireContent>,
    generation_config: SpeechGenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechGenerationConfig {
    response_modalities: [&'static str; 1],
    speech_config: SpeechConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: &'static str,
}

pub(crate) async fn synthesize(gateway: &Gateway, text: &str) -> Result<Vec<u8>, GatewayError> {
    let body = SpeechRequest {
        contents: vec![WireContent::prompt(&format!("Say naturally: {text}"))],
        generation_config: SpeechGenerationConfig {
            response_modalities: ["AUDIO"],
            speech_config: SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: VOICE },
                },
            },
        },
    };

    let resp = gateway
        .client()
        .post(gateway.model_url(models::TTS, "generateContent"))
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

    let encoded = data
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.first())
        .and_then(|p| p.inline_data.as_ref())
        .map(|inline| inline.data.clone())
        .ok_or(GatewayError::MissingPayload("no audio returned"))?;

    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| GatewayError::Parse(format!("audio payload: {e}")))
}

/// Decode raw 16-bit little-endian PCM into normalized f32 samples.
pub fn pcm_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_to_samples_normalizes() {
        let bytes = [
            0x00, 0x00, // 0
            0xff, 0x7f, // i16::MAX
            0x00, 0x80, // i16::MIN
        ];
        let samples = pcm_to_samples(&bytes);
        assert_eq!(samples.len(), 3);
        assert!((samples[0]).abs() < 1e-6);
        assert!((samples[1] - (32767.0 / 32768.0)).abs() < 1e-6);
        assert!((samples[2] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pcm_to_samples_ignores_trailing_byte() {
        let samples = pcm_to_samples(&[0x00, 0x00, 0x7f]);
        assert_eq!(samples.len(), 1);
    }
}
