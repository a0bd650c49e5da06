//! Gemini TTS narration synthesis.
//!
//! Raw audio comes back base64-encoded with a provider-chosen mime type;
//! everything is converted to WAV PCM s16le 48 kHz mono so the ffmpeg mix
//! stage can consume it without sniffing formats.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{GenError, GenResult};
use crate::llm::GEMINI_API_KEY_ENV;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
const DEFAULT_TTS_FALLBACK_MODEL: &str = "gemini-2.5-pro-preview-tts";

pub const DEFAULT_VOICE: &str = "Kore";

/// TTS client configuration.
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub model: String,
    pub fallback_model: String,
    /// language → prebuilt voice name overrides.
    pub voice_map: HashMap<String, String>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_TTS_MODEL.to_string(),
            fallback_model: DEFAULT_TTS_FALLBACK_MODEL.to_string(),
            voice_map: HashMap::new(),
        }
    }
}

impl TtsConfig {
    pub fn from_env() -> Self {
        Self {
            model: std::env::var("PIPELINE_TTS_MODEL")
                .unwrap_or_else(|_| DEFAULT_TTS_MODEL.to_string()),
            fallback_model: std::env::var("PIPELINE_TTS_MODEL_FALLBACK")
                .unwrap_or_else(|_| DEFAULT_TTS_FALLBACK_MODEL.to_string()),
            voice_map: parse_voice_map(std::env::var("PIPELINE_VOICE_MAP").ok().as_deref()),
        }
    }

    /// Voice for a language: mapped override or the default voice.
    pub fn voice_for(&self, language: &str) -> String {
        self.voice_map
            .get(&language.to_lowercase())
            .cloned()
            .unwrap_or_else(|| DEFAULT_VOICE.to_string())
    }
}

/// Parse the `PIPELINE_VOICE_MAP` JSON map. Malformed input degrades to an
/// empty map rather than failing the pipeline.
pub fn parse_voice_map(raw: Option<&str>) -> HashMap<String, String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return HashMap::new();
    };
    let Ok(serde_json::Value::Object(entries)) = serde_json::from_str(raw) else {
        warn!("PIPELINE_VOICE_MAP is not a JSON object, using default voice");
        return HashMap::new();
    };
    entries
        .into_iter()
        .filter_map(|(key, value)| {
            let voice = value.as_str()?.trim().to_string();
            let language = key.trim().to_lowercase();
            (!language.is_empty() && !voice.is_empty()).then_some((language, voice))
        })
        .collect()
}

/// Result of one synthesis call.
#[derive(Debug, Clone)]
pub struct TtsOutput {
    pub model: String,
    pub voice: String,
}

#[derive(Debug, Serialize)]
struct TtsRequest {
    contents: Vec<TtsContent>,
    #[serde(rename = "generationConfig")]
    generation_config: TtsGenerationConfig,
}

#[derive(Debug, Serialize)]
struct TtsContent {
    parts: Vec<TtsPart>,
}

#[derive(Debug, Serialize)]
struct TtsPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct TtsGenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<String>,
    #[serde(rename = "speechConfig")]
    speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
struct SpeechConfig {
    #[serde(rename = "voiceConfig")]
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
struct VoiceConfig {
    #[serde(rename = "prebuiltVoiceConfig")]
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
struct PrebuiltVoiceConfig {
    #[serde(rename = "voiceName")]
    voice_name: String,
}

#[derive(Debug, Deserialize)]
struct TtsResponse {
    #[serde(default)]
    candidates: Vec<TtsCandidate>,
}

#[derive(Debug, Deserialize)]
struct TtsCandidate {
    content: Option<TtsResponseContent>,
}

#[derive(Debug, Deserialize)]
struct TtsResponseContent {
    #[serde(default)]
    parts: Vec<TtsResponsePart>,
}

#[derive(Debug, Deserialize)]
struct TtsResponsePart {
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    data: String,
}

/// Gemini TTS client.
#[derive(Debug, Clone)]
pub struct TtsClient {
    http: Client,
    api_key: String,
    base_url: String,
    config: TtsConfig,
}

impl TtsClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        config: TtsConfig,
    ) -> GenResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into(),
            config,
        })
    }

    pub fn from_env() -> GenResult<Self> {
        let api_key = std::env::var(GEMINI_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GenError::MissingApiKey(GEMINI_API_KEY_ENV.to_string()))?;
        Self::new(api_key, DEFAULT_BASE_URL.to_string(), TtsConfig::from_env())
    }

    /// Synthesize narration to `output` (WAV, 48 kHz mono). Tries the
    /// primary model, then the fallback; the last error wins when both fail.
    pub async fn synthesize(
        &self,
        text: &str,
        language: &str,
        output: impl AsRef<Path>,
    ) -> GenResult<TtsOutput> {
        if text.trim().is_empty() {
            return Err(GenError::validation("TTS text must be non-empty"));
        }
        let voice = self.config.voice_for(language);
        let output = output.as_ref();

        let mut errors = Vec::new();
        for model in [&self.config.model, &self.config.fallback_model] {
            match self.synthesize_once(model, text, language, &voice, output).await {
                Ok(()) => {
                    info!(model, voice = %voice, language, "narration synthesized");
                    return Ok(TtsOutput {
                        model: model.clone(),
                        voice,
                    });
                }
                Err(e) => {
                    warn!(model, error = %e, "TTS model attempt failed");
                    errors.push(format!("{model}: {e}"));
                }
            }
        }
        Err(GenError::request_failed(format!(
            "TTS failed across models: {}",
            errors.join(" | ")
        )))
    }

    async fn synthesize_once(
        &self,
        model: &str,
        text: &str,
        language: &str,
        voice: &str,
        output: &Path,
    ) -> GenResult<()> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );
        let request = TtsRequest {
            contents: vec![TtsContent {
                parts: vec![TtsPart {
                    text: format!("Language: {language}\n\n{text}"),
                }],
            }],
            generation_config: TtsGenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.to_string(),
                        },
                    },
                },
            },
        };

        let http_response = self.http.post(&url).json(&request).send().await?;
        if !http_response.status().is_success() {
            let status = http_response.status();
            let body = http_response.text().await.unwrap_or_default();
            return Err(GenError::request_failed(format!(
                "TTS returned {status}: {body}"
            )));
        }

        let payload: TtsResponse = http_response.json().await?;
        let (audio, mime_type) = extract_audio(&payload)?;
        write_as_wav(&audio, mime_type.as_deref(), output).await
    }
}

fn extract_audio(payload: &TtsResponse) -> GenResult<(Vec<u8>, Option<String>)> {
    for candidate in &payload.candidates {
        let Some(content) = &candidate.content else {
            continue;
        };
        for part in &content.parts {
            let Some(inline) = &part.inline_data else {
                continue;
            };
            let audio = base64::engine::general_purpose::STANDARD
                .decode(&inline.data)
                .map_err(|_| GenError::response_format("TTS audio payload is not valid base64"))?;
            if !audio.is_empty() {
                return Ok((audio, inline.mime_type.clone()));
            }
        }
    }
    Err(GenError::response_format("TTS response carried no audio data"))
}

/// Lowercased base mime type plus its parameters.
fn parse_mime_type(mime_type: Option<&str>) -> (String, HashMap<String, String>) {
    let raw = mime_type.unwrap_or("").trim();
    let mut parts = raw.split(';').map(str::trim).filter(|p| !p.is_empty());
    let base = parts.next().unwrap_or("").to_lowercase();
    let params = parts
        .filter_map(|item| {
            let (key, value) = item.split_once('=')?;
            Some((
                key.trim().to_lowercase(),
                value.trim().trim_matches('"').to_lowercase(),
            ))
        })
        .collect();
    (base, params)
}

async fn write_as_wav(audio: &[u8], mime_type: Option<&str>, output: &Path) -> GenResult<()> {
    let (base, params) = parse_mime_type(mime_type);
    let temp_dir = tempfile::tempdir()?;

    if base == "audio/l16" || base == "audio/pcm" {
        // Raw PCM: the container-less payload needs its format stated.
        let sample_rate: u32 = params.get("rate").and_then(|r| r.parse().ok()).unwrap_or(24_000);
        let channels: u16 = params.get("channels").and_then(|c| c.parse().ok()).unwrap_or(1);
        let sample_format = if base == "audio/l16" { "s16be" } else { "s16le" };
        let raw_path = temp_dir.path().join("tts_raw.pcm");
        tokio::fs::write(&raw_path, audio).await?;
        dcast_media::convert_pcm_to_wav(&raw_path, output, sample_format, sample_rate, channels)
            .await?;
    } else {
        let ext = extension_for_mime(&base);
        let raw_path = temp_dir.path().join(format!("tts_raw{ext}"));
        tokio::fs::write(&raw_path, audio).await?;
        dcast_media::convert_to_wav(&raw_path, output).await?;
    }
    Ok(())
}

fn extension_for_mime(base: &str) -> &'static str {
    match base {
        "audio/wav" | "audio/x-wav" | "audio/wave" => ".wav",
        "audio/mp3" | "audio/mpeg" => ".mp3",
        "audio/ogg" => ".ogg",
        "audio/opus" => ".opus",
        "audio/aac" => ".aac",
        "audio/flac" => ".flac",
        _ => ".raw",
    }
}
