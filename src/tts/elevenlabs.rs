use std::collections::BTreeMap;

use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::audio::Clip;
use crate::error::{ConfigError, SynthesisError};

use super::http;
use super::provider::{
    check_options, parse_f32_option, AudioStream, Capabilities, CustomVoice, ProviderId,
    ProviderOptions, SpeechProvider, SynthesisRequest,
};
use super::selector::{Credentials, SpeechProviderConfig};

pub const DEFAULT_ENDPOINT: &str = "https://api.elevenlabs.io";
pub const DEFAULT_MODEL: &str = "eleven_monolingual_v1";
const NAME: &str = "elevenlabs";
const OPTIONS: &[&str] = &["api_key", "model", "stability", "similarity_boost", "endpoint"];
const PCM_RATE: u32 = 24_000;

pub struct ElevenLabsProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    settings: VoiceSettings,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

#[derive(Serialize)]
struct SpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceEntry>,
}

#[derive(Deserialize)]
struct VoiceEntry {
    voice_id: String,
    name: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

impl ElevenLabsProvider {
    pub fn new(config: &SpeechProviderConfig) -> Result<Self, ConfigError> {
        let Credentials::ApiKey(api_key) = &config.credentials else {
            return Err(ConfigError::MissingField {
                provider: NAME,
                field: "api_key",
                env_var: "ELEVENLABS_API_KEY",
            });
        };
        Ok(Self {
            client: http::client()?,
            api_key: api_key.clone(),
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            settings: VoiceSettings::default(),
        })
    }

    /// Sends the text-to-speech request; `suffix` selects the streaming route.
    fn post_speech(
        &self,
        request: &SynthesisRequest<'_>,
        suffix: &str,
    ) -> Result<Response, SynthesisError> {
        self.capabilities().check_length(NAME, request.text)?;

        let url = format!(
            "{}/v1/text-to-speech/{}{suffix}",
            http::trim_endpoint(&self.endpoint),
            request.voice
        );
        tracing::debug!(%url, model = %self.model, "elevenlabs synthesize");
        let response = self
            .client
            .post(&url)
            .query(&[("output_format", "pcm_24000")])
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/pcm")
            .json(&SpeechBody {
                text: request.text,
                model_id: &self.model,
                voice_settings: self.settings,
            })
            .send()
            .map_err(http::request_error(NAME))?;
        http::check_status(NAME, response)
    }
}

fn unit_interval(key: &str, value: &str) -> Result<f32, ConfigError> {
    let parsed = parse_f32_option(key, value)?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be between 0.0 and 1.0".to_string(),
        });
    }
    Ok(parsed)
}

impl SpeechProvider for ElevenLabsProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        ProviderId::ElevenLabs.capabilities()
    }

    fn configure(&mut self, options: &ProviderOptions) -> Result<(), ConfigError> {
        check_options(NAME, options, OPTIONS)?;
        let mut settings = self.settings;
        if let Some(value) = options.get("stability") {
            settings.stability = unit_interval("stability", value)?;
        }
        if let Some(value) = options.get("similarity_boost") {
            settings.similarity_boost = unit_interval("similarity_boost", value)?;
        }

        self.settings = settings;
        if let Some(value) = options.get("api_key") {
            self.api_key = value.clone();
        }
        if let Some(value) = options.get("model") {
            self.model = value.trim().to_string();
        }
        if let Some(value) = options.get("endpoint") {
            self.endpoint = value.clone();
        }
        Ok(())
    }

    /// Locale and rate are not part of the ElevenLabs request.
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        let response = self.post_speech(request, "")?;
        let pcm = http::read_body(NAME, response)?;
        Clip::from_pcm16_le(&pcm, PCM_RATE, 1)
            .encode()
            .map_err(|err| SynthesisError::InvalidResponse {
                provider: NAME.to_string(),
                reason: err.to_string(),
            })
    }

    fn synthesize_stream(&self, request: &SynthesisRequest<'_>) -> Result<AudioStream, SynthesisError> {
        let response = self.post_speech(request, "/stream")?;
        Ok(AudioStream::new(NAME, PCM_RATE, response))
    }

    fn list_custom_voices(&self) -> Result<Vec<CustomVoice>, SynthesisError> {
        let url = format!("{}/v1/voices", http::trim_endpoint(&self.endpoint));
        tracing::debug!(%url, "elevenlabs list voices");
        let response = self
            .client
            .get(&url)
            .header("xi-api-key", &self.api_key)
            .send()
            .map_err(http::request_error(NAME))?;
        let listing: VoicesResponse = http::check_status(NAME, response)?
            .json()
            .map_err(|err| SynthesisError::InvalidResponse {
                provider: NAME.to_string(),
                reason: format!("decode voice list: {err}"),
            })?;

        Ok(listing
            .voices
            .into_iter()
            .map(|voice| CustomVoice {
                id: voice.voice_id,
                name: voice.name,
                category: voice.category.unwrap_or_else(|| "custom".to_string()),
                labels: voice.labels,
            })
            .collect())
    }
}

