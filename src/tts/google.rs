use base64::Engine as _;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SynthesisError};

use super::http;
use super::provider::{
    check_options, non_empty, Capabilities, ProviderId, ProviderOptions, SpeechProvider,
    SynthesisRequest,
};
use super::selector::{Credentials, SpeechProviderConfig};

pub const DEFAULT_ENDPOINT: &str = "https://texttospeech.googleapis.com";
const NAME: &str = "google";
const OPTIONS: &[&str] = &["api_key", "effects_profile", "endpoint"];

/// Device profiles accepted in `audioConfig.effectsProfileId`.
pub const EFFECTS_PROFILES: &[&str] = &[
    "telephony-class-application",
    "wearable-class-device",
    "handset-class-device",
    "headphone-class-device",
    "small-bluetooth-speaker-class-device",
    "medium-bluetooth-speaker-class-device",
    "large-home-entertainment-class-device",
    "large-automotive-class-device",
];

/// Google Cloud Text-to-Speech over its REST interface.
pub struct GoogleProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    effects_profile: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeBody<'a> {
    audio_config: AudioConfig<'a>,
    input: Input<'a>,
    voice: VoiceSelection<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'static str,
    pitch: f32,
    speaking_rate: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    effects_profile_id: Vec<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum Input<'a> {
    Text(&'a str),
    Ssml(&'a str),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

impl GoogleProvider {
    pub fn new(config: &SpeechProviderConfig) -> Result<Self, ConfigError> {
        let Credentials::ApiKey(api_key) = &config.credentials else {
            return Err(ConfigError::MissingField {
                provider: NAME,
                field: "api_key",
                env_var: "GOOGLE_API_KEY",
            });
        };
        Ok(Self {
            client: http::client()?,
            api_key: api_key.clone(),
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            effects_profile: config.effects_profile.clone(),
        })
    }

    fn send(&self, input: Input<'_>, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        let body = SynthesizeBody {
            audio_config: AudioConfig {
                audio_encoding: "LINEAR16",
                pitch: 0.0,
                speaking_rate: request.rate,
                effects_profile_id: self.effects_profile.as_deref().into_iter().collect(),
            },
            input,
            voice: VoiceSelection {
                language_code: request.locale,
                name: request.voice,
            },
        };
        let url = format!("{}/v1beta1/text:synthesize", http::trim_endpoint(&self.endpoint));
        tracing::debug!(%url, voice = request.voice, "google synthesize");

        let response = self
            .client
            .post(&url)
            .query(&[("alt", "json"), ("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(http::request_error(NAME))?;
        let payload: SynthesizeResponse = http::check_status(NAME, response)?
            .json()
            .map_err(|err| SynthesisError::InvalidResponse {
                provider: NAME.to_string(),
                reason: format!("decode JSON: {err}"),
            })?;

        base64::engine::general_purpose::STANDARD
            .decode(payload.audio_content.trim())
            .map_err(|err| SynthesisError::InvalidResponse {
                provider: NAME.to_string(),
                reason: format!("decode audioContent: {err}"),
            })
    }
}

impl SpeechProvider for GoogleProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        ProviderId::Google.capabilities()
    }

    fn configure(&mut self, options: &ProviderOptions) -> Result<(), ConfigError> {
        check_options(NAME, options, OPTIONS)?;
        for (key, value) in options {
            match key.as_str() {
                "api_key" => self.api_key = value.clone(),
                // An empty profile turns the telephony effect off.
                "effects_profile" => self.effects_profile = non_empty(value),
                "endpoint" => self.endpoint = value.clone(),
                _ => {}
            }
        }
        Ok(())
    }

    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        self.capabilities().check_length(NAME, request.text)?;
        self.send(Input::Text(request.text), request)
    }

    fn synthesize_ssml(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        self.capabilities().check_length(NAME, request.text)?;
        self.send(Input::Ssml(request.text), request)
    }

    fn list_effects_profiles(&self) -> &'static [&'static str] {
        EFFECTS_PROFILES
    }
}
