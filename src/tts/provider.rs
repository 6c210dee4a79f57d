use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use serde::Serialize;

use crate::audio::Clip;
use crate::error::{ConfigError, SynthesisError};

use super::selector::SpeechProviderConfig;
use super::{aws::PollyProvider, azure::AzureProvider, elevenlabs::ElevenLabsProvider, google::GoogleProvider};

pub type ProviderOptions = BTreeMap<String, String>;

pub struct SynthesisRequest<'a> {
    pub text: &'a str,
    pub voice: &'a str,
    pub locale: &'a str,
    pub rate: f32,
}

pub trait SpeechProvider {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Applies settings after construction. Every key is checked against the
    /// provider's recognized set before anything is applied.
    fn configure(&mut self, options: &ProviderOptions) -> Result<(), ConfigError>;

    /// Plain-text synthesis. Returns a complete WAV file.
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError>;

    /// SSML synthesis; only called when `capabilities().ssml` is set.
    fn synthesize_ssml(&self, _request: &SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        Err(unsupported(self.name(), "SSML input"))
    }

    /// Audio as it arrives from the service. Requires `capabilities().streaming`.
    fn synthesize_stream(&self, _request: &SynthesisRequest<'_>) -> Result<AudioStream, SynthesisError> {
        Err(unsupported(self.name(), "streaming synthesis"))
    }

    /// Voices created on the account. Requires `capabilities().custom_voices`.
    fn list_custom_voices(&self) -> Result<Vec<CustomVoice>, SynthesisError> {
        Err(unsupported(self.name(), "custom voices"))
    }

    /// Device profiles accepted as `effects_profile`. Empty unless
    /// `capabilities().audio_effects` is set.
    fn list_effects_profiles(&self) -> &'static [&'static str] {
        &[]
    }
}

fn unsupported(provider: &str, feature: &'static str) -> SynthesisError {
    SynthesisError::Unsupported {
        provider: provider.to_string(),
        feature,
    }
}

pub const STREAM_CHUNK_SIZE: usize = 4096;

/// Mono PCM16 little-endian audio read in fixed-size chunks from a live
/// response. Every chunk but the last is exactly `chunk_size` bytes.
pub struct AudioStream {
    provider: String,
    sample_rate: u32,
    chunk_size: usize,
    reader: Box<dyn Read + Send>,
    finished: bool,
}

impl AudioStream {
    pub fn new(provider: &str, sample_rate: u32, reader: impl Read + Send + 'static) -> Self {
        Self {
            provider: provider.to_string(),
            sample_rate,
            chunk_size: STREAM_CHUNK_SIZE,
            reader: Box::new(reader),
            finished: false,
        }
    }

    /// Rounded down to whole samples.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(2) & !1;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Drains the remaining chunks into one clip.
    pub fn into_clip(self) -> Result<Clip, SynthesisError> {
        let sample_rate = self.sample_rate;
        let mut pcm = Vec::new();
        for chunk in self {
            pcm.extend_from_slice(&chunk?);
        }
        Ok(Clip::from_pcm16_le(&pcm, sample_rate, 1))
    }

    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(filled)
    }
}

impl Iterator for AudioStream {
    type Item = Result<Vec<u8>, SynthesisError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let mut buf = vec![0; self.chunk_size];
        match self.fill(&mut buf) {
            Ok(0) => {
                self.finished = true;
                None
            }
            Ok(n) => {
                if n < buf.len() {
                    self.finished = true;
                }
                buf.truncate(n);
                Some(Ok(buf))
            }
            Err(source) => {
                self.finished = true;
                Some(Err(SynthesisError::Stream {
                    provider: self.provider.clone(),
                    source,
                }))
            }
        }
    }
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioStream")
            .field("provider", &self.provider)
            .field("sample_rate", &self.sample_rate)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

/// A voice created on the provider account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomVoice {
    pub id: String,
    pub name: String,
    pub category: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    pub streaming: bool,
    pub ssml: bool,
    pub custom_voices: bool,
    pub audio_effects: bool,
    pub rate_control: bool,
    pub max_text_length: Option<usize>,
}

impl Capabilities {
    pub fn has_feature(&self, feature: &str) -> bool {
        match feature.to_ascii_lowercase().as_str() {
            "streaming" => self.streaming,
            "ssml" => self.ssml,
            "custom_voices" => self.custom_voices,
            "audio_effects" => self.audio_effects,
            "rate_control" => self.rate_control,
            _ => false,
        }
    }

    pub fn features(&self) -> Vec<&'static str> {
        [
            ("streaming", self.streaming),
            ("ssml", self.ssml),
            ("custom_voices", self.custom_voices),
            ("audio_effects", self.audio_effects),
            ("rate_control", self.rate_control),
        ]
        .into_iter()
        .filter_map(|(name, enabled)| enabled.then_some(name))
        .collect()
    }

    pub(crate) fn check_length(&self, provider: &str, text: &str) -> Result<(), SynthesisError> {
        match self.max_text_length {
            Some(max) if text.chars().count() > max => Err(SynthesisError::TextTooLong {
                provider: provider.to_string(),
                len: text.chars().count(),
                max,
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Google,
    Azure,
    ElevenLabs,
    Aws,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Google,
        ProviderId::Azure,
        ProviderId::ElevenLabs,
        ProviderId::Aws,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::Google => "google",
            ProviderId::Azure => "azure",
            ProviderId::ElevenLabs => "elevenlabs",
            ProviderId::Aws => "aws",
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            ProviderId::Google => Capabilities {
                ssml: true,
                audio_effects: true,
                rate_control: true,
                max_text_length: Some(5000),
                ..Capabilities::default()
            },
            ProviderId::Azure => Capabilities {
                ssml: true,
                rate_control: true,
                ..Capabilities::default()
            },
            ProviderId::ElevenLabs => Capabilities {
                streaming: true,
                custom_voices: true,
                max_text_length: Some(5000),
                ..Capabilities::default()
            },
            ProviderId::Aws => Capabilities {
                streaming: true,
                ssml: true,
                rate_control: true,
                max_text_length: Some(3000),
                ..Capabilities::default()
            },
        }
    }

    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let wanted = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownProvider {
                name: name.to_string(),
                available: Self::available(),
            })
    }
}

pub fn create_provider(
    config: &SpeechProviderConfig,
) -> Result<Box<dyn SpeechProvider>, ConfigError> {
    let provider: Box<dyn SpeechProvider> = match config.provider {
        ProviderId::Google => Box::new(GoogleProvider::new(config)?),
        ProviderId::Azure => Box::new(AzureProvider::new(config)?),
        ProviderId::ElevenLabs => Box::new(ElevenLabsProvider::new(config)?),
        ProviderId::Aws => Box::new(PollyProvider::new(config)?),
    };
    tracing::debug!(
        provider = provider.name(),
        features = ?provider.capabilities().features(),
        "created speech provider"
    );
    Ok(provider)
}

/// Rejects the whole option set if any key is outside `recognized`.
pub(crate) fn check_options(
    provider: &str,
    options: &ProviderOptions,
    recognized: &[&str],
) -> Result<(), ConfigError> {
    match options.keys().find(|key| !recognized.contains(&key.as_str())) {
        Some(key) => Err(ConfigError::UnknownOption {
            provider: provider.to_string(),
            key: key.clone(),
        }),
        None => Ok(()),
    }
}

pub(crate) fn parse_f32_option(key: &str, value: &str) -> Result<f32, ConfigError> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a number".to_string(),
        })
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub(crate) fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub(crate) fn rate_percent(rate: f32) -> String {
    format!("{}%", (rate * 100.0).round() as i32)
}
