//! Resolves which speech provider to use and with what settings.
//!
//! Each setting is taken from the first source that defines it: explicit
//! overrides, then provider-specific environment variables, then the
//! provider's table in the configuration file, then built-in defaults.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::FileConfig;
use crate::error::ConfigError;

use super::provider::ProviderId;

pub const PROVIDER_ENV: &str = "TTS_PROVIDER";
pub const DEFAULT_PROVIDER: ProviderId = ProviderId::Google;
pub const RATE_RANGE: std::ops::RangeInclusive<f32> = 0.25..=4.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub va_voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub va_locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ProviderSettings {
    /// Fills every unset field of `self` from `lower`.
    pub fn or(self, lower: ProviderSettings) -> ProviderSettings {
        ProviderSettings {
            api_key: self.api_key.or(lower.api_key),
            subscription_key: self.subscription_key.or(lower.subscription_key),
            access_key_id: self.access_key_id.or(lower.access_key_id),
            secret_access_key: self.secret_access_key.or(lower.secret_access_key),
            session_token: self.session_token.or(lower.session_token),
            region: self.region.or(lower.region),
            va_voice: self.va_voice.or(lower.va_voice),
            va_locale: self.va_locale.or(lower.va_locale),
            caller_voice: self.caller_voice.or(lower.caller_voice),
            caller_locale: self.caller_locale.or(lower.caller_locale),
            rate: self.rate.or(lower.rate),
            model: self.model.or(lower.model),
            engine: self.engine.or(lower.engine),
            effects_profile: self.effects_profile.or(lower.effects_profile),
            endpoint: self.endpoint.or(lower.endpoint),
        }
    }

    /// Copy safe to print: secrets are replaced by a fixed marker.
    pub fn masked(&self) -> ProviderSettings {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "********".to_string());
        ProviderSettings {
            api_key: mask(&self.api_key),
            subscription_key: mask(&self.subscription_key),
            secret_access_key: mask(&self.secret_access_key),
            session_token: mask(&self.session_token),
            ..self.clone()
        }
    }

    /// Built-in defaults for `provider`.
    pub fn defaults(provider: ProviderId) -> ProviderSettings {
        let text = |value: &str| Some(value.to_string());
        let base = ProviderSettings {
            va_locale: text("en-US"),
            caller_locale: text("en-US"),
            rate: Some(1.0),
            ..ProviderSettings::default()
        };
        match provider {
            ProviderId::Google => ProviderSettings {
                va_voice: text("en-US-Journey-O"),
                caller_voice: text("en-US-Journey-D"),
                effects_profile: text("telephony-class-application"),
                ..base
            },
            ProviderId::Azure => ProviderSettings {
                va_voice: text("en-US-JennyNeural"),
                caller_voice: text("en-US-GuyNeural"),
                region: text("eastus"),
                ..base
            },
            ProviderId::ElevenLabs => ProviderSettings {
                model: text("eleven_monolingual_v1"),
                ..base
            },
            ProviderId::Aws => ProviderSettings {
                va_voice: text("Joanna"),
                caller_voice: text("Matthew"),
                region: text("us-east-1"),
                engine: text("neural"),
                ..base
            },
        }
    }

    /// Values read from the provider's environment variables.
    pub fn from_env(provider: ProviderId, env: &Environment) -> ProviderSettings {
        let var = |name: &str| env.get(name).map(str::to_string);
        match provider {
            ProviderId::Google => ProviderSettings {
                api_key: var("GOOGLE_API_KEY"),
                va_voice: var("VA_VOICE"),
                va_locale: var("VA_LOCALE"),
                caller_voice: var("CALLER_VOICE"),
                caller_locale: var("CALLER_LOCALE"),
                ..ProviderSettings::default()
            },
            ProviderId::Azure => ProviderSettings {
                subscription_key: var("AZURE_SUBSCRIPTION_KEY"),
                region: var("AZURE_REGION"),
                va_voice: var("AZURE_VA_VOICE"),
                caller_voice: var("AZURE_CALLER_VOICE"),
                ..ProviderSettings::default()
            },
            ProviderId::ElevenLabs => ProviderSettings {
                api_key: var("ELEVENLABS_API_KEY"),
                va_voice: var("ELEVENLABS_VA_VOICE"),
                caller_voice: var("ELEVENLABS_CALLER_VOICE"),
                model: var("ELEVENLABS_MODEL"),
                ..ProviderSettings::default()
            },
            ProviderId::Aws => ProviderSettings {
                access_key_id: var("AWS_ACCESS_KEY_ID"),
                secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
                session_token: var("AWS_SESSION_TOKEN"),
                region: var("AWS_REGION"),
                va_voice: var("AWS_VA_VOICE"),
                caller_voice: var("AWS_CALLER_VOICE"),
                ..ProviderSettings::default()
            },
        }
    }
}

/// Process environment captured once at startup.
#[derive(Debug, Clone, Default)]
pub struct Environment(BTreeMap<String, String>);

impl Environment {
    pub fn capture() -> Self {
        Self(std::env::vars().collect())
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Empty values count as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// Values given explicitly by the caller, usually from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct ProviderOverrides {
    pub provider: Option<String>,
    pub settings: ProviderSettings,
}

#[derive(Clone, PartialEq)]
pub enum Credentials {
    ApiKey(String),
    SubscriptionKey(String),
    Aws {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Credentials::SubscriptionKey(_) => f.write_str("SubscriptionKey(<redacted>)"),
            Credentials::Aws { access_key_id, .. } => f
                .debug_struct("Aws")
                .field("access_key_id", access_key_id)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceProfile {
    pub voice: String,
    pub locale: String,
}

/// Voices used for the two speaking roles of a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct Voices {
    pub assistant: VoiceProfile,
    pub caller: VoiceProfile,
    pub rate: f32,
}

/// Fully resolved provider selection, ready for [`super::create_provider`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechProviderConfig {
    pub provider: ProviderId,
    pub credentials: Credentials,
    pub assistant: VoiceProfile,
    pub caller: VoiceProfile,
    pub rate: f32,
    pub region: Option<String>,
    pub model: Option<String>,
    pub engine: Option<String>,
    pub effects_profile: Option<String>,
    pub endpoint: Option<String>,
}

impl SpeechProviderConfig {
    pub fn voices(&self) -> Voices {
        Voices {
            assistant: self.assistant.clone(),
            caller: self.caller.clone(),
            rate: self.rate,
        }
    }
}

pub struct Resolver<'a> {
    overrides: &'a ProviderOverrides,
    env: &'a Environment,
}

impl<'a> Resolver<'a> {
    pub fn new(overrides: &'a ProviderOverrides, env: &'a Environment) -> Self {
        Self { overrides, env }
    }

    /// Validates a provider named explicitly or through the environment. Runs
    /// before any configuration file is read.
    pub fn preflight(&self) -> Result<Option<ProviderId>, ConfigError> {
        if let Some(name) = self.overrides.provider.as_deref() {
            return name.parse().map(Some);
        }
        self.env.get(PROVIDER_ENV).map(str::parse).transpose()
    }

    pub fn provider_id(&self, file: Option<&FileConfig>) -> Result<ProviderId, ConfigError> {
        if let Some(id) = self.preflight()? {
            return Ok(id);
        }
        match file.and_then(|config| config.provider.as_deref()) {
            Some(name) => name.parse(),
            None => Ok(DEFAULT_PROVIDER),
        }
    }

    /// Settings after precedence merging, before required-field checks.
    pub fn merged(
        &self,
        file: Option<&FileConfig>,
    ) -> Result<(ProviderId, ProviderSettings), ConfigError> {
        let id = self.provider_id(file)?;
        let from_file = file
            .and_then(|config| config.provider_settings(id))
            .cloned()
            .unwrap_or_default();
        let settings = self
            .overrides
            .settings
            .clone()
            .or(ProviderSettings::from_env(id, self.env))
            .or(from_file)
            .or(ProviderSettings::defaults(id));
        Ok((id, settings))
    }

    pub fn resolve(&self, file: Option<&FileConfig>) -> Result<SpeechProviderConfig, ConfigError> {
        let (provider, settings) = self.merged(file)?;
        let name = provider.as_str();

        let credentials = match provider {
            ProviderId::Google => Credentials::ApiKey(required(
                settings.api_key.clone(),
                name,
                "api_key",
                "GOOGLE_API_KEY",
            )?),
            ProviderId::ElevenLabs => Credentials::ApiKey(required(
                settings.api_key.clone(),
                name,
                "api_key",
                "ELEVENLABS_API_KEY",
            )?),
            ProviderId::Azure => Credentials::SubscriptionKey(required(
                settings.subscription_key.clone(),
                name,
                "subscription_key",
                "AZURE_SUBSCRIPTION_KEY",
            )?),
            ProviderId::Aws => Credentials::Aws {
                access_key_id: required(
                    settings.access_key_id.clone(),
                    name,
                    "access_key_id",
                    "AWS_ACCESS_KEY_ID",
                )?,
                secret_access_key: required(
                    settings.secret_access_key.clone(),
                    name,
                    "secret_access_key",
                    "AWS_SECRET_ACCESS_KEY",
                )?,
                session_token: settings.session_token.clone(),
            },
        };

        let (va_env, caller_env) = voice_env_vars(provider);
        let assistant = VoiceProfile {
            voice: required(settings.va_voice.clone(), name, "va_voice", va_env)?,
            locale: settings.va_locale.clone().unwrap_or_else(|| "en-US".to_string()),
        };
        let caller = VoiceProfile {
            voice: required(settings.caller_voice.clone(), name, "caller_voice", caller_env)?,
            locale: settings
                .caller_locale
                .clone()
                .unwrap_or_else(|| "en-US".to_string()),
        };

        let rate = settings.rate.unwrap_or(1.0);
        validate_rate(rate)?;

        let resolved = SpeechProviderConfig {
            provider,
            credentials,
            assistant,
            caller,
            rate,
            region: settings.region,
            model: settings.model,
            engine: settings.engine,
            effects_profile: settings.effects_profile,
            endpoint: settings.endpoint,
        };
        tracing::debug!(
            provider = name,
            va_voice = %resolved.assistant.voice,
            caller_voice = %resolved.caller.voice,
            rate,
            "resolved speech provider"
        );
        Ok(resolved)
    }
}

pub fn validate_rate(rate: f32) -> Result<(), ConfigError> {
    if rate.is_finite() && RATE_RANGE.contains(&rate) {
        return Ok(());
    }
    Err(ConfigError::InvalidValue {
        key: "rate".to_string(),
        value: rate.to_string(),
        reason: format!(
            "must be between {} and {}",
            RATE_RANGE.start(),
            RATE_RANGE.end()
        ),
    })
}

fn required(
    value: Option<String>,
    provider: &'static str,
    field: &'static str,
    env_var: &'static str,
) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingField {
            provider,
            field,
            env_var,
        })
}

fn voice_env_vars(provider: ProviderId) -> (&'static str, &'static str) {
    match provider {
        ProviderId::Google => ("VA_VOICE", "CALLER_VOICE"),
        ProviderId::Azure => ("AZURE_VA_VOICE", "AZURE_CALLER_VOICE"),
        ProviderId::ElevenLabs => ("ELEVENLABS_VA_VOICE", "ELEVENLABS_CALLER_VOICE"),
        ProviderId::Aws => ("AWS_VA_VOICE", "AWS_CALLER_VOICE"),
    }
}
