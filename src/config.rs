use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tts::{ProviderId, ProviderSettings};

pub const PROJECT_FILE: &str = "vision-clip.toml";

/// On-disk configuration. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub generator: GeneratorSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google: Option<ProviderSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<ProviderSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevenlabs: Option<ProviderSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<ProviderSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
}

impl FileConfig {
    /// Finds and loads the configuration file. A path given explicitly must
    /// exist; otherwise the project file and then the user file are tried, and
    /// `None` means neither exists.
    pub fn locate(explicit: Option<&Path>) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            return Self::load_from_path(path).map(|config| Some((path.to_path_buf(), config)));
        }

        let project = Self::project_path();
        if project.is_file() {
            return Self::load_from_path(&project).map(|config| Some((project, config)));
        }

        if let Ok(path) = Self::default_path() {
            if path.is_file() {
                return Self::load_from_path(&path).map(|config| Some((path, config)));
            }
        }

        tracing::debug!("no configuration file found");
        Ok(None)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |reason: String| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        let config: FileConfig = if is_json(path) {
            serde_json::from_str(&raw).map_err(|err| parse_err(err.to_string()))?
        } else {
            toml::from_str(&raw).map_err(|err| parse_err(err.to_string()))?
        };
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Writes a starter file at the user location and returns its path.
    pub fn init_default() -> Result<PathBuf, ConfigError> {
        let path = Self::default_path()?;
        let write_err = |source| ConfigError::Write {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(&path, Self::template()?).map_err(write_err)?;
        Ok(path)
    }

    pub fn template() -> Result<String, ConfigError> {
        let config = FileConfig {
            provider: Some(ProviderId::Google.as_str().to_string()),
            generator: GeneratorSettings {
                effects_dir: Some(PathBuf::from(crate::audio::effects::DEFAULT_EFFECTS_DIR)),
                temp_dir: Some(PathBuf::from(crate::generator::DEFAULT_TEMP_DIR)),
                sample_rate: Some(crate::audio::DEFAULT_SAMPLE_RATE),
            },
            google: Some(ProviderSettings::defaults(ProviderId::Google)),
            azure: Some(ProviderSettings::defaults(ProviderId::Azure)),
            elevenlabs: Some(ProviderSettings::defaults(ProviderId::ElevenLabs)),
            aws: Some(ProviderSettings::defaults(ProviderId::Aws)),
        };
        toml::to_string_pretty(&config).map_err(|err| ConfigError::Render(err.to_string()))
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = BaseDirs::new().ok_or(ConfigError::NoHomeDir)?;
        Ok(base.config_dir().join("vision-clip").join("config.toml"))
    }

    pub fn project_path() -> PathBuf {
        PathBuf::from(PROJECT_FILE)
    }

    pub fn provider_settings(&self, id: ProviderId) -> Option<&ProviderSettings> {
        match id {
            ProviderId::Google => self.google.as_ref(),
            ProviderId::Azure => self.azure.as_ref(),
            ProviderId::ElevenLabs => self.elevenlabs.as_ref(),
            ProviderId::Aws => self.aws.as_ref(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.provider {
            name.parse::<ProviderId>()?;
        }
        if let Some(rate) = self.generator.sample_rate {
            if rate == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "generator.sample_rate".to_string(),
                    value: rate.to_string(),
                    reason: "must be greater than 0".to_string(),
                });
            }
        }
        for id in ProviderId::ALL {
            if let Some(rate) = self.provider_settings(id).and_then(|s| s.rate) {
                crate::tts::selector::validate_rate(rate)?;
            }
        }
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
