pub mod aws;
pub mod azure;
pub mod elevenlabs;
pub mod google;
mod http;
pub mod provider;
pub mod selector;

pub use provider::{
    create_provider, AudioStream, Capabilities, CustomVoice, ProviderId, ProviderOptions,
    SpeechProvider, SynthesisRequest,
};
pub use selector::{
    Credentials, Environment, ProviderOverrides, ProviderSettings, Resolver, SpeechProviderConfig,
    VoiceProfile, Voices,
};

use serde::Serialize;

/// Registry entry as printed by `vision-clip providers`.
#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub default: bool,
    pub features: Vec<&'static str>,
    pub capabilities: Capabilities,
}

pub fn providers_info() -> Vec<ProviderInfo> {
    ProviderId::ALL
        .into_iter()
        .map(|id| {
            let capabilities = id.capabilities();
            ProviderInfo {
                name: id.as_str(),
                default: id == selector::DEFAULT_PROVIDER,
                features: capabilities.features(),
                capabilities,
            }
        })
        .collect()
}
