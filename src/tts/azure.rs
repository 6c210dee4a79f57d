use reqwest::blocking::Client;

use crate::error::{ConfigError, SynthesisError};

use super::http;
use super::provider::{
    check_options, rate_percent, xml_escape, Capabilities, ProviderId, ProviderOptions,
    SpeechProvider, SynthesisRequest,
};
use super::selector::{Credentials, SpeechProviderConfig};

const NAME: &str = "azure";
const OPTIONS: &[&str] = &["subscription_key", "region", "endpoint"];
const OUTPUT_FORMAT: &str = "riff-24khz-16bit-mono-pcm";

/// Azure Cognitive Services speech over the REST interface. Every request is
/// sent as SSML; plain text is wrapped before sending.
pub struct AzureProvider {
    client: Client,
    subscription_key: String,
    region: String,
    endpoint: Option<String>,
}

impl AzureProvider {
    pub fn new(config: &SpeechProviderConfig) -> Result<Self, ConfigError> {
        let Credentials::SubscriptionKey(key) = &config.credentials else {
            return Err(ConfigError::MissingField {
                provider: NAME,
                field: "subscription_key",
                env_var: "AZURE_SUBSCRIPTION_KEY",
            });
        };
        Ok(Self {
            client: http::client()?,
            subscription_key: key.clone(),
            region: config.region.clone().unwrap_or_else(|| "eastus".to_string()),
            endpoint: config.endpoint.clone(),
        })
    }

    fn url(&self) -> String {
        let base = match &self.endpoint {
            Some(endpoint) => http::trim_endpoint(endpoint).to_string(),
            None => format!("https://{}.tts.speech.microsoft.com", self.region),
        };
        format!("{base}/cognitiveservices/v1")
    }

    fn post_ssml(&self, ssml: String) -> Result<Vec<u8>, SynthesisError> {
        let url = self.url();
        tracing::debug!(%url, "azure synthesize");
        let response = self
            .client
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .header(reqwest::header::CONTENT_TYPE, "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .body(ssml)
            .send()
            .map_err(http::request_error(NAME))?;
        http::read_body(NAME, http::check_status(NAME, response)?)
    }
}

pub(crate) fn build_ssml(request: &SynthesisRequest<'_>) -> String {
    let text = xml_escape(request.text);
    let body = if request.rate == 1.0 {
        text
    } else {
        format!(
            r#"<prosody rate="{}">{text}</prosody>"#,
            rate_percent(request.rate)
        )
    };
    format!(
        r#"<speak version="1.0" xmlns="http://www.w3.org/2001/10/synthesis" xml:lang="{}"><voice name="{}">{body}</voice></speak>"#,
        xml_escape(request.locale),
        xml_escape(request.voice),
    )
}

impl SpeechProvider for AzureProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        ProviderId::Azure.capabilities()
    }

    fn configure(&mut self, options: &ProviderOptions) -> Result<(), ConfigError> {
        check_options(NAME, options, OPTIONS)?;
        for (key, value) in options {
            match key.as_str() {
                "subscription_key" => self.subscription_key = value.clone(),
                "region" => self.region = value.trim().to_string(),
                "endpoint" => self.endpoint = Some(value.clone()),
                _ => {}
            }
        }
        Ok(())
    }

    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        self.post_ssml(build_ssml(request))
    }

    fn synthesize_ssml(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        self.post_ssml(request.text.to_string())
    }
}
