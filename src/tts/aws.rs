use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::blocking::{Client, Response};
use reqwest::Url;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::audio::Clip;
use crate::error::{ConfigError, SynthesisError};

use super::http;
use super::provider::{
    check_options, non_empty, rate_percent, xml_escape, AudioStream, Capabilities, ProviderId,
    ProviderOptions, SpeechProvider, SynthesisRequest,
};
use super::selector::{Credentials, SpeechProviderConfig};

type HmacSha256 = Hmac<Sha256>;

const NAME: &str = "aws";
const SERVICE: &str = "polly";
const OPTIONS: &[&str] = &[
    "access_key_id",
    "secret_access_key",
    "session_token",
    "region",
    "engine",
    "endpoint",
];
const PCM_RATE: u32 = 16_000;
const CONTENT_TYPE: &str = "application/json";

/// Amazon Polly via the `SynthesizeSpeech` REST call, signed with SigV4.
pub struct PollyProvider {
    client: Client,
    keys: AwsKeys,
    region: String,
    engine: String,
    endpoint: Option<String>,
}

#[derive(Clone)]
pub struct AwsKeys {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SpeechBody<'a> {
    engine: &'a str,
    language_code: &'a str,
    output_format: &'static str,
    sample_rate: &'static str,
    text: &'a str,
    text_type: &'static str,
    voice_id: &'a str,
}

/// Headers to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub amz_date: String,
    pub authorization: String,
    pub security_token: Option<String>,
}

/// Signs a POST with AWS Signature Version 4. `host` must match the Host
/// header the transport sends, including a non-default port.
pub fn sign_request(
    keys: &AwsKeys,
    region: &str,
    service: &str,
    host: &str,
    path: &str,
    payload: &[u8],
    now: DateTime<Utc>,
) -> Result<SignedHeaders, SynthesisError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let mut headers = vec![
        ("content-type", CONTENT_TYPE.to_string()),
        ("host", host.to_string()),
        ("x-amz-date", amz_date.clone()),
    ];
    if let Some(token) = &keys.session_token {
        headers.push(("x-amz-security-token", token.clone()));
    }

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");
    let canonical_request = format!(
        "POST\n{path}\n\n{canonical_headers}\n{signed_headers}\n{}",
        hex::encode(Sha256::digest(payload))
    );

    let scope = format!("{date}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let secret = format!("AWS4{}", keys.secret_access_key);
    let k_date = hmac(secret.as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    let k_signing = hmac(&k_service, b"aws4_request")?;
    let signature = hex::encode(hmac(&k_signing, string_to_sign.as_bytes())?);

    Ok(SignedHeaders {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            keys.access_key_id
        ),
        amz_date,
        security_token: keys.session_token.clone(),
    })
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SynthesisError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|err| SynthesisError::Signing {
        provider: NAME.to_string(),
        reason: err.to_string(),
    })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

impl PollyProvider {
    pub fn new(config: &SpeechProviderConfig) -> Result<Self, ConfigError> {
        let Credentials::Aws {
            access_key_id,
            secret_access_key,
            session_token,
        } = &config.credentials
        else {
            return Err(ConfigError::MissingField {
                provider: NAME,
                field: "access_key_id",
                env_var: "AWS_ACCESS_KEY_ID",
            });
        };
        Ok(Self {
            client: http::client()?,
            keys: AwsKeys {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: session_token.clone(),
            },
            region: config
                .region
                .clone()
                .unwrap_or_else(|| "us-east-1".to_string()),
            engine: config.engine.clone().unwrap_or_else(|| "neural".to_string()),
            endpoint: config.endpoint.clone(),
        })
    }

    fn url(&self) -> Result<Url, SynthesisError> {
        let base = match &self.endpoint {
            Some(endpoint) => http::trim_endpoint(endpoint).to_string(),
            None => format!("https://polly.{}.amazonaws.com", self.region),
        };
        Url::parse(&format!("{base}/v1/speech")).map_err(|err| SynthesisError::InvalidResponse {
            provider: NAME.to_string(),
            reason: format!("invalid endpoint {base}: {err}"),
        })
    }

    fn post(
        &self,
        text: &str,
        text_type: &'static str,
        request: &SynthesisRequest<'_>,
    ) -> Result<Response, SynthesisError> {
        self.capabilities().check_length(NAME, text)?;

        let body = serde_json::to_vec(&SpeechBody {
            engine: &self.engine,
            language_code: request.locale,
            output_format: "pcm",
            sample_rate: "16000",
            text,
            text_type,
            voice_id: request.voice,
        })
        .map_err(|err| SynthesisError::InvalidResponse {
            provider: NAME.to_string(),
            reason: format!("encode request: {err}"),
        })?;

        let url = self.url()?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        let signed = sign_request(
            &self.keys,
            &self.region,
            SERVICE,
            &host,
            url.path(),
            &body,
            Utc::now(),
        )?;
        tracing::debug!(%url, voice = request.voice, text_type, "polly synthesize");

        let mut builder = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("x-amz-date", &signed.amz_date)
            .header(reqwest::header::AUTHORIZATION, &signed.authorization);
        if let Some(token) = &signed.security_token {
            builder = builder.header("x-amz-security-token", token);
        }
        let response = builder
            .body(body)
            .send()
            .map_err(http::request_error(NAME))?;
        http::check_status(NAME, response)
    }

    /// Plain text at normal rate; otherwise an SSML prosody wrapper.
    fn post_text(&self, request: &SynthesisRequest<'_>) -> Result<Response, SynthesisError> {
        if request.rate == 1.0 {
            return self.post(request.text, "text", request);
        }
        let ssml = format!(
            r#"<speak><prosody rate="{}">{}</prosody></speak>"#,
            rate_percent(request.rate),
            xml_escape(request.text)
        );
        self.post(&ssml, "ssml", request)
    }
}

fn wrap_pcm(response: Response) -> Result<Vec<u8>, SynthesisError> {
    let pcm = http::read_body(NAME, response)?;
    Clip::from_pcm16_le(&pcm, PCM_RATE, 1)
        .encode()
        .map_err(|err| SynthesisError::InvalidResponse {
            provider: NAME.to_string(),
            reason: err.to_string(),
        })
}

impl SpeechProvider for PollyProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        ProviderId::Aws.capabilities()
    }

    fn configure(&mut self, options: &ProviderOptions) -> Result<(), ConfigError> {
        check_options(NAME, options, OPTIONS)?;
        for (key, value) in options {
            match key.as_str() {
                "access_key_id" => self.keys.access_key_id = value.clone(),
                "secret_access_key" => self.keys.secret_access_key = value.clone(),
                "session_token" => self.keys.session_token = non_empty(value),
                "region" => self.region = value.trim().to_string(),
                "engine" => self.engine = value.trim().to_string(),
                "endpoint" => self.endpoint = Some(value.clone()),
                _ => {}
            }
        }
        Ok(())
    }

    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        wrap_pcm(self.post_text(request)?)
    }

    fn synthesize_ssml(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        wrap_pcm(self.post(request.text, "ssml", request)?)
    }

    /// Polly sends the audio body as it is produced.
    fn synthesize_stream(&self, request: &SynthesisRequest<'_>) -> Result<AudioStream, SynthesisError> {
        Ok(AudioStream::new(NAME, PCM_RATE, self.post_text(request)?))
    }
}
