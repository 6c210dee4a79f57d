use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;

use crate::error::{ConfigError, SynthesisError};

const USER_AGENT: &str = concat!("vision-clip/", env!("CARGO_PKG_VERSION"));

/// Blocking client shared by the HTTP providers. Requests wait as long as the
/// service takes; there is no client-side timeout.
pub(crate) fn client() -> Result<Client, ConfigError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(None::<Duration>)
        .build()
        .map_err(ConfigError::HttpClient)
}

pub(crate) fn request_error(provider: &str) -> impl FnOnce(reqwest::Error) -> SynthesisError + '_ {
    move |source| SynthesisError::Request {
        provider: provider.to_string(),
        source,
    }
}

/// Maps non-success statuses to errors, leaving successful responses untouched.
pub(crate) fn check_status(provider: &str, response: Response) -> Result<Response, SynthesisError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(SynthesisError::RateLimited {
            provider: provider.to_string(),
        });
    }

    let body = response.text().unwrap_or_default();
    tracing::debug!(provider, status = status.as_u16(), %body, "provider rejected request");
    Err(SynthesisError::Status {
        provider: provider.to_string(),
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

pub(crate) fn read_body(provider: &str, response: Response) -> Result<Vec<u8>, SynthesisError> {
    let bytes = response.bytes().map_err(request_error(provider))?;
    if bytes.is_empty() {
        return Err(SynthesisError::InvalidResponse {
            provider: provider.to_string(),
            reason: "empty audio body".to_string(),
        });
    }
    Ok(bytes.to_vec())
}

pub(crate) fn trim_endpoint(endpoint: &str) -> &str {
    endpoint.trim_end_matches('/')
}
