//! Shared HTTP client, auth headers and error mapping.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{HostError, ProviderErrorBody};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// Only connecting is time-limited. Generations can take as long as the
/// backend needs.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Content-type only.
pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = json_headers();
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Build Azure-style headers (api-key).
pub fn api_key_headers(api_key: &str) -> HeaderMap {
    let mut headers = json_headers();
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("api-key", val);
    }
    headers
}

/// Build Anthropic-style headers (x-api-key).
pub fn anthropic_headers(api_key: &str, version: &str) -> HeaderMap {
    let mut headers = json_headers();
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("x-api-key", val);
    }
    if let Ok(val) = HeaderValue::from_str(version) {
        headers.insert("anthropic-version", val);
    }
    headers
}

/// Map a non-success HTTP status and body to an error.
///
/// 529 and 503 responses, and bodies whose error type or code mentions
/// overload, become [`HostError::Overloaded`] so the retry wrapper picks them up.
pub fn status_to_error(status: u16, body: &str) -> HostError {
    let parsed = ProviderErrorBody::parse(body);
    let message = parsed
        .as_ref()
        .map(ProviderErrorBody::describe)
        .unwrap_or_else(|| body.to_string());

    if matches!(status, 503 | 529) || parsed.as_ref().is_some_and(ProviderErrorBody::is_overloaded) {
        return HostError::Overloaded(message);
    }

    match status {
        401 | 403 => HostError::Authentication(message),
        429 => HostError::RateLimited(message),
        _ => HostError::api(status, message),
    }
}

/// POST a JSON body and decode a JSON response.
pub(crate) async fn post_json<T: DeserializeOwned>(
    url: &str,
    headers: HeaderMap,
    body: &Value,
) -> Result<T, HostError> {
    let resp = shared_client()
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await?;

    let status = resp.status().as_u16();
    if !(200..300).contains(&status) {
        let body_text = resp.text().await.unwrap_or_default();
        debug!(url, status, "Provider request failed");
        return Err(status_to_error(status, &body_text));
    }

    let text = resp.text().await?;
    Ok(serde_json::from_str(&text)?)
}
