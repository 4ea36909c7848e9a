use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Shared builder for every outbound client so they all carry the same timeout.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
}

/// Join a configured base URL and a path without doubling the slash.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// `endpoint` plus one caller-supplied id, percent-encoded as a single path segment.
pub(crate) fn object_url(base_url: &str, collection: &str, id: &str) -> Result<Url, String> {
    let mut url = Url::parse(&endpoint(base_url, collection)).map_err(|e| format!("invalid base url {}: {}", base_url, e))?;
    url.path_segments_mut()
        .map_err(|_| format!("base url {} cannot carry a path", base_url))?
        .pop_if_empty()
        .push(id);
    Ok(url)
}

/// Response envelope used by the cart/order service.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Envelope<T> {
    #[allow(dead_code)]
    pub message: String,
    pub data: Option<T>,
}

/// Body of a completed request, split by status class.
pub(crate) enum Reply {
    Success { status: u16, body: String },
    ClientError { status: u16, body: String },
    ServerError { status: u16, body: String },
}

impl Reply {
    pub async fn read(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let body = response.text().await?;
        let code = status.as_u16();
        Ok(if status.is_success() {
            Reply::Success { status: code, body }
        } else if status.is_client_error() {
            Reply::ClientError { status: code, body }
        } else {
            Reply::ServerError { status: code, body }
        })
    }
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(body)
}
