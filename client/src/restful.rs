use std::time::Duration;

use serde::{de, ser};
use shared::{
    errors::{ClientError, ClientResult},
    interaction::{AcquireRequest, RangeResponse, SubmitRequest, SubmitResponse},
};

use crate::config::Config;

pub const API_URL: &str = "https://btc-puzzle.com/api";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Single-attempt request wrappers for the coordination server. Retry and
/// backoff policy lives in the session loop.
pub struct ServerAPI {
    pub url: String,
    pub token: String,
}

impl ServerAPI {
    /// lease one search range for this worker
    pub async fn acquire_range(&self, config: &Config) -> anyhow::Result<RangeResponse> {
        let payload = AcquireRequest {
            nickname: config.nickname.clone(),
            device_name: config.device_name.clone(),
            workername: config.workername.clone(),
            prefix: config.prefix().map(str::to_string),
        };
        self.request("/get_range", &payload).await
    }

    /// report a completed range with its proof-of-work digest
    pub async fn submit_range(
        &self,
        range: &str,
        proof_of_work: &str,
        device_name: &str,
        workername: &str,
    ) -> anyhow::Result<SubmitResponse> {
        let payload = SubmitRequest {
            range: range.to_string(),
            proof_of_work: proof_of_work.to_string(),
            device_name: device_name.to_string(),
            workername: workername.to_string(),
        };
        self.request("/submit_range", &payload).await
    }

    /// base request
    async fn request<T, R>(&self, endpoint: &str, data: &T) -> anyhow::Result<R>
    where
        T: ser::Serialize,
        R: de::DeserializeOwned, {
        let url = format!("{}{}", self.url.trim_end_matches('/'), endpoint);

        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let response = match client
            .post(&url)
            .header("Authorization", &self.token)
            .json(data)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => anyhow::bail!("fail to send request: {err}"),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => anyhow::bail!("fail to read response content: {err:#}"),
        };

        match serde_json::from_str(&text) {
            Ok(response) => Ok(response),
            Err(err) => {
                anyhow::bail!(
                    "fail to deserialize response: {err:#}, response: {text}, status: {status}"
                )
            }
        }
    }
}

/// Client-side prefix check, performed before any network call. A violation
/// is a validation error, never sent to the server.
pub fn validate_prefix(prefix: &str) -> ClientResult<()> {
    if prefix.is_empty() || prefix.len() > 7 {
        return Err(ClientError::InvalidPrefix("must be 1 to 7 characters".to_string()));
    }
    if !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ClientError::InvalidPrefix("must contain only hex characters".to_string()));
    }
    match prefix.as_bytes()[0].to_ascii_lowercase() {
        b'8'..=b'9' | b'a'..=b'f' => {}
        _ => return Err(ClientError::InvalidPrefix("must start with 8 to f".to_string())),
    }
    if prefix.len() == 7 && !matches!(prefix.as_bytes()[6].to_ascii_uppercase(), b'0' | b'4' | b'8' | b'C') {
        return Err(ClientError::InvalidPrefix(
            "a 7-character prefix must end with 0, 4, 8 or C".to_string(),
        ));
    }
    Ok(())
}
