use crate::api::AggregateEnvelope;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to request to contest api: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("invalid api url given")]
    InvalidUrlError(#[from] url::ParseError),
    #[error("contest api is not healthy: status {0}")]
    UnhealthyError(u16),
    #[error("failed to deserialize contest envelope: {0}")]
    DeserializeError(#[from] serde_json::Error),
    #[error("{0}")]
    FailedError(String),
}

/// Client of a running aggregator's `/api` surface.
pub struct ApiClient {
    health_url: Url,
    contests_url: Url,
    client: Client,
}

impl ApiClient {
    /// `base_url` is the api root, e.g. `http://localhost:3000/api`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(ApiClient {
            health_url: base_url.join("health")?,
            contests_url: base_url.join("contests")?,
            client: Client::builder().gzip(true).timeout(timeout).build()?,
        })
    }

    pub async fn health(&self) -> Result<()> {
        let res = self.client.get(self.health_url.clone()).send().await?;
        if !res.status().is_success() {
            return Err(ClientError::UnhealthyError(res.status().as_u16()));
        }
        Ok(())
    }

    /// Check health, then fetch the contest envelope. A failed envelope is returned as an error.
    pub async fn fetch_contests(&self) -> Result<AggregateEnvelope> {
        self.health().await?;

        let res = self.client.get(self.contests_url.clone()).send().await?;
        let status = res.status();
        let body: Value = res.json().await?;

        if body.get("success").and_then(Value::as_bool) != Some(true) {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or(format!("Failed to fetch contests (status {})", status.as_u16()));
            tracing::error!("contest api reported failure: {}", message);
            return Err(ClientError::FailedError(message));
        }

        Ok(serde_json::from_value(body)?)
    }
}
