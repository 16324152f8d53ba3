use super::{Platform, SourceConfig};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client, Url,
};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    StatusError { status: u16, url: String },
    #[error("malformed response body: {0}")]
    DeserializeError(#[from] serde_json::Error),
    #[error("invalid source url given")]
    InvalidUrlError(#[from] url::ParseError),
    #[error("timed out after {}ms", .0.as_millis())]
    TimeoutError(Duration),
}

/// An external contest listing.
#[async_trait]
pub trait ContestSource: Send + Sync {
    fn platform(&self) -> Platform;
    async fn fetch(&self) -> Result<Value>;
}

pub struct HttpContestSource {
    platform: Platform,
    url: Url,
    timeout: Duration,
    client: Client,
}

impl HttpContestSource {
    pub fn new(platform: Platform, config: &SourceConfig, user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .gzip(true)
            .timeout(config.timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;

        Ok(HttpContestSource {
            platform,
            url: config.url.clone(),
            timeout: config.timeout,
            client,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn map_request_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::TimeoutError(self.timeout)
        } else {
            SourceError::RequestError(e)
        }
    }
}

#[async_trait]
impl ContestSource for HttpContestSource {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch(&self) -> Result<Value> {
        let res = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;
        if let Err(e) = res.error_for_status_ref() {
            tracing::error!("error response returned from {}: {:?}", self.platform, e);
            return Err(SourceError::StatusError {
                status: res.status().as_u16(),
                url: self.url.to_string(),
            });
        }

        let body = res.bytes().await.map_err(|e| self.map_request_error(e))?;
        let value: Value = serde_json::from_slice(&body)?;

        Ok(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::{http::StatusCode, routing, Router, Server};
    use serde_json::json;
    use std::net::{SocketAddr, TcpListener};

    async fn spawn_server(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            Server::from_tcp(listener)
                .unwrap()
                .serve(app.into_make_service())
                .await
                .unwrap();
        });
        addr
    }

    fn source_for(addr: SocketAddr, path: &str) -> HttpContestSource {
        let mut config = SourceConfig::new(Platform::Codeforces);
        config.url = Url::parse(&format!("http://{}{}", addr, path)).unwrap();
        config.timeout = Duration::from_secs(2);
        HttpContestSource::new(Platform::Codeforces, &config, "codefuse-test").unwrap()
    }

    #[tokio::test]
    async fn fetch_json_body() {
        let app = Router::new().route(
            "/contest.list",
            routing::get(|| async { axum::Json(json!({"status": "OK", "result": []})) }),
        );
        let addr = spawn_server(app).await;

        let value = source_for(addr, "/contest.list").fetch().await.unwrap();

        assert_eq!(value, json!({"status": "OK", "result": []}));
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let app = Router::new().route(
            "/contest.list",
            routing::get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
        let addr = spawn_server(app).await;

        let err = source_for(addr, "/contest.list").fetch().await.unwrap_err();

        assert!(matches!(err, SourceError::StatusError { status: 503, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_error() {
        let app = Router::new().route(
            "/contest.list",
            routing::get(|| async { "<html>Just a moment...</html>" }),
        );
        let addr = spawn_server(app).await;

        let err = source_for(addr, "/contest.list").fetch().await.unwrap_err();

        assert!(matches!(err, SourceError::DeserializeError(_)));
    }

    #[tokio::test]
    async fn client_timeout_is_timeout_error() {
        let app = Router::new().route(
            "/contest.list",
            routing::get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                axum::Json(json!({"status": "OK", "result": []}))
            }),
        );
        let addr = spawn_server(app).await;

        let mut config = SourceConfig::new(Platform::Codeforces);
        config.url = Url::parse(&format!("http://{}/contest.list", addr)).unwrap();
        config.timeout = Duration::from_millis(200);
        let source = HttpContestSource::new(Platform::Codeforces, &config, "codefuse-test").unwrap();

        let err = source.fetch().await.unwrap_err();

        assert!(matches!(err, SourceError::TimeoutError(_)));
        assert_eq!(err.to_string(), "timed out after 200ms");
    }

    #[test]
    fn timeout_error_message() {
        let err = SourceError::TimeoutError(Duration::from_secs(8));
        assert_eq!(err.to_string(), "timed out after 8000ms");
    }
}
