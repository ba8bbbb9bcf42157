use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ScanError;
use crate::types::{ScanRequest, ScanResponse, ScanResult};

/// One round trip to the scan endpoint.
#[async_trait]
pub trait ScanApi: Send + Sync {
    async fn scan(&self, options: &[String]) -> Result<ScanResult, ScanError>;
}

/// Turn a decoded envelope into the result or the application error it carries.
pub fn interpret(response: ScanResponse) -> Result<ScanResult, ScanError> {
    if response.success {
        response
            .data
            .ok_or_else(|| ScanError::Transport("success response without data".into()))
    } else {
        Err(ScanError::Application(
            response.error.unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct TargetBody {
    target: String,
}

/// reqwest-backed client for the scan service.
#[derive(Debug, Clone)]
pub struct HttpScanApi {
    http: Client,
    base: String,
}

impl HttpScanApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ScanError> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(t) = config.request_timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            http: builder.build()?,
            base: config.server_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// The lab target the service is configured to scan.
    pub async fn target(&self) -> Result<String, ScanError> {
        let body: TargetBody = self
            .http
            .get(self.url("/api/target"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.target)
    }
}

#[async_trait]
impl ScanApi for HttpScanApi {
    async fn scan(&self, options: &[String]) -> Result<ScanResult, ScanError> {
        let body = ScanRequest {
            options: options.to_vec(),
        };
        let resp = self.http.post(self.url("/api/scan")).json(&body).send().await?;
        let status = resp.status();
        // Failure envelopes arrive with 4xx/5xx codes, so decode the body regardless.
        let bytes = resp.bytes().await?;
        debug!(%status, len = bytes.len(), "scan response received");
        let envelope: ScanResponse = serde_json::from_slice(&bytes)?;
        interpret(envelope)
    }
}
