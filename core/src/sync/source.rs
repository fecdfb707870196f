use crate::config::MonitorConfig;
use crate::prelude::{SyncError, SyncResult};
use crate::records::PointRecord;
use std::future::Future;
use std::time::Duration;

/// Request/response source of the full point collection.
pub trait PointSource {
    fn fetch_points(&self) -> impl Future<Output = SyncResult<Vec<PointRecord>>> + Send;
}

/// `GET <endpoint>` returning a JSON array of point records.
#[derive(Debug, Clone)]
pub struct HttpPointSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPointSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &MonitorConfig) -> SyncResult<Self> {
        Self::new(
            config.endpoint_url.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl PointSource for HttpPointSource {
    async fn fetch_points(&self) -> SyncResult<Vec<PointRecord>> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        PointRecord::collection_from_slice(&body)
    }
}
