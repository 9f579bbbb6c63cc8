use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};

/// Presence summary for one tracked data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub has_data: bool,
    pub row_count: u64,
}

impl SourceStatus {
    pub fn from_count(row_count: u64) -> Self {
        Self {
            has_data: row_count > 0,
            row_count,
        }
    }
}

/// Source name (e.g. `eeg_tokens`, `whoop_metrics`) to its status.
pub type DataStatus = BTreeMap<String, SourceStatus>;

#[async_trait]
pub trait DataStatusSource: Send + Sync {
    async fn status(&self) -> GatewayResult<DataStatus>;
}

/// Reads the status summary from an HTTP endpoint exposed by the time-series service.
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    client: reqwest::Client,
    url: String,
}

impl HttpStatusSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DataStatusSource for HttpStatusSource {
    async fn status(&self) -> GatewayResult<DataStatus> {
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Upstream(format!(
                "status endpoint returned HTTP {}",
                status.as_u16()
            )));
        }
        Ok(resp.json().await?)
    }
}
