use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricKind {
    Recovery,
    Sleep,
    Strain,
    Hrv,
}

impl BiometricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recovery => "recovery",
            Self::Sleep => "sleep",
            Self::Strain => "strain",
            Self::Hrv => "hrv",
        }
    }
}

impl std::fmt::Display for BiometricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of structured biometric data.
#[async_trait]
pub trait BiometricSource: Send + Sync {
    async fn query(&self, kind: BiometricKind, days_back: u32) -> GatewayResult<Value>;
}

/// Payload returned when no biometric provider can be reached.
pub fn unavailable_payload(kind: BiometricKind, days_back: u32, details: Option<&str>) -> Value {
    let mut payload = json!({
        "data_type": kind.as_str(),
        "days_back": days_back,
        "note": "WHOOP API unavailable",
    });
    if let Some(details) = details {
        payload["details"] = json!(details);
    }
    payload
}

/// Used when no biometric provider is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBiometrics;

#[async_trait]
impl BiometricSource for UnavailableBiometrics {
    async fn query(&self, kind: BiometricKind, days_back: u32) -> GatewayResult<Value> {
        Ok(unavailable_payload(kind, days_back, None))
    }
}

/// Fetches `GET {base_url}/{kind}?days_back=N` from a biometric bridge service.
#[derive(Debug, Clone)]
pub struct HttpBiometricSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBiometricSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BiometricSource for HttpBiometricSource {
    async fn query(&self, kind: BiometricKind, days_back: u32) -> GatewayResult<Value> {
        let url = format!("{}/{}?days_back={days_back}", self.base_url, kind.as_str());
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Upstream(format!(
                "biometric query returned HTTP {}",
                status.as_u16()
            )));
        }
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_source_reports_note() {
        let payload = UnavailableBiometrics
            .query(BiometricKind::Sleep, 3)
            .await
            .unwrap();
        assert_eq!(payload["data_type"], "sleep");
        assert_eq!(payload["days_back"], 3);
        assert_eq!(payload["note"], "WHOOP API unavailable");
        assert!(payload.get("details").is_none());
    }
}
