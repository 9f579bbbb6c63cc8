//! `memory_search`: queries the shared remote memory service.
//!
//! Candidate endpoints are tried in order; the first HTTP 200 wins. When every
//! candidate fails the failure is returned as data, not as an error, so the
//! model always receives valid JSON it can reason about.

use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{ExecutionSide, ParamSpec, ToolSpec};
use crate::config::MemorySearchConfig;
use crate::error::{GatewayError, GatewayResult};

pub const NAME: &str = "memory_search";

const PARAMS: &[ParamSpec] = &[
    ParamSpec::string("query", "What to search for in memory").required(),
    ParamSpec::string("user_id", "User identifier (optional)"),
    ParamSpec::integer("limit", "Maximum number of memories to return").default_int(5),
];

pub const SPEC: ToolSpec = ToolSpec {
    name: NAME,
    description: "Search the shared memory system for user context, preferences, and historical information.
This memory is shared across all AI agents and contains important user details.

Use this when you need to recall user preferences, past interactions, or stored context.",
    side: ExecutionSide::Client,
    params: PARAMS,
};

#[derive(Debug, Deserialize)]
pub struct MemorySearchArgs {
    pub query: String,
    pub user_id: Option<String>,
    pub limit: u32,
}

/// HTTP client bound to the ordered list of search endpoints.
#[derive(Debug, Clone)]
pub struct RemoteMemorySearch {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl RemoteMemorySearch {
    pub fn new(config: &MemorySearchConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Configuration(format!("http client: {e}")))?;
        let endpoints = config
            .base_urls
            .iter()
            .map(|base| format!("{}{}", base.trim_end_matches('/'), config.path))
            .collect();
        Ok(Self { client, endpoints })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn try_endpoint(&self, url: &str, body: &Value) -> Result<Value, String> {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {text}", status.as_u16()));
        }
        let data: Value = resp.json().await.map_err(|e| e.to_string())?;
        Ok(data.get("results").cloned().unwrap_or_else(|| json!([])))
    }
}

pub async fn run(search: &RemoteMemorySearch, args: &Value, fallback_user: &str) -> GatewayResult<Value> {
    let args: MemorySearchArgs = SPEC.parse_args(args)?;
    if args.query.trim().is_empty() {
        return Err(GatewayError::validation("query is required for memory_search"));
    }
    let user_id = args
        .user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| fallback_user.to_string());

    let body = json!({
        "query": args.query,
        "userId": user_id,
        "limit": args.limit,
    });

    let mut last_error = String::from("no memory search endpoints configured");
    for url in &search.endpoints {
        match search.try_endpoint(url, &body).await {
            Ok(results) => {
                return Ok(json!({
                    "query": args.query,
                    "user_id": user_id,
                    "limit": args.limit,
                    "results": results,
                }))
            }
            Err(detail) => {
                tracing::debug!(url = %url, error = %detail, "memory search candidate failed");
                last_error = detail;
            }
        }
    }

    tracing::warn!(error = %last_error, "all memory search endpoints failed");
    Ok(json!({
        "error": "Failed to query memory search endpoint",
        "details": last_error,
        "query": args.query,
        "user_id": user_id,
        "limit": args.limit,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_base_and_path() {
        let config = MemorySearchConfig {
            base_urls: vec!["http://a:3000/".into(), "http://b:3002".into()],
            path: "/api/memory/search".into(),
            timeout_secs: 1,
        };
        let search = RemoteMemorySearch::new(&config).unwrap();
        assert_eq!(
            search.endpoints(),
            &[
                "http://a:3000/api/memory/search".to_string(),
                "http://b:3002/api/memory/search".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn no_endpoints_reports_error_payload() {
        let config = MemorySearchConfig {
            base_urls: vec![],
            path: "/api/memory/search".into(),
            timeout_secs: 1,
        };
        let search = RemoteMemorySearch::new(&config).unwrap();
        let payload = run(&search, &json!({"query": "coffee"}), "default")
            .await
            .unwrap();
        assert_eq!(payload["error"], "Failed to query memory search endpoint");
        assert_eq!(payload["user_id"], "default");
    }

    #[tokio::test]
    async fn blank_query_is_a_validation_error() {
        let search = RemoteMemorySearch::new(&MemorySearchConfig::default()).unwrap();
        let err = run(&search, &json!({"query": "  "}), "default").await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }
}
