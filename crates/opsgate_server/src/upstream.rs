//! Reqwest adapter for the upstream advertising/messaging API.

use async_trait::async_trait;
use opsgate_core::Source;
use opsgate_engine::{ConnectorRefresh, UpstreamClient};
use opsgate_error::{OpsgateResult, UpstreamError};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// HTTP client for the upstream API, speaking JSON over reqwest.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUpstream {
    /// Create a client against `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Decode a response, mapping non-success statuses to the
    /// upstream `{status, code, message}` failure shape.
    async fn decode(response: reqwest::Response) -> OpsgateResult<Value> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| UpstreamError::new(status.as_u16(), "bad_body", e.to_string()).into());
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let code = body
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("upstream_failure")
            .to_string();
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("upstream failure"))
            .to_string();
        Err(UpstreamError::new(status.as_u16(), code, message).into())
    }
}

fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let Some(map) = params.as_object() else {
        return Vec::new();
    };
    map.iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    #[instrument(skip(self, params))]
    async fn get(&self, path: &str, params: &Value) -> OpsgateResult<Value> {
        let response = self
            .client
            .get(self.url(path))
            .query(&query_pairs(params))
            .send()
            .await
            .map_err(|e| UpstreamError::new(0, "network", e.to_string()))?;
        Self::decode(response).await
    }

    #[instrument(skip(self, body))]
    async fn post(&self, path: &str, body: &Value) -> OpsgateResult<Value> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| UpstreamError::new(0, "network", e.to_string()))?;
        Self::decode(response).await
    }
}

/// Connector refresh over the upstream client: fetches the items
/// endpoint for the source's connector and reports the item count.
#[derive(Clone)]
pub struct UpstreamRefresher {
    client: Arc<dyn UpstreamClient>,
}

impl UpstreamRefresher {
    /// Wrap an upstream client.
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConnectorRefresh for UpstreamRefresher {
    async fn refresh(&self, source: &Source) -> OpsgateResult<u64> {
        let path = format!("/{}/items", source.connector());
        let data = self.client.get(&path, source.config()).await?;
        let count = data
            .get("count")
            .and_then(Value::as_u64)
            .or_else(|| data.get("items").and_then(Value::as_array).map(|a| a.len() as u64))
            .or_else(|| data.as_array().map(|a| a.len() as u64));
        match count {
            Some(count) => {
                debug!(source_id = %source.id(), count, "Connector refreshed");
                Ok(count)
            }
            None => Err(UpstreamError::new(
                200,
                "bad_shape",
                "upstream items response has neither count nor items",
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_pairs_strip_string_quotes() {
        let pairs = query_pairs(&json!({"account": "a-1", "limit": 25}));
        assert!(pairs.contains(&("account".to_string(), "a-1".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "25".to_string())));
    }

    #[test]
    fn test_url_join() {
        let client = HttpUpstream::new("http://localhost:9000/");
        assert_eq!(client.url("/list_ads"), "http://localhost:9000/list_ads");
    }
}
