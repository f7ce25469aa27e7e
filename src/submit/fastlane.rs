use std::time::Duration;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde_json::json;
use solana_sdk::{signature::Signature, transaction::VersionedTransaction};

/// Low-retry sender: `sendTransaction` over plain JSON-RPC with preflight
/// skipped and forwarder retries disabled. The connection pool is tuned for
/// repeated small posts on the hot path.
pub struct FastlaneClient {
    endpoint: String,
    http: Client,
}

impl FastlaneClient {
    pub fn new(endpoint: String) -> Self {
        let http = Client::builder()
            .pool_idle_timeout(Duration::from_secs(120))
            .pool_max_idle_per_host(256)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .tcp_nodelay(true)
            .http2_keep_alive_interval(Duration::from_secs(10))
            .http2_keep_alive_timeout(Duration::from_secs(5))
            .http2_adaptive_window(true)
            .timeout(Duration::from_millis(3_000))
            .connect_timeout(Duration::from_millis(2_000))
            .build()
            .unwrap_or_default();
        Self { endpoint, http }
    }

    pub async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature> {
        let signature = *transaction
            .signatures
            .first()
            .ok_or_else(|| anyhow!("transaction has no signatures"))?;
        let content = STANDARD.encode(bincode::serialize(transaction)?);
        let request_body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendTransaction",
            "params": [
                content,
                {
                    "encoding": "base64",
                    "skipPreflight": true,
                    "maxRetries": 0
                }
            ]
        });

        let response: serde_json::Value = self
            .http
            .post(&self.endpoint)
            .json(&request_body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.get("error") {
            let message =
                error.get("message").and_then(|m| m.as_str()).unwrap_or("unknown rpc error");
            return Err(anyhow!("fastlane rejected transaction: {}", message));
        }
        if response.get("result").is_none() {
            return Err(anyhow!("fastlane returned neither result nor error"));
        }
        Ok(signature)
    }
}
