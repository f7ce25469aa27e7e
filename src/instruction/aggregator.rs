use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde_json::json;
use solana_sdk::{pubkey::Pubkey, transaction::VersionedTransaction};

use crate::constants::trade::HTTP_TIMEOUT_MS;
use crate::planner::CopyPlan;

/// Fallback for DEX families without a native builder: a single-endpoint
/// swap API that returns one or more prebuilt base64 transactions. The
/// follower signs them locally; the blockhash is replaced at signing time.
pub struct AggregatorClient {
    endpoint: String,
    http: Client,
}

impl AggregatorClient {
    pub fn new(endpoint: String) -> Self {
        let http = Client::builder()
            .pool_idle_timeout(Duration::from_secs(120))
            .pool_max_idle_per_host(64)
            .tcp_nodelay(true)
            .timeout(Duration::from_millis(HTTP_TIMEOUT_MS))
            .connect_timeout(Duration::from_millis(2_000))
            .build()
            .unwrap_or_default();
        Self { endpoint, http }
    }

    pub async fn fetch_swap_transactions(
        &self,
        plan: &CopyPlan,
        user: &Pubkey,
    ) -> Result<Vec<VersionedTransaction>> {
        let classification = &plan.classification;
        let body = json!({
            "inputMint": classification.input_mint.to_string(),
            "outputMint": classification.output_mint.to_string(),
            "amount": plan.amount,
            "userPublicKey": user.to_string(),
            "slippageBps": plan.slippage_bps,
        });
        let response: serde_json::Value = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("aggregator request failed")?
            .error_for_status()
            .context("aggregator returned an error status")?
            .json()
            .await
            .context("aggregator response is not json")?;

        let encoded: Vec<&str> = if let Some(tx) =
            response.get("swapTransaction").and_then(|v| v.as_str())
        {
            vec![tx]
        } else if let Some(list) = response.get("transactions").and_then(|v| v.as_array()) {
            list.iter().filter_map(|v| v.as_str()).collect()
        } else {
            return Err(anyhow!("aggregator response carries no transaction"));
        };

        encoded
            .into_iter()
            .map(|tx| {
                let bytes = STANDARD.decode(tx).context("aggregator transaction base64")?;
                bincode::deserialize::<VersionedTransaction>(&bytes)
                    .context("aggregator transaction deserialize")
            })
            .collect()
    }
}
