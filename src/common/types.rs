use anyhow::Context;
use solana_sdk::commitment_config::CommitmentConfig;

use crate::constants::trade;

pub type SolanaRpcClient = solana_client::nonblocking::rpc_client::RpcClient;
pub type AnyResult<T> = anyhow::Result<T>;

/// Process-level configuration, loaded once from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// JSON-RPC endpoint pool, in round-robin order.
    pub rpc_urls: Vec<String>,
    /// Low-retry endpoint that receives `sendTransaction` with
    /// `skipPreflight=true, maxRetries=0`.
    pub fastlane_url: String,
    pub grpc_url: String,
    pub grpc_token: Option<String>,
    /// Aggregator swap API for DEX families without a native builder.
    pub aggregator_url: Option<String>,
    pub commitment: CommitmentConfig,
    /// Floor for the compute-unit price; the dynamic estimate only raises it.
    pub min_cu_price: u64,
    pub buy_tip_lamports: u64,
    pub sell_tip_lamports: u64,
}

impl EngineConfig {
    pub fn from_env() -> AnyResult<Self> {
        let rpc_urls: Vec<String> = required("RPC_URLS")?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if rpc_urls.is_empty() {
            anyhow::bail!("RPC_URLS must contain at least one endpoint");
        }
        Ok(Self {
            fastlane_url: optional("FASTLANE_URL").unwrap_or_else(|| rpc_urls[0].clone()),
            grpc_url: required("YELLOWSTONE_GRPC_URL")?,
            grpc_token: optional("YELLOWSTONE_GRPC_TOKEN"),
            aggregator_url: optional("AGGREGATOR_URL"),
            commitment: CommitmentConfig::confirmed(),
            min_cu_price: parsed("MIN_CU_PRICE", trade::DEFAULT_CU_PRICE)?,
            buy_tip_lamports: parsed("BUY_TIP_LAMPORTS", trade::DEFAULT_BUY_TIP_LAMPORTS)?,
            sell_tip_lamports: parsed("SELL_TIP_LAMPORTS", trade::DEFAULT_SELL_TIP_LAMPORTS)?,
            rpc_urls,
        })
    }
}

fn required(name: &str) -> AnyResult<String> {
    std::env::var(name).with_context(|| format!("missing required env var {}", name))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed(name: &str, default: u64) -> AnyResult<u64> {
    match std::env::var(name) {
        Ok(v) => v.parse::<u64>().with_context(|| format!("{} must be a u64", name)),
        Err(_) => Ok(default),
    }
}
