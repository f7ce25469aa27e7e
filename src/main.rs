use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use sol_copy_engine::{
    CopyEngine, EngineConfig, EnvSignerProvider, FollowerPolicy, FollowerProfile, Leader,
    MemoryStore,
};

/// Single-box deployment: leaders, follower keys, and policy all come from
/// the environment; positions live in memory. Larger deployments implement
/// the `ControlStore`/`PositionStore`/`SignerProvider` seams instead.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "engine init failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = EngineConfig::from_env()?;
    let signer = Arc::new(EnvSignerProvider::from_env()?);
    let store = Arc::new(build_store_from_env(&signer)?);

    let engine = CopyEngine::new(config, store.clone(), store, signer);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    engine.run(shutdown_rx).await
}

/// `LEADERS` is a comma-separated list of `pubkey` or `pubkey:name` entries;
/// every follower key from `FOLLOWER_KEYS` copies all of them.
fn build_store_from_env(signer: &EnvSignerProvider) -> Result<MemoryStore> {
    let raw = std::env::var("LEADERS").context("missing required env var LEADERS")?;
    let mut leaders = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, name) = match entry.split_once(':') {
            Some((key, name)) => (key, name.to_string()),
            None => (entry, entry.to_string()),
        };
        let pubkey: Pubkey =
            key.parse().with_context(|| format!("LEADERS entry {} is not a pubkey", key))?;
        leaders.push(Leader { pubkey, display_name: name });
    }
    let leader_keys: HashSet<Pubkey> = leaders.iter().map(|l| l.pubkey).collect();

    let buy_lamports = std::env::var("BUY_AMOUNT_LAMPORTS")
        .unwrap_or_else(|_| "10000000".to_string())
        .parse::<u64>()
        .context("BUY_AMOUNT_LAMPORTS must be a u64")?;
    let max_slippage_bps = std::env::var("MAX_SLIPPAGE_BPS")
        .unwrap_or_else(|_| "1000".to_string())
        .parse::<u64>()
        .context("MAX_SLIPPAGE_BPS must be a u64")?;

    let followers = signer
        .wallets()
        .into_iter()
        .map(|wallet| FollowerProfile {
            wallet,
            policy: FollowerPolicy {
                buy_lamports,
                max_slippage_bps,
                platform_allow_list: None,
                close_ata_on_exit: true,
            },
            leaders: leader_keys.clone(),
        })
        .collect();

    let store = MemoryStore::new();
    store.set_leaders(leaders);
    store.set_followers(followers);
    Ok(store)
}
