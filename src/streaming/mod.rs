pub mod normalize;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use solana_sdk::pubkey::Pubkey;
use tokio::sync::{mpsc, watch};
use yellowstone_grpc_client::{ClientTlsConfig, GeyserGrpcClient};
use yellowstone_grpc_proto::prelude::{
    subscribe_update::UpdateOneof, CommitmentLevel, SubscribeRequest,
    SubscribeRequestFilterTransactions, SubscribeRequestPing,
};

use crate::chain::ChainClient;
pub use normalize::{LeaderTxEvent, RawInstruction, TokenBalanceEntry};

/// Owns the upstream gRPC subscription.
///
/// The stream task never blocks on downstream work: every normalized event is
/// handed to the supervisor through a channel and each becomes an independent
/// task there. Leader-set changes close and reopen the subscription, which the
/// upstream contract allows.
pub struct LeaderStream {
    endpoint: String,
    x_token: Option<String>,
    chain: Arc<ChainClient>,
}

impl LeaderStream {
    pub fn new(endpoint: String, x_token: Option<String>, chain: Arc<ChainClient>) -> Self {
        Self { endpoint, x_token, chain }
    }

    fn subscribe_request(leaders: &HashSet<Pubkey>) -> SubscribeRequest {
        let mut transactions = HashMap::new();
        transactions.insert(
            "leaders".to_string(),
            SubscribeRequestFilterTransactions {
                vote: Some(false),
                failed: Some(false),
                signature: None,
                account_include: leaders.iter().map(|k| k.to_string()).collect(),
                account_exclude: vec![],
                account_required: vec![],
            },
        );
        SubscribeRequest {
            transactions,
            commitment: Some(CommitmentLevel::Confirmed as i32),
            ..Default::default()
        }
    }

    /// Consumes the stream until shutdown. Reconnects with linear backoff on
    /// disconnect and re-seeds the subscription from the current leader set.
    pub async fn run(
        &self,
        mut leaders_rx: watch::Receiver<HashSet<Pubkey>>,
        events_tx: mpsc::Sender<Arc<LeaderTxEvent>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut backoff: u64 = 0;
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }
            let leaders = leaders_rx.borrow_and_update().clone();
            if leaders.is_empty() {
                tracing::info!("leader set empty, waiting for refresh");
                tokio::select! {
                    _ = leaders_rx.changed() => continue,
                    _ = shutdown.changed() => return Ok(()),
                }
            }

            match self.consume_once(&leaders, &mut leaders_rx, &events_tx, &mut shutdown).await {
                Ok(StreamExit::Shutdown) => return Ok(()),
                Ok(StreamExit::Resubscribe) => {
                    backoff = 0;
                    tracing::info!("leader set changed, re-subscribing");
                }
                Ok(StreamExit::Disconnected) | Err(_) => {
                    backoff = (backoff + 1).min(10);
                    tracing::warn!(backoff_s = backoff, "stream disconnected, reconnecting");
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(backoff)) => {}
                        _ = shutdown.changed() => return Ok(()),
                    }
                }
            }
        }
    }

    async fn consume_once(
        &self,
        leaders: &HashSet<Pubkey>,
        leaders_rx: &mut watch::Receiver<HashSet<Pubkey>>,
        events_tx: &mpsc::Sender<Arc<LeaderTxEvent>>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<StreamExit> {
        let mut builder = GeyserGrpcClient::build_from_shared(self.endpoint.clone())?
            .tls_config(ClientTlsConfig::new().with_native_roots())?;
        if let Some(token) = &self.x_token {
            builder = builder.x_token(Some(token.clone()))?;
        }
        let mut client = builder.connect().await?;
        let (mut sink, mut stream) =
            client.subscribe_with_request(Some(Self::subscribe_request(leaders))).await?;
        tracing::info!(leaders = leaders.len(), "subscribed to leader transaction stream");

        loop {
            tokio::select! {
                _ = shutdown.changed() => return Ok(StreamExit::Shutdown),
                _ = leaders_rx.changed() => return Ok(StreamExit::Resubscribe),
                update = stream.next() => {
                    let Some(update) = update else { return Ok(StreamExit::Disconnected) };
                    let update = match update {
                        Ok(update) => update,
                        Err(status) => {
                            tracing::warn!(%status, "stream error");
                            return Ok(StreamExit::Disconnected);
                        }
                    };
                    match update.update_oneof {
                        Some(UpdateOneof::Transaction(tx_update)) => {
                            match normalize::normalize(&tx_update, leaders, &self.chain).await {
                                Ok(Some(event)) => {
                                    if events_tx.send(Arc::new(event)).await.is_err() {
                                        return Ok(StreamExit::Shutdown);
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => {
                                    tracing::debug!(error = %e, "dropping malformed stream update");
                                }
                            }
                        }
                        Some(UpdateOneof::Ping(_)) => {
                            let _ = sink
                                .send(SubscribeRequest {
                                    ping: Some(SubscribeRequestPing { id: 1 }),
                                    ..Default::default()
                                })
                                .await;
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

enum StreamExit {
    Shutdown,
    Resubscribe,
    Disconnected,
}
