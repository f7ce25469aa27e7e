pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use tokio::sync::mpsc;

use store::{PositionRecord, PositionStore};

#[derive(Debug, Clone)]
pub struct OpenPosition {
    pub mint: Pubkey,
    pub amount_raw: u64,
    pub sol_spent: u64,
    pub buy_signature: Signature,
    pub opened_at_ms: i64,
}

enum StoreOp {
    Record(PositionRecord),
    Update { follower: Pubkey, mint: Pubkey, amount_raw: u64, sol_received: u64 },
}

/// In-memory, write-through map of follower → token → open position.
///
/// Invariant: at most one open position per (follower, mint) with non-zero
/// amount. Writes are serialized per follower by the per-follower shard lock;
/// reads are snapshots. Persistence goes through an unbounded channel drained
/// by a background task so the hot path never waits on the store.
pub struct PositionLedger {
    shards: DashMap<Pubkey, Arc<Mutex<HashMap<Pubkey, OpenPosition>>>>,
    store_tx: mpsc::UnboundedSender<StoreOp>,
}

impl PositionLedger {
    pub fn new(store: Arc<dyn PositionStore>) -> Arc<Self> {
        let (store_tx, mut store_rx) = mpsc::unbounded_channel::<StoreOp>();
        tokio::spawn(async move {
            while let Some(op) = store_rx.recv().await {
                let result = match &op {
                    StoreOp::Record(record) => store.record_position(record).await,
                    StoreOp::Update { follower, mint, amount_raw, sol_received } => {
                        store.update_position(follower, mint, *amount_raw, *sol_received).await
                    }
                };
                if let Err(e) = result {
                    tracing::error!(error = %e, "position store write failed");
                }
            }
        });
        Arc::new(Self { shards: DashMap::new(), store_tx })
    }

    /// Replays the durable store into memory. Called once at startup before
    /// the stream starts.
    pub async fn load(&self, store: &dyn PositionStore) -> anyhow::Result<usize> {
        let records = store.load_positions().await?;
        let count = records.len();
        for record in records {
            let shard = self.shard(&record.follower);
            let mut positions = shard.lock();
            positions.insert(
                record.mint,
                OpenPosition {
                    mint: record.mint,
                    amount_raw: record.amount_raw,
                    sol_spent: record.sol_spent,
                    buy_signature: record
                        .buy_signature
                        .parse()
                        .unwrap_or_else(|_| Signature::default()),
                    opened_at_ms: record.opened_at_ms,
                },
            );
        }
        Ok(count)
    }

    fn shard(&self, follower: &Pubkey) -> Arc<Mutex<HashMap<Pubkey, OpenPosition>>> {
        self.shards.entry(*follower).or_default().clone()
    }

    pub fn has_open(&self, follower: &Pubkey, mint: &Pubkey) -> bool {
        self.get(follower, mint).is_some_and(|p| p.amount_raw > 0)
    }

    pub fn get(&self, follower: &Pubkey, mint: &Pubkey) -> Option<OpenPosition> {
        let shard = self.shards.get(follower)?;
        let positions = shard.lock();
        positions.get(mint).cloned()
    }

    /// Records a confirmed buy. The amount is the actual on-chain token
    /// delta, not the planned amount. A second buy into the same mint folds
    /// into the existing position so the one-position invariant holds.
    pub fn record_buy(
        &self,
        follower: &Pubkey,
        mint: &Pubkey,
        amount_raw: u64,
        sol_spent: u64,
        buy_signature: Signature,
    ) {
        if amount_raw == 0 {
            return;
        }
        let shard = self.shard(follower);
        let record = {
            let mut positions = shard.lock();
            let position = positions.entry(*mint).or_insert_with(|| OpenPosition {
                mint: *mint,
                amount_raw: 0,
                sol_spent: 0,
                buy_signature,
                opened_at_ms: chrono::Utc::now().timestamp_millis(),
            });
            position.amount_raw += amount_raw;
            position.sol_spent += sol_spent;
            PositionRecord {
                follower: *follower,
                mint: *mint,
                amount_raw: position.amount_raw,
                sol_spent: position.sol_spent,
                buy_signature: position.buy_signature.to_string(),
                opened_at_ms: position.opened_at_ms,
            }
        };
        let _ = self.store_tx.send(StoreOp::Record(record));
    }

    /// Applies a confirmed sell. The position is destroyed when the held
    /// amount reaches zero.
    pub fn apply_sell(
        &self,
        follower: &Pubkey,
        mint: &Pubkey,
        amount_sold: u64,
        sol_received: u64,
    ) {
        let shard = self.shard(follower);
        let remaining = {
            let mut positions = shard.lock();
            let Some(position) = positions.get_mut(mint) else { return };
            position.amount_raw = position.amount_raw.saturating_sub(amount_sold);
            let remaining = position.amount_raw;
            if remaining == 0 {
                positions.remove(mint);
            }
            remaining
        };
        let _ = self.store_tx.send(StoreOp::Update {
            follower: *follower,
            mint: *mint,
            amount_raw: remaining,
            sol_received,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemoryStore;

    fn ledger() -> Arc<PositionLedger> {
        PositionLedger::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn one_open_position_per_follower_and_mint() {
        let ledger = ledger();
        let follower = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let sig = Signature::from([1u8; 64]);
        ledger.record_buy(&follower, &mint, 100, 10, sig);
        ledger.record_buy(&follower, &mint, 50, 5, sig);
        let position = ledger.get(&follower, &mint).unwrap();
        assert_eq!(position.amount_raw, 150);
        assert_eq!(position.sol_spent, 15);
        assert!(ledger.has_open(&follower, &mint));
    }

    #[tokio::test]
    async fn sell_to_zero_destroys_position() {
        let ledger = ledger();
        let follower = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        ledger.record_buy(&follower, &mint, 100, 10, Signature::from([2u8; 64]));
        ledger.apply_sell(&follower, &mint, 40, 3);
        assert_eq!(ledger.get(&follower, &mint).unwrap().amount_raw, 60);
        ledger.apply_sell(&follower, &mint, 60, 5);
        assert!(ledger.get(&follower, &mint).is_none());
        assert!(!ledger.has_open(&follower, &mint));
    }

    #[tokio::test]
    async fn sell_without_position_is_a_no_op() {
        let ledger = ledger();
        let follower = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        ledger.apply_sell(&follower, &mint, 40, 3);
        assert!(ledger.get(&follower, &mint).is_none());
    }

    #[tokio::test]
    async fn zero_amount_buy_is_ignored() {
        let ledger = ledger();
        let follower = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        ledger.record_buy(&follower, &mint, 0, 10, Signature::from([3u8; 64]));
        assert!(!ledger.has_open(&follower, &mint));
    }

    #[tokio::test]
    async fn load_replays_store_records() {
        let store = Arc::new(MemoryStore::new());
        let follower = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        store
            .record_position(&PositionRecord {
                follower,
                mint,
                amount_raw: 777,
                sol_spent: 9,
                buy_signature: Signature::from([4u8; 64]).to_string(),
                opened_at_ms: 1,
            })
            .await
            .unwrap();
        let ledger = PositionLedger::new(store.clone());
        let count = ledger.load(store.as_ref()).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(ledger.get(&follower, &mint).unwrap().amount_raw, 777);
    }
}
