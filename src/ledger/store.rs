use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;

use crate::classifier::registry::DexFamily;
use crate::common::AnyResult;

#[derive(Debug, Clone)]
pub struct Leader {
    pub pubkey: Pubkey,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct FollowerPolicy {
    /// Fixed SOL spent per copied buy, in lamports. Must be positive.
    pub buy_lamports: u64,
    pub max_slippage_bps: u64,
    /// When set, only these DEX families are copied for this follower.
    pub platform_allow_list: Option<HashSet<DexFamily>>,
    /// Reclaim the token ATA's rent after a position is fully exited.
    pub close_ata_on_exit: bool,
}

#[derive(Debug, Clone)]
pub struct FollowerProfile {
    pub wallet: Pubkey,
    pub policy: FollowerPolicy,
    /// Leaders this follower copies. A leader appears at most once.
    pub leaders: HashSet<Pubkey>,
}

/// Read side of the external key-value collaborator: who to watch and on
/// whose behalf.
#[async_trait]
pub trait ControlStore: Send + Sync {
    async fn leader_set(&self) -> AnyResult<Vec<Leader>>;
    async fn follower_profiles(&self) -> AnyResult<Vec<FollowerProfile>>;
}

#[derive(Debug, Clone)]
pub struct PositionRecord {
    pub follower: Pubkey,
    pub mint: Pubkey,
    pub amount_raw: u64,
    pub sol_spent: u64,
    pub buy_signature: String,
    pub opened_at_ms: i64,
}

/// Write-behind collaborator for the position ledger. The in-memory view is
/// authoritative for the hot path; this store only has to survive restarts.
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn record_position(&self, record: &PositionRecord) -> AnyResult<()>;
    async fn update_position(
        &self,
        follower: &Pubkey,
        mint: &Pubkey,
        amount_raw: u64,
        sol_received: u64,
    ) -> AnyResult<()>;
    async fn load_positions(&self) -> AnyResult<Vec<PositionRecord>>;
}

/// In-process store used by tests and by single-box deployments that accept
/// losing position state on restart.
#[derive(Default)]
pub struct MemoryStore {
    leaders: Mutex<Vec<Leader>>,
    followers: Mutex<Vec<FollowerProfile>>,
    positions: Mutex<HashMap<(Pubkey, Pubkey), PositionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_leaders(&self, leaders: Vec<Leader>) {
        *self.leaders.lock() = leaders;
    }

    pub fn set_followers(&self, followers: Vec<FollowerProfile>) {
        *self.followers.lock() = followers;
    }
}

#[async_trait]
impl ControlStore for MemoryStore {
    async fn leader_set(&self) -> AnyResult<Vec<Leader>> {
        Ok(self.leaders.lock().clone())
    }

    async fn follower_profiles(&self) -> AnyResult<Vec<FollowerProfile>> {
        Ok(self.followers.lock().clone())
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn record_position(&self, record: &PositionRecord) -> AnyResult<()> {
        self.positions.lock().insert((record.follower, record.mint), record.clone());
        Ok(())
    }

    async fn update_position(
        &self,
        follower: &Pubkey,
        mint: &Pubkey,
        amount_raw: u64,
        _sol_received: u64,
    ) -> AnyResult<()> {
        let mut positions = self.positions.lock();
        if amount_raw == 0 {
            positions.remove(&(*follower, *mint));
        } else if let Some(record) = positions.get_mut(&(*follower, *mint)) {
            record.amount_raw = amount_raw;
        }
        Ok(())
    }

    async fn load_positions(&self) -> AnyResult<Vec<PositionRecord>> {
        Ok(self.positions.lock().values().cloned().collect())
    }
}
