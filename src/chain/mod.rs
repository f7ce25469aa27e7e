pub mod endpoint_pool;

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::{
    account::Account,
    address_lookup_table::{state::AddressLookupTable, AddressLookupTableAccount},
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use solana_transaction_status::TransactionConfirmationStatus;

use crate::common::EngineConfig;
use crate::constants::trade::{BLOCKHASH_TTL_MS, CONFIRM_TIMEOUT_MS};
use endpoint_pool::EndpointPool;

#[derive(Debug, Clone, Copy)]
pub struct BlockhashSnapshot {
    pub hash: Hash,
    pub last_valid_block_height: u64,
    fetched_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    /// The transaction landed but the runtime rejected it.
    OnChainError(String),
    Timeout,
}

/// Stateful wrapper over the RPC endpoint pool.
///
/// Owns the blockhash cache and the address-lookup-table cache. ALT contents
/// are append-only for the horizons this engine cares about, so the ALT cache
/// is never invalidated within a process. Transient errors are surfaced to
/// the caller with the endpoint URL attached; the client itself never
/// retries.
pub struct ChainClient {
    pool: EndpointPool,
    commitment: CommitmentConfig,
    blockhash: Mutex<Option<BlockhashSnapshot>>,
    alt_cache: DashMap<Pubkey, AddressLookupTableAccount>,
}

impl ChainClient {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            pool: EndpointPool::new(&config.rpc_urls, config.commitment),
            commitment: config.commitment,
            blockhash: Mutex::new(None),
            alt_cache: DashMap::new(),
        }
    }

    pub fn endpoint_pool(&self) -> &EndpointPool {
        &self.pool
    }

    /// Cached blockhash, refreshed when older than the TTL.
    pub async fn latest_blockhash(&self) -> Result<(Hash, u64)> {
        if let Some(snapshot) = *self.blockhash.lock() {
            if snapshot.fetched_at.elapsed() < Duration::from_millis(BLOCKHASH_TTL_MS) {
                return Ok((snapshot.hash, snapshot.last_valid_block_height));
            }
        }
        self.refresh_blockhash().await
    }

    /// Unconditional fetch; the background refresher calls this on a cadence.
    pub async fn refresh_blockhash(&self) -> Result<(Hash, u64)> {
        let (idx, client) = self.pool.next();
        match client.get_latest_blockhash_with_commitment(self.commitment).await {
            Ok((hash, last_valid_block_height)) => {
                self.pool.record_success(idx);
                *self.blockhash.lock() = Some(BlockhashSnapshot {
                    hash,
                    last_valid_block_height,
                    fetched_at: Instant::now(),
                });
                Ok((hash, last_valid_block_height))
            }
            Err(e) => {
                self.pool.record_failure(idx);
                Err(anyhow!(e)).with_context(|| format!("getLatestBlockhash via {}", self.pool.url(idx)))
            }
        }
    }

    /// Last cached blockhash without touching the network. Used to stamp
    /// dedup entries.
    pub fn cached_blockhash(&self) -> Option<Hash> {
        (*self.blockhash.lock()).map(|s| s.hash)
    }

    pub async fn fetch_account(&self, pubkey: &Pubkey) -> Result<Option<Account>> {
        let (idx, client) = self.pool.next();
        match client.get_account_with_commitment(pubkey, self.commitment).await {
            Ok(response) => {
                self.pool.record_success(idx);
                Ok(response.value)
            }
            Err(e) => {
                self.pool.record_failure(idx);
                Err(anyhow!(e)).with_context(|| format!("getAccountInfo via {}", self.pool.url(idx)))
            }
        }
    }

    /// Raw token amount held by a token account, zero when the account does
    /// not exist. Layout: mint(32) owner(32) amount(8, LE).
    pub async fn token_balance(&self, token_account: &Pubkey) -> Result<u64> {
        match self.fetch_account(token_account).await? {
            Some(account) if account.data.len() >= 72 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&account.data[64..72]);
                Ok(u64::from_le_bytes(raw))
            }
            _ => Ok(0),
        }
    }

    /// Address-lookup-table contents, cached permanently.
    pub async fn fetch_alt(&self, table_address: &Pubkey) -> Result<AddressLookupTableAccount> {
        if let Some(cached) = self.alt_cache.get(table_address) {
            return Ok(cached.clone());
        }
        let account = self
            .fetch_account(table_address)
            .await?
            .ok_or_else(|| anyhow!("address lookup table {} not found", table_address))?;
        let table = AddressLookupTable::deserialize(&account.data)
            .with_context(|| format!("deserialize ALT {}", table_address))?;
        let resolved = AddressLookupTableAccount {
            key: *table_address,
            addresses: table.addresses.to_vec(),
        };
        self.alt_cache.insert(*table_address, resolved.clone());
        Ok(resolved)
    }

    /// `sendTransaction` with preflight skipped and sender retries disabled.
    pub async fn submit_raw(&self, transaction: &VersionedTransaction) -> Result<Signature> {
        let (idx, client) = self.pool.next();
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };
        match client.send_transaction_with_config(transaction, config).await {
            Ok(signature) => {
                self.pool.record_success(idx);
                Ok(signature)
            }
            Err(e) => {
                self.pool.record_failure(idx);
                Err(anyhow!(e)).with_context(|| format!("sendTransaction via {}", self.pool.url(idx)))
            }
        }
    }

    /// Polls signature status until confirmed, rejected, or the deadline
    /// elapses. A timeout is a failure from the caller's point of view; the
    /// transaction may still land, and the caller must not re-send.
    pub async fn confirm(&self, signature: &Signature) -> Result<ConfirmOutcome> {
        let deadline = Instant::now() + Duration::from_millis(CONFIRM_TIMEOUT_MS);
        loop {
            if Instant::now() >= deadline {
                return Ok(ConfirmOutcome::Timeout);
            }
            let (idx, client) = self.pool.next();
            match client.get_signature_statuses(&[*signature]).await {
                Ok(response) => {
                    self.pool.record_success(idx);
                    if let Some(Some(status)) = response.value.into_iter().next() {
                        if let Some(err) = status.err {
                            return Ok(ConfirmOutcome::OnChainError(format!("{:?}", err)));
                        }
                        if matches!(
                            status.confirmation_status,
                            Some(TransactionConfirmationStatus::Confirmed)
                                | Some(TransactionConfirmationStatus::Finalized)
                        ) {
                            return Ok(ConfirmOutcome::Confirmed);
                        }
                    }
                }
                Err(e) => {
                    self.pool.record_failure(idx);
                    tracing::debug!(error = %e, "getSignatureStatuses failed, rotating endpoint");
                }
            }
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
    }

    /// High-percentile recent prioritization fee for the target program.
    /// Best effort: returns zero when the endpoint cannot answer, leaving the
    /// policy floor in charge.
    pub async fn prioritization_fee(&self, program: &Pubkey) -> u64 {
        let (idx, client) = self.pool.next();
        match client.get_recent_prioritization_fees(&[*program]).await {
            Ok(fees) => {
                self.pool.record_success(idx);
                let mut values: Vec<u64> =
                    fees.iter().map(|f| f.prioritization_fee).filter(|f| *f > 0).collect();
                if values.is_empty() {
                    return 0;
                }
                values.sort_unstable();
                values[(values.len() - 1) * 4 / 5]
            }
            Err(e) => {
                self.pool.record_failure(idx);
                tracing::debug!(error = %e, "getRecentPrioritizationFees failed");
                0
            }
        }
    }
}
