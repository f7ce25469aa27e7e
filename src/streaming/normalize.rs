use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Context, Result};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use yellowstone_grpc_proto::prelude::{
    SubscribeUpdateTransaction, TokenBalance, Transaction as ProtoTransaction,
};

use crate::chain::ChainClient;
use crate::constants::{PRE_FILTER_LAMPORTS, WSOL_MINT};

/// A compiled instruction with indices into the normalized account list.
#[derive(Debug, Clone)]
pub struct RawInstruction {
    pub program_id_index: usize,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TokenBalanceEntry {
    pub account_index: usize,
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

/// A leader transaction after normalization: account keys fully resolved
/// (ALT-expanded), instructions flattened, balances indexed by account
/// position. Built once in ingest and moved through the pipeline; dispatch
/// tasks share it read-only behind an `Arc`.
#[derive(Debug, Clone)]
pub struct LeaderTxEvent {
    pub leader: Pubkey,
    pub signature: Signature,
    pub slot: u64,
    pub received_at_ms: i64,
    pub account_keys: Vec<Pubkey>,
    pub instructions: Vec<RawInstruction>,
    /// Inner instructions in execution order (outer index, then position).
    pub inner_instructions: Vec<RawInstruction>,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub pre_token_balances: Vec<TokenBalanceEntry>,
    pub post_token_balances: Vec<TokenBalanceEntry>,
    pub logs: Vec<String>,
}

impl LeaderTxEvent {
    pub fn leader_index(&self) -> Option<usize> {
        self.account_keys.iter().position(|k| *k == self.leader)
    }

    /// Native-SOL delta at the leader's account position (post minus pre).
    pub fn sol_delta(&self) -> i128 {
        match self.leader_index() {
            Some(idx) if idx < self.pre_balances.len() && idx < self.post_balances.len() => {
                self.post_balances[idx] as i128 - self.pre_balances[idx] as i128
            }
            _ => 0,
        }
    }

    /// Per-mint token deltas for accounts owned by the leader. Wrapped SOL is
    /// folded into the SOL side by the classifier, not here.
    pub fn token_deltas(&self) -> HashMap<Pubkey, i128> {
        let mut deltas: HashMap<Pubkey, i128> = HashMap::new();
        for entry in &self.post_token_balances {
            if entry.owner == self.leader {
                *deltas.entry(entry.mint).or_default() += entry.amount as i128;
            }
        }
        for entry in &self.pre_token_balances {
            if entry.owner == self.leader {
                *deltas.entry(entry.mint).or_default() -= entry.amount as i128;
            }
        }
        deltas.retain(|_, d| *d != 0);
        deltas
    }

    pub fn program_id(&self, ix: &RawInstruction) -> Option<Pubkey> {
        self.account_keys.get(ix.program_id_index).copied()
    }

    /// Resolves an instruction's account indices against the normalized key
    /// list. Fails when the stream delivered an index past the expanded list.
    pub fn resolve_accounts(&self, ix: &RawInstruction) -> Result<Vec<Pubkey>> {
        ix.accounts
            .iter()
            .map(|i| {
                self.account_keys
                    .get(*i as usize)
                    .copied()
                    .ok_or_else(|| anyhow!("account index {} outside normalized key list", i))
            })
            .collect()
    }

    pub fn has_swap_log(&self) -> bool {
        self.logs.iter().any(|line| {
            line.contains("Instruction: Buy")
                || line.contains("Instruction: Sell")
                || line.contains("Instruction: Swap")
        })
    }

    /// True when the leader's balance sheet shows movement of the wrapped-SOL
    /// side, counting both native lamports and WSOL token accounts.
    pub fn sol_moved(&self) -> i128 {
        let wsol: i128 = self
            .token_deltas()
            .get(&WSOL_MINT)
            .copied()
            .unwrap_or(0);
        self.sol_delta() + wsol
    }
}

fn pubkey_from_bytes(bytes: &[u8]) -> Result<Pubkey> {
    Pubkey::try_from(bytes).map_err(|_| anyhow!("malformed 32-byte key in stream update"))
}

fn pubkey_from_str(s: &str) -> Option<Pubkey> {
    s.parse().ok()
}

fn convert_token_balances(balances: &[TokenBalance]) -> Vec<TokenBalanceEntry> {
    balances
        .iter()
        .filter_map(|b| {
            let amount = b.ui_token_amount.as_ref()?.amount.parse::<u64>().ok()?;
            Some(TokenBalanceEntry {
                account_index: b.account_index as usize,
                mint: pubkey_from_str(&b.mint)?,
                owner: pubkey_from_str(&b.owner)?,
                amount,
            })
        })
        .collect()
}

/// Normalizes one stream update into a `LeaderTxEvent`.
///
/// Returns `Ok(None)` for updates this engine must never copy: failed leader
/// transactions, transactions touching none of the monitored leaders, and
/// transactions with no swap signal at all. The swap pre-filter is
/// conservative: any positive signal (a swap log line or a visible SOL move)
/// passes.
pub async fn normalize(
    update: &SubscribeUpdateTransaction,
    leaders: &HashSet<Pubkey>,
    chain: &ChainClient,
) -> Result<Option<LeaderTxEvent>> {
    let info = update
        .transaction
        .as_ref()
        .ok_or_else(|| anyhow!("stream update without transaction info"))?;
    let meta = info.meta.as_ref().ok_or_else(|| anyhow!("stream update without meta"))?;

    // Leader transactions that failed on-chain are never copied.
    if meta.err.is_some() {
        return Ok(None);
    }

    // The stream format nests `transaction` arbitrarily; walk it defensively.
    let transaction: &ProtoTransaction =
        info.transaction.as_ref().ok_or_else(|| anyhow!("transaction info without payload"))?;
    let message =
        transaction.message.as_ref().ok_or_else(|| anyhow!("transaction without message"))?;

    let signature = Signature::try_from(info.signature.as_slice())
        .map_err(|_| anyhow!("malformed signature in stream update"))?;

    // Static keys first, then the ALT-expanded tail: all loaded writable
    // addresses, then all loaded readonly addresses. When the stream did not
    // carry the loaded addresses, resolve the tables through the chain
    // client's permanent ALT cache.
    let mut account_keys: Vec<Pubkey> = message
        .account_keys
        .iter()
        .map(|k| pubkey_from_bytes(k))
        .collect::<Result<_>>()?;

    if !meta.loaded_writable_addresses.is_empty() || !meta.loaded_readonly_addresses.is_empty() {
        for key in meta.loaded_writable_addresses.iter().chain(&meta.loaded_readonly_addresses) {
            account_keys.push(pubkey_from_bytes(key)?);
        }
    } else if !message.address_table_lookups.is_empty() {
        let mut tables = Vec::with_capacity(message.address_table_lookups.len());
        for lookup in &message.address_table_lookups {
            let table_address = pubkey_from_bytes(&lookup.account_key)?;
            tables.push(chain.fetch_alt(&table_address).await.with_context(|| {
                format!("expanding lookup table for {}", signature)
            })?);
        }
        for (lookup, table) in message.address_table_lookups.iter().zip(&tables) {
            for idx in &lookup.writable_indexes {
                let address = table.addresses.get(*idx as usize).ok_or_else(|| {
                    anyhow!("writable index {} outside ALT {}", idx, table.key)
                })?;
                account_keys.push(*address);
            }
        }
        for (lookup, table) in message.address_table_lookups.iter().zip(&tables) {
            for idx in &lookup.readonly_indexes {
                let address = table.addresses.get(*idx as usize).ok_or_else(|| {
                    anyhow!("readonly index {} outside ALT {}", idx, table.key)
                })?;
                account_keys.push(*address);
            }
        }
    }

    let Some(leader) = account_keys.iter().find(|k| leaders.contains(k)).copied() else {
        return Ok(None);
    };

    let instructions: Vec<RawInstruction> = message
        .instructions
        .iter()
        .map(|ix| RawInstruction {
            program_id_index: ix.program_id_index as usize,
            accounts: ix.accounts.clone(),
            data: ix.data.clone(),
        })
        .collect();

    let mut inner_instructions = Vec::new();
    let mut inner_sets: Vec<_> = meta.inner_instructions.iter().collect();
    inner_sets.sort_by_key(|set| set.index);
    for set in inner_sets {
        for ix in &set.instructions {
            inner_instructions.push(RawInstruction {
                program_id_index: ix.program_id_index as usize,
                accounts: ix.accounts.clone(),
                data: ix.data.clone(),
            });
        }
    }

    let event = LeaderTxEvent {
        leader,
        signature,
        slot: update.slot,
        received_at_ms: chrono::Utc::now().timestamp_millis(),
        account_keys,
        instructions,
        inner_instructions,
        pre_balances: meta.pre_balances.clone(),
        post_balances: meta.post_balances.clone(),
        pre_token_balances: convert_token_balances(&meta.pre_token_balances),
        post_token_balances: convert_token_balances(&meta.post_token_balances),
        logs: meta.log_messages.clone(),
    };

    // Conservative pre-filter: only drop when there is neither a swap log
    // line nor a visible SOL move.
    if !event.has_swap_log() && event.sol_delta().unsigned_abs() < PRE_FILTER_LAMPORTS as u128 {
        return Ok(None);
    }

    Ok(Some(event))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Bare event for classifier/planner tests; fields are overridden per
    /// scenario.
    pub fn event(leader: Pubkey, keys: Vec<Pubkey>) -> LeaderTxEvent {
        LeaderTxEvent {
            leader,
            signature: Signature::from([7u8; 64]),
            slot: 1,
            received_at_ms: 0,
            account_keys: keys,
            instructions: vec![],
            inner_instructions: vec![],
            pre_balances: vec![],
            post_balances: vec![],
            pre_token_balances: vec![],
            post_token_balances: vec![],
            logs: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::commitment_config::CommitmentConfig;
    use yellowstone_grpc_proto::prelude::{
        Message, SubscribeUpdateTransactionInfo, TransactionError, TransactionStatusMeta,
    };

    use crate::common::EngineConfig;

    fn offline_chain() -> ChainClient {
        ChainClient::new(&EngineConfig {
            rpc_urls: vec!["http://localhost:8899".to_string()],
            fastlane_url: "http://localhost:8899".to_string(),
            grpc_url: "http://localhost:10000".to_string(),
            grpc_token: None,
            aggregator_url: None,
            commitment: CommitmentConfig::confirmed(),
            min_cu_price: 1,
            buy_tip_lamports: 0,
            sell_tip_lamports: 0,
        })
    }

    fn update_for(
        leader: Pubkey,
        err: Option<TransactionError>,
        logs: Vec<String>,
        pre_balances: Vec<u64>,
        post_balances: Vec<u64>,
    ) -> SubscribeUpdateTransaction {
        SubscribeUpdateTransaction {
            slot: 5,
            transaction: Some(SubscribeUpdateTransactionInfo {
                signature: vec![1u8; 64],
                is_vote: false,
                transaction: Some(ProtoTransaction {
                    signatures: vec![vec![1u8; 64]],
                    message: Some(Message {
                        account_keys: vec![leader.to_bytes().to_vec()],
                        ..Default::default()
                    }),
                }),
                meta: Some(TransactionStatusMeta {
                    err,
                    log_messages: logs,
                    pre_balances,
                    post_balances,
                    ..Default::default()
                }),
                index: 0,
            }),
        }
    }

    #[tokio::test]
    async fn failed_leader_transaction_is_never_classified() {
        let leader = Pubkey::new_unique();
        let leaders: HashSet<Pubkey> = [leader].into_iter().collect();
        let update = update_for(
            leader,
            Some(TransactionError { err: vec![1] }),
            vec!["Program log: Instruction: Buy".to_string()],
            vec![1_000_000_000],
            vec![900_000_000],
        );
        let normalized = normalize(&update, &leaders, &offline_chain()).await.unwrap();
        assert!(normalized.is_none());
    }

    #[tokio::test]
    async fn update_without_swap_signal_is_dropped() {
        let leader = Pubkey::new_unique();
        let leaders: HashSet<Pubkey> = [leader].into_iter().collect();
        // No swap log line and a sub-threshold SOL move.
        let update = update_for(
            leader,
            None,
            vec!["Program log: Instruction: Transfer".to_string()],
            vec![1_000_000_000],
            vec![999_950_000],
        );
        let normalized = normalize(&update, &leaders, &offline_chain()).await.unwrap();
        assert!(normalized.is_none());
    }

    #[tokio::test]
    async fn swap_shaped_update_is_normalized() {
        let leader = Pubkey::new_unique();
        let leaders: HashSet<Pubkey> = [leader].into_iter().collect();
        let update = update_for(
            leader,
            None,
            vec!["Program log: Instruction: Buy".to_string()],
            vec![1_000_000_000],
            vec![900_000_000],
        );
        let event = normalize(&update, &leaders, &offline_chain()).await.unwrap().unwrap();
        assert_eq!(event.leader, leader);
        assert_eq!(event.slot, 5);
        assert_eq!(event.sol_delta(), -100_000_000);
        assert!(event.has_swap_log());
    }

    #[tokio::test]
    async fn non_leader_update_is_ignored() {
        let leader = Pubkey::new_unique();
        let stranger = Pubkey::new_unique();
        let leaders: HashSet<Pubkey> = [leader].into_iter().collect();
        let update = update_for(
            stranger,
            None,
            vec!["Program log: Instruction: Buy".to_string()],
            vec![1_000_000_000],
            vec![900_000_000],
        );
        let normalized = normalize(&update, &leaders, &offline_chain()).await.unwrap();
        assert!(normalized.is_none());
    }

    #[test]
    fn sol_delta_reads_leader_position() {
        let leader = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        let mut event = test_support::event(leader, vec![other, leader]);
        event.pre_balances = vec![50, 1_000_000_000];
        event.post_balances = vec![50, 900_000_000];
        assert_eq!(event.sol_delta(), -100_000_000);
    }

    #[test]
    fn token_deltas_only_count_leader_owned_accounts() {
        let leader = Pubkey::new_unique();
        let stranger = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let mut event = test_support::event(leader, vec![leader]);
        event.pre_token_balances = vec![TokenBalanceEntry {
            account_index: 2,
            mint,
            owner: leader,
            amount: 10,
        }];
        event.post_token_balances = vec![
            TokenBalanceEntry { account_index: 2, mint, owner: leader, amount: 60 },
            TokenBalanceEntry { account_index: 3, mint, owner: stranger, amount: 999 },
        ];
        let deltas = event.token_deltas();
        assert_eq!(deltas.get(&mint), Some(&50));
        assert_eq!(deltas.len(), 1);
    }

    #[test]
    fn swap_log_detection() {
        let leader = Pubkey::new_unique();
        let mut event = test_support::event(leader, vec![leader]);
        event.logs = vec!["Program log: Instruction: Buy".to_string()];
        assert!(event.has_swap_log());
        event.logs = vec!["Program log: Instruction: Transfer".to_string()];
        assert!(!event.has_swap_log());
    }
}
