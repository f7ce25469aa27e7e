pub mod registry;
pub mod slippage;
pub mod verdict_cache;

use std::sync::Arc;

use once_cell::sync::Lazy;
use solana_sdk::{pubkey::Pubkey, signature::Signature};

use crate::constants::{SYSTEM_PROGRAM, TOKEN_PROGRAM, WSOL_MINT};
use crate::instruction::utils::pumpfun;
use crate::streaming::normalize::{LeaderTxEvent, RawInstruction};
use registry::{dex_by_program, router_by_program, DexFamily};
use verdict_cache::VerdictCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TradeDirection::Buy => "buy",
            TradeDirection::Sell => "sell",
        })
    }
}

/// The leader's real DEX instruction with its account indices resolved.
/// Builders mirror this account graph when rebuilding the swap for a
/// follower.
#[derive(Debug, Clone, PartialEq)]
pub struct DexCall {
    pub program: Pubkey,
    pub accounts: Vec<Pubkey>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Router attribution; `None` means the leader called the DEX directly.
    pub router: Option<&'static str>,
    pub dex: DexFamily,
    pub direction: TradeDirection,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// What the leader put in, raw units of the input mint.
    pub leader_input_amount: u64,
    pub leader_slippage_bps: Option<u64>,
    pub leader_signature: Signature,
    pub dex_call: Option<DexCall>,
}

/// Structured reasons a leader transaction is definitively not copyable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotCopyable {
    #[error("no recognized dex program in logs, accounts, or inner instructions")]
    NoDex,
    #[error("leader key missing from normalized account list")]
    LeaderKeyMissing,
    #[error("pumpfun direct call without the fee-recipient account")]
    MissingFeeRecipient,
    #[error("raydium call without the system program")]
    MissingSystemProgram,
    #[error("meteora call without the spl token program")]
    MissingTokenProgram,
    #[error("no swap-shaped log line or recognized instruction data")]
    NoInstructionPattern,
    #[error("no economic signature on the leader's balance sheet")]
    NoEconomicSignal,
    #[error("swap is not SOL-denominated")]
    NotSolDenominated,
}

pub type Verdict = Result<Classification, NotCopyable>;

static DEX_LOG_NEEDLES: Lazy<Vec<(DexFamily, String)>> = Lazy::new(|| {
    DexFamily::NATIVE.iter().map(|f| (*f, f.program_id().to_string())).collect()
});

/// The bouncer. Four layers, all of which must pass; the economic signature
/// (layer 4) is authoritative for direction and mints.
pub struct Classifier {
    cache: VerdictCache<Verdict>,
}

impl Classifier {
    pub fn new() -> Self {
        Self { cache: VerdictCache::new() }
    }

    pub fn classify(&self, event: &LeaderTxEvent) -> Arc<Verdict> {
        if let Some(hit) = self.cache.get(&event.signature) {
            return hit;
        }
        let verdict = Arc::new(classify_event(event));
        self.cache.insert(event.signature, verdict.clone());
        verdict
    }

    pub fn sweep_cache(&self) {
        self.cache.sweep();
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_event(event: &LeaderTxEvent) -> Verdict {
    // Layer 1: router vs DEX attribution.
    let router = event
        .instructions
        .iter()
        .find_map(|ix| event.program_id(ix).and_then(|p| router_by_program(&p)));
    let dex = attribute_dex(event).ok_or(NotCopyable::NoDex)?;
    let dex_call = find_dex_call(event, dex);

    // Layer 2: account structure.
    if event.leader_index().is_none() {
        return Err(NotCopyable::LeaderKeyMissing);
    }
    match dex {
        DexFamily::PumpFun if router.is_none() => {
            if !event.account_keys.contains(&pumpfun::accounts::FEE_RECIPIENT) {
                return Err(NotCopyable::MissingFeeRecipient);
            }
        }
        DexFamily::RaydiumV4
        | DexFamily::RaydiumCpmm
        | DexFamily::RaydiumClmm
        | DexFamily::RaydiumLaunchpad => {
            if !event.account_keys.contains(&SYSTEM_PROGRAM) {
                return Err(NotCopyable::MissingSystemProgram);
            }
        }
        DexFamily::MeteoraDlmm | DexFamily::MeteoraDbc | DexFamily::MeteoraDammV2 => {
            if !event.account_keys.contains(&TOKEN_PROGRAM) {
                return Err(NotCopyable::MissingTokenProgram);
            }
        }
        _ => {}
    }

    // Layer 3: instruction-data pattern. Log evidence first; otherwise the
    // DEX payload must carry a recognized discriminator.
    let has_pattern = log_direction(&event.logs).is_some()
        || dex_call.as_ref().is_some_and(|c| slippage::recognized(dex, &c.data));
    if !has_pattern {
        return Err(NotCopyable::NoInstructionPattern);
    }

    // Layer 4: economic signature, authoritative for direction and mints.
    let mut token_deltas = event.token_deltas();
    let wsol_delta = token_deltas.remove(&WSOL_MINT).unwrap_or(0);
    let sol_moved = event.sol_delta() + wsol_delta;

    if sol_moved == 0 && token_deltas.is_empty() {
        return Err(NotCopyable::NoEconomicSignal);
    }

    let gained = token_deltas.iter().filter(|(_, d)| **d > 0).max_by_key(|(_, d)| **d);
    let lost = token_deltas.iter().filter(|(_, d)| **d < 0).min_by_key(|(_, d)| **d);

    let (direction, input_mint, output_mint, leader_input_amount, out_delta) =
        if sol_moved < 0 {
            let Some((mint, delta)) = gained else {
                return Err(if lost.is_some() {
                    NotCopyable::NotSolDenominated
                } else {
                    NotCopyable::NoEconomicSignal
                });
            };
            (TradeDirection::Buy, WSOL_MINT, *mint, sol_moved.unsigned_abs() as u64, *delta)
        } else if sol_moved > 0 {
            let Some((mint, delta)) = lost else {
                return Err(if gained.is_some() {
                    NotCopyable::NotSolDenominated
                } else {
                    NotCopyable::NoEconomicSignal
                });
            };
            (TradeDirection::Sell, *mint, WSOL_MINT, delta.unsigned_abs() as u64, *delta)
        } else {
            // Tokens moved but SOL did not: token-for-token, not copyable.
            return Err(NotCopyable::NotSolDenominated);
        };

    let leader_slippage_bps = dex_call
        .as_ref()
        .and_then(|call| slippage::decode_args(dex, &call.data))
        .and_then(|args| slippage::derive_bps(args, direction, sol_moved, out_delta));

    Ok(Classification {
        router,
        dex,
        direction,
        input_mint,
        output_mint,
        leader_input_amount,
        leader_slippage_bps,
        leader_signature: event.signature,
        dex_call,
    })
}

/// DEX attribution: log messages first (highest signal, earliest line wins),
/// then the account list in index order, then inner instructions.
fn attribute_dex(event: &LeaderTxEvent) -> Option<DexFamily> {
    for line in &event.logs {
        for (family, needle) in DEX_LOG_NEEDLES.iter() {
            if line.contains(needle.as_str()) {
                return Some(*family);
            }
        }
    }
    if let Some(family) = event.account_keys.iter().find_map(dex_by_program) {
        return Some(family);
    }
    event
        .inner_instructions
        .iter()
        .find_map(|ix| event.program_id(ix).and_then(|p| dex_by_program(&p)))
}

/// The real DEX instruction: inner instructions first (router-wrapped calls
/// live there), then top-level.
fn find_dex_call(event: &LeaderTxEvent, dex: DexFamily) -> Option<DexCall> {
    let program = dex.program_id();
    let matches = |ix: &&RawInstruction| {
        !ix.data.is_empty() && event.program_id(ix) == Some(program)
    };
    let ix = event
        .inner_instructions
        .iter()
        .find(matches)
        .or_else(|| event.instructions.iter().find(matches))?;
    let accounts = event.resolve_accounts(ix).ok()?;
    Some(DexCall { program, accounts, data: ix.data.clone() })
}

fn log_direction(logs: &[String]) -> Option<TradeDirection> {
    for line in logs {
        if line.contains("Instruction: Buy") {
            return Some(TradeDirection::Buy);
        }
        if line.contains("Instruction: Sell") {
            return Some(TradeDirection::Sell);
        }
        if line.contains("Instruction: Swap") {
            // Direction resolved by the economic signature.
            return Some(TradeDirection::Buy);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::normalize::{test_support, TokenBalanceEntry};

    fn pumpfun_invoke_log() -> String {
        format!("Program {} invoke [1]", pumpfun::accounts::PUMPFUN)
    }

    fn buy_event(leader: Pubkey, mint: Pubkey) -> LeaderTxEvent {
        let mut event = test_support::event(
            leader,
            vec![
                leader,
                pumpfun::accounts::FEE_RECIPIENT,
                mint,
                SYSTEM_PROGRAM,
                TOKEN_PROGRAM,
            ],
        );
        event.logs = vec![pumpfun_invoke_log(), "Program log: Instruction: Buy".into()];
        event.pre_balances = vec![1_000_000_000, 0, 0, 0, 0];
        event.post_balances = vec![900_000_000, 0, 0, 0, 0];
        event.pre_token_balances = vec![];
        event.post_token_balances = vec![TokenBalanceEntry {
            account_index: 5,
            mint,
            owner: leader,
            amount: 12_345,
        }];
        event
    }

    #[test]
    fn happy_path_pumpfun_buy() {
        let leader = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let verdict = classify_event(&buy_event(leader, mint)).unwrap();
        assert_eq!(verdict.router, None);
        assert_eq!(verdict.dex, DexFamily::PumpFun);
        assert_eq!(verdict.direction, TradeDirection::Buy);
        assert_eq!(verdict.input_mint, WSOL_MINT);
        assert_eq!(verdict.output_mint, mint);
        assert_eq!(verdict.leader_input_amount, 100_000_000);
    }

    #[test]
    fn router_wrapped_pumpfun_keeps_dex_attribution() {
        let leader = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let jupiter = registry::ROUTERS[0].0;
        let mut event = buy_event(leader, mint);
        // Top-level call goes through Jupiter; fee-recipient check is waived.
        event.account_keys = vec![leader, jupiter, mint, SYSTEM_PROGRAM, TOKEN_PROGRAM];
        event.instructions = vec![RawInstruction {
            program_id_index: 1,
            accounts: vec![0, 2],
            data: vec![0xaa],
        }];
        let verdict = classify_event(&event).unwrap();
        assert_eq!(verdict.router, Some("Jupiter"));
        assert_eq!(verdict.dex, DexFamily::PumpFun);
    }

    #[test]
    fn pumpfun_direct_requires_fee_recipient() {
        let leader = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let mut event = buy_event(leader, mint);
        event.account_keys = vec![leader, mint, SYSTEM_PROGRAM, TOKEN_PROGRAM];
        assert_eq!(classify_event(&event), Err(NotCopyable::MissingFeeRecipient));
    }

    #[test]
    fn no_dex_program_is_not_copyable() {
        let leader = Pubkey::new_unique();
        let mut event = test_support::event(leader, vec![leader]);
        event.logs = vec!["Program log: Instruction: Buy".into()];
        assert_eq!(classify_event(&event), Err(NotCopyable::NoDex));
    }

    #[test]
    fn economic_signature_resolves_sell() {
        let leader = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let mut event = buy_event(leader, mint);
        event.logs = vec![pumpfun_invoke_log(), "Program log: Instruction: Sell".into()];
        event.pre_balances = vec![900_000_000, 0, 0, 0, 0];
        event.post_balances = vec![1_000_000_000, 0, 0, 0, 0];
        event.pre_token_balances = vec![TokenBalanceEntry {
            account_index: 5,
            mint,
            owner: leader,
            amount: 12_345,
        }];
        event.post_token_balances = vec![];
        let verdict = classify_event(&event).unwrap();
        assert_eq!(verdict.direction, TradeDirection::Sell);
        assert_eq!(verdict.input_mint, mint);
        assert_eq!(verdict.output_mint, WSOL_MINT);
        assert_eq!(verdict.leader_input_amount, 12_345);
    }

    #[test]
    fn token_for_token_swap_is_rejected() {
        let leader = Pubkey::new_unique();
        let mint_a = Pubkey::new_unique();
        let mint_b = Pubkey::new_unique();
        let mut event = buy_event(leader, mint_a);
        event.pre_balances = vec![1_000_000_000, 0, 0, 0, 0];
        event.post_balances = vec![1_000_000_000, 0, 0, 0, 0];
        event.pre_token_balances = vec![TokenBalanceEntry {
            account_index: 5,
            mint: mint_a,
            owner: leader,
            amount: 500,
        }];
        event.post_token_balances = vec![TokenBalanceEntry {
            account_index: 6,
            mint: mint_b,
            owner: leader,
            amount: 700,
        }];
        assert_eq!(classify_event(&event), Err(NotCopyable::NotSolDenominated));
    }

    #[test]
    fn verdict_cache_returns_identical_arc() {
        let classifier = Classifier::new();
        let leader = Pubkey::new_unique();
        let event = buy_event(leader, Pubkey::new_unique());
        let first = classifier.classify(&event);
        let second = classifier.classify(&event);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn classified_mints_bracket_wrapped_sol() {
        let leader = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let verdict = classify_event(&buy_event(leader, mint)).unwrap();
        assert_ne!(verdict.input_mint, verdict.output_mint);
        assert!(
            (verdict.input_mint == WSOL_MINT) ^ (verdict.output_mint == WSOL_MINT),
            "exactly one side must be wrapped SOL"
        );
    }
}
