use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;

use crate::classifier::{Classification, TradeDirection};
use crate::constants::{TOKEN_PROGRAM, WSOL_MINT};
use crate::ledger::store::FollowerProfile;
use crate::ledger::PositionLedger;

/// Idempotent account provisioning a dispatch must run before the swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupStep {
    CreateAta { mint: Pubkey, token_program: Pubkey },
}

/// One follower's sized, validated copy of a classified leader swap.
#[derive(Debug, Clone)]
pub struct CopyPlan {
    pub follower: Pubkey,
    pub classification: Arc<Classification>,
    /// Raw units of the input mint: lamports for buys, token units for sells.
    pub amount: u64,
    pub slippage_bps: u64,
    pub setup: Vec<SetupStep>,
    /// Close the input-mint ATA after a full exit to reclaim rent.
    pub close_ata_after: bool,
}

/// Why a plan was dropped before submission. `NoPosition` and
/// `AlreadyHolding` are normal outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlanDrop {
    #[error("follower already holds an open position in this token")]
    AlreadyHolding,
    #[error("no open position for this token")]
    NoPosition,
    #[error("computed amount is zero")]
    ZeroAmount,
    #[error("input and output mints are identical")]
    SameMints,
    #[error("buy input is not wrapped SOL")]
    BuyNotSolDenominated,
    #[error("sell output is not wrapped SOL")]
    SellNotSolDenominated,
    #[error("dex family not in the follower's allow-list")]
    PlatformNotAllowed,
}

/// Computes the follower-side plan for a classification, or the reason there
/// is none. Only SOL-denominated copies are supported in this pass.
pub fn plan(
    classification: &Arc<Classification>,
    follower: &FollowerProfile,
    ledger: &PositionLedger,
) -> Result<CopyPlan, PlanDrop> {
    if classification.input_mint == classification.output_mint {
        return Err(PlanDrop::SameMints);
    }
    if let Some(allowed) = &follower.policy.platform_allow_list {
        if !allowed.contains(&classification.dex) {
            return Err(PlanDrop::PlatformNotAllowed);
        }
    }

    let slippage_bps = match classification.leader_slippage_bps {
        Some(bps) if bps <= follower.policy.max_slippage_bps => bps,
        _ => follower.policy.max_slippage_bps,
    };

    match classification.direction {
        TradeDirection::Buy => {
            if classification.input_mint != WSOL_MINT {
                return Err(PlanDrop::BuyNotSolDenominated);
            }
            if ledger.has_open(&follower.wallet, &classification.output_mint) {
                return Err(PlanDrop::AlreadyHolding);
            }
            let amount = follower.policy.buy_lamports;
            if amount == 0 {
                return Err(PlanDrop::ZeroAmount);
            }
            Ok(CopyPlan {
                follower: follower.wallet,
                classification: classification.clone(),
                amount,
                slippage_bps,
                setup: vec![SetupStep::CreateAta {
                    mint: classification.output_mint,
                    token_program: TOKEN_PROGRAM,
                }],
                close_ata_after: false,
            })
        }
        TradeDirection::Sell => {
            if classification.output_mint != WSOL_MINT {
                return Err(PlanDrop::SellNotSolDenominated);
            }
            let Some(position) = ledger.get(&follower.wallet, &classification.input_mint) else {
                return Err(PlanDrop::NoPosition);
            };
            if position.amount_raw == 0 {
                return Err(PlanDrop::NoPosition);
            }
            // Full exit: the whole held amount, no output ATA setup since the
            // output is native SOL.
            Ok(CopyPlan {
                follower: follower.wallet,
                classification: classification.clone(),
                amount: position.amount_raw,
                slippage_bps,
                setup: vec![],
                close_ata_after: follower.policy.close_ata_on_exit,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::registry::DexFamily;
    use crate::ledger::store::{FollowerPolicy, MemoryStore};
    use solana_sdk::signature::Signature;
    use std::collections::HashSet;

    fn classification(direction: TradeDirection, mint: Pubkey) -> Arc<Classification> {
        let (input_mint, output_mint) = match direction {
            TradeDirection::Buy => (WSOL_MINT, mint),
            TradeDirection::Sell => (mint, WSOL_MINT),
        };
        Arc::new(Classification {
            router: None,
            dex: DexFamily::PumpFun,
            direction,
            input_mint,
            output_mint,
            leader_input_amount: 100_000_000,
            leader_slippage_bps: None,
            leader_signature: Signature::from([9u8; 64]),
            dex_call: None,
        })
    }

    fn follower(wallet: Pubkey) -> FollowerProfile {
        FollowerProfile {
            wallet,
            policy: FollowerPolicy {
                buy_lamports: 10_000_000,
                max_slippage_bps: 1_000,
                platform_allow_list: None,
                close_ata_on_exit: false,
            },
            leaders: HashSet::new(),
        }
    }

    fn ledger() -> Arc<PositionLedger> {
        PositionLedger::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn buy_is_sized_by_policy() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let plan =
            plan(&classification(TradeDirection::Buy, mint), &follower(wallet), &ledger()).unwrap();
        assert_eq!(plan.amount, 10_000_000);
        assert_eq!(
            plan.setup,
            vec![SetupStep::CreateAta { mint, token_program: TOKEN_PROGRAM }]
        );
    }

    #[tokio::test]
    async fn buy_of_held_token_is_dropped() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ledger = ledger();
        ledger.record_buy(&wallet, &mint, 500, 10_000_000, Signature::from([1u8; 64]));
        let result = plan(&classification(TradeDirection::Buy, mint), &follower(wallet), &ledger);
        assert_eq!(result.unwrap_err(), PlanDrop::AlreadyHolding);
    }

    #[tokio::test]
    async fn sell_without_position_is_dropped_silently() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let result = plan(&classification(TradeDirection::Sell, mint), &follower(wallet), &ledger());
        assert_eq!(result.unwrap_err(), PlanDrop::NoPosition);
    }

    #[tokio::test]
    async fn sell_uses_full_held_amount() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ledger = ledger();
        ledger.record_buy(&wallet, &mint, 4_321, 10_000_000, Signature::from([2u8; 64]));
        let plan =
            plan(&classification(TradeDirection::Sell, mint), &follower(wallet), &ledger).unwrap();
        assert_eq!(plan.amount, 4_321);
        assert!(plan.setup.is_empty());
    }

    #[tokio::test]
    async fn leader_slippage_is_used_when_within_policy() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let mut c = classification(TradeDirection::Buy, mint);
        Arc::make_mut(&mut c).leader_slippage_bps = Some(250);
        let plan = plan(&c, &follower(wallet), &ledger()).unwrap();
        assert_eq!(plan.slippage_bps, 250);
    }

    #[tokio::test]
    async fn leader_slippage_above_policy_falls_back() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let mut c = classification(TradeDirection::Buy, mint);
        Arc::make_mut(&mut c).leader_slippage_bps = Some(4_999);
        let plan = plan(&c, &follower(wallet), &ledger()).unwrap();
        assert_eq!(plan.slippage_bps, 1_000);
    }

    #[tokio::test]
    async fn platform_allow_list_gates_dispatch() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let mut f = follower(wallet);
        f.policy.platform_allow_list = Some([DexFamily::RaydiumV4].into_iter().collect());
        let result = plan(&classification(TradeDirection::Buy, mint), &f, &ledger());
        assert_eq!(result.unwrap_err(), PlanDrop::PlatformNotAllowed);
    }
}
