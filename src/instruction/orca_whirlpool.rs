use anyhow::Result;
use async_trait::async_trait;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};

use super::{
    follower_min_out, mirror_leader_accounts, require_dex_call, with_sol_legs,
    CopyInstructionBuilder,
};
use crate::chain::ChainClient;
use crate::classifier::registry::DexFamily;
use crate::classifier::TradeDirection;
use crate::common::spl;
use crate::constants::TOKEN_PROGRAM;
use crate::instruction::utils::orca_whirlpool::{
    accounts, decode_leader_swap, idx, swap_data, SwapArgs, ACCOUNT_FLAGS,
};
use crate::planner::CopyPlan;

/// Which user account holds which mint depends on the pool's A/B orientation,
/// recovered from the leader's `a_to_b` flag.
pub struct OrcaWhirlpoolBuilder;

#[async_trait]
impl CopyInstructionBuilder for OrcaWhirlpoolBuilder {
    fn family(&self) -> DexFamily {
        DexFamily::OrcaWhirlpool
    }

    async fn build(
        &self,
        plan: &CopyPlan,
        chain: &ChainClient,
        payer: &Pubkey,
    ) -> Result<Vec<Instruction>> {
        let classification = &plan.classification;
        let call = require_dex_call(plan)?;
        let leader_args = decode_leader_swap(&call.data);
        let a_to_b = leader_args.map(|args| args.a_to_b).unwrap_or(true);
        let sqrt_price_limit = leader_args.map(|args| args.sqrt_price_limit).unwrap_or(0);

        // a_to_b: input is mint A. The follower swaps the same direction.
        let (mint_a, mint_b) = if a_to_b {
            (classification.input_mint, classification.output_mint)
        } else {
            (classification.output_mint, classification.input_mint)
        };
        let owner_account_a = spl::get_associated_token_address(payer, &mint_a);
        let owner_account_b = spl::get_associated_token_address(payer, &mint_b);

        let metas = mirror_leader_accounts(
            call,
            ACCOUNT_FLAGS,
            &[
                (idx::TOKEN_AUTHORITY, *payer),
                (idx::TOKEN_OWNER_ACCOUNT_A, owner_account_a),
                (idx::TOKEN_OWNER_ACCOUNT_B, owner_account_b),
            ],
            true,
        )?;

        let data = swap_data(&SwapArgs {
            amount: plan.amount,
            other_amount_threshold: follower_min_out(plan),
            sqrt_price_limit,
            amount_specified_is_input: true,
            a_to_b,
        })?;
        let swap = Instruction::new_with_bytes(accounts::ORCA_WHIRLPOOL, &data, metas);

        let token_mint = match classification.direction {
            TradeDirection::Buy => classification.output_mint,
            TradeDirection::Sell => classification.input_mint,
        };
        with_sol_legs(plan, chain, payer, &token_mint, &TOKEN_PROGRAM, swap).await
    }
}
