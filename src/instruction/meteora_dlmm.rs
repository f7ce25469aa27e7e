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
use crate::instruction::utils::meteora_dlmm::{
    accounts, idx, swap_data, SwapArgs, ACCOUNT_FLAGS,
};
use crate::planner::CopyPlan;

/// Bin arrays past the fixed prefix are mirrored verbatim (writable).
pub struct MeteoraDlmmBuilder;

#[async_trait]
impl CopyInstructionBuilder for MeteoraDlmmBuilder {
    fn family(&self) -> DexFamily {
        DexFamily::MeteoraDlmm
    }

    async fn build(
        &self,
        plan: &CopyPlan,
        chain: &ChainClient,
        payer: &Pubkey,
    ) -> Result<Vec<Instruction>> {
        let classification = &plan.classification;
        let call = require_dex_call(plan)?;

        let user_token_in =
            spl::get_associated_token_address(payer, &classification.input_mint);
        let user_token_out =
            spl::get_associated_token_address(payer, &classification.output_mint);

        let metas = mirror_leader_accounts(
            call,
            ACCOUNT_FLAGS,
            &[
                (idx::USER, *payer),
                (idx::USER_TOKEN_IN, user_token_in),
                (idx::USER_TOKEN_OUT, user_token_out),
            ],
            true,
        )?;

        let data = swap_data(&SwapArgs {
            amount_in: plan.amount,
            min_amount_out: follower_min_out(plan),
        })?;
        let swap = Instruction::new_with_bytes(accounts::METEORA_DLMM, &data, metas);

        let token_mint = match classification.direction {
            TradeDirection::Buy => classification.output_mint,
            TradeDirection::Sell => classification.input_mint,
        };
        with_sol_legs(plan, chain, payer, &token_mint, &TOKEN_PROGRAM, swap).await
    }
}
