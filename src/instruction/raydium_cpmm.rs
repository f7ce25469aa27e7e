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
use crate::instruction::utils::raydium_cpmm::{
    accounts, idx, swap_base_input_data, SwapBaseInputArgs, ACCOUNT_FLAGS,
};
use crate::planner::CopyPlan;

pub struct RaydiumCpmmBuilder;

#[async_trait]
impl CopyInstructionBuilder for RaydiumCpmmBuilder {
    fn family(&self) -> DexFamily {
        DexFamily::RaydiumCpmm
    }

    async fn build(
        &self,
        plan: &CopyPlan,
        chain: &ChainClient,
        payer: &Pubkey,
    ) -> Result<Vec<Instruction>> {
        let classification = &plan.classification;
        let call = require_dex_call(plan)?;

        let user_input =
            spl::get_associated_token_address(payer, &classification.input_mint);
        let user_output =
            spl::get_associated_token_address(payer, &classification.output_mint);

        let metas = mirror_leader_accounts(
            call,
            ACCOUNT_FLAGS,
            &[
                (idx::PAYER, *payer),
                (idx::USER_INPUT_ATA, user_input),
                (idx::USER_OUTPUT_ATA, user_output),
            ],
            false,
        )?;

        let data = swap_base_input_data(&SwapBaseInputArgs {
            amount_in: plan.amount,
            minimum_amount_out: follower_min_out(plan),
        })?;
        let swap = Instruction::new_with_bytes(accounts::RAYDIUM_CPMM, &data, metas);

        let token_mint = match classification.direction {
            TradeDirection::Buy => classification.output_mint,
            TradeDirection::Sell => classification.input_mint,
        };
        with_sol_legs(plan, chain, payer, &token_mint, &TOKEN_PROGRAM, swap).await
    }
}
