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
use crate::instruction::utils::raydium_launchpad::{
    accounts, buy_exact_in_data, idx, sell_exact_in_data, ExactInArgs, ACCOUNT_FLAGS,
};
use crate::planner::CopyPlan;

pub struct RaydiumLaunchpadBuilder;

#[async_trait]
impl CopyInstructionBuilder for RaydiumLaunchpadBuilder {
    fn family(&self) -> DexFamily {
        DexFamily::RaydiumLaunchpad
    }

    async fn build(
        &self,
        plan: &CopyPlan,
        chain: &ChainClient,
        payer: &Pubkey,
    ) -> Result<Vec<Instruction>> {
        let classification = &plan.classification;
        let call = require_dex_call(plan)?;

        let base_mint = call.accounts[idx::BASE_MINT];
        let quote_mint = call.accounts[idx::QUOTE_MINT];
        let user_base = spl::get_associated_token_address(payer, &base_mint);
        let user_quote = spl::get_associated_token_address(payer, &quote_mint);

        let metas = mirror_leader_accounts(
            call,
            ACCOUNT_FLAGS,
            &[
                (idx::PAYER, *payer),
                (idx::USER_BASE_ATA, user_base),
                (idx::USER_QUOTE_ATA, user_quote),
            ],
            false,
        )?;

        let args = ExactInArgs {
            amount_in: plan.amount,
            minimum_amount_out: follower_min_out(plan),
            share_fee_rate: 0,
        };
        let data = match classification.direction {
            TradeDirection::Buy => buy_exact_in_data(&args)?,
            TradeDirection::Sell => sell_exact_in_data(&args)?,
        };
        let swap = Instruction::new_with_bytes(accounts::RAYDIUM_LAUNCHPAD, &data, metas);

        let token_mint = match classification.direction {
            TradeDirection::Buy => classification.output_mint,
            TradeDirection::Sell => classification.input_mint,
        };
        with_sol_legs(plan, chain, payer, &token_mint, &TOKEN_PROGRAM, swap).await
    }
}
