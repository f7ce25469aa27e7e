use anyhow::{anyhow, Result};
use async_trait::async_trait;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use super::{follower_min_out, require_dex_call, with_sol_legs, CopyInstructionBuilder};
use crate::chain::ChainClient;
use crate::classifier::registry::DexFamily;
use crate::classifier::TradeDirection;
use crate::common::spl;
use crate::constants::TOKEN_PROGRAM;
use crate::instruction::utils::raydium_amm_v4::{
    accounts, swap_base_in_data, SwapBaseInArgs,
};
use crate::planner::CopyPlan;

/// V4 swaps come in a 17-account and an 18-account shape (with or without
/// `amm_target_orders`), so the user positions are anchored to the tail:
/// source, destination, owner.
pub struct RaydiumAmmV4Builder;

#[async_trait]
impl CopyInstructionBuilder for RaydiumAmmV4Builder {
    fn family(&self) -> DexFamily {
        DexFamily::RaydiumV4
    }

    async fn build(
        &self,
        plan: &CopyPlan,
        chain: &ChainClient,
        payer: &Pubkey,
    ) -> Result<Vec<Instruction>> {
        let classification = &plan.classification;
        let call = require_dex_call(plan)?;
        let n = call.accounts.len();
        if n < 17 {
            return Err(anyhow!("raydium v4 swap carries {} accounts, expected 17 or 18", n));
        }
        let serum_program_idx = if n >= 18 { 7 } else { 6 };

        let user_source =
            spl::get_associated_token_address(payer, &classification.input_mint);
        let user_destination =
            spl::get_associated_token_address(payer, &classification.output_mint);

        let mut metas: Vec<AccountMeta> = call
            .accounts
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let readonly = i == 0 || i == 2 || i == serum_program_idx || i == n - 4;
                if readonly {
                    AccountMeta::new_readonly(*key, false)
                } else {
                    AccountMeta::new(*key, false)
                }
            })
            .collect();
        metas[n - 3] = AccountMeta::new(user_source, false);
        metas[n - 2] = AccountMeta::new(user_destination, false);
        metas[n - 1] = AccountMeta::new_readonly(*payer, true);

        let data = swap_base_in_data(&SwapBaseInArgs {
            amount_in: plan.amount,
            minimum_amount_out: follower_min_out(plan),
        })?;
        let swap = Instruction::new_with_bytes(accounts::RAYDIUM_AMM_V4, &data, metas);

        let token_mint = match classification.direction {
            TradeDirection::Buy => classification.output_mint,
            TradeDirection::Sell => classification.input_mint,
        };
        with_sol_legs(plan, chain, payer, &token_mint, &TOKEN_PROGRAM, swap).await
    }
}
