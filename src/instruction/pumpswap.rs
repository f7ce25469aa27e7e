use anyhow::Result;
use async_trait::async_trait;
use borsh::BorshDeserialize;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};

use super::{
    follower_min_out, mirror_leader_accounts, require_dex_call, with_sol_legs,
    CopyInstructionBuilder,
};
use crate::chain::ChainClient;
use crate::classifier::registry::DexFamily;
use crate::classifier::TradeDirection;
use crate::common::spl;
use crate::constants::{TOKEN_PROGRAM, WSOL_MINT};
use crate::instruction::utils::pumpswap::{
    accounts, buy_instruction_data, idx, sell_instruction_data, BuyArgs, SellArgs,
    ACCOUNT_FLAGS, BUY_DISCRIMINATOR,
};
use crate::planner::CopyPlan;

pub struct PumpSwapBuilder;

#[async_trait]
impl CopyInstructionBuilder for PumpSwapBuilder {
    fn family(&self) -> DexFamily {
        DexFamily::PumpFunAmm
    }

    async fn build(
        &self,
        plan: &CopyPlan,
        chain: &ChainClient,
        payer: &Pubkey,
    ) -> Result<Vec<Instruction>> {
        let classification = &plan.classification;
        let call = require_dex_call(plan)?;

        // Base/quote orientation comes from the mirrored pool, not from our
        // buy/sell view; quote is the wrapped-SOL side for copyable pools.
        let base_mint = call.accounts[idx::BASE_MINT];
        let quote_mint = call.accounts[idx::QUOTE_MINT];
        let user_base_ata = spl::get_associated_token_address(payer, &base_mint);
        let user_quote_ata = spl::get_associated_token_address(payer, &quote_mint);

        let metas = mirror_leader_accounts(
            call,
            ACCOUNT_FLAGS,
            &[
                (idx::USER, *payer),
                (idx::USER_BASE_ATA, user_base_ata),
                (idx::USER_QUOTE_ATA, user_quote_ata),
            ],
            true,
        )?;

        let data = match classification.direction {
            TradeDirection::Buy => {
                // Scale the leader's requested base-out to our quote budget,
                // then shave the plan's slippage off it.
                let leader_base_out = (call.data.len() >= 24
                    && call.data[..8] == BUY_DISCRIMINATOR)
                    .then(|| BuyArgs::try_from_slice(&call.data[8..24]).ok())
                    .flatten()
                    .map(|args| args.base_amount_out)
                    .unwrap_or(0);
                let scaled = if classification.leader_input_amount > 0 {
                    (leader_base_out as u128 * plan.amount as u128
                        / classification.leader_input_amount as u128) as u64
                } else {
                    0
                };
                let base_amount_out = scaled
                    .saturating_sub((scaled as u128 * plan.slippage_bps as u128 / 10_000) as u64);
                buy_instruction_data(&BuyArgs {
                    base_amount_out,
                    max_quote_amount_in: plan.amount,
                })?
            }
            TradeDirection::Sell => sell_instruction_data(&SellArgs {
                base_amount_in: plan.amount,
                min_quote_amount_out: follower_min_out(plan),
            })?,
        };

        let swap = Instruction::new_with_bytes(accounts::PUMPFUN_AMM, &data, metas);
        let token_mint = if base_mint == WSOL_MINT { quote_mint } else { base_mint };
        with_sol_legs(plan, chain, payer, &token_mint, &TOKEN_PROGRAM, swap).await
    }
}
