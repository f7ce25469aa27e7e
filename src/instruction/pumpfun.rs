use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use super::{ensure_ata, CopyInstructionBuilder};
use crate::chain::ChainClient;
use crate::classifier::registry::DexFamily;
use crate::classifier::TradeDirection;
use crate::common::spl;
use crate::constants::{SYSTEM_PROGRAM, TOKEN_PROGRAM};
use crate::instruction::utils::pumpfun::{
    accounts, buy_instruction_data, get_bonding_curve_pda, get_creator_vault_pda,
    sell_instruction_data, BondingCurveState, BuyArgs, SellArgs,
};
use crate::planner::CopyPlan;

/// Bonding-curve trades settle in native SOL, so there are no wrap/unwrap
/// legs; the curve PDAs are derived from the mint rather than mirrored.
pub struct PumpFunBuilder;

impl PumpFunBuilder {
    async fn curve_state(
        &self,
        chain: &ChainClient,
        bonding_curve: &Pubkey,
    ) -> Result<BondingCurveState> {
        let account = chain
            .fetch_account(bonding_curve)
            .await?
            .ok_or_else(|| anyhow!("bonding curve {} does not exist", bonding_curve))?;
        BondingCurveState::decode(&account.data)
            .with_context(|| format!("decoding bonding curve {}", bonding_curve))
    }
}

#[async_trait]
impl CopyInstructionBuilder for PumpFunBuilder {
    fn family(&self) -> DexFamily {
        DexFamily::PumpFun
    }

    async fn build(
        &self,
        plan: &CopyPlan,
        chain: &ChainClient,
        payer: &Pubkey,
    ) -> Result<Vec<Instruction>> {
        let classification = &plan.classification;
        let is_buy = classification.direction == TradeDirection::Buy;
        let mint = if is_buy { classification.output_mint } else { classification.input_mint };

        let bonding_curve = get_bonding_curve_pda(&mint);
        let associated_bonding_curve = spl::get_associated_token_address(&bonding_curve, &mint);
        let state = self.curve_state(chain, &bonding_curve).await?;
        if state.complete {
            return Err(anyhow!(
                "bonding curve for {} has migrated; pumpfun-amm handles this mint now",
                mint
            ));
        }
        let creator_vault = get_creator_vault_pda(&state.creator);
        let user_ata = spl::get_associated_token_address(payer, &mint);

        let mut instructions = Vec::with_capacity(3);
        if is_buy {
            instructions.extend(ensure_ata(chain, payer, &mint, &TOKEN_PROGRAM).await?);
            let data = buy_instruction_data(&BuyArgs {
                token_amount: 0,
                max_sol_cost: plan.amount,
            })?;
            instructions.push(Instruction::new_with_bytes(
                accounts::PUMPFUN,
                &data,
                vec![
                    AccountMeta::new_readonly(accounts::GLOBAL_ACCOUNT, false),
                    AccountMeta::new(accounts::FEE_RECIPIENT, false),
                    AccountMeta::new_readonly(mint, false),
                    AccountMeta::new(bonding_curve, false),
                    AccountMeta::new(associated_bonding_curve, false),
                    AccountMeta::new(user_ata, false),
                    AccountMeta::new(*payer, true),
                    AccountMeta::new_readonly(SYSTEM_PROGRAM, false),
                    AccountMeta::new_readonly(TOKEN_PROGRAM, false),
                    AccountMeta::new(creator_vault, false),
                    AccountMeta::new_readonly(accounts::EVENT_AUTHORITY, false),
                    AccountMeta::new_readonly(accounts::PUMPFUN, false),
                ],
            ));
        } else {
            let quote = state.quote_sell(plan.amount);
            let min_sol_output =
                quote.saturating_sub((quote as u128 * plan.slippage_bps as u128 / 10_000) as u64);
            let data = sell_instruction_data(&SellArgs {
                token_amount: plan.amount,
                min_sol_output,
            })?;
            instructions.push(Instruction::new_with_bytes(
                accounts::PUMPFUN,
                &data,
                vec![
                    AccountMeta::new_readonly(accounts::GLOBAL_ACCOUNT, false),
                    AccountMeta::new(accounts::FEE_RECIPIENT, false),
                    AccountMeta::new_readonly(mint, false),
                    AccountMeta::new(bonding_curve, false),
                    AccountMeta::new(associated_bonding_curve, false),
                    AccountMeta::new(user_ata, false),
                    AccountMeta::new(*payer, true),
                    AccountMeta::new_readonly(SYSTEM_PROGRAM, false),
                    AccountMeta::new(creator_vault, false),
                    AccountMeta::new_readonly(TOKEN_PROGRAM, false),
                    AccountMeta::new_readonly(accounts::EVENT_AUTHORITY, false),
                    AccountMeta::new_readonly(accounts::PUMPFUN, false),
                ],
            ));
            if plan.close_ata_after {
                instructions.push(spl::close_token_account(
                    &user_ata,
                    payer,
                    payer,
                    &TOKEN_PROGRAM,
                ));
            }
        }
        Ok(instructions)
    }
}
