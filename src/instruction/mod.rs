pub mod aggregator;
pub mod utils;

mod meteora_damm_v2;
mod meteora_dbc;
mod meteora_dlmm;
mod orca_whirlpool;
mod pumpfun;
mod pumpswap;
mod raydium_amm_v4;
mod raydium_clmm;
mod raydium_cpmm;
mod raydium_launchpad;

pub use aggregator::AggregatorClient;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_instruction,
};

use crate::chain::ChainClient;
use crate::classifier::registry::DexFamily;
use crate::classifier::{slippage, DexCall, TradeDirection};
use crate::common::spl;
use crate::constants::{TOKEN_PROGRAM, WSOL_MINT};
use crate::planner::CopyPlan;

/// Builds the ordered instruction list that mirrors a leader swap for one
/// follower: account provisioning, the DEX call itself, and SOL wrap/unwrap
/// legs where the family trades wrapped SOL.
#[async_trait]
pub trait CopyInstructionBuilder: Send + Sync {
    fn family(&self) -> DexFamily;

    async fn build(
        &self,
        plan: &CopyPlan,
        chain: &ChainClient,
        payer: &Pubkey,
    ) -> Result<Vec<Instruction>>;
}

/// Static dispatch table over the closed family set. `Aggregator` has no
/// native builder; the dispatcher routes it to the aggregator client.
pub fn builder_for(family: DexFamily) -> Option<&'static dyn CopyInstructionBuilder> {
    match family {
        DexFamily::PumpFun => Some(&pumpfun::PumpFunBuilder),
        DexFamily::PumpFunAmm => Some(&pumpswap::PumpSwapBuilder),
        DexFamily::RaydiumV4 => Some(&raydium_amm_v4::RaydiumAmmV4Builder),
        DexFamily::RaydiumCpmm => Some(&raydium_cpmm::RaydiumCpmmBuilder),
        DexFamily::RaydiumClmm => Some(&raydium_clmm::RaydiumClmmBuilder),
        DexFamily::RaydiumLaunchpad => Some(&raydium_launchpad::RaydiumLaunchpadBuilder),
        DexFamily::MeteoraDlmm => Some(&meteora_dlmm::MeteoraDlmmBuilder),
        DexFamily::MeteoraDbc => Some(&meteora_dbc::MeteoraDbcBuilder),
        DexFamily::MeteoraDammV2 => Some(&meteora_damm_v2::MeteoraDammV2Builder),
        DexFamily::OrcaWhirlpool => Some(&orca_whirlpool::OrcaWhirlpoolBuilder),
        DexFamily::Aggregator => None,
    }
}

pub(crate) fn require_dex_call(plan: &CopyPlan) -> Result<&DexCall> {
    plan.classification.dex_call.as_ref().ok_or_else(|| {
        anyhow!(
            "{} plan has no decoded leader instruction to rebuild from",
            plan.classification.dex
        )
    })
}

/// Mirrors the leader's account list into follower metas.
///
/// The fixed prefix takes its writable/signer flags from the family's IDL
/// table; accounts past the prefix (tick arrays, bin arrays) take
/// `extras_writable`. Substitutions swap user-owned positions for the
/// follower's keys.
pub(crate) fn mirror_leader_accounts(
    call: &DexCall,
    flags: &[(bool, bool)],
    substitutions: &[(usize, Pubkey)],
    extras_writable: bool,
) -> Result<Vec<AccountMeta>> {
    if call.accounts.len() < flags.len() {
        return Err(anyhow!(
            "leader instruction carries {} accounts, family layout needs {}",
            call.accounts.len(),
            flags.len()
        ));
    }
    let mut metas: Vec<AccountMeta> = call
        .accounts
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let (writable, signer) = flags.get(i).copied().unwrap_or((extras_writable, false));
            AccountMeta { pubkey: *key, is_signer: signer, is_writable: writable }
        })
        .collect();
    for (index, key) in substitutions {
        metas[*index].pubkey = *key;
    }
    Ok(metas)
}

/// Probes the ATA and returns the idempotent create when it is absent. When
/// the probe itself fails the create is returned anyway; it is a no-op on an
/// existing account.
pub(crate) async fn ensure_ata(
    chain: &ChainClient,
    payer: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Result<Vec<Instruction>> {
    let ata = spl::get_associated_token_address_with_program_id(payer, mint, token_program);
    match chain.fetch_account(&ata).await {
        Ok(Some(_)) => Ok(vec![]),
        Ok(None) => Ok(vec![spl::create_associated_token_account_idempotent(
            payer,
            payer,
            mint,
            token_program,
        )]),
        Err(e) => {
            tracing::debug!(error = %e, %ata, "ata probe failed, prepending idempotent create");
            Ok(vec![spl::create_associated_token_account_idempotent(
                payer,
                payer,
                mint,
                token_program,
            )])
        }
    }
}

/// SPL-Token `SyncNative`.
fn sync_native(token_account: &Pubkey) -> Instruction {
    Instruction {
        program_id: TOKEN_PROGRAM,
        accounts: vec![AccountMeta::new(*token_account, false)],
        data: vec![17],
    }
}

/// Funds the follower's wrapped-SOL ATA with `lamports`: idempotent create,
/// system transfer, sync.
pub(crate) fn wrap_sol_instructions(payer: &Pubkey, lamports: u64) -> Vec<Instruction> {
    let wsol_ata = spl::get_associated_token_address(payer, &WSOL_MINT);
    vec![
        spl::create_associated_token_account_idempotent(payer, payer, &WSOL_MINT, &TOKEN_PROGRAM),
        system_instruction::transfer(payer, &wsol_ata, lamports),
        sync_native(&wsol_ata),
    ]
}

/// Closes the wrapped-SOL ATA, returning its balance (and rent) as native
/// SOL.
pub(crate) fn unwrap_sol_instruction(payer: &Pubkey) -> Instruction {
    let wsol_ata = spl::get_associated_token_address(payer, &WSOL_MINT);
    spl::close_token_account(&wsol_ata, payer, payer, &TOKEN_PROGRAM)
}

/// Leader's declared minimum-out scaled to the follower's input size.
/// Zero when the leader's payload carried no decodable bound.
pub(crate) fn follower_min_out(plan: &CopyPlan) -> u64 {
    let classification = &plan.classification;
    let Some(call) = &classification.dex_call else { return 0 };
    match slippage::decode_args(classification.dex, &call.data) {
        Some(args) => match args.min_out {
            Some(min_out) if classification.leader_input_amount > 0 => {
                (min_out as u128 * plan.amount as u128
                    / classification.leader_input_amount as u128) as u64
            }
            _ => 0,
        },
        None => 0,
    }
}

/// Wraps a pool-family swap with its SOL legs: fund wrapped SOL on the way
/// in for buys, unwrap on the way out, and provision/close the token ATA per
/// the plan.
pub(crate) async fn with_sol_legs(
    plan: &CopyPlan,
    chain: &ChainClient,
    payer: &Pubkey,
    token_mint: &Pubkey,
    token_program: &Pubkey,
    swap: Instruction,
) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::with_capacity(7);
    match plan.classification.direction {
        TradeDirection::Buy => {
            instructions.extend(wrap_sol_instructions(payer, plan.amount));
            instructions.extend(ensure_ata(chain, payer, token_mint, token_program).await?);
            instructions.push(swap);
            instructions.push(unwrap_sol_instruction(payer));
        }
        TradeDirection::Sell => {
            instructions.extend(ensure_ata(chain, payer, &WSOL_MINT, &TOKEN_PROGRAM).await?);
            instructions.push(swap);
            instructions.push(unwrap_sol_instruction(payer));
            if plan.close_ata_after {
                let token_ata = spl::get_associated_token_address_with_program_id(
                    payer,
                    token_mint,
                    token_program,
                );
                instructions.push(spl::close_token_account(
                    &token_ata,
                    payer,
                    payer,
                    token_program,
                ));
            }
        }
    }
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(n: usize) -> DexCall {
        DexCall {
            program: Pubkey::new_unique(),
            accounts: (0..n).map(|_| Pubkey::new_unique()).collect(),
            data: vec![],
        }
    }

    #[test]
    fn mirror_applies_flags_and_substitutions() {
        let call = call(4);
        let flags = &[(true, false), (false, true), (true, false)];
        let me = Pubkey::new_unique();
        let metas = mirror_leader_accounts(&call, flags, &[(1, me)], true).unwrap();
        assert_eq!(metas.len(), 4);
        assert!(metas[0].is_writable && !metas[0].is_signer);
        assert_eq!(metas[1].pubkey, me);
        assert!(metas[1].is_signer);
        // Past the fixed prefix: extras_writable applies.
        assert!(metas[3].is_writable && !metas[3].is_signer);
        // Untouched positions keep the leader's keys.
        assert_eq!(metas[0].pubkey, call.accounts[0]);
    }

    #[test]
    fn mirror_rejects_short_account_lists() {
        let call = call(2);
        let flags = &[(true, false), (false, false), (false, false)];
        assert!(mirror_leader_accounts(&call, flags, &[], false).is_err());
    }

    #[test]
    fn wrap_sol_orders_create_transfer_sync() {
        let payer = Pubkey::new_unique();
        let ixs = wrap_sol_instructions(&payer, 5_000_000);
        assert_eq!(ixs.len(), 3);
        assert_eq!(ixs[0].program_id, crate::constants::ASSOCIATED_TOKEN_PROGRAM);
        assert_eq!(ixs[1].program_id, crate::constants::SYSTEM_PROGRAM);
        assert_eq!(ixs[2].program_id, TOKEN_PROGRAM);
        assert_eq!(ixs[2].data, vec![17]);
    }
}
