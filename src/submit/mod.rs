pub mod fastlane;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::seq::IndexedRandom;
use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    system_instruction,
    transaction::VersionedTransaction,
};

use crate::chain::{ChainClient, ConfirmOutcome};
use crate::classifier::TradeDirection;
use crate::common::{spl, EngineConfig};
use crate::constants::trade::{SUBMIT_ATTEMPTS, SUBMIT_BACKOFF_MS};
use crate::constants::TIP_ACCOUNTS;
use crate::planner::CopyPlan;
use fastlane::FastlaneClient;

#[derive(Debug)]
pub enum SubmitOutcome {
    /// `token_received` is the follower's on-chain output-mint balance after
    /// a buy (the actual delta, since the one-position rule guarantees the
    /// balance started at zero); zero for sells.
    Confirmed { signature: Signature, token_received: u64 },
    /// The transaction confirmed but the follower received nothing; the
    /// caller must not record a position.
    ConfirmedEmpty { signature: Signature },
    Failed { signature: Option<Signature>, reason: SubmitFailure },
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitFailure {
    #[error("on-chain error: {0}")]
    OnChain(String),
    #[error("confirmation deadline elapsed")]
    Timeout,
    #[error("send failed after {SUBMIT_ATTEMPTS} attempts: {0}")]
    Send(String),
    #[error("transaction too large; the account set needs an address lookup table")]
    TooLarge,
}

/// Assembles, signs, sends, and confirms one follower transaction.
pub struct Submitter {
    chain: Arc<ChainClient>,
    fastlane: FastlaneClient,
    min_cu_price: u64,
    buy_tip_lamports: u64,
    sell_tip_lamports: u64,
}

impl Submitter {
    pub fn new(chain: Arc<ChainClient>, config: &EngineConfig) -> Self {
        Self {
            chain,
            fastlane: FastlaneClient::new(config.fastlane_url.clone()),
            min_cu_price: config.min_cu_price,
            buy_tip_lamports: config.buy_tip_lamports,
            sell_tip_lamports: config.sell_tip_lamports,
        }
    }

    pub async fn submit_plan(
        &self,
        plan: &CopyPlan,
        instructions: Vec<Instruction>,
        keypair: Arc<Keypair>,
        lookup_tables: Vec<AddressLookupTableAccount>,
    ) -> Result<SubmitOutcome> {
        let dex = plan.classification.dex;
        let dynamic_price = self.chain.prioritization_fee(&dex.program_id()).await;
        let unit_price = dynamic_price.max(self.min_cu_price);
        let tip_lamports = match plan.classification.direction {
            TradeDirection::Buy => self.buy_tip_lamports,
            TradeDirection::Sell => self.sell_tip_lamports,
        };
        let full = assemble_instructions(
            instructions,
            dex.compute_unit_limit(),
            unit_price,
            &keypair.pubkey(),
            tip_lamports,
        );

        // Send phase: up to three attempts, each on a fresh blockhash, with a
        // modest linear backoff. Once a send succeeds there is exactly one
        // confirmation wait and never a re-send.
        let mut last_error = String::new();
        let mut sent: Option<Signature> = None;
        for attempt in 1..=SUBMIT_ATTEMPTS {
            let (blockhash, _) = if attempt == 1 {
                self.chain.latest_blockhash().await?
            } else {
                self.chain.refresh_blockhash().await?
            };
            let transaction = sign_transaction(&full, &keypair, &lookup_tables, blockhash)?;
            match self.fastlane.send_transaction(&transaction).await {
                Ok(signature) => {
                    sent = Some(signature);
                    break;
                }
                Err(e) => {
                    let message = e.to_string();
                    if message.to_lowercase().contains("too large") {
                        return Ok(SubmitOutcome::Failed {
                            signature: None,
                            reason: SubmitFailure::TooLarge,
                        });
                    }
                    tracing::warn!(attempt, error = %message, "fastlane send failed");
                    last_error = message;
                    tokio::time::sleep(Duration::from_millis(
                        SUBMIT_BACKOFF_MS * attempt as u64,
                    ))
                    .await;
                }
            }
        }
        let Some(signature) = sent else {
            return Ok(SubmitOutcome::Failed {
                signature: None,
                reason: SubmitFailure::Send(last_error),
            });
        };

        match self.chain.confirm(&signature).await? {
            ConfirmOutcome::Confirmed => {
                let mut token_received = 0;
                if plan.classification.direction == TradeDirection::Buy {
                    let ata = spl::get_associated_token_address(
                        &keypair.pubkey(),
                        &plan.classification.output_mint,
                    );
                    token_received = self.chain.token_balance(&ata).await.unwrap_or(0);
                    if token_received == 0 {
                        return Ok(SubmitOutcome::ConfirmedEmpty { signature });
                    }
                }
                Ok(SubmitOutcome::Confirmed { signature, token_received })
            }
            ConfirmOutcome::OnChainError(error) => Ok(SubmitOutcome::Failed {
                signature: Some(signature),
                reason: SubmitFailure::OnChain(error),
            }),
            ConfirmOutcome::Timeout => Ok(SubmitOutcome::Failed {
                signature: Some(signature),
                reason: SubmitFailure::Timeout,
            }),
        }
    }

    /// Sends aggregator-prebuilt transactions sequentially, re-signing each
    /// over a fresh blockhash, and confirms the last one.
    pub async fn submit_prebuilt(
        &self,
        transactions: Vec<VersionedTransaction>,
        keypair: Arc<Keypair>,
    ) -> Result<SubmitOutcome> {
        let mut last_signature = None;
        for mut transaction in transactions {
            let (blockhash, _) = self.chain.latest_blockhash().await?;
            transaction.message.set_recent_blockhash(blockhash);
            let resigned = VersionedTransaction::try_new(transaction.message, &[keypair.as_ref()])?;
            let signature = match self.fastlane.send_transaction(&resigned).await {
                Ok(signature) => signature,
                Err(e) => {
                    return Ok(SubmitOutcome::Failed {
                        signature: None,
                        reason: SubmitFailure::Send(e.to_string()),
                    })
                }
            };
            last_signature = Some(signature);
        }
        let Some(signature) = last_signature else {
            return Ok(SubmitOutcome::Failed {
                signature: None,
                reason: SubmitFailure::Send("aggregator returned no transactions".into()),
            });
        };
        match self.chain.confirm(&signature).await? {
            ConfirmOutcome::Confirmed => {
                Ok(SubmitOutcome::Confirmed { signature, token_received: 0 })
            }
            ConfirmOutcome::OnChainError(error) => Ok(SubmitOutcome::Failed {
                signature: Some(signature),
                reason: SubmitFailure::OnChain(error),
            }),
            ConfirmOutcome::Timeout => Ok(SubmitOutcome::Failed {
                signature: Some(signature),
                reason: SubmitFailure::Timeout,
            }),
        }
    }
}

/// Compute budget first, then the swap legs, then the tip transfer to a
/// uniformly random tip account.
fn assemble_instructions(
    business: Vec<Instruction>,
    unit_limit: u32,
    unit_price: u64,
    payer: &Pubkey,
    tip_lamports: u64,
) -> Vec<Instruction> {
    let mut instructions = Vec::with_capacity(business.len() + 3);
    instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(unit_limit));
    instructions.push(ComputeBudgetInstruction::set_compute_unit_price(unit_price));
    instructions.extend(business);
    if tip_lamports > 0 {
        let tip_account = TIP_ACCOUNTS
            .choose(&mut rand::rng())
            .or_else(|| TIP_ACCOUNTS.first())
            .expect("tip account table is non-empty");
        instructions.push(system_instruction::transfer(payer, tip_account, tip_lamports));
    }
    instructions
}

fn sign_transaction(
    instructions: &[Instruction],
    keypair: &Keypair,
    lookup_tables: &[AddressLookupTableAccount],
    blockhash: Hash,
) -> Result<VersionedTransaction> {
    let message =
        v0::Message::try_compile(&keypair.pubkey(), instructions, lookup_tables, blockhash)?;
    let versioned = VersionedMessage::V0(message);
    let signature = keypair.try_sign_message(&versioned.serialize())?;
    Ok(VersionedTransaction { signatures: vec![signature], message: versioned })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{COMPUTE_BUDGET_PROGRAM, SYSTEM_PROGRAM};

    #[test]
    fn assembly_prepends_compute_budget_and_appends_tip() {
        let payer = Pubkey::new_unique();
        let body = vec![Instruction::new_with_bytes(Pubkey::new_unique(), &[1], vec![])];
        let out = assemble_instructions(body, 400_000, 500_000, &payer, 600_000);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].program_id, COMPUTE_BUDGET_PROGRAM);
        assert_eq!(out[1].program_id, COMPUTE_BUDGET_PROGRAM);
        // Set-unit-limit: discriminator 2 then u32_le units.
        assert_eq!(out[0].data[0], 2);
        assert_eq!(&out[0].data[1..5], &400_000u32.to_le_bytes());
        // Set-unit-price: discriminator 3 then u64_le micro-lamports.
        assert_eq!(out[1].data[0], 3);
        assert_eq!(&out[1].data[1..9], &500_000u64.to_le_bytes());
        let tip = out.last().unwrap();
        assert_eq!(tip.program_id, SYSTEM_PROGRAM);
        assert!(TIP_ACCOUNTS.contains(&tip.accounts[1].pubkey));
    }

    #[test]
    fn zero_tip_is_omitted() {
        let payer = Pubkey::new_unique();
        let out = assemble_instructions(vec![], 400_000, 1, &payer, 0);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn signed_transaction_compiles_v0_message() {
        let keypair = Keypair::new();
        let memoish = Instruction::new_with_bytes(Pubkey::new_unique(), &[0xde, 0xad], vec![]);
        let tx = sign_transaction(&[memoish], &keypair, &[], Hash::new_unique()).unwrap();
        assert_eq!(tx.signatures.len(), 1);
        assert!(matches!(tx.message, VersionedMessage::V0(_)));
    }
}
