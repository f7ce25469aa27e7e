use std::sync::Arc;

use anyhow::{anyhow, Result};
use solana_sdk::signer::Signer;

use crate::classifier::registry::DexFamily;
use crate::classifier::{Classification, Classifier, TradeDirection};
use crate::chain::ChainClient;
use crate::common::spl;
use crate::dedup::DedupCache;
use crate::instruction::{builder_for, AggregatorClient};
use crate::ledger::store::FollowerProfile;
use crate::ledger::PositionLedger;
use crate::planner::{self, CopyPlan, PlanDrop};
use crate::signer::SignerProvider;
use crate::submit::{SubmitFailure, SubmitOutcome, Submitter};

/// Everything a dispatch task needs, shared once per process.
pub(crate) struct EngineShared {
    pub chain: Arc<ChainClient>,
    pub classifier: Classifier,
    pub ledger: Arc<PositionLedger>,
    pub dedup: DedupCache,
    pub submitter: Submitter,
    pub aggregator: Option<AggregatorClient>,
    pub signer: Arc<dyn SignerProvider>,
}

/// Runs one follower's copy of one classified leader swap, end to end.
///
/// Errors never escape: each dispatch task is isolated, so a failure for one
/// follower cannot affect any other.
pub(crate) async fn dispatch(
    shared: &EngineShared,
    follower: &FollowerProfile,
    classification: Arc<Classification>,
) {
    let leader_signature = classification.leader_signature;
    if shared.dedup.is_failed(&leader_signature) {
        return;
    }
    // The dedup entry is written before submission; a cancellation past this
    // point can never duplicate a send.
    let stamp = shared.chain.cached_blockhash().unwrap_or_default();
    if !shared.dedup.first_dispatch(follower.wallet, leader_signature, stamp) {
        tracing::debug!(
            follower = %follower.wallet,
            signature = %leader_signature,
            "duplicate dispatch dropped"
        );
        return;
    }

    let plan = match planner::plan(&classification, follower, &shared.ledger) {
        Ok(plan) => plan,
        // Normal outcomes, dropped silently.
        Err(PlanDrop::NoPosition | PlanDrop::AlreadyHolding) => return,
        Err(reason) => {
            tracing::debug!(
                follower = %follower.wallet,
                signature = %leader_signature,
                %reason,
                "plan dropped"
            );
            return;
        }
    };
    debug_assert!(plan.amount > 0, "zero-amount plans must not reach the submitter");

    // Failures here stay local to this follower. The fail cache is keyed
    // globally per leader signature, so only `run_plan` marks it, and only
    // for outcomes that condemn the signature itself (on-chain rejection,
    // confirmation timeout) rather than this follower's setup.
    if let Err(e) = run_plan(shared, follower, &plan).await {
        tracing::warn!(
            follower = %follower.wallet,
            signature = %leader_signature,
            dex = %plan.classification.dex,
            error = %e,
            "dispatch failed"
        );
    }
}

async fn run_plan(
    shared: &EngineShared,
    follower: &FollowerProfile,
    plan: &CopyPlan,
) -> Result<()> {
    let classification = &plan.classification;
    let keypair = shared.signer.keypair_for(&follower.wallet).await?;
    let payer = keypair.pubkey();

    let outcome = if classification.dex == DexFamily::Aggregator {
        let aggregator = shared
            .aggregator
            .as_ref()
            .ok_or_else(|| anyhow!("unknown dex family and no aggregator endpoint configured"))?;
        let transactions = aggregator.fetch_swap_transactions(plan, &payer).await?;
        shared.submitter.submit_prebuilt(transactions, keypair).await?
    } else {
        let builder = builder_for(classification.dex)
            .ok_or_else(|| anyhow!("no builder for {}", classification.dex))?;
        let instructions = builder.build(plan, &shared.chain, &payer).await?;
        shared.submitter.submit_plan(plan, instructions, keypair, vec![]).await?
    };

    match outcome {
        SubmitOutcome::Confirmed { signature, mut token_received } => {
            match classification.direction {
                TradeDirection::Buy => {
                    // The aggregator path confirms without a balance probe.
                    if token_received == 0 {
                        let ata = spl::get_associated_token_address(
                            &payer,
                            &classification.output_mint,
                        );
                        token_received = shared.chain.token_balance(&ata).await.unwrap_or(0);
                    }
                    if token_received == 0 {
                        tracing::warn!(
                            follower = %follower.wallet,
                            %signature,
                            "buy confirmed but follower received nothing"
                        );
                        return Ok(());
                    }
                    shared.ledger.record_buy(
                        &follower.wallet,
                        &classification.output_mint,
                        token_received,
                        plan.amount,
                        signature,
                    );
                    tracing::info!(
                        follower = %follower.wallet,
                        mint = %classification.output_mint,
                        amount = token_received,
                        sol_spent = plan.amount,
                        %signature,
                        "buy confirmed"
                    );
                }
                TradeDirection::Sell => {
                    shared.ledger.apply_sell(
                        &follower.wallet,
                        &classification.input_mint,
                        plan.amount,
                        0,
                    );
                    tracing::info!(
                        follower = %follower.wallet,
                        mint = %classification.input_mint,
                        amount = plan.amount,
                        %signature,
                        "sell confirmed"
                    );
                }
            }
            Ok(())
        }
        SubmitOutcome::ConfirmedEmpty { signature } => {
            tracing::warn!(
                follower = %follower.wallet,
                %signature,
                "confirmed-but-empty buy; no position recorded"
            );
            Ok(())
        }
        SubmitOutcome::Failed { signature, reason } => {
            match &reason {
                SubmitFailure::OnChain(detail) => {
                    if detail.to_lowercase().contains("insufficient") {
                        tracing::error!(
                            follower = %follower.wallet,
                            detail,
                            "follower has insufficient funds"
                        );
                    }
                    let stamp = shared.chain.cached_blockhash().unwrap_or_default();
                    shared.dedup.mark_failed(classification.leader_signature, stamp);
                }
                SubmitFailure::Timeout => {
                    // The transaction may still land; never re-send this
                    // leader signature.
                    let stamp = shared.chain.cached_blockhash().unwrap_or_default();
                    shared.dedup.mark_failed(classification.leader_signature, stamp);
                }
                // Send errors and oversized transactions are this follower's
                // problem; other followers may still copy the signature.
                SubmitFailure::Send(_) | SubmitFailure::TooLarge => {}
            }
            Err(anyhow!("submit failed ({:?}): {}", signature, reason))
        }
    }
}
