//! Latency-focused Solana copy-trading engine.
//!
//! The engine watches a curated set of leader wallets over a gRPC
//! transaction stream, classifies each confirmed transaction as a decodable
//! swap on a known DEX, and mirrors it from every subscribing follower's
//! wallet within a few hundred milliseconds, sized and signed independently
//! per follower.
//!
//! Pipeline: stream ingest → classifier → (per follower) planner → builder →
//! submitter → ledger update. The dedup cache gates entry to the classifier;
//! the position ledger gates buys; the chain client is the shared RPC
//! dependency of ingest, builders, and the submitter.

pub mod chain;
pub mod classifier;
pub mod common;
pub mod constants;
pub mod dedup;
pub mod engine;
pub mod instruction;
pub mod ledger;
pub mod planner;
pub mod signer;
pub mod streaming;
pub mod submit;

pub use chain::ChainClient;
pub use classifier::registry::DexFamily;
pub use classifier::{Classification, Classifier, NotCopyable, TradeDirection};
pub use common::{AnyResult, EngineConfig};
pub use engine::CopyEngine;
pub use ledger::store::{
    ControlStore, FollowerPolicy, FollowerProfile, Leader, MemoryStore, PositionStore,
};
pub use ledger::PositionLedger;
pub use planner::{CopyPlan, PlanDrop, SetupStep};
pub use signer::{EnvSignerProvider, SignerProvider};
pub use streaming::LeaderTxEvent;
pub use submit::{SubmitFailure, SubmitOutcome, Submitter};
