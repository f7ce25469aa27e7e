mod dispatch;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::{mpsc, watch};

use crate::chain::ChainClient;
use crate::classifier::{Classification, Classifier};
use crate::common::EngineConfig;
use crate::constants::trade::{
    BLOCKHASH_REFRESH_MS, CACHE_SWEEP_MS, LEADER_REFRESH_MS, SHUTDOWN_GRACE_MS,
};
use crate::dedup::DedupCache;
use crate::instruction::AggregatorClient;
use crate::ledger::store::{ControlStore, FollowerProfile, PositionStore};
use crate::ledger::PositionLedger;
use crate::signer::SignerProvider;
use crate::streaming::{LeaderStream, LeaderTxEvent};
use crate::submit::Submitter;
use dispatch::EngineShared;

struct Job {
    follower: Arc<FollowerProfile>,
    classification: Arc<Classification>,
}

/// Owns every long-lived task: the stream consumer, the classification pump,
/// per-follower dispatch workers, and the background loops (blockhash
/// refresh, leader-set refresh, cache sweep, endpoint health reaper).
///
/// Within one follower, dispatch respects the upstream order of that
/// follower's leader signatures: each follower has a serialized worker queue.
/// Across followers there is no ordering guarantee.
pub struct CopyEngine {
    config: EngineConfig,
    shared: Arc<EngineShared>,
    control: Arc<dyn ControlStore>,
    position_store: Arc<dyn PositionStore>,
    followers_by_leader: ArcSwap<HashMap<Pubkey, Vec<Arc<FollowerProfile>>>>,
    workers: DashMap<Pubkey, mpsc::UnboundedSender<Job>>,
    in_flight: Arc<AtomicUsize>,
}

impl CopyEngine {
    pub fn new(
        config: EngineConfig,
        control: Arc<dyn ControlStore>,
        position_store: Arc<dyn PositionStore>,
        signer: Arc<dyn SignerProvider>,
    ) -> Arc<Self> {
        let chain = Arc::new(ChainClient::new(&config));
        let shared = Arc::new(EngineShared {
            chain: chain.clone(),
            classifier: Classifier::new(),
            ledger: PositionLedger::new(position_store.clone()),
            dedup: DedupCache::new(),
            submitter: Submitter::new(chain, &config),
            aggregator: config.aggregator_url.clone().map(AggregatorClient::new),
            signer,
        });
        Arc::new(Self {
            config,
            shared,
            control,
            position_store,
            followers_by_leader: ArcSwap::from_pointee(HashMap::new()),
            workers: DashMap::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Runs until the shutdown signal flips. In-flight dispatches get a
    /// bounded grace period to finish confirmation before the process exits.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.shared.chain.refresh_blockhash().await.context("initial blockhash fetch")?;
        let replayed = self
            .shared
            .ledger
            .load(self.position_store.as_ref())
            .await
            .context("ledger replay")?;
        tracing::info!(positions = replayed, "position ledger replayed");

        let initial_leaders = self.refresh_control().await.context("initial leader set")?;
        tracing::info!(leaders = initial_leaders.len(), "leader set loaded");
        let (leaders_tx, leaders_rx) = watch::channel(initial_leaders);

        let (events_tx, mut events_rx) = mpsc::channel::<Arc<LeaderTxEvent>>(1024);
        let stream = LeaderStream::new(
            self.config.grpc_url.clone(),
            self.config.grpc_token.clone(),
            self.shared.chain.clone(),
        );
        let stream_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = stream.run(leaders_rx, events_tx, stream_shutdown).await {
                tracing::error!(error = %e, "stream task exited with error");
            }
        });

        self.spawn_blockhash_refresher(shutdown.clone());
        self.spawn_sweeper(shutdown.clone());
        self.spawn_control_refresher(leaders_tx, shutdown.clone());

        // Classification is synchronous and cheap, so it runs inline here:
        // jobs reach each follower's worker queue in stream order, which is
        // what guarantees per-follower dispatch ordering. The expensive work
        // (build, sign, send, confirm) happens in the worker tasks.
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = events_rx.recv() => {
                    let Some(event) = event else { break };
                    self.handle_event(event);
                }
            }
        }

        // Bounded grace: let in-flight dispatches finish confirmation.
        let deadline = Instant::now() + Duration::from_millis(SHUTDOWN_GRACE_MS);
        while self.in_flight.load(Ordering::Acquire) > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let abandoned = self.in_flight.load(Ordering::Acquire);
        if abandoned > 0 {
            tracing::warn!(abandoned, "shutdown grace elapsed with dispatches in flight");
        }
        tracing::info!("engine stopped");
        Ok(())
    }

    /// Dedup gate, classification, and fan-out. One call per stream event.
    fn handle_event(&self, event: Arc<LeaderTxEvent>) {
        let stamp = self.shared.chain.cached_blockhash().unwrap_or_default();
        if !self.shared.dedup.first_seen(event.signature, stamp) {
            tracing::debug!(signature = %event.signature, "re-delivered signature dropped");
            return;
        }
        if self.shared.dedup.is_failed(&event.signature) {
            return;
        }
        let verdict = self.shared.classifier.classify(&event);
        let classification = match verdict.as_ref() {
            Ok(classification) => Arc::new(classification.clone()),
            Err(reason) => {
                tracing::debug!(
                    signature = %event.signature,
                    leader = %event.leader,
                    %reason,
                    "not copyable"
                );
                return;
            }
        };
        tracing::info!(
            signature = %event.signature,
            leader = %event.leader,
            dex = %classification.dex,
            direction = %classification.direction,
            router = classification.router.unwrap_or("Direct"),
            "leader swap classified"
        );

        let map = self.followers_by_leader.load();
        let Some(followers) = map.get(&event.leader) else { return };
        for follower in followers {
            self.enqueue(follower.clone(), classification.clone());
        }
    }

    fn enqueue(&self, follower: Arc<FollowerProfile>, classification: Arc<Classification>) {
        let sender = self
            .workers
            .entry(follower.wallet)
            .or_insert_with(|| self.spawn_worker())
            .clone();
        if sender.send(Job { follower, classification }).is_err() {
            tracing::error!("follower worker queue closed");
        }
    }

    /// One serialized worker per follower keeps that follower's dispatches in
    /// stream order while followers run in parallel with each other.
    fn spawn_worker(&self) -> mpsc::UnboundedSender<Job> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let shared = self.shared.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                in_flight.fetch_add(1, Ordering::AcqRel);
                dispatch::dispatch(&shared, &job.follower, job.classification).await;
                in_flight.fetch_sub(1, Ordering::AcqRel);
            }
        });
        tx
    }

    /// Re-reads the control store and swaps in the new follower index.
    /// Returns the leader set for the stream subscription.
    async fn refresh_control(&self) -> Result<HashSet<Pubkey>> {
        let leaders = self.control.leader_set().await?;
        let profiles = self.control.follower_profiles().await?;
        let leader_keys: HashSet<Pubkey> = leaders.iter().map(|l| l.pubkey).collect();

        let mut by_leader: HashMap<Pubkey, Vec<Arc<FollowerProfile>>> = HashMap::new();
        for profile in profiles {
            let profile = Arc::new(profile);
            for leader in profile.leaders.iter().filter(|l| leader_keys.contains(l)) {
                by_leader.entry(*leader).or_default().push(profile.clone());
            }
        }
        self.followers_by_leader.store(Arc::new(by_leader));
        Ok(leader_keys)
    }

    fn spawn_blockhash_refresher(&self, mut shutdown: watch::Receiver<bool>) {
        let chain = self.shared.chain.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(BLOCKHASH_REFRESH_MS));
            loop {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = ticker.tick() => {
                        if let Err(e) = chain.refresh_blockhash().await {
                            tracing::warn!(error = %e, "blockhash refresh failed");
                        }
                    }
                }
            }
        });
    }

    fn spawn_sweeper(&self, mut shutdown: watch::Receiver<bool>) {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(CACHE_SWEEP_MS));
            loop {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = ticker.tick() => {
                        if let Some(current) = shared.chain.cached_blockhash() {
                            shared.dedup.sweep(&current);
                        }
                        shared.classifier.sweep_cache();
                        shared.chain.endpoint_pool().reap();
                    }
                }
            }
        });
    }

    fn spawn_control_refresher(
        self: &Arc<Self>,
        leaders_tx: watch::Sender<HashSet<Pubkey>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(LEADER_REFRESH_MS));
            ticker.tick().await; // the initial load already happened
            loop {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = ticker.tick() => {
                        match engine.refresh_control().await {
                            Ok(leaders) => {
                                // Only a changed set reopens the subscription.
                                leaders_tx.send_if_modified(|current| {
                                    if *current != leaders {
                                        *current = leaders;
                                        true
                                    } else {
                                        false
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "leader-set refresh failed");
                            }
                        }
                    }
                }
            }
        });
    }
}
