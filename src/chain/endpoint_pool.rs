use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use solana_sdk::commitment_config::CommitmentConfig;

use crate::common::SolanaRpcClient;
use crate::constants::trade::{ENDPOINT_COOLING_MS, ENDPOINT_STRIKE_LIMIT, RPC_TIMEOUT_MS};

struct EndpointHealth {
    strikes: u32,
    cooling_until: Option<Instant>,
    last_cooled: Option<Instant>,
}

struct EndpointSlot {
    url: String,
    client: Arc<SolanaRpcClient>,
    health: Mutex<EndpointHealth>,
}

/// Round-robin pool of JSON-RPC endpoints with per-endpoint health.
///
/// Five consecutive errors put an endpoint into a cooling period during which
/// it is skipped; any success clears the counter. When every endpoint is
/// cooling the least-recently-penalized one is handed out anyway so the pool
/// stays live as long as one endpoint works at all.
pub struct EndpointPool {
    slots: Vec<EndpointSlot>,
    cursor: AtomicUsize,
}

impl EndpointPool {
    pub fn new(urls: &[String], commitment: CommitmentConfig) -> Self {
        let slots = urls
            .iter()
            .map(|url| EndpointSlot {
                url: url.clone(),
                client: Arc::new(SolanaRpcClient::new_with_timeout_and_commitment(
                    url.clone(),
                    Duration::from_millis(RPC_TIMEOUT_MS),
                    commitment,
                )),
                health: Mutex::new(EndpointHealth {
                    strikes: 0,
                    cooling_until: None,
                    last_cooled: None,
                }),
            })
            .collect();
        Self { slots, cursor: AtomicUsize::new(0) }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Next healthy endpoint in round-robin order.
    pub fn next(&self) -> (usize, Arc<SolanaRpcClient>) {
        let now = Instant::now();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..self.slots.len() {
            let idx = start.wrapping_add(offset) % self.slots.len();
            let slot = &self.slots[idx];
            let mut health = slot.health.lock();
            match health.cooling_until {
                Some(until) if until > now => continue,
                Some(_) => {
                    // Cooling period elapsed; give it another chance.
                    health.cooling_until = None;
                    health.strikes = 0;
                    return (idx, slot.client.clone());
                }
                None => return (idx, slot.client.clone()),
            }
        }
        // Everyone is cooling. Pick the endpoint penalized longest ago.
        let idx = self
            .slots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.health.lock().last_cooled.unwrap_or(now))
            .map(|(i, _)| i)
            .unwrap_or(0);
        (idx, self.slots[idx].client.clone())
    }

    pub fn url(&self, idx: usize) -> &str {
        &self.slots[idx].url
    }

    pub fn record_success(&self, idx: usize) {
        let mut health = self.slots[idx].health.lock();
        health.strikes = 0;
        health.cooling_until = None;
    }

    pub fn record_failure(&self, idx: usize) {
        let mut health = self.slots[idx].health.lock();
        health.strikes += 1;
        if health.strikes >= ENDPOINT_STRIKE_LIMIT {
            let now = Instant::now();
            health.cooling_until = Some(now + Duration::from_millis(ENDPOINT_COOLING_MS));
            health.last_cooled = Some(now);
            health.strikes = 0;
            tracing::warn!(endpoint = %self.slots[idx].url, "rpc endpoint cooling");
        }
    }

    /// Clears cooling flags whose penalty window has fully elapsed. Run from
    /// the supervisor's health reaper.
    pub fn reap(&self) {
        let now = Instant::now();
        for slot in &self.slots {
            let mut health = slot.health.lock();
            if matches!(health.cooling_until, Some(until) if until <= now) {
                health.cooling_until = None;
                health.strikes = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> EndpointPool {
        let urls: Vec<String> =
            (0..n).map(|i| format!("http://rpc-{}.invalid", i)).collect();
        EndpointPool::new(&urls, CommitmentConfig::confirmed())
    }

    #[test]
    fn round_robin_rotates() {
        let p = pool(3);
        let (a, _) = p.next();
        let (b, _) = p.next();
        let (c, _) = p.next();
        let (d, _) = p.next();
        assert_eq!(vec![a, b, c], vec![0, 1, 2]);
        assert_eq!(d, 0);
    }

    #[test]
    fn five_strikes_cools_endpoint() {
        let p = pool(2);
        for _ in 0..ENDPOINT_STRIKE_LIMIT {
            p.record_failure(0);
        }
        for _ in 0..4 {
            let (idx, _) = p.next();
            assert_ne!(idx, 0);
        }
    }

    #[test]
    fn success_clears_strikes() {
        let p = pool(2);
        for _ in 0..ENDPOINT_STRIKE_LIMIT - 1 {
            p.record_failure(0);
        }
        p.record_success(0);
        p.record_failure(0);
        // One strike after the reset is not enough to cool.
        let seen: Vec<usize> = (0..2).map(|_| p.next().0).collect();
        assert!(seen.contains(&0));
    }

    #[test]
    fn all_cooling_still_yields_an_endpoint() {
        let p = pool(2);
        for idx in 0..2 {
            for _ in 0..ENDPOINT_STRIKE_LIMIT {
                p.record_failure(idx);
            }
        }
        let (idx, _) = p.next();
        assert!(idx < 2);
    }
}
