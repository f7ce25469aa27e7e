use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use solana_sdk::signature::Signature;

use crate::constants::trade::VERDICT_TTL_MS;

/// Signature-keyed cache of classification verdicts with a short TTL.
///
/// Advisory only: it elides re-classification work for duplicate deliveries
/// but never decides whether a dispatch happens — the dedup cache does that.
pub struct VerdictCache<T> {
    entries: DashMap<Signature, (Instant, Arc<T>)>,
}

impl<T> VerdictCache<T> {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    pub fn get(&self, signature: &Signature) -> Option<Arc<T>> {
        let entry = self.entries.get(signature)?;
        let (inserted_at, verdict) = entry.value();
        if inserted_at.elapsed() < Duration::from_millis(VERDICT_TTL_MS) {
            Some(verdict.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, signature: Signature, verdict: Arc<T>) {
        self.entries.insert(signature, (Instant::now(), verdict));
    }

    pub fn sweep(&self) {
        let ttl = Duration::from_millis(VERDICT_TTL_MS);
        self.entries.retain(|_, (inserted_at, _)| inserted_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for VerdictCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_within_ttl_returns_same_value() {
        let cache: VerdictCache<u32> = VerdictCache::new();
        let sig = Signature::from([1u8; 64]);
        cache.insert(sig, Arc::new(42));
        let hit = cache.get(&sig).unwrap();
        assert_eq!(*hit, 42);
    }

    #[test]
    fn miss_for_unknown_signature() {
        let cache: VerdictCache<u32> = VerdictCache::new();
        assert!(cache.get(&Signature::from([2u8; 64])).is_none());
    }
}
