use dashmap::DashMap;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature};

/// At-most-once gates for the pipeline, plus the fail cache.
///
/// Every entry is stamped with the blockhash that was current at insertion.
/// The sweeper removes entries whose stamp no longer matches the current
/// blockhash, which bounds memory with natural correlation to the
/// recent-blockhash horizon.
pub struct DedupCache {
    /// Leader signatures that have entered the classifier.
    seen: DashMap<Signature, Hash>,
    /// (follower, leader signature) pairs handed to the submitter.
    dispatched: DashMap<(Pubkey, Signature), Hash>,
    /// Leader signatures whose copy failed; never retried.
    failed: DashMap<Signature, Hash>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self { seen: DashMap::new(), dispatched: DashMap::new(), failed: DashMap::new() }
    }

    /// True exactly once per signature: the first delivery wins, re-deliveries
    /// are dropped by the caller.
    pub fn first_seen(&self, signature: Signature, blockhash: Hash) -> bool {
        match self.seen.entry(signature) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(blockhash);
                true
            }
        }
    }

    /// True exactly once per (follower, signature). Written before
    /// submission so a cancelled dispatch cannot be duplicated.
    pub fn first_dispatch(
        &self,
        follower: Pubkey,
        signature: Signature,
        blockhash: Hash,
    ) -> bool {
        match self.dispatched.entry((follower, signature)) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(blockhash);
                true
            }
        }
    }

    pub fn mark_failed(&self, signature: Signature, blockhash: Hash) {
        self.failed.insert(signature, blockhash);
    }

    pub fn is_failed(&self, signature: &Signature) -> bool {
        self.failed.contains_key(signature)
    }

    /// Evicts every entry whose stored blockhash differs from the current
    /// one. Runs on the supervisor's sweep cadence.
    pub fn sweep(&self, current: &Hash) {
        self.seen.retain(|_, stamp| stamp == current);
        self.dispatched.retain(|_, stamp| stamp == current);
        self.failed.retain(|_, stamp| stamp == current);
    }

    pub fn len(&self) -> usize {
        self.seen.len() + self.dispatched.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_enters_classifier_at_most_once() {
        let cache = DedupCache::new();
        let sig = Signature::from([5u8; 64]);
        let hash = Hash::new_unique();
        assert!(cache.first_seen(sig, hash));
        assert!(!cache.first_seen(sig, hash));
        assert!(!cache.first_seen(sig, Hash::new_unique()));
    }

    #[test]
    fn follower_pair_dispatches_at_most_once() {
        let cache = DedupCache::new();
        let sig = Signature::from([6u8; 64]);
        let follower_a = Pubkey::new_unique();
        let follower_b = Pubkey::new_unique();
        let hash = Hash::new_unique();
        assert!(cache.first_dispatch(follower_a, sig, hash));
        assert!(!cache.first_dispatch(follower_a, sig, hash));
        // Different follower, same signature: independent gate.
        assert!(cache.first_dispatch(follower_b, sig, hash));
    }

    #[test]
    fn sweep_evicts_entries_from_older_blockhash_epochs() {
        let cache = DedupCache::new();
        let old_hash = Hash::new_unique();
        let current = Hash::new_unique();
        let old_sig = Signature::from([7u8; 64]);
        let fresh_sig = Signature::from([8u8; 64]);
        cache.first_seen(old_sig, old_hash);
        cache.mark_failed(old_sig, old_hash);
        cache.first_seen(fresh_sig, current);
        cache.sweep(&current);
        assert!(cache.first_seen(old_sig, current), "old epoch entry must be gone");
        assert!(!cache.is_failed(&old_sig));
        assert!(!cache.first_seen(fresh_sig, current), "current epoch entry must survive");
    }
}
