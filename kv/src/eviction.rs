//! Eviction controller (spec §4.6, component C6).
//!
//! Mirrors Redis's approximated-LRU/LFU sampling pool rather than a true
//! global ordering: each pass draws a small random sample, merges it into a
//! small persistent pool of the best eviction candidates seen so far, and
//! evicts from the front of that pool. This keeps per-key bookkeeping O(1)
//! at the cost of approximate (not exact) ordering, the same trade-off the
//! spec calls out in §4.6.

use bytes::Bytes;
use log::debug;
use rand::seq::IteratorRandom;

use crate::expiry::WhenMs;
use crate::keyspace::db::Database;
use crate::keyspace::entry::AccessMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde_derive::Serialize, serde_derive::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    NoEviction,
    AllKeysLru,
    AllKeysLfu,
    AllKeysRandom,
    VolatileLru,
    VolatileLfu,
    VolatileRandom,
    VolatileTtl,
}

impl EvictionPolicy {
    /// Whether this policy tracks LFU (vs. LRU) access meta, so callers know
    /// which [`AccessMeta`] variant to stamp new entries with (spec
    /// invariant: the two schemes are never mixed within one process).
    pub fn is_lfu(self) -> bool {
        matches!(self, EvictionPolicy::AllKeysLfu | EvictionPolicy::VolatileLfu)
    }

    fn only_considers_volatile(self) -> bool {
        matches!(
            self,
            EvictionPolicy::VolatileLru
                | EvictionPolicy::VolatileLfu
                | EvictionPolicy::VolatileRandom
                | EvictionPolicy::VolatileTtl
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EvictionConfig {
    pub policy: EvictionPolicy,
    /// `maxmemory-samples` (spec §3 default 5).
    pub samples: usize,
    /// Eviction pool capacity K (spec §3 default 16).
    pub pool_capacity: usize,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        EvictionConfig {
            policy: EvictionPolicy::NoEviction,
            samples: 5,
            pool_capacity: 16,
        }
    }
}

/// A bounded, score-sorted pool of eviction candidates. Higher score is
/// more evictable; the pool keeps only its `capacity` best entries across
/// calls, the way Redis's `evictionPoolPopulate` does.
#[derive(Default)]
pub struct EvictionPool {
    candidates: Vec<(u64, Bytes)>,
}

impl EvictionPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn merge(&mut self, fresh: Vec<(u64, Bytes)>, capacity: usize) {
        for (score, key) in fresh {
            if let Some(pos) = self.candidates.iter().position(|(_, k)| *k == key) {
                self.candidates[pos].0 = score;
            } else {
                self.candidates.push((score, key));
            }
        }
        self.candidates.sort_by(|a, b| b.0.cmp(&a.0));
        self.candidates.truncate(capacity);
    }

    fn pop_best(&mut self) -> Option<Bytes> {
        if self.candidates.is_empty() {
            None
        } else {
            Some(self.candidates.remove(0).1)
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Scores `key`'s current entry for eviction desirability under `policy`;
/// higher means "evict me first". Returns `None` when the key is
/// ineligible (e.g. a volatile-only policy and the key has no TTL).
fn score_key(db: &Database, policy: EvictionPolicy, key: &Bytes, now_secs: u32, now_ms: WhenMs) -> Option<u64> {
    if policy.only_considers_volatile() && db.expiry.peek_next_expiry(key).is_none() {
        return None;
    }
    let entry = db.live.get(key)?;
    let score = match policy {
        EvictionPolicy::AllKeysLru | EvictionPolicy::VolatileLru => entry.idle_secs(now_secs) as u64,
        EvictionPolicy::AllKeysLfu | EvictionPolicy::VolatileLfu => {
            (u8::MAX - entry.lfu_counter()) as u64
        }
        EvictionPolicy::VolatileTtl => {
            let ttl = db.expiry.ttl_ms(key, now_ms).unwrap_or(i64::MAX);
            // Soonest-to-expire scores highest; invert so a smaller TTL
            // yields a larger score.
            u64::MAX - ttl.max(0) as u64
        }
        EvictionPolicy::AllKeysRandom | EvictionPolicy::VolatileRandom => 1,
        EvictionPolicy::NoEviction => 0,
    };
    // LRU/LFU access meta must match the policy's family, or the score is
    // meaningless (spec invariant: the two schemes are never mixed).
    match (&entry.meta, policy) {
        (AccessMeta::Lru { .. }, EvictionPolicy::AllKeysLfu | EvictionPolicy::VolatileLfu) => None,
        (AccessMeta::Lfu { .. }, EvictionPolicy::AllKeysLru | EvictionPolicy::VolatileLru) => None,
        _ => Some(score),
    }
}

/// Runs one round of sampling + pool maintenance + eviction, freeing keys
/// until `used_memory` would fall at or below `maxmemory`, or the pool and
/// keyspace are exhausted. Returns the keys evicted, in eviction order.
pub fn evict_to_budget(
    db: &mut Database,
    pool: &mut EvictionPool,
    config: &EvictionConfig,
    mut used_memory: u64,
    maxmemory: u64,
    now_secs: u32,
    now_ms: WhenMs,
) -> Vec<Bytes> {
    let mut evicted = Vec::new();
    if config.policy == EvictionPolicy::NoEviction {
        return evicted;
    }
    let mut rng = rand::thread_rng();

    while used_memory > maxmemory {
        let sample: Vec<Bytes> = db.live.keys().cloned().choose_multiple(&mut rng, config.samples);
        if sample.is_empty() && pool.is_empty() {
            break;
        }
        let scored: Vec<(u64, Bytes)> = sample
            .into_iter()
            .filter_map(|k| score_key(db, config.policy, &k, now_secs, now_ms).map(|s| (s, k)))
            .collect();
        pool.merge(scored, config.pool_capacity);

        let Some(victim) = pool.pop_best() else { break };
        let freed = db.live.get(&victim).map(|e| e.estimated_size() as u64).unwrap_or(0);
        if db.delete(&victim, now_ms) {
            debug!(target: "kv::eviction", "evicted key, freed ~{freed} bytes");
            used_memory = used_memory.saturating_sub(freed);
            evicted.push(victim);
        }
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::entry::Entry;
    use crate::value::Value;

    fn seed(db: &mut Database, n: usize) {
        for i in 0..n {
            let mut e = Entry::new(Value::from_str(format!("v{i}")), AccessMeta::new_lru(0));
            e.touch_lru(i as u32);
            db.set(Bytes::from(format!("k{i}")), e);
        }
    }

    #[test]
    fn no_eviction_policy_never_evicts() {
        let mut db = Database::new();
        seed(&mut db, 10);
        let mut pool = EvictionPool::new();
        let config = EvictionConfig { policy: EvictionPolicy::NoEviction, ..Default::default() };
        let evicted = evict_to_budget(&mut db, &mut pool, &config, 1000, 10, 100, 0);
        assert!(evicted.is_empty());
    }

    #[test]
    fn all_keys_lru_evicts_until_under_budget() {
        let mut db = Database::new();
        seed(&mut db, 20);
        let mut pool = EvictionPool::new();
        let config = EvictionConfig { policy: EvictionPolicy::AllKeysLru, samples: 5, pool_capacity: 16 };

        let per_key = db.live.get(&Bytes::from("k0")).unwrap().estimated_size() as u64;
        let used = per_key * 20;
        let budget = per_key * 10;
        let evicted = evict_to_budget(&mut db, &mut pool, &config, used, budget, 1000, 0);
        assert!(!evicted.is_empty());
        assert!(db.db_size() <= 20);
    }

    #[test]
    fn volatile_policy_ignores_keys_without_ttl() {
        let mut db = Database::new();
        seed(&mut db, 5);
        let mut pool = EvictionPool::new();
        let config = EvictionConfig { policy: EvictionPolicy::VolatileLru, samples: 5, pool_capacity: 16 };
        let evicted = evict_to_budget(&mut db, &mut pool, &config, 1000, 10, 100, 0);
        assert!(evicted.is_empty(), "no keys carry a TTL, so nothing is eligible");
    }
}
