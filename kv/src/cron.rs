//! Cron / background maintenance loop (spec §4.8, component C8).
//!
//! Runs as a repeating `tokio::time::interval` tick (the teacher already
//! depends on `tokio` with the `time` feature) rather than a dedicated OS
//! thread, so embedders that already drive an async runtime don't need a
//! second one just for this engine.

use std::time::Duration;

use log::{debug, trace};
use tokio::time::{self, MissedTickBehavior};

use crate::expiry::SweepBudget;
use crate::keyspace::Keyspace;
use crate::mvcc::EpochGc;

/// Wall-clock period between cron ticks (spec §4.8 default: 10/second,
/// i.e. every 100ms, matching Redis's `hz` default of 10).
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct CronStats {
    pub ticks: u64,
    pub keys_expired: u64,
    pub subkeys_expired: u64,
}

impl Default for CronStats {
    fn default() -> Self {
        CronStats { ticks: 0, keys_expired: 0, subkeys_expired: 0 }
    }
}

/// One cron tick's worth of maintenance across every logical database:
/// slow expiry sweep and epoch advancement (for chain-compaction
/// bookkeeping) are driven from here; the caller supplies `now_ms` rather
/// than the cron loop reading the clock itself, keeping this function pure
/// and testable without real time passing. Secondary-store write-back
/// flush is driven separately by [`crate::storage::bridge::SecondaryBridge::drain`]
/// at the embedder's chosen period (spec §4.5 "periodic task").
pub fn tick(keyspace: &mut Keyspace, gc: &EpochGc, now_ms: i64, stats: &mut CronStats) {
    stats.ticks += 1;
    for db in keyspace.iter_mut() {
        let fired = db.expiry.fire_due(now_ms, SweepBudget::slow());
        for key in &fired.keys {
            db.delete(key, now_ms);
            stats.keys_expired += 1;
        }
        for (key, subkey) in &fired.subkeys {
            db.fire_subkey_expiry(key, subkey, now_ms);
            stats.subkeys_expired += 1;
        }
        if !fired.keys.is_empty() || !fired.subkeys.is_empty() {
            trace!(
                target: "kv::cron",
                "expired {} keys and {} subkeys this tick",
                fired.keys.len(),
                fired.subkeys.len()
            );
        }
    }
    gc.advance_epoch();
}

/// Drives [`tick`] forever on a `tokio` interval. Intended to be spawned
/// once per engine instance by the embedder; the core itself never spawns
/// tasks implicitly (spec §9: no ambient background threads the caller
/// didn't ask for).
pub async fn run(
    keyspace: std::sync::Arc<crate::concurrency::ExecutionLock<Keyspace>>,
    gc: EpochGc,
    period: Duration,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stats = CronStats::default();
    loop {
        interval.tick().await;
        let now_ms = wall_clock_ms();
        let mut guard = keyspace.acquire();
        tick(&mut guard, &gc, now_ms, &mut stats);
        drop(guard);
        debug!(target: "kv::cron", "tick {} complete, {} keys expired total", stats.ticks, stats.keys_expired);
    }
}

fn wall_clock_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::entry::{AccessMeta, Entry};
    use crate::value::Value;
    use bytes::Bytes;

    #[test]
    fn tick_expires_due_keys_across_every_database() {
        let mut keyspace = Keyspace::new(2);
        keyspace.db_mut(0).set(Bytes::from("k"), Entry::new(Value::from_str("v"), AccessMeta::new_lru(0)));
        keyspace.db_mut(0).expiry.set_expire(Bytes::from("k"), None, 100);
        keyspace.db_mut(1).set(Bytes::from("j"), Entry::new(Value::from_str("v"), AccessMeta::new_lru(0)));
        keyspace.db_mut(1).expiry.set_expire(Bytes::from("j"), None, 100);

        let gc = EpochGc::new();
        let mut stats = CronStats::default();
        tick(&mut keyspace, &gc, 1_000, &mut stats);

        assert_eq!(stats.keys_expired, 2);
        assert_eq!(stats.ticks, 1);
        assert!(keyspace.db(0).live.get(&Bytes::from("k")).is_none());
        assert!(keyspace.db(1).live.get(&Bytes::from("j")).is_none());
    }

    #[test]
    fn tick_fires_subkey_expiry_as_member_removal_not_key_delete() {
        let mut keyspace = Keyspace::new(1);
        let mut fields = indexmap::IndexMap::new();
        fields.insert(Bytes::from("f1"), Bytes::from("v1"));
        fields.insert(Bytes::from("f2"), Bytes::from("v2"));
        keyspace.db_mut(0).set(
            Bytes::from("h"),
            Entry::new(Value::from_hash(fields, &Default::default()), AccessMeta::new_lru(0)),
        );
        keyspace.db_mut(0).expiry.set_expire(Bytes::from("h"), Some(Bytes::from("f1")), 100);

        let gc = EpochGc::new();
        let mut stats = CronStats::default();
        tick(&mut keyspace, &gc, 1_000, &mut stats);

        assert_eq!(stats.subkeys_expired, 1);
        assert_eq!(stats.keys_expired, 0);
        match keyspace.db(0).lookup(&Bytes::from("h"), 1_000) {
            crate::keyspace::db::Lookup::Found(e) => match &e.value.data {
                crate::value::ValueData::Hash(fields) => {
                    assert!(!fields.contains_key(&Bytes::from("f1")));
                    assert!(fields.contains_key(&Bytes::from("f2")));
                }
                _ => panic!("expected hash"),
            },
            _ => panic!("key must still exist, only the field expired"),
        }
    }

    #[test]
    fn tick_advances_the_epoch() {
        let mut keyspace = Keyspace::new(1);
        let gc = EpochGc::new();
        let mut stats = CronStats::default();
        let before = gc.current_epoch();
        tick(&mut keyspace, &gc, 0, &mut stats);
        assert!(gc.current_epoch() > before);
    }
}
