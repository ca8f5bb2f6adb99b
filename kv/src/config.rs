//! Runtime configuration (spec §6, ambient per `SPEC_FULL.md` §1).
//!
//! Mirrors the teacher's `kv-cli::config::ConfigLoad` shape: a flat,
//! `serde`-deserializable struct of `Option<T>`/plain fields with sane
//! `Default`s, loaded from whatever format the embedder chooses (the core
//! never reads a config file itself — CLI/config-file parsing is out of
//! scope per spec.md §1).

use serde_derive::{Deserialize, Serialize};

use crate::eviction::EvictionPolicy;
use crate::storage::bridge::SecondaryMode;

/// Every configuration key the core consumes, per spec §6. Values a
/// runtime `CONFIG SET`-equivalent command would change are all plain
/// fields rather than `Cell`/atomics — the embedder owns synchronizing a
/// reconfigure with in-flight commands, the same way the executor's global
/// lock already serializes everything else (spec §9: "a single owned
/// structure passed by reference into the executor").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of logical databases (spec §3 default 16).
    pub databases: usize,

    /// Memory ceiling in bytes; `None` means unbounded (no eviction ever
    /// triggers from the memory-pressure loop).
    pub maxmemory: Option<u64>,
    pub maxmemory_policy: EvictionPolicy,
    /// `maxmemory-samples`: eviction-pool sampling draw width (spec §3
    /// default 5).
    pub maxmemory_samples: usize,
    /// Consecutive no-progress eviction iterations tolerated before OOM is
    /// raised (spec §4.6 "tenacity parameter (1..100)").
    pub eviction_tenacity: u8,

    /// Cron tick rate in Hz, 1..500 (spec §4.8 default 10).
    pub hz: u32,
    /// Whether `hz` may be raised automatically under client-count
    /// pressure (spec §6 `dynamic-hz`); the core only exposes the flag —
    /// the adaptive policy itself lives with the embedder's scheduler.
    pub dynamic_hz: bool,

    pub active_expire_enabled: bool,
    /// 0..9, higher spends more per-tick CPU budget on the expire sweep
    /// (spec §6 `active-expire-effort`).
    pub active_expire_effort: u8,

    /// `lazyfree-lazy-*` family: whether large deletions are offloaded to
    /// the async work queue rather than freed inline (spec §4.3
    /// "Asynchronous delete").
    pub lazyfree_lazy_expire: bool,
    pub lazyfree_lazy_eviction: bool,
    pub lazyfree_lazy_server_del: bool,
    pub lazyfree_lazy_user_del: bool,

    /// Whether an append-only propagation log is being maintained by a
    /// collaborator outside this crate; affects only whether the executor
    /// bothers building propagation records (spec §4.7 "Propagation").
    pub appendonly: bool,

    /// Secondary-store bridge mode; `None` means no secondary store is
    /// wired in and every lookup is keyspace-only (spec §4.5).
    pub secondary_mode: Option<SecondaryMode>,
    /// Write-back flush period, milliseconds (spec §6
    /// `storage-flush-period`).
    pub storage_flush_period_ms: u64,

    /// Tolerable gap, in snapshot-chain layers, before `create_snapshot`
    /// degrades a best-effort (`optional=true`) request rather than
    /// forcing a new layer (spec §6 `snapshot-slip`; see DESIGN.md for the
    /// exact interplay with `storage_flush_period_ms` the spec leaves as
    /// an open question).
    pub snapshot_slip: u32,
    /// Wall-clock age, milliseconds, after which an outstanding snapshot
    /// is eligible for eager background collapse (spec §4.4 "Staleness",
    /// default 500ms).
    pub snapshot_stale_after_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            databases: 16,
            maxmemory: None,
            maxmemory_policy: EvictionPolicy::NoEviction,
            maxmemory_samples: 5,
            eviction_tenacity: 10,
            hz: 10,
            dynamic_hz: true,
            active_expire_enabled: true,
            active_expire_effort: 1,
            lazyfree_lazy_expire: false,
            lazyfree_lazy_eviction: false,
            lazyfree_lazy_server_del: false,
            lazyfree_lazy_user_del: false,
            appendonly: false,
            secondary_mode: None,
            storage_flush_period_ms: 1_000,
            snapshot_slip: 1,
            snapshot_stale_after_ms: 500,
        }
    }
}

impl EngineConfig {
    /// `hz` clamped to the spec's legal range (§4.8: "1..500").
    pub fn tick_period(&self) -> std::time::Duration {
        let hz = self.hz.clamp(1, 500);
        std::time::Duration::from_millis(1000 / hz as u64)
    }
}
