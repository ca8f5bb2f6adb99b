//! A keyspace map slot: payload + LRU/LFU meta + MVCC stamp (spec §3/§4.1).

use crate::value::Value;

/// 24-bit LRU/LFU meta field (spec §3), widened to native integer types for
/// convenience; the active [`crate::eviction::EvictionPolicy`] selects which
/// variant is meaningful and the two are never mixed within one process
/// lifetime (spec invariant (c)).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMeta {
    /// Truncated monotonic clock, in seconds, of last access.
    Lru { last_access_secs: u32 },
    /// Logarithmic access-frequency counter plus last-decrement time.
    Lfu { counter: u8, last_decay_min: u16 },
}

pub const LFU_INIT_VAL: u8 = 5;

impl AccessMeta {
    pub fn new_lru(now_secs: u32) -> Self {
        AccessMeta::Lru { last_access_secs: now_secs }
    }

    pub fn new_lfu(now_min: u16) -> Self {
        AccessMeta::Lfu { counter: LFU_INIT_VAL, last_decay_min: now_min }
    }
}

/// A map slot. Owns its [`Value`]; ref-counting for shared singletons and
/// non-owning borrows is tracked explicitly here rather than via `Rc`/`Arc`
/// strong-count, since the spec's sentinel values (shared-max, stack-local)
/// are policy markers the executor must be able to branch on, not just
/// memory-management bookkeeping.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Value,
    pub meta: AccessMeta,
    /// Attached only when an ancestor snapshot is live (component C4);
    /// `None` otherwise to save space, per spec §3 "MVCC timestamp".
    pub mvcc_tstamp: Option<u64>,
    /// `true` for values drawn from the shared-singleton pool (spec §4.1
    /// `share_if_eligible`): immutable, and ineligible for LRU/LFU tracking
    /// specific to this slot.
    pub shared: bool,
}

impl Entry {
    pub fn new(value: Value, meta: AccessMeta) -> Self {
        Entry { value, meta, mvcc_tstamp: None, shared: false }
    }

    pub fn with_stamp(mut self, stamp: u64) -> Self {
        self.mvcc_tstamp = Some(stamp);
        self
    }

    pub fn estimated_size(&self) -> usize {
        self.value.estimated_size() + std::mem::size_of::<Self>()
    }

    /// Updates idle-time tracking for LRU, or runs the logarithmic counter
    /// bump for LFU (spec §4.6 "LFU counter"). A no-op for shared entries,
    /// since those carry no meaningful per-slot access history.
    pub fn touch_lru(&mut self, now_secs: u32) {
        if self.shared {
            return;
        }
        if let AccessMeta::Lru { last_access_secs } = &mut self.meta {
            *last_access_secs = now_secs;
        }
    }

    pub fn touch_lfu(&mut self, now_min: u16, decay_time_min: u16, log_factor: f64) {
        if self.shared {
            return;
        }
        if let AccessMeta::Lfu { counter, last_decay_min } = &mut self.meta {
            let decay_periods = if decay_time_min == 0 {
                0
            } else {
                now_min.saturating_sub(*last_decay_min) / decay_time_min
            };
            if decay_periods > 0 {
                *counter = counter.saturating_sub(decay_periods.min(u16::from(u8::MAX)) as u8);
                *last_decay_min = now_min;
            }
            if *counter < u8::MAX {
                let base = counter.saturating_sub(LFU_INIT_VAL) as f64;
                let p = 1.0 / (base * log_factor + 1.0);
                if rand::random::<f64>() < p {
                    *counter = counter.saturating_add(1);
                }
            }
        }
    }

    pub fn idle_secs(&self, now_secs: u32) -> u32 {
        match self.meta {
            AccessMeta::Lru { last_access_secs } => now_secs.saturating_sub(last_access_secs),
            AccessMeta::Lfu { .. } => 0,
        }
    }

    pub fn lfu_counter(&self) -> u8 {
        match self.meta {
            AccessMeta::Lfu { counter, .. } => counter,
            AccessMeta::Lru { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn lru_touch_updates_idle_time() {
        let mut e = Entry::new(Value::from_str("v"), AccessMeta::new_lru(0));
        e.touch_lru(100);
        assert_eq!(e.idle_secs(150), 50);
    }

    #[test]
    fn shared_entries_ignore_touch() {
        let mut e = Entry::new(Value::from_str("v"), AccessMeta::new_lru(0));
        e.shared = true;
        e.touch_lru(999);
        assert_eq!(e.idle_secs(999), 999);
    }

    #[test]
    fn lfu_counter_starts_at_init_value() {
        let e = Entry::new(Value::from_str("v"), AccessMeta::new_lfu(0));
        assert_eq!(e.lfu_counter(), LFU_INIT_VAL);
    }
}
