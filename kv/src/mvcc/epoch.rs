//! Hand-rolled epoch bookkeeping for snapshot-chain reclamation (spec §4.4,
//! component C4/C9). The teacher's stack has no `crossbeam-epoch`, and
//! doesn't need one: chain nodes are already `Arc`-counted, so the borrow
//! checker gives us safe reclamation for free the moment the last
//! [`EpochPin`] referencing a generation drops. This type exists to make
//! that generation boundary observable — for the cron loop's chain
//! compaction pass and for `INFO`-style introspection — not to replace
//! `Arc`'s own bookkeeping with something unsafe.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct Inner {
    global_epoch: AtomicU64,
    active_pins: AtomicU64,
}

#[derive(Clone)]
pub struct EpochGc(Arc<Inner>);

impl Default for EpochGc {
    fn default() -> Self {
        Self::new()
    }
}

impl EpochGc {
    pub fn new() -> Self {
        EpochGc(Arc::new(Inner { global_epoch: AtomicU64::new(0), active_pins: AtomicU64::new(0) }))
    }

    /// Pins the current epoch for the lifetime of the returned guard. Every
    /// live [`crate::mvcc::snapshot::Snapshot`] holds one.
    pub fn pin(&self) -> EpochPin {
        self.0.active_pins.fetch_add(1, Ordering::AcqRel);
        EpochPin(self.clone())
    }

    /// Advances the global epoch, e.g. once per cron tick. Returns the new
    /// epoch value.
    pub fn advance_epoch(&self) -> u64 {
        self.0.global_epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn current_epoch(&self) -> u64 {
        self.0.global_epoch.load(Ordering::Acquire)
    }

    pub fn active_pins(&self) -> u64 {
        self.0.active_pins.load(Ordering::Acquire)
    }
}

pub struct EpochPin(EpochGc);

impl Drop for EpochPin {
    fn drop(&mut self) {
        self.0 .0.active_pins.fetch_sub(1, Ordering::AcqRel);
    }
}
