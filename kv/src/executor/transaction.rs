//! Per-connection transaction state: `MULTI`/`EXEC`/`DISCARD`/`WATCH`
//! buffering (spec §4.7 "Transactional buffering (MULTI/EXEC)").
//!
//! The keyspace itself stays oblivious to transactions — only a per-key
//! write version (`Database::version_of`) is consulted at `EXEC` time to
//! detect an intervening write to a watched key. Everything else (the
//! queue of pending commands, the dirty flag) is connection-local state,
//! owned by whatever holds a [`ClientState`] — the embedder's per-connection
//! object, not this crate.

use bytes::Bytes;

/// One key a client is watching, pinned to the database it was watched in
/// (a client can `SELECT` between `WATCH` and `EXEC`, though doing so is
/// unusual) and the write version observed at `WATCH` time.
#[derive(Debug, Clone)]
pub struct WatchedKey {
    pub db_index: usize,
    pub key: Bytes,
    pub version_at_watch: u64,
}

#[derive(Debug, Clone)]
pub struct QueuedCommand {
    pub name: String,
    pub args: Vec<Bytes>,
}

/// Connection-local command-execution state (spec §4.7). Not `Clone`:
/// a connection owns exactly one of these for its lifetime.
#[derive(Debug, Default)]
pub struct ClientState {
    pub db_index: usize,
    in_multi: bool,
    queue: Vec<QueuedCommand>,
    /// Set when a command is rejected at enqueue time (unknown name, bad
    /// arity); `EXEC` then returns `EXECABORT` without running anything
    /// (spec §4.7, spec §7 propagation policy).
    dirty: bool,
    watches: Vec<WatchedKey>,
}

impl ClientState {
    pub fn new(db_index: usize) -> Self {
        ClientState { db_index, ..Default::default() }
    }

    pub fn in_multi(&self) -> bool {
        self.in_multi
    }

    pub fn begin_multi(&mut self) {
        self.in_multi = true;
        self.queue.clear();
        self.dirty = false;
    }

    /// Enqueues a command under an open `MULTI`. `arity_known_bad` lets the
    /// caller flag a validation failure it already detected (unknown
    /// command name or wrong arity) without storing the rejected command.
    pub fn enqueue(&mut self, name: String, args: Vec<Bytes>, arity_known_bad: bool) {
        if arity_known_bad {
            self.dirty = true;
            return;
        }
        self.queue.push(QueuedCommand { name, args });
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn queued(&self) -> &[QueuedCommand] {
        &self.queue
    }

    /// Ends the transaction (whether via `EXEC` or `DISCARD`), clearing
    /// queue, dirty flag, and watches.
    pub fn end_multi(&mut self) -> Vec<QueuedCommand> {
        self.in_multi = false;
        self.dirty = false;
        self.watches.clear();
        std::mem::take(&mut self.queue)
    }

    pub fn watch(&mut self, db_index: usize, key: Bytes, version_at_watch: u64) {
        self.watches.push(WatchedKey { db_index, key, version_at_watch });
    }

    pub fn unwatch(&mut self) {
        self.watches.clear();
    }

    pub fn watches(&self) -> &[WatchedKey] {
        &self.watches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_then_end_multi_drains_the_queue() {
        let mut c = ClientState::new(0);
        c.begin_multi();
        c.enqueue("INCR".into(), vec![Bytes::from("a")], false);
        c.enqueue("INCR".into(), vec![Bytes::from("a")], false);
        assert_eq!(c.queued().len(), 2);
        let drained = c.end_multi();
        assert_eq!(drained.len(), 2);
        assert!(c.queued().is_empty());
        assert!(!c.in_multi());
    }

    #[test]
    fn bad_enqueue_marks_dirty_without_queuing() {
        let mut c = ClientState::new(0);
        c.begin_multi();
        c.enqueue("NOTACOMMAND".into(), vec![], true);
        assert!(c.is_dirty());
        assert!(c.queued().is_empty());
    }

    #[test]
    fn end_multi_clears_watches() {
        let mut c = ClientState::new(0);
        c.watch(0, Bytes::from("k"), 1);
        c.begin_multi();
        c.end_multi();
        assert!(c.watches().is_empty());
    }
}
