//! Keyspace (spec §3/§4.3, component C3): the primary dictionary, its
//! tombstone overlay, and the per-key expiry and watch/block indices.

pub mod db;
pub mod dict;
pub mod entry;

pub use db::{Database, Lookup, SnapshotNode, Status, WaiterId};
pub use dict::IncrementalDict;
pub use entry::{AccessMeta, Entry, LFU_INIT_VAL};

/// The server-wide set of logical databases a client selects among by
/// index (spec §3 "Keyspace": "N logical databases (default 16)"). This is
/// the unit the global execution lock (component C9) actually guards —
/// every database, not just one — since the spec's single-writer
/// discipline applies across the whole process, not per database.
pub struct Keyspace {
    dbs: Vec<Database>,
}

impl Keyspace {
    pub fn new(count: usize) -> Self {
        Keyspace { dbs: (0..count.max(1)).map(|_| Database::new()).collect() }
    }

    pub fn len(&self) -> usize {
        self.dbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dbs.is_empty()
    }

    pub fn db(&self, index: usize) -> &Database {
        &self.dbs[index]
    }

    pub fn db_mut(&mut self, index: usize) -> &mut Database {
        &mut self.dbs[index]
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Database> {
        self.dbs.iter_mut()
    }
}
