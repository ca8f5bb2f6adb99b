//! Snapshot creation/teardown (spec §4.4 `createSnapshot`/`endSnapshot`,
//! component C4). A snapshot freezes the live table as a new chain layer
//! and hands the caller a read-only handle; the live view keeps mutating
//! in a fresh, empty top layer so writers never block on an outstanding
//! reader (spec invariant I3).

use std::sync::Arc;

use bytes::Bytes;

use crate::keyspace::db::{Database, Lookup, SnapshotNode};
use crate::mvcc::epoch::{EpochGc, EpochPin};

pub struct Snapshot {
    node: Arc<SnapshotNode>,
    pub t_snap: u64,
    _pin: EpochPin,
}

impl Snapshot {
    /// Looks up `key` as of this snapshot's creation time, independent of
    /// any mutation the live view has undergone since.
    pub fn lookup(&self, key: &Bytes) -> Lookup {
        if let Some(e) = self.node.table.get(key) {
            return Lookup::Found(e.clone());
        }
        if self.node.tombstones.contains(key) {
            return Lookup::NotFound;
        }
        let mut node = self.node.parent.clone();
        while let Some(n) = node {
            if let Some(e) = n.table.get(key) {
                return Lookup::Found(e.clone());
            }
            if n.tombstones.contains(key) {
                return Lookup::NotFound;
            }
            node = n.parent.clone();
        }
        Lookup::NotFound
    }

    /// All keys visible through this snapshot, newest-layer-wins.
    pub fn iter_keys(&self) -> Vec<Bytes> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let mut node = Some(self.node.clone());
        let mut hidden: std::collections::HashSet<Bytes> = std::collections::HashSet::new();
        while let Some(n) = node {
            for k in n.table.keys() {
                if !hidden.contains(k) && seen.insert(k.clone()) {
                    out.push(k.clone());
                }
            }
            hidden.extend(n.tombstones.iter().cloned());
            node = n.parent.clone();
        }
        out
    }
}

/// Freezes `db`'s current live layer into a new chain node and returns a
/// handle to it. The live view is left with an empty top layer.
pub fn create_snapshot(db: &mut Database, gc: &EpochGc, t_snap: u64) -> Snapshot {
    let frozen_table = std::mem::take(&mut db.live);
    let frozen_tombstones = std::mem::take(&mut db.tombstones);
    let node = Arc::new(SnapshotNode {
        table: frozen_table,
        tombstones: frozen_tombstones,
        parent: db.parent.take(),
        t_snap,
    });
    db.parent = Some(node.clone());
    Snapshot { node, t_snap, _pin: gc.pin() }
}

/// Releases a snapshot and, if it was the last reference to its chain
/// layer, folds that layer's still-visible keys back into `db`'s live view
/// so the chain doesn't grow without bound across many short-lived
/// snapshots (spec §4.4 epoch-based reclamation).
pub fn end_snapshot(snapshot: Snapshot, db: &mut Database) {
    drop(snapshot);
    compact_chain(db);
}

fn compact_chain(db: &mut Database) {
    let Some(top) = db.parent.take() else { return };
    match Arc::try_unwrap(top) {
        Ok(node) => {
            for (k, v) in node.table.iter() {
                if !db.live.contains_key(k) && !db.tombstones.contains(k) {
                    db.live.insert(k.clone(), v.clone());
                }
            }
            db.parent = node.parent;
        }
        Err(arc) => {
            db.parent = Some(arc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::entry::{AccessMeta, Entry};
    use crate::value::Value;

    fn entry(s: &str) -> Entry {
        Entry::new(Value::from_str(s), AccessMeta::new_lru(0))
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let gc = EpochGc::new();
        let mut db = Database::new();
        db.set(Bytes::from("k"), entry("v1"));

        let snap = create_snapshot(&mut db, &gc, 1);
        db.set(Bytes::from("k"), entry("v2"));

        match snap.lookup(&Bytes::from("k")) {
            Lookup::Found(e) => assert!(e.value.equal(&Value::from_str("v1"))),
            _ => panic!("expected Found"),
        }
        match db.lookup(&Bytes::from("k"), 0) {
            Lookup::Found(e) => assert!(e.value.equal(&Value::from_str("v2"))),
            _ => panic!("expected Found"),
        }
    }

    #[test]
    fn ending_last_snapshot_folds_chain_back_into_live() {
        let gc = EpochGc::new();
        let mut db = Database::new();
        db.set(Bytes::from("a"), entry("1"));

        let snap = create_snapshot(&mut db, &gc, 1);
        assert!(db.parent.is_some());

        end_snapshot(snap, &mut db);
        assert!(db.parent.is_none());
        assert!(matches!(db.lookup(&Bytes::from("a"), 0), Lookup::Found(_)));
    }

    #[test]
    fn delete_after_snapshot_is_invisible_to_the_snapshot_but_visible_live() {
        let gc = EpochGc::new();
        let mut db = Database::new();
        db.set(Bytes::from("k"), entry("v"));

        let snap = create_snapshot(&mut db, &gc, 1);
        db.delete(&Bytes::from("k"), 0);

        assert!(matches!(snap.lookup(&Bytes::from("k")), Lookup::Found(_)));
        assert!(matches!(db.lookup(&Bytes::from("k"), 0), Lookup::NotFound));
    }
}
