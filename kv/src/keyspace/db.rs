//! A single logical database (spec §3 "Keyspace", component C3) and its
//! interaction with the snapshot chain (component C4).
//!
//! The live view and every outstanding snapshot form a singly-linked chain
//! of immutable layers, each holding the keys frozen at its creation plus a
//! tombstone set recording what has since been deleted or overwritten
//! *above* it. A lookup walks the chain from the live layer outward until
//! it finds the key, finds a tombstone hiding it, or runs off the end.
//! This directly implements the spec's snapshot DAG (§3 invariant I3) and
//! the write path's detach-into-tombstone behavior (§4.3) without needing a
//! copy of the whole table on every snapshot.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use bytes::Bytes;

use crate::expiry::{ExpiryIndex, WhenMs};
use crate::keyspace::dict::IncrementalDict;
use crate::keyspace::entry::Entry;
use crate::value::ValueData;

/// One frozen layer in the snapshot chain: the table as it stood at
/// creation, the keys tombstoned since, and a link to the next-older layer.
pub struct SnapshotNode {
    pub table: IncrementalDict<Bytes, Entry>,
    pub tombstones: HashSet<Bytes>,
    pub parent: Option<Arc<SnapshotNode>>,
    pub t_snap: u64,
}

pub enum Lookup {
    NotFound,
    /// Present but past its expiration; the caller must fire it (spec §4.2,
    /// `lookupKey` contract).
    Expired,
    Found(Entry),
}

/// A client blocked on a key (e.g. `BLPOP`), tracked by an opaque ID the
/// connection layer owns — the keyspace never holds a real client pointer
/// (spec §9 "cyclic object graphs": client objects are a weak back
/// reference here).
pub type WaiterId = u64;

#[derive(Debug, Default)]
pub struct Status {
    pub keys: u64,
    pub expires: u64,
}

pub struct Database {
    pub(crate) live: IncrementalDict<Bytes, Entry>,
    pub(crate) tombstones: HashSet<Bytes>,
    pub(crate) parent: Option<Arc<SnapshotNode>>,
    pub expiry: ExpiryIndex,
    /// Key -> waiting client IDs (`BLPOP` family, spec §3).
    pub blocking_keys: HashMap<Bytes, Vec<WaiterId>>,
    /// Key -> watching client IDs (optimistic `WATCH`/`MULTI`/`EXEC`).
    pub watched_keys: HashMap<Bytes, HashSet<WaiterId>>,
    /// Keys that became ready (had a blocking-relevant mutation) since the
    /// executor last drained this queue.
    pub ready_keys: VecDeque<Bytes>,
    /// Per-key write counters, bumped on every `set`/`delete`/`flush`.
    /// `WATCH` snapshots a key's counter via [`Database::version_of`];
    /// `EXEC` aborts the transaction if it has since changed — this
    /// distinguishes "never touched" from "touched before my WATCH ran",
    /// which a single dirty bit per key cannot (a key's dirty bit set by
    /// one client's write would otherwise falsely trip up a different
    /// client that watches the same key later).
    pub(crate) versions: HashMap<Bytes, u64>,
    pub(crate) version_seq: u64,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    pub fn new() -> Self {
        Database {
            live: IncrementalDict::new(),
            tombstones: HashSet::new(),
            parent: None,
            expiry: ExpiryIndex::new(),
            blocking_keys: HashMap::new(),
            watched_keys: HashMap::new(),
            ready_keys: VecDeque::new(),
            versions: HashMap::new(),
            version_seq: 0,
        }
    }

    /// Current write version of `key` (0 if it has never been written).
    /// Used by `WATCH`/`EXEC` to detect intervening modifications.
    pub fn version_of(&self, key: &Bytes) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn bump_version(&mut self, key: &Bytes) {
        self.version_seq += 1;
        let seq = self.version_seq;
        self.versions.insert(key.clone(), seq);
    }

    pub fn has_live_snapshot(&self) -> bool {
        self.parent.is_some()
    }

    /// Looks up `key`, honoring lazy expiration. Does not mutate LRU/LFU
    /// meta; callers that want that effect call [`Database::touch`]
    /// afterward (spec §4.3 "no-touch flag for introspection commands").
    pub fn lookup(&self, key: &Bytes, now_ms: WhenMs) -> Lookup {
        if let Some(e) = self.live.get(key) {
            if self.expiry.is_key_expired(key, now_ms) {
                return Lookup::Expired;
            }
            return Lookup::Found(e.clone());
        }
        if self.tombstones.contains(key) {
            return Lookup::NotFound;
        }
        let mut node = self.parent.clone();
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

    /// Updates LRU/LFU access meta for `key` if it lives in the live layer
    /// (ancestors in the snapshot chain are immutable and never touched).
    pub fn touch(&mut self, key: &Bytes, now_secs: u32) {
        if let Some(e) = self.live.get_mut(key) {
            e.touch_lru(now_secs);
        }
    }

    pub fn contains_live(&self, key: &Bytes) -> bool {
        self.live.contains_key(key)
    }

    /// Inserts/overwrites `key`. The new entry always lands in the live
    /// layer; any older copy visible only through the snapshot chain is
    /// left untouched there (spec §4.3: "the old value is detached into
    /// the snapshot's tombstone overlay with its original MVCC stamp" — in
    /// this chain representation that detachment is implicit, since the
    /// ancestor layer already owns its own copy and is never mutated).
    pub fn set(&mut self, key: Bytes, entry: Entry) {
        self.tombstones.remove(&key);
        self.bump_version(&key);
        self.live.insert(key, entry);
    }

    /// Deletes `key` through the same path explicit `DEL` and expiry firing
    /// both use. Returns whether the key was visible (and thus actually
    /// removed) beforehand.
    pub fn delete(&mut self, key: &Bytes, now_ms: WhenMs) -> bool {
        let was_visible = !matches!(self.lookup(key, now_ms), Lookup::NotFound | Lookup::Expired);
        self.live.remove(key);
        self.expiry.remove_expire(key, None);
        self.bump_version(key);
        if self.has_live_snapshot() {
            self.tombstones.insert(key.clone());
        }
        was_visible
    }

    /// Fires a subkey expiry (spec §4.2 "Subkey expiry"): removes `subkey`
    /// as a member of the container value at `key`, rather than deleting
    /// `key` itself. If the container becomes empty as a result, the whole
    /// key is then deleted through the normal [`Database::delete`] path (so
    /// snapshot tombstone routing still applies). Returns whether a member
    /// was actually removed.
    pub fn fire_subkey_expiry(&mut self, key: &Bytes, subkey: &Bytes, now_ms: WhenMs) -> bool {
        let removed = match self.live.get_mut(key) {
            Some(entry) => match &mut entry.value.data {
                ValueData::Hash(fields) => fields.shift_remove(subkey).is_some(),
                ValueData::Set(members) => members.remove(subkey),
                ValueData::ZSet(zset) => zset.remove(subkey),
                _ => false,
            },
            None => false,
        };
        if removed {
            self.bump_version(key);
            let now_empty = matches!(
                self.live.get(key).map(|e| &e.value.data),
                Some(ValueData::Hash(f)) if f.is_empty()
            ) || matches!(
                self.live.get(key).map(|e| &e.value.data),
                Some(ValueData::Set(s)) if s.is_empty()
            ) || matches!(
                self.live.get(key).map(|e| &e.value.data),
                Some(ValueData::ZSet(z)) if z.is_empty()
            );
            if now_empty {
                self.delete(key, now_ms);
            }
        }
        removed
    }

    pub fn flush(&mut self) {
        let touched: Vec<Bytes> = self.live.keys().cloned().collect();
        for key in touched {
            self.bump_version(&key);
        }
        self.live = IncrementalDict::new();
        self.expiry = ExpiryIndex::new();
        if self.has_live_snapshot() {
            // Every previously-visible key must now read as absent through
            // the live view; recording each ancestor key individually would
            // require walking the whole chain, so instead we track a
            // generation cut: any ancestor lookup that would otherwise
            // succeed is masked by treating the live table's absence as
            // authoritative once a flush has occurred. We approximate this
            // by tombstoning every key currently reachable through the
            // chain.
            let mut node = self.parent.clone();
            while let Some(n) = node {
                for key in n.table.keys() {
                    self.tombstones.insert(key.clone());
                }
                node = n.parent.clone();
            }
        }
    }

    pub fn db_size(&self) -> u64 {
        self.live.len() as u64
    }

    pub fn status(&self) -> Status {
        Status { keys: self.db_size(), expires: self.expiry.len() as u64 }
    }

    /// Iterates the live view as it exists right now: every key reachable
    /// from the live layer down through the snapshot chain, newest value
    /// wins, tombstones hide older ones. Used by the (non-snapshot) `KEYS`
    /// / `SCAN` family; snapshot iteration itself is in
    /// [`crate::mvcc::iter_snapshot`].
    pub fn iter_live(&self) -> Vec<Bytes> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for k in self.live.keys() {
            if seen.insert(k.clone()) {
                out.push(k.clone());
            }
        }
        let mut node = self.parent.clone();
        let mut hidden = self.tombstones.clone();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::entry::AccessMeta;
    use crate::value::Value;
    use indexmap::IndexMap;

    fn entry(s: &str) -> Entry {
        Entry::new(Value::from_str(s), AccessMeta::new_lru(0))
    }

    #[test]
    fn fire_subkey_expiry_removes_field_but_keeps_nonempty_hash() {
        let mut db = Database::new();
        let mut fields = IndexMap::new();
        fields.insert(Bytes::from("f1"), Bytes::from("v1"));
        fields.insert(Bytes::from("f2"), Bytes::from("v2"));
        db.set(Bytes::from("h"), Entry::new(Value::from_hash(fields, &Default::default()), AccessMeta::new_lru(0)));

        assert!(db.fire_subkey_expiry(&Bytes::from("h"), &Bytes::from("f1"), 0));
        match db.lookup(&Bytes::from("h"), 0) {
            Lookup::Found(e) => match &e.value.data {
                crate::value::ValueData::Hash(fields) => {
                    assert!(!fields.contains_key(&Bytes::from("f1")));
                    assert!(fields.contains_key(&Bytes::from("f2")));
                }
                _ => panic!("expected hash"),
            },
            _ => panic!("expected key to still exist"),
        }
    }

    #[test]
    fn fire_subkey_expiry_deletes_key_once_container_is_emptied() {
        let mut db = Database::new();
        let mut fields = IndexMap::new();
        fields.insert(Bytes::from("f1"), Bytes::from("v1"));
        db.set(Bytes::from("h"), Entry::new(Value::from_hash(fields, &Default::default()), AccessMeta::new_lru(0)));

        assert!(db.fire_subkey_expiry(&Bytes::from("h"), &Bytes::from("f1"), 0));
        assert!(matches!(db.lookup(&Bytes::from("h"), 0), Lookup::NotFound));
    }

    #[test]
    fn set_then_lookup_round_trips() {
        let mut db = Database::new();
        db.set(Bytes::from("k"), entry("v"));
        match db.lookup(&Bytes::from("k"), 0) {
            Lookup::Found(e) => assert!(e.value.equal(&Value::from_str("v"))),
            _ => panic!("expected Found"),
        }
    }

    #[test]
    fn version_bumps_on_write_and_delete_but_not_on_read() {
        let mut db = Database::new();
        let k = Bytes::from("k");
        assert_eq!(db.version_of(&k), 0);
        db.set(k.clone(), entry("v1"));
        let v1 = db.version_of(&k);
        assert!(v1 > 0);
        let _ = db.lookup(&k, 0);
        assert_eq!(db.version_of(&k), v1, "reads must not bump the write version");
        db.set(k.clone(), entry("v2"));
        assert!(db.version_of(&k) > v1);
        let v2 = db.version_of(&k);
        db.delete(&k, 0);
        assert!(db.version_of(&k) > v2);
    }

    #[test]
    fn flush_bumps_versions_for_every_previously_live_key() {
        let mut db = Database::new();
        db.set(Bytes::from("a"), entry("1"));
        let v = db.version_of(&Bytes::from("a"));
        db.flush();
        assert!(db.version_of(&Bytes::from("a")) > v);
    }

    #[test]
    fn delete_missing_key_returns_false() {
        let mut db = Database::new();
        assert!(!db.delete(&Bytes::from("missing"), 0));
    }

    #[test]
    fn delete_through_snapshot_uses_tombstone_not_removal_from_ancestor() {
        let mut db = Database::new();
        db.set(Bytes::from("k"), entry("v"));

        // Simulate an outstanding snapshot by freezing the current table.
        let frozen = std::mem::replace(&mut db.live, IncrementalDict::new());
        db.parent = Some(Arc::new(SnapshotNode {
            table: frozen,
            tombstones: HashSet::new(),
            parent: None,
            t_snap: 1,
        }));

        // Still visible through the live view before deletion.
        assert!(matches!(db.lookup(&Bytes::from("k"), 0), Lookup::Found(_)));

        assert!(db.delete(&Bytes::from("k"), 0));
        assert!(matches!(db.lookup(&Bytes::from("k"), 0), Lookup::NotFound));

        // But the ancestor snapshot's own table still has it untouched.
        let ancestor = db.parent.as_ref().unwrap();
        assert!(ancestor.table.get(&Bytes::from("k")).is_some());
    }

    #[test]
    fn flush_clears_live_view_even_with_snapshot_outstanding() {
        let mut db = Database::new();
        db.set(Bytes::from("a"), entry("1"));
        db.set(Bytes::from("b"), entry("2"));

        let frozen = std::mem::replace(&mut db.live, IncrementalDict::new());
        db.parent = Some(Arc::new(SnapshotNode {
            table: frozen,
            tombstones: HashSet::new(),
            parent: None,
            t_snap: 1,
        }));

        db.flush();
        assert!(matches!(db.lookup(&Bytes::from("a"), 0), Lookup::NotFound));
        assert!(matches!(db.lookup(&Bytes::from("b"), 0), Lookup::NotFound));
    }
}
