//! The value model (spec §3/§4.1, component C1).
//!
//! A [`Value`] is a tagged payload plus an encoding tag, mirroring the
//! teacher's preference for a plain struct-of-fields over a class hierarchy
//! (cf. `storage::Status`, a flat status struct rather than a trait object).
//! Ref-counting and LRU/LFU bookkeeping live one level up, on
//! [`crate::keyspace::Entry`], since in Rust the natural owner of "how many
//! places point at this" is the map slot, not the payload enum itself.

use std::collections::{BTreeSet, HashSet, VecDeque};

use bytes::Bytes;
use indexmap::IndexMap;

/// Policy thresholds controlling one-way packed→tree encoding promotion.
/// Defaults match spec.md §4.1.
#[derive(Debug, Clone, Copy)]
pub struct EncodingThresholds {
    pub hash_max_entries: usize,
    pub hash_max_value_bytes: usize,
    pub zset_max_entries: usize,
    pub zset_max_value_bytes: usize,
    pub list_segment_size: usize,
}

impl Default for EncodingThresholds {
    fn default() -> Self {
        Self {
            hash_max_entries: 128,
            hash_max_value_bytes: 64,
            zset_max_entries: 128,
            zset_max_value_bytes: 64,
            list_segment_size: 128,
        }
    }
}

/// In-memory representation tag. Promotion is one-way within a value's
/// lifetime: once `HashTable`/`Skiplist`/`LinkedList` is reached, a
/// subsequent shrink never demotes back to the packed form (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    IntInline,
    EmbStr,
    Raw,
    IntSet,
    ListPack,
    LinkedList,
    HashTable,
    Skiplist,
    Stream,
    Module,
}

/// A stream entry ID: `{ms-time}-{sequence}`, ordered lexicographically by
/// (ms, seq) the way Redis streams order IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Stream {
    pub entries: std::collections::BTreeMap<StreamId, Vec<(Bytes, Bytes)>>,
    pub last_id: Option<StreamId>,
}

impl Stream {
    pub fn memory_usage(&self) -> usize {
        self.entries
            .values()
            .map(|fields| fields.iter().map(|(f, v)| f.len() + v.len()).sum::<usize>())
            .sum()
    }
}

/// Maps a score to a `u64` that sorts in the same order as the score,
/// so `(score_key, member)` tuples can live in a plain `BTreeSet` without
/// pulling in an `ordered-float` dependency the teacher's stack doesn't
/// carry. Redis disallows NaN scores, so this total order is sufficient.
fn score_key(score: f64) -> u64 {
    let bits = score.to_bits();
    if score.is_sign_negative() {
        !bits
    } else {
        bits | (1u64 << 63)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    by_member: IndexMap<Bytes, f64>,
    by_score: BTreeSet<(u64, Bytes)>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_member.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_member.is_empty()
    }

    /// Inserts or updates `member`'s score. Returns `true` if the member was
    /// newly added (mirrors `ZADD`'s "number of elements added" count).
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        if let Some(old) = self.by_member.insert(member.clone(), score) {
            self.by_score.remove(&(score_key(old), member.clone()));
            self.by_score.insert((score_key(score), member));
            false
        } else {
            self.by_score.insert((score_key(score), member));
            true
        }
    }

    pub fn remove(&mut self, member: &Bytes) -> bool {
        if let Some(score) = self.by_member.shift_remove(member) {
            self.by_score.remove(&(score_key(score), member.clone()));
            true
        } else {
            false
        }
    }

    pub fn score(&self, member: &Bytes) -> Option<f64> {
        self.by_member.get(member).copied()
    }

    /// Members with `min <= score <= max`, in ascending score order.
    pub fn range_by_score(&self, min: f64, max: f64) -> Vec<(Bytes, f64)> {
        self.by_score
            .range((score_key(min), Bytes::new())..)
            .take_while(|(k, _)| {
                let s = f64::from_bits(if k & (1u64 << 63) != 0 { k ^ (1u64 << 63) } else { !k });
                s <= max
            })
            .filter_map(|(k, m)| {
                let s = f64::from_bits(if k & (1u64 << 63) != 0 { k ^ (1u64 << 63) } else { !k });
                if s >= min && s <= max {
                    Some((m.clone(), s))
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.by_member
            .iter()
            .map(|(m, _)| m.len() + std::mem::size_of::<f64>())
            .sum()
    }
}

impl PartialEq for SortedSet {
    fn eq(&self, other: &Self) -> bool {
        self.by_member.len() == other.by_member.len()
            && self
                .by_member
                .iter()
                .all(|(m, s)| other.by_member.get(m) == Some(s))
    }
}

/// The tagged payload. One variant per spec.md §3 type.
#[derive(Debug, Clone)]
pub enum ValueData {
    Str(Bytes),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    Hash(IndexMap<Bytes, Bytes>),
    ZSet(SortedSet),
    Stream(Stream),
    /// Opaque payload owned by a module type; the core only moves it around.
    Module(Bytes),
}

impl ValueData {
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueData::Str(_) => "string",
            ValueData::List(_) => "list",
            ValueData::Set(_) => "set",
            ValueData::Hash(_) => "hash",
            ValueData::ZSet(_) => "zset",
            ValueData::Stream(_) => "stream",
            ValueData::Module(_) => "module",
        }
    }
}

/// A live value: payload + encoding tag. Ref-counting/LRU-LFU metadata is
/// tracked by the owning [`crate::keyspace::Entry`], not here (see module
/// doc comment).
#[derive(Debug, Clone)]
pub struct Value {
    pub data: ValueData,
    pub encoding: Encoding,
}

impl Value {
    pub fn from_str(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let encoding = if bytes.len() <= 20 && std::str::from_utf8(&bytes).ok()
            .and_then(|s| s.parse::<i64>().ok())
            .is_some()
        {
            Encoding::IntInline
        } else if bytes.len() <= 44 {
            Encoding::EmbStr
        } else {
            Encoding::Raw
        };
        Value { data: ValueData::Str(bytes), encoding }
    }

    pub fn from_list(items: VecDeque<Bytes>, thresholds: &EncodingThresholds) -> Self {
        let encoding = if items.len() <= thresholds.list_segment_size
            && items.iter().all(|i| i.len() <= thresholds.hash_max_value_bytes)
        {
            Encoding::ListPack
        } else {
            Encoding::LinkedList
        };
        Value { data: ValueData::List(items), encoding }
    }

    pub fn from_set(items: HashSet<Bytes>) -> Self {
        let all_ints = items.iter().all(|i| std::str::from_utf8(i).ok()
            .and_then(|s| s.parse::<i64>().ok())
            .is_some());
        let encoding = if all_ints { Encoding::IntSet } else { Encoding::HashTable };
        Value { data: ValueData::Set(items), encoding }
    }

    pub fn from_hash(fields: IndexMap<Bytes, Bytes>, thresholds: &EncodingThresholds) -> Self {
        let encoding = if fields.len() <= thresholds.hash_max_entries
            && fields.iter().all(|(k, v)| {
                k.len() <= thresholds.hash_max_value_bytes && v.len() <= thresholds.hash_max_value_bytes
            })
        {
            Encoding::ListPack
        } else {
            Encoding::HashTable
        };
        Value { data: ValueData::Hash(fields), encoding }
    }

    pub fn from_zset(set: SortedSet, thresholds: &EncodingThresholds) -> Self {
        let encoding = if set.len() <= thresholds.zset_max_entries
            && set
                .by_member
                .keys()
                .all(|m| m.len() <= thresholds.zset_max_value_bytes)
        {
            Encoding::ListPack
        } else {
            Encoding::Skiplist
        };
        Value { data: ValueData::ZSet(set), encoding }
    }

    /// Re-evaluates the encoding tag given the current payload size,
    /// enforcing the one-way promotion invariant: a value already promoted
    /// to a tree-ish encoding never reverts to a packed one (spec §4.1).
    pub fn try_encode(&mut self, thresholds: &EncodingThresholds) {
        let promoted = matches!(
            self.encoding,
            Encoding::HashTable | Encoding::Skiplist | Encoding::LinkedList
        );
        if promoted {
            return;
        }
        match &self.data {
            ValueData::Hash(fields) => {
                if fields.len() > thresholds.hash_max_entries
                    || fields
                        .iter()
                        .any(|(k, v)| k.len() > thresholds.hash_max_value_bytes || v.len() > thresholds.hash_max_value_bytes)
                {
                    self.encoding = Encoding::HashTable;
                }
            }
            ValueData::ZSet(set) => {
                if set.len() > thresholds.zset_max_entries
                    || set.by_member.keys().any(|m| m.len() > thresholds.zset_max_value_bytes)
                {
                    self.encoding = Encoding::Skiplist;
                }
            }
            ValueData::List(items) => {
                if items.len() > thresholds.list_segment_size {
                    self.encoding = Encoding::LinkedList;
                }
            }
            ValueData::Set(items) => {
                if self.encoding == Encoding::IntSet
                    && items
                        .iter()
                        .any(|i| std::str::from_utf8(i).ok().and_then(|s| s.parse::<i64>().ok()).is_none())
                {
                    self.encoding = Encoding::HashTable;
                }
            }
            _ => {}
        }
    }

    /// Materializes the payload for mutation. With this in-memory model the
    /// payload is always materialized, so this is a no-op hook kept for
    /// parity with spec.md's operation list (an on-disk/compressed backend
    /// would decompress here).
    pub fn try_decode(&self) -> &Value {
        self
    }

    pub fn dup(&self) -> Value {
        self.clone()
    }

    pub fn estimated_size(&self) -> usize {
        let payload = match &self.data {
            ValueData::Str(b) => b.len(),
            ValueData::List(l) => l.iter().map(|b| b.len()).sum(),
            ValueData::Set(s) => s.iter().map(|b| b.len()).sum(),
            ValueData::Hash(h) => h.iter().map(|(k, v)| k.len() + v.len()).sum(),
            ValueData::ZSet(z) => z.memory_usage(),
            ValueData::Stream(s) => s.memory_usage(),
            ValueData::Module(b) => b.len(),
        };
        payload + std::mem::size_of::<Value>()
    }

    pub fn equal(&self, other: &Value) -> bool {
        match (&self.data, &other.data) {
            (ValueData::Str(a), ValueData::Str(b)) => a == b,
            (ValueData::List(a), ValueData::List(b)) => a == b,
            (ValueData::Set(a), ValueData::Set(b)) => a == b,
            (ValueData::Hash(a), ValueData::Hash(b)) => a == b,
            (ValueData::ZSet(a), ValueData::ZSet(b)) => a == b,
            (ValueData::Module(a), ValueData::Module(b)) => a == b,
            _ => false,
        }
    }
}

/// Small-integer and fixed-reply sharing (spec §4.1 `share_if_eligible`).
/// Integers `0..=9999` are eligible; the caller is responsible for not
/// sharing when the active eviction policy needs distinct LRU/LFU meta per
/// entry (the shared singleton carries no per-entry meta by construction,
/// since [`Value`] itself never stores LRU/LFU fields — see module doc).
pub const SHARED_INTEGER_MAX: i64 = 9999;

pub fn share_if_eligible(value: Value) -> Value {
    if let ValueData::Str(ref bytes) = value.data {
        if let Ok(s) = std::str::from_utf8(bytes) {
            if let Ok(n) = s.parse::<i64>() {
                if (0..=SHARED_INTEGER_MAX).contains(&n) {
                    return Value { data: ValueData::Str(bytes.clone()), encoding: Encoding::IntInline };
                }
            }
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_strings_encode_inline() {
        let v = Value::from_str("12345");
        assert_eq!(v.encoding, Encoding::IntInline);
    }

    #[test]
    fn long_strings_encode_raw() {
        let v = Value::from_str("x".repeat(100));
        assert_eq!(v.encoding, Encoding::Raw);
    }

    #[test]
    fn hash_promotes_past_threshold_and_never_demotes() {
        let thresholds = EncodingThresholds::default();
        let mut fields = IndexMap::new();
        for i in 0..200 {
            fields.insert(Bytes::from(format!("f{i}")), Bytes::from("v"));
        }
        let mut v = Value::from_hash(fields, &thresholds);
        assert_eq!(v.encoding, Encoding::HashTable);

        if let ValueData::Hash(ref mut h) = v.data {
            h.clear();
            h.insert(Bytes::from("f"), Bytes::from("v"));
        }
        v.try_encode(&thresholds);
        assert_eq!(v.encoding, Encoding::HashTable, "encoding must not demote");
    }

    #[test]
    fn intset_promotes_to_hashtable_on_non_integer_member() {
        let mut set = HashSet::new();
        set.insert(Bytes::from("1"));
        set.insert(Bytes::from("2"));
        let mut v = Value::from_set(set);
        assert_eq!(v.encoding, Encoding::IntSet);

        if let ValueData::Set(ref mut s) = v.data {
            s.insert(Bytes::from("notanumber"));
        }
        v.try_encode(&EncodingThresholds::default());
        assert_eq!(v.encoding, Encoding::HashTable);
    }

    #[test]
    fn zset_range_by_score_is_ascending() {
        let mut z = SortedSet::new();
        z.insert(Bytes::from("a"), 1.0);
        z.insert(Bytes::from("b"), 2.0);
        z.insert(Bytes::from("c"), 3.0);
        let r = z.range_by_score(f64::NEG_INFINITY, f64::INFINITY);
        assert_eq!(
            r.into_iter().map(|(m, _)| m).collect::<Vec<_>>(),
            vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]
        );
    }

    #[test]
    fn sadd_is_idempotent() {
        let mut set = HashSet::new();
        set.insert(Bytes::from("x"));
        let v = Value::from_set(set);
        if let ValueData::Set(ref s) = v.data {
            assert_eq!(s.len(), 1);
        }
    }

    #[test]
    fn shared_small_integers_round_trip() {
        let v = Value::from_str("42");
        let shared = share_if_eligible(v);
        assert_eq!(shared.encoding, Encoding::IntInline);
    }
}
