//! Write-through / write-back glue between the keyspace and a
//! [`SecondaryStore`] (spec §4.5).
//!
//! Two policies are supported, selected by `EngineConfig::secondary_mode`
//! (spec §6):
//! - `WriteThrough`: every mutation is pushed to the store synchronously
//!   before the command returns.
//! - `WriteBack`: mutations are buffered and flushed by the cron loop
//!   (component C8), trading durability latency for throughput.

use bytes::Bytes;
use log::{trace, warn};
use serde_derive::{Deserialize, Serialize};

use crate::codec::bytes_codec::BytesCodec;
use crate::error::CResult;
use crate::storage::engine::SecondaryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecondaryMode {
    WriteThrough,
    WriteBack,
}

/// On-the-wire record stored in the secondary backend: the raw encoded
/// value plus enough metadata to reconstruct an `Entry` on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeRecord {
    pub payload: Vec<u8>,
    pub mvcc_tstamp: Option<u64>,
    pub expire_at_ms: Option<i64>,
}

pub struct SecondaryBridge<S: SecondaryStore> {
    store: S,
    mode: SecondaryMode,
    codec: BytesCodec,
    pending: Vec<(Bytes, Option<BridgeRecord>)>,
}

impl<S: SecondaryStore> SecondaryBridge<S> {
    pub fn new(store: S, mode: SecondaryMode) -> Self {
        SecondaryBridge { store, mode, codec: BytesCodec::new(), pending: Vec::new() }
    }

    /// Stages (or immediately applies, under `WriteThrough`) an upsert.
    pub fn put(&mut self, key: Bytes, record: BridgeRecord) -> CResult<()> {
        match self.mode {
            SecondaryMode::WriteThrough => {
                let bytes = self.codec.encode(&record)?;
                self.store.set(&key, bytes)?;
                Ok(())
            }
            SecondaryMode::WriteBack => {
                self.pending.push((key, Some(record)));
                Ok(())
            }
        }
    }

    pub fn delete(&mut self, key: Bytes) -> CResult<()> {
        match self.mode {
            SecondaryMode::WriteThrough => {
                self.store.delete(&key)?;
                Ok(())
            }
            SecondaryMode::WriteBack => {
                self.pending.push((key, None));
                Ok(())
            }
        }
    }

    pub fn get(&mut self, key: &[u8]) -> CResult<Option<BridgeRecord>> {
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(self.codec.decode_bytes(&bytes, true)?)),
            None => Ok(None),
        }
    }

    /// Drains the write-back queue into the store; a no-op under
    /// `WriteThrough`. Called once per cron tick (spec §4.8).
    pub fn drain(&mut self) -> CResult<usize> {
        let n = self.pending.len();
        for (key, record) in self.pending.drain(..) {
            match record {
                Some(r) => {
                    let bytes = self.codec.encode(&r)?;
                    if let Err(e) = self.store.set(&key, bytes) {
                        warn!(target: "kv::store", "write-back failed for key: {e}");
                    }
                }
                None => {
                    if let Err(e) = self.store.delete(&key) {
                        warn!(target: "kv::store", "write-back delete failed: {e}");
                    }
                }
            }
        }
        if n > 0 {
            trace!(target: "kv::store", "drained {n} write-back records");
            self.store.flush()?;
        }
        Ok(n)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryProvider;

    #[test]
    fn write_through_applies_immediately() {
        let mut bridge = SecondaryBridge::new(InMemoryProvider::new(), SecondaryMode::WriteThrough);
        bridge
            .put(Bytes::from("k"), BridgeRecord { payload: vec![1, 2, 3], mvcc_tstamp: None, expire_at_ms: None })
            .unwrap();
        let got = bridge.get(b"k").unwrap().unwrap();
        assert_eq!(got.payload, vec![1, 2, 3]);
    }

    #[test]
    fn write_back_buffers_until_drain() {
        let mut bridge = SecondaryBridge::new(InMemoryProvider::new(), SecondaryMode::WriteBack);
        bridge
            .put(Bytes::from("k"), BridgeRecord { payload: vec![9], mvcc_tstamp: None, expire_at_ms: None })
            .unwrap();
        assert!(bridge.get(b"k").unwrap().is_none());
        assert_eq!(bridge.pending_len(), 1);

        let n = bridge.drain().unwrap();
        assert_eq!(n, 1);
        assert_eq!(bridge.get(b"k").unwrap().unwrap().payload, vec![9]);
    }
}
