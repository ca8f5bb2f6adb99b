#![allow(non_camel_case_types)]

//! An in-memory, Redis-compatible key-value engine core: N logical
//! databases, a typed value model with one-way encoding promotion, MVCC
//! snapshots over a tombstone-overlaid chain, active and lazy expiration,
//! approximated LRU/LFU eviction, a command executor with `MULTI`/`EXEC`
//! transactional buffering, and a write-through/write-back bridge to an
//! optional secondary store.
//!
//! Wire-protocol framing, clustering, replication, and persistence to an
//! append-only log are an embedder's job; this crate is the engine a RESP
//! server, an embedded cache, or a test harness sits on top of.
//!
//! ## Getting started
//!
//! ```rust
//! use bytes::Bytes;
//! use kv::config::EngineConfig;
//! use kv::core::Engine;
//! use kv::executor::transaction::ClientState;
//!
//! fn main() {
//!     let engine: Engine = Engine::new(EngineConfig::default());
//!     let mut client = ClientState::new(0);
//!
//!     engine
//!         .execute(&mut client, "SET", vec![Bytes::from("greeting"), Bytes::from("hello")], 0)
//!         .unwrap();
//!     let reply = engine.execute(&mut client, "GET", vec![Bytes::from("greeting")], 0).unwrap();
//!     assert_eq!(reply, kv::executor::reply::Reply::Bulk(Bytes::from("hello")));
//! }
//! ```

pub mod codec;
pub mod concurrency;
pub mod config;
pub mod core;
pub mod cron;
pub mod error;
pub mod eviction;
pub mod executor;
pub mod expiry;
pub mod keyspace;
pub mod mvcc;
pub mod storage;
pub mod value;
