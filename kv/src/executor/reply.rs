//! Reply values the executor produces (spec §6 "Command protocol").
//!
//! The core never builds RESP bytes itself — framing is an external
//! collaborator's job (spec.md §1 "Out of scope") — but it has to hand
//! that collaborator something richer than a plain string, since integers,
//! nil, and arrays all need to round-trip through RESP2/RESP3 without the
//! collaborator re-deriving "was this nil or an empty bulk string" from a
//! `String`. [`Reply`] is that typed handoff: a small closed sum over the
//! RESP type families spec §6 lists, restricted to the ones this
//! component's command surface actually produces.

use bytes::Bytes;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    SimpleString(&'static str),
    Integer(i64),
    Double(f64),
    Bulk(Bytes),
    Nil,
    Array(Vec<Reply>),
    Boolean(bool),
    /// An error embedded inside an `EXEC` array (spec §4.7 "Propagation":
    /// one queued command failing does not abort the others). Distinct
    /// from [`crate::error::Error`], which is how a command rejected
    /// *before* it ever runs (bad arity, OOM) is reported to the caller.
    Error(String),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::SimpleString("OK")
    }

    pub fn bulk(bytes: impl Into<Bytes>) -> Self {
        Reply::Bulk(bytes.into())
    }

    pub fn from_bool(b: bool) -> Self {
        Reply::Integer(if b { 1 } else { 0 })
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Reply::Error(msg.into())
    }
}
