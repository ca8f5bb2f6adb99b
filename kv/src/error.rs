//! Error taxonomy for the command pipeline (spec §7).
//!
//! Every variant carries the RESP-visible token collaborators parse
//! (`WRONGTYPE`, `NOPERM`, `OOM`, ...) via [`Error::token`]. `CResult<T>` is
//! the alias used throughout the crate, mirroring the teacher's `CResult`.

use thiserror::Error;

pub type CResult<T> = std::result::Result<T, Error>;

/// The eight error kinds from spec.md §7, plus the connection-level
/// `Internal`/`Parse` variants the teacher's codec module already raises.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed input: bad arity, unknown command.
    #[error("ERR {0}")]
    Protocol(String),

    /// Operation attempted on a key holding the wrong value type.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// ACL / permission denial.
    #[error("NOPERM {0}")]
    Permission(String),

    /// Key required to exist but does not.
    #[error("no such key")]
    NotFound,

    /// Resource exhaustion: OOM under `noeviction`, replica shortfall, etc.
    #[error("OOM {0}")]
    Resource(String),

    /// Transient server state: loading, master link down, cluster down.
    #[error("{0}")]
    TransientState(TransientToken, String),

    /// Cluster slot redirection.
    #[error("{0} {1}")]
    Redirect(&'static str, String),

    /// Invariant violation. Logged at WARNING; never silently swallowed.
    #[error("internal error: {0}")]
    Internal(String),

    /// Value could not be parsed into the shape a command requires
    /// (e.g. INCR on a non-integer string).
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// A transaction command was issued outside of MULTI/EXEC where that's
    /// invalid, or EXEC was called without a preceding MULTI.
    #[error("{0}")]
    Transaction(String),

    /// EXEC aborted because a command failed validation while queued.
    #[error("EXECABORT Transaction discarded because of previous errors")]
    ExecAbort,

    /// Lower-level (de)serialization failure in the secondary-store bridge.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O failure surfaced by a `SecondaryStore` implementation.
    #[error("io error: {0}")]
    Io(String),
}

/// Tokens for [`Error::TransientState`], matching §7 kind 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientToken {
    Loading,
    MasterDown,
    ClusterDown,
    Busy,
    NoScript,
}

impl std::fmt::Display for TransientToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransientToken::Loading => "LOADING",
            TransientToken::MasterDown => "MASTERDOWN",
            TransientToken::ClusterDown => "CLUSTERDOWN",
            TransientToken::Busy => "BUSY",
            TransientToken::NoScript => "NOSCRIPT",
        };
        write!(f, "{s}")
    }
}

impl Error {
    /// The leading RESP error token collaborators key off of (spec §6).
    pub fn token(&self) -> &str {
        match self {
            Error::Protocol(_) => "ERR",
            Error::WrongType => "WRONGTYPE",
            Error::Permission(_) => "NOPERM",
            Error::NotFound => "ERR",
            Error::Resource(_) => "OOM",
            Error::TransientState(t, _) => match t {
                TransientToken::Loading => "LOADING",
                TransientToken::MasterDown => "MASTERDOWN",
                TransientToken::ClusterDown => "CLUSTERDOWN",
                TransientToken::Busy => "BUSY",
                TransientToken::NoScript => "NOSCRIPT",
            },
            Error::Redirect(tok, _) => tok,
            Error::Internal(_) => "ERR",
            Error::NotAnInteger => "ERR",
            Error::Transaction(_) => "ERR",
            Error::ExecAbort => "EXECABORT",
            Error::Serialization(_) => "ERR",
            Error::Io(_) => "ERR",
        }
    }

    /// Whether this error should mark a MULTI transaction dirty rather than
    /// abort the connection (spec §7 propagation policy).
    pub fn is_transaction_dirty(&self) -> bool {
        matches!(
            self,
            Error::WrongType | Error::Permission(_) | Error::NotAnInteger
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for Error {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        Error::Serialization(err.to_string())
    }
}
