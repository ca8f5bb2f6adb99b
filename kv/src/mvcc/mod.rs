//! Snapshot / MVCC layer (spec §3/§4.4, component C4).

pub mod clock;
pub mod epoch;
pub mod snapshot;

pub use clock::{MvccClock, Timestamp};
pub use epoch::{EpochGc, EpochPin};
pub use snapshot::{create_snapshot, end_snapshot, Snapshot};
