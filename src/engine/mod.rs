//! Transfer Engine (spec §4.C): the UWS job state machine, synchronous and
//! asynchronous transfer execution, and startup recovery.

pub mod jobs;
pub mod transfer_engine;
pub mod ulid;

pub use transfer_engine::{SyncOutcome, TransferEngine};
