//! UWS job phases and the durable job record.

use chrono::{DateTime, Utc};

use crate::error::VoSpaceError;
use crate::model::transfer::Protocol;

/// The UWS phase of a transfer job (spec §3.5).
///
/// `PENDING < QUEUED < EXECUTING < COMPLETED` is the monotonic main chain;
/// `ABORTED` and `ERROR` are side-exits reachable from any non-terminal
/// phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pending,
    Queued,
    Executing,
    Completed,
    Aborted,
    Error,
}

impl Phase {
    /// Terminal phases are immutable: no further transition is legal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Aborted | Phase::Error)
    }

    /// Position along the main chain, for jobs not in a side-exit phase.
    /// Side-exit phases have no position on the chain.
    fn chain_ordinal(&self) -> Option<u8> {
        match self {
            Phase::Pending => Some(0),
            Phase::Queued => Some(1),
            Phase::Executing => Some(2),
            Phase::Completed => Some(3),
            Phase::Aborted | Phase::Error => None,
        }
    }

    /// Whether `self -> next` is a legal phase transition: strictly forward
    /// along the main chain, or to `Aborted`/`Error` from any non-terminal
    /// phase.
    pub fn can_transition_to(&self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Phase::Aborted | Phase::Error) {
            return true;
        }
        match (self.chain_ordinal(), next.chain_ordinal()) {
            (Some(from), Some(to)) => to == from + 1,
            _ => false,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Pending => "PENDING",
            Phase::Queued => "QUEUED",
            Phase::Executing => "EXECUTING",
            Phase::Completed => "COMPLETED",
            Phase::Aborted => "ABORTED",
            Phase::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Phase {
    type Err = VoSpaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Phase::Pending),
            "QUEUED" => Ok(Phase::Queued),
            "EXECUTING" => Ok(Phase::Executing),
            "COMPLETED" => Ok(Phase::Completed),
            "ABORTED" => Ok(Phase::Aborted),
            "ERROR" => Ok(Phase::Error),
            other => Err(VoSpaceError::InternalError(format!("unknown phase: {other}"))),
        }
    }
}

/// The durable record of an in-flight (or finished) transfer (spec §3.5).
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub owner: String,
    pub phase: Phase,
    pub transfer_xml: String,
    pub results: Vec<Protocol>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Job {
    /// Results (endpoints produced by a transfer) are readable only once
    /// the job has reached at least `EXECUTING` (spec §3.5). `started_at`
    /// is set exactly when a job enters `EXECUTING`, so it doubles as the
    /// "has this job ever reached EXECUTING" marker even after a later
    /// `ABORTED`/`ERROR` side-exit.
    pub fn results_visible(&self) -> bool {
        self.started_at.is_some()
    }
}

#[cfg(test)]
#[path = "job_test.rs"]
mod job_test;
