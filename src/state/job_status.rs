/// Job lifecycle states and the transition table
///
/// `pending -> running -> {done | error | stopped}`. A job can also leave
/// `pending` directly for `error` (its row never became visible) or `stopped`
/// (a stop request arrived before the run began).
use crate::CrawlError;
use std::fmt;

/// Represents the lifecycle state of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Created by the submitter, not yet picked up
    Pending,

    /// The orchestrator owns the job and is crawling
    Running,

    // ===== Terminal States =====
    /// Page fetched and extracted, final summary persisted
    Done,

    /// Job row never appeared, page fetch failed, or a hard write failed
    Error,

    /// An external stop request was observed
    Stopped,
}

impl JobStatus {
    /// Returns true if no further automatic transitions occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Stopped)
    }

    /// Whether the orchestrator may move a job from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Error)
                | (Self::Pending, Self::Stopped)
                | (Self::Running, Self::Done)
                | (Self::Running, Self::Error)
                | (Self::Running, Self::Stopped)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 5] {
        [
            Self::Pending,
            Self::Running,
            Self::Done,
            Self::Error,
            Self::Stopped,
        ]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// In-memory view of one job's status, rejecting illegal transitions
#[derive(Debug, Clone)]
pub struct StatusTracker {
    current: JobStatus,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            current: JobStatus::Pending,
        }
    }

    pub fn current(&self) -> JobStatus {
        self.current
    }

    /// Moves to `next`, or fails with `InvalidTransition`
    pub fn advance(&mut self, next: JobStatus) -> Result<JobStatus, CrawlError> {
        if !self.current.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        let previous = self.current;
        self.current = next;
        Ok(previous)
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}
