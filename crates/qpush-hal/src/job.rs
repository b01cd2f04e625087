//! Job and session identifiers.
//!
//! ```text
//!   open_session() ──→ SessionId ──→ submit(.., Some(&id)) ──→ JobId ──→ close_session()
//! ```
//!
//! A job submitted to IBM Quantum starts `Queued` and moves through the
//! states below. qpush submits and leaves; `status()` exists so callers
//! can look the job up later.
//!
//! ```text
//!   Queued ──→ Running ──→ Completed
//!     │           ├──→ Failed(reason)
//!     └───────────┴──→ Cancelled
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed(String),
    Cancelled,
}

impl JobStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed(_) | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "Queued"),
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::Failed(msg) => write!(f, "Failed: {msg}"),
            JobStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Identifier of an execution session held open on a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the backend schedules the jobs of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Jobs run back to back on a reserved device.
    #[default]
    Dedicated,
    /// Jobs are queued together but may interleave with others.
    Batch,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Dedicated => "dedicated",
            SessionMode::Batch => "batch",
        }
    }
}

/// Options for [`Backend::open_session`](crate::Backend::open_session).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub mode: SessionMode,
    /// Upper bound on how long the backend keeps the session alive.
    pub max_time: Option<Duration>,
}

impl SessionOptions {
    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed("error".into()).is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_session_mode_serializes_lowercase() {
        let json = serde_json::to_string(&SessionMode::Dedicated).unwrap();
        assert_eq!(json, "\"dedicated\"");
        assert_eq!(SessionMode::Batch.as_str(), "batch");
    }

    #[test]
    fn test_session_options_builder() {
        let options = SessionOptions::default().with_max_time(Duration::from_secs(900));
        assert_eq!(options.mode, SessionMode::Dedicated);
        assert_eq!(options.max_time, Some(Duration::from_secs(900)));

        let batch = options.with_mode(SessionMode::Batch);
        assert_eq!(batch.mode, SessionMode::Batch);
    }

    #[test]
    fn test_ids_display_raw() {
        assert_eq!(JobId::new("d1x2").to_string(), "d1x2");
        assert_eq!(SessionId::new("s-9").to_string(), "s-9");
    }
}
