//! Task lifecycle status model
//!
//! The status enumeration is explicit and total: `Unprocessed` is a real
//! variant, not the absence of a diagnostics row. The integer codes are
//! fixed for on-disk compatibility with the upstream correction stage,
//! which stores the same codes in `todolist.corr_status`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lifecycle status of one (target, classifier) task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// No worker has claimed the task yet (code 0, never written by the scheduler)
    Unprocessed,
    /// Completed successfully
    Ok,
    /// Completed with an error; see the diagnostics error text
    Error,
    /// Completed with warnings
    Warning,
    /// Aborted by the worker
    Abort,
    /// Skipped without processing
    Skipped,
    /// Claimed by a worker, result not yet reported
    Started,
}

impl TaskStatus {
    /// Stable integer code stored in the diagnostics table
    pub fn code(self) -> i64 {
        match self {
            TaskStatus::Unprocessed => 0,
            TaskStatus::Ok => 1,
            TaskStatus::Error => 2,
            TaskStatus::Warning => 3,
            TaskStatus::Abort => 4,
            TaskStatus::Skipped => 5,
            TaskStatus::Started => 6,
        }
    }

    /// Decode a stored status code
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(TaskStatus::Unprocessed),
            1 => Ok(TaskStatus::Ok),
            2 => Ok(TaskStatus::Error),
            3 => Ok(TaskStatus::Warning),
            4 => Ok(TaskStatus::Abort),
            5 => Ok(TaskStatus::Skipped),
            6 => Ok(TaskStatus::Started),
            other => Err(Error::InvalidInput(format!("Unknown status code: {}", other))),
        }
    }

    /// True once a worker has reported a final outcome for the task
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Ok
                | TaskStatus::Error
                | TaskStatus::Warning
                | TaskStatus::Abort
                | TaskStatus::Skipped
        )
    }

    /// Lowercase name used in review output
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Unprocessed => "unprocessed",
            TaskStatus::Ok => "ok",
            TaskStatus::Error => "error",
            TaskStatus::Warning => "warning",
            TaskStatus::Abort => "abort",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Started => "started",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for status in [
            TaskStatus::Unprocessed,
            TaskStatus::Ok,
            TaskStatus::Error,
            TaskStatus::Warning,
            TaskStatus::Abort,
            TaskStatus::Skipped,
            TaskStatus::Started,
        ] {
            assert_eq!(TaskStatus::from_code(status.code()).unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert!(TaskStatus::from_code(7).is_err());
        assert!(TaskStatus::from_code(-1).is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Ok.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
        assert!(TaskStatus::Warning.is_terminal());
        assert!(!TaskStatus::Started.is_terminal());
        assert!(!TaskStatus::Unprocessed.is_terminal());
    }
}
