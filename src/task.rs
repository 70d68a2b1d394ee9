//! Core task types for http-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a download task
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<TaskId> for i64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for TaskId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Task lifecycle status
///
/// `New` tasks have never been attempted. `InProgress` marks an attempt
/// underway (a task found in this state at batch start belonged to a run that
/// crashed mid-transfer and is re-attempted). `Ready` is terminal success.
/// `Failed` tasks are picked up again by a later run. `Forbidden` is reached
/// once the attempt budget is exhausted and is never re-attempted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Never attempted
    New,
    /// An attempt is underway (or a prior run crashed mid-attempt)
    InProgress,
    /// Fully downloaded and promoted to the completed directory
    Ready,
    /// Last attempt failed; eligible for a future run
    Failed,
    /// Attempt budget exhausted; never re-attempted
    Forbidden,
}

impl TaskStatus {
    /// Convert integer status code to TaskStatus
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => TaskStatus::New,
            1 => TaskStatus::InProgress,
            2 => TaskStatus::Ready,
            3 => TaskStatus::Failed,
            4 => TaskStatus::Forbidden,
            _ => TaskStatus::Failed, // Default to Failed for unknown status
        }
    }

    /// Convert TaskStatus to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            TaskStatus::New => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Ready => 2,
            TaskStatus::Failed => 3,
            TaskStatus::Forbidden => 4,
        }
    }

    /// Whether a batch run should pick this task up
    ///
    /// Ready and Forbidden are terminal; everything else is eligible.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            TaskStatus::New | TaskStatus::InProgress | TaskStatus::Failed
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskStatus::New => "new",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Ready => "ready",
            TaskStatus::Failed => "failed",
            TaskStatus::Forbidden => "forbidden",
        };
        write!(f, "{name}")
    }
}

/// A unit of work: one URL to download, with its lifecycle state
///
/// `file_partial` and `file_completed` are mutually exclusive basenames: the
/// partial reference is set while downloading and cleared on success, when the
/// completed reference is set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    /// Unique database ID
    pub id: TaskId,
    /// The remote resource to download
    pub url: String,
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Number of attempts started, across all batch runs
    pub attempts: u32,
    /// Accumulated error text from failed attempts
    pub log: String,
    /// Basename of the in-progress partial file (empty when not downloading)
    pub file_partial: String,
    /// Basename of the completed file (empty until Ready)
    pub file_completed: String,
    /// When the task was created; immutable
    pub datetime_created: DateTime<Utc>,
    /// When the task reached Ready
    pub datetime_ready: Option<DateTime<Utc>>,
    /// When the task last failed
    pub datetime_failed: Option<DateTime<Utc>>,
}

impl Task {
    /// Append a line to the task's error log
    pub fn record_error(&mut self, message: &str) {
        if !self.log.is_empty() {
            self.log.push('\n');
        }
        self.log.push_str(message);
    }
}
