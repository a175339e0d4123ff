//! Action item definitions — the core data model for schedulable work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of work an action item represents.
///
/// Closed set: the dispatcher refuses anything it cannot map to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Open-ended research on a market topic.
    Research,
    /// Fetch a dataset from an upstream source.
    DataFetch,
    /// Scan news feeds for relevant headlines.
    NewsScan,
    /// Run a derived computation over stored data.
    Calculation,
    /// Watch a level or condition and report on it.
    Monitoring,
    /// Modify or generate code in the pipeline itself.
    CodeTask,
}

impl ActionType {
    /// Stable string form used in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Research => "research",
            ActionType::DataFetch => "data_fetch",
            ActionType::NewsScan => "news_scan",
            ActionType::Calculation => "calculation",
            ActionType::Monitoring => "monitoring",
            ActionType::CodeTask => "code_task",
        }
    }

    /// Parse the stored string form. Unknown strings are a dispatch-time
    /// permanent failure, so this returns None rather than defaulting.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "research" => Some(ActionType::Research),
            "data_fetch" => Some(ActionType::DataFetch),
            "news_scan" => Some(ActionType::NewsScan),
            "calculation" => Some(ActionType::Calculation),
            "monitoring" => Some(ActionType::Monitoring),
            "code_task" => Some(ActionType::CodeTask),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution priority. Rank 1 is dispatched first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Ordering rank stored in the database (lower = sooner).
    pub fn rank(&self) -> i64 {
        match self {
            Priority::Critical => 1,
            Priority::High => 2,
            Priority::Medium => 3,
            Priority::Low => 4,
        }
    }

    /// Informational deadline horizon derived from priority.
    pub fn deadline_days(&self) -> i64 {
        match self {
            Priority::Critical => 1,
            Priority::High => 3,
            Priority::Medium => 7,
            Priority::Low => 14,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    /// Reverse of [`rank`](Self::rank), for rows read back from the store.
    pub fn from_rank(rank: i64) -> Self {
        match rank {
            1 => Priority::Critical,
            2 => Priority::High,
            3 => Priority::Medium,
            _ => Priority::Low,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action lifecycle status.
///
/// The transition table is closed: `pending`/`retry` → `in_progress` →
/// {`completed`, `retry`, `failed`}, plus the orphan-recovery path
/// `in_progress` → `pending`. The store's conditional updates enforce the
/// same table at the SQL boundary, so a transition outside it affects
/// zero rows rather than corrupting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    InProgress,
    Completed,
    Retry,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::InProgress => "in_progress",
            ActionStatus::Completed => "completed",
            ActionStatus::Retry => "retry",
            ActionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ActionStatus::Pending),
            "in_progress" => Some(ActionStatus::InProgress),
            "completed" => Some(ActionStatus::Completed),
            "retry" => Some(ActionStatus::Retry),
            "failed" => Some(ActionStatus::Failed),
            _ => None,
        }
    }

    /// Whether this status is terminal. Terminal rows are kept for audit
    /// and never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Completed | ActionStatus::Failed)
    }

    /// The closed transition table.
    pub fn can_transition(&self, to: ActionStatus) -> bool {
        use ActionStatus::*;
        matches!(
            (self, to),
            (Pending, InProgress)
                | (Retry, InProgress)
                | (InProgress, Completed)
                | (InProgress, Retry)
                | (InProgress, Failed)
                // orphan recovery returns a stale claim to the pool
                | (InProgress, Pending)
        )
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of schedulable, retryable work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    /// Stable unique id, distinct from the row key. Idempotent
    /// re-registration keys off this.
    pub action_id: String,
    pub action_type: ActionType,
    pub priority: Priority,
    /// Short human-readable summary.
    pub title: String,
    /// Free-text description; the date extractor reads this at insertion.
    pub description: String,
    /// Where the item was extracted from (report section, chat thread, ...).
    pub source_context: Option<String>,
    /// Identifier of the report the item originated in.
    pub source_report: Option<String>,
    pub status: ActionStatus,
    pub created_at: DateTime<Utc>,
    /// None means "eligible immediately". Always a concrete timestamp —
    /// natural-language parsing happens once, at insertion.
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Informational deadline derived from priority.
    pub deadline: DateTime<Utc>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    /// Lease: both set iff status is `in_progress`.
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    /// Handler output, recorded on completion.
    pub result: Option<serde_json::Value>,
    /// Set iff status is terminal.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input for inserting a new action item. The store computes
/// `scheduled_for` (via the date extractor) and `deadline` at insertion.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub action_id: String,
    pub action_type: ActionType,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub source_context: Option<String>,
    pub source_report: Option<String>,
}

impl NewAction {
    /// Create a new action with a generated id.
    pub fn new(action_type: ActionType, priority: Priority, title: &str, description: &str) -> Self {
        Self {
            action_id: format!("act-{}", uuid::Uuid::new_v4()),
            action_type,
            priority,
            title: title.to_string(),
            description: description.to_string(),
            source_context: None,
            source_report: None,
        }
    }

    /// Attach source provenance.
    pub fn with_source(mut self, context: &str, report: &str) -> Self {
        self.source_context = Some(context.to_string());
        self.source_report = Some(report.to_string());
        self
    }
}

/// Append-only audit record, written once per dispatch attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub action_id: String,
    pub succeeded: bool,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    pub executed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_round_trip() {
        for t in [
            ActionType::Research,
            ActionType::DataFetch,
            ActionType::NewsScan,
            ActionType::Calculation,
            ActionType::Monitoring,
            ActionType::CodeTask,
        ] {
            assert_eq!(ActionType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ActionType::parse("telepathy"), None);
    }

    #[test]
    fn test_priority_rank_order() {
        assert!(Priority::Critical.rank() < Priority::High.rank());
        assert!(Priority::High.rank() < Priority::Medium.rank());
        assert!(Priority::Medium.rank() < Priority::Low.rank());
    }

    #[test]
    fn test_transition_table() {
        use ActionStatus::*;
        assert!(Pending.can_transition(InProgress));
        assert!(Retry.can_transition(InProgress));
        assert!(InProgress.can_transition(Completed));
        assert!(InProgress.can_transition(Retry));
        assert!(InProgress.can_transition(Failed));
        assert!(InProgress.can_transition(Pending));

        // terminal states never move
        assert!(!Completed.can_transition(InProgress));
        assert!(!Failed.can_transition(Pending));
        // claims only come from eligible states
        assert!(!Completed.can_transition(Completed));
        assert!(!Pending.can_transition(Completed));
    }
}
