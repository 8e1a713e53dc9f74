use chrono::{DateTime, Local};
use serde::Serialize;

use crate::analysis::{AnalysisParams, AnalysisReport, LlmOverride};

#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Serialize, strum::Display, strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,

    /// The worker terminated without reporting, the real outcome is unknowable
    Unknown,
}

/// One unit of batch work, owned by its worker for its whole lifetime
#[derive(Clone, Debug)]
pub struct Task {
    pub task_id: String,
    pub symbol: String,
    pub params: AnalysisParams,
    pub llm_config: Option<LlmOverride>,
    pub status: TaskStatus,
    pub created_at: DateTime<Local>,
    pub start_time: Option<DateTime<Local>>,
    pub end_time: Option<DateTime<Local>>,
    pub result: Option<AnalysisReport>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(symbol: &str, params: AnalysisParams, llm_config: Option<LlmOverride>) -> Self {
        let mut task_id = uuid::Uuid::new_v4().simple().to_string();
        task_id.truncate(8);

        Self {
            task_id,
            symbol: symbol.to_string(),
            params,
            llm_config,
            status: TaskStatus::Pending,
            created_at: Local::now(),
            start_time: None,
            end_time: None,
            result: None,
            error: None,
        }
    }
}

/// Terminal outcome of one task, moved through the completion channel and
/// consumed exactly once
#[derive(Clone, Debug)]
pub struct CompletionRecord {
    pub task_id: String,
    pub symbol: String,
    pub status: TaskStatus,
    pub start_time: Option<DateTime<Local>>,
    pub end_time: Option<DateTime<Local>>,
    pub result: Option<AnalysisReport>,
    pub error: Option<String>,

    /// Fabricated by the dead-worker sweep rather than reported by the worker
    pub auto_detected: bool,
}

impl CompletionRecord {
    pub fn duration_secs(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                Some(end.signed_duration_since(start).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }

    pub(super) fn unknown(task_id: &str, symbol: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            symbol: symbol.to_string(),
            status: TaskStatus::Unknown,
            start_time: None,
            end_time: Some(Local::now()),
            result: None,
            error: None,
            auto_detected: true,
        }
    }
}

impl From<Task> for CompletionRecord {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.task_id,
            symbol: task.symbol,
            status: task.status,
            start_time: task.start_time,
            end_time: task.end_time,
            result: task.result,
            error: task.error,
            auto_detected: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CompletionLogEntry {
    pub task_id: String,
    pub symbol: String,
    pub completed_at: DateTime<Local>,
    pub duration_secs: f64,
}

/// Point-in-time read of aggregate batch progress
#[derive(Clone, Debug)]
pub struct ProgressSnapshot {
    /// Tasks ever launched, monotonic for the controller's lifetime
    pub total_tasks: usize,
    pub running_tasks: usize,
    /// Tasks ever finished (real or auto-detected), monotonic
    pub completed_tasks: usize,
    /// Records drained by this call, gone from the channel afterwards
    pub drained: Vec<CompletionRecord>,
    pub is_running: bool,
    pub progress_percentage: f64,
    pub last_activity_time: Option<DateTime<Local>>,
    pub time_since_last_activity: Option<f64>,
    pub completion_log_count: usize,
    pub dead_workers_detected: usize,
    pub force_completion: bool,
}

/// Lightweight state broadcast to push-style observers on every transition
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgressPulse {
    pub submitted: usize,
    pub running: usize,
    pub completed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new() {
        let task = Task::new("600036", AnalysisParams::default(), None);

        assert_eq!(task.task_id.len(), 8);
        assert_eq!(task.symbol, "600036");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.start_time.is_none());
        assert!(task.end_time.is_none());

        let other = Task::new("600036", AnalysisParams::default(), None);
        assert_ne!(task.task_id, other.task_id);
    }

    #[test]
    fn test_completion_record_duration() {
        let mut task = Task::new("AAPL", AnalysisParams::default(), None);
        task.start_time = Some(Local::now());
        task.end_time = Some(Local::now() + chrono::Duration::milliseconds(1500));
        task.status = TaskStatus::Completed;

        let record = CompletionRecord::from(task);
        assert!(!record.auto_detected);
        assert_eq!(record.duration_secs(), Some(1.5));

        let unknown = CompletionRecord::unknown("deadbeef", "AAPL");
        assert!(unknown.auto_detected);
        assert_eq!(unknown.status, TaskStatus::Unknown);
        assert_eq!(unknown.duration_secs(), None);
    }
}
