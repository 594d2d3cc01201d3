//! Value types shared across the workflow engine.
//!
//! These describe executions, routing, options, and policies the way user
//! code and the worker runtime see them. Timeouts are plain `Duration`s;
//! the service may round them to second resolution.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Version returned by `get_version` for workflow code changes.
pub type Version = i32;

/// Version reported when replay encounters a change id with no recorded
/// marker, meaning the execution predates the versioned code path.
pub const DEFAULT_VERSION: Version = -1;

/// Reserved search-attribute key carrying the ordered list of
/// `"changeId-version"` strings for every `get_version` call made so far.
/// Wire-stable, must not be renamed.
pub const CHANGE_VERSION_SEARCH_ATTRIBUTE: &str = "CadenceChangeVersion";

/// Built-in query returning the scheduler's dump of coroutine states.
pub const QUERY_TYPE_STACK_TRACE: &str = "__stack_trace";

/// Built-in query returning the open session table.
pub const QUERY_TYPE_OPEN_SESSIONS: &str = "__open_sessions";

/// Unique identifier for a workflow execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: String,
}

impl WorkflowExecution {
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }
}

/// Workflow type, resolved against the registry by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowType {
    pub name: String,
}

/// Activity type, resolved against the registry by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityType {
    pub name: String,
}

/// Task list identifier used to route decision and activity tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskList {
    pub name: String,
    pub kind: TaskListKind,
}

impl TaskList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TaskListKind::Normal,
        }
    }

    pub fn sticky(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TaskListKind::Sticky,
        }
    }
}

impl Default for TaskList {
    fn default() -> Self {
        TaskList::new("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskListKind {
    Normal,
    Sticky,
}

/// Retry policy for activities and workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub maximum_interval: Duration,
    /// Zero means unlimited attempts.
    pub maximum_attempts: i32,
    pub non_retryable_error_types: Vec<String>,
    pub expiration_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(100),
            maximum_attempts: 0,
            non_retryable_error_types: vec![],
            expiration_interval: Duration::from_secs(0),
        }
    }
}

/// Options for scheduling an activity from workflow code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityOptions {
    /// Explicit activity id. Generated from the deterministic sequence
    /// counter when empty.
    pub activity_id: Option<String>,
    /// Task list to schedule on. Defaults to the workflow's own task list.
    pub task_list: String,
    pub schedule_to_close_timeout: Duration,
    pub schedule_to_start_timeout: Duration,
    pub start_to_close_timeout: Duration,
    pub heartbeat_timeout: Duration,
    /// When set, cancellation resolves the awaiting future only after the
    /// server confirms the activity was canceled.
    pub wait_for_cancellation: bool,
    pub retry_policy: Option<RetryPolicy>,
    pub header: Option<Header>,
}

/// Options for a local activity, executed in-process without a server round
/// trip and persisted through a `LocalActivity` marker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalActivityOptions {
    pub schedule_to_close_timeout: Duration,
    pub retry_policy: Option<RetryPolicy>,
}

/// Options for starting a child workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChildWorkflowOptions {
    /// Defaults to the parent's domain when empty.
    pub domain: Option<String>,
    /// Generated as `"{parent_run_id}_{seq}"` when empty.
    pub workflow_id: String,
    pub task_list: Option<String>,
    pub execution_start_to_close_timeout: Duration,
    pub task_start_to_close_timeout: Duration,
    pub wait_for_cancellation: bool,
    pub workflow_id_reuse_policy: WorkflowIdReusePolicy,
    pub parent_close_policy: ParentClosePolicy,
    pub retry_policy: Option<RetryPolicy>,
    pub cron_schedule: Option<String>,
    pub memo: Option<HashMap<String, Vec<u8>>>,
    pub search_attributes: Option<HashMap<String, Vec<u8>>>,
    pub header: Option<Header>,
}

/// Options carried by a continue-as-new request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContinueAsNewOptions {
    pub task_list: String,
    pub execution_start_to_close_timeout: Duration,
    pub task_start_to_close_timeout: Duration,
    pub retry_policy: Option<RetryPolicy>,
    pub cron_schedule: Option<String>,
    pub memo: Option<HashMap<String, Vec<u8>>>,
    pub search_attributes: Option<HashMap<String, Vec<u8>>>,
}

/// Policy applied to a still-running child when its parent closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParentClosePolicy {
    #[default]
    Terminate,
    RequestCancel,
    Abandon,
}

/// Policy for reusing a workflow id across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowIdReusePolicy {
    #[default]
    AllowDuplicateFailedOnly,
    AllowDuplicate,
    RejectDuplicate,
    TerminateIfRunning,
}

/// What the worker does when workflow code panics or diverges from history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonDeterministicWorkflowPolicy {
    /// Fail the decision task, leaving the workflow open for retry and
    /// human intervention. History is unchanged.
    #[default]
    BlockWorkflow,
    /// Issue a fail-workflow decision, terminating the execution.
    FailWorkflow,
}

/// Immutable identifiers and settings of a running workflow.
///
/// Created when the execution starts. Only the search attributes mutate
/// afterwards, through upserts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub task_list: String,
    pub domain: String,
    pub execution_start_to_close_timeout: Duration,
    pub task_start_to_close_timeout: Duration,
    pub attempt: i32,
    pub continued_execution_run_id: Option<String>,
    pub parent_workflow_execution: Option<WorkflowExecution>,
    pub cron_schedule: Option<String>,
    pub memo: Option<Memo>,
    pub search_attributes: Option<SearchAttributes>,
}

impl WorkflowInfo {
    /// Merge upserted search attributes into this info, last write wins
    /// per key.
    pub fn merge_search_attributes(&mut self, upsert: &SearchAttributes) {
        if upsert.indexed_fields.is_empty() {
            return;
        }
        let current = self.search_attributes.get_or_insert_with(Default::default);
        for (k, v) in &upsert.indexed_fields {
            current.indexed_fields.insert(k.clone(), v.clone());
        }
    }
}

/// Header for passing propagated context across workflow boundaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub fields: HashMap<String, Vec<u8>>,
}

/// Memo attached to a workflow at start time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    pub fields: HashMap<String, Vec<u8>>,
}

/// Search attributes indexed by the service for visibility queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchAttributes {
    pub indexed_fields: HashMap<String, Vec<u8>>,
}

/// An open session created by workflow code, reported by the
/// `__open_sessions` query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub task_list: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_search_attributes_overwrites_per_key() {
        let mut info = WorkflowInfo {
            workflow_execution: WorkflowExecution::new("w", "r"),
            workflow_type: WorkflowType { name: "t".into() },
            task_list: "tl".into(),
            domain: "d".into(),
            execution_start_to_close_timeout: Duration::from_secs(60),
            task_start_to_close_timeout: Duration::from_secs(10),
            attempt: 1,
            continued_execution_run_id: None,
            parent_workflow_execution: None,
            cron_schedule: None,
            memo: None,
            search_attributes: None,
        };

        let mut first = SearchAttributes::default();
        first.indexed_fields.insert("a".into(), b"1".to_vec());
        first.indexed_fields.insert("b".into(), b"2".to_vec());
        info.merge_search_attributes(&first);

        let mut second = SearchAttributes::default();
        second.indexed_fields.insert("b".into(), b"3".to_vec());
        info.merge_search_attributes(&second);

        let attrs = info.search_attributes.unwrap();
        assert_eq!(attrs.indexed_fields["a"], b"1".to_vec());
        assert_eq!(attrs.indexed_fields["b"], b"3".to_vec());
    }

    #[test]
    fn merge_empty_upsert_leaves_attributes_untouched() {
        let mut info = WorkflowInfo {
            workflow_execution: WorkflowExecution::new("w", "r"),
            workflow_type: WorkflowType { name: "t".into() },
            task_list: "tl".into(),
            domain: "d".into(),
            execution_start_to_close_timeout: Duration::from_secs(60),
            task_start_to_close_timeout: Duration::from_secs(10),
            attempt: 1,
            continued_execution_run_id: None,
            parent_workflow_execution: None,
            cron_schedule: None,
            memo: None,
            search_attributes: None,
        };
        info.merge_search_attributes(&SearchAttributes::default());
        assert!(info.search_attributes.is_none());
    }

    #[test]
    fn retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_coefficient, 2.0);
        assert_eq!(policy.maximum_attempts, 0);
    }
}
