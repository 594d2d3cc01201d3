//! Internal value model for decisions.
//!
//! A decision is an intent the worker returns to the service at the end of
//! a decision task. The transport layer translates these into its wire
//! representation at the boundary.

use serde::{Deserialize, Serialize};

use crate::types::{
    ActivityType, Header, Memo, ParentClosePolicy, RetryPolicy, SearchAttributes, TaskList,
    WorkflowExecution, WorkflowIdReusePolicy, WorkflowType,
};

/// Discriminant of a [`Decision`], mostly useful in tests and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionType {
    ScheduleActivityTask,
    RequestCancelActivityTask,
    StartTimer,
    CancelTimer,
    CompleteWorkflowExecution,
    FailWorkflowExecution,
    CancelWorkflowExecution,
    ContinueAsNewWorkflowExecution,
    StartChildWorkflowExecution,
    RequestCancelExternalWorkflowExecution,
    SignalExternalWorkflowExecution,
    RecordMarker,
    UpsertWorkflowSearchAttributes,
}

/// An intent returned to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    ScheduleActivityTask(Box<ScheduleActivityTaskDecisionAttributes>),
    RequestCancelActivityTask(Box<RequestCancelActivityTaskDecisionAttributes>),
    StartTimer(Box<StartTimerDecisionAttributes>),
    CancelTimer(Box<CancelTimerDecisionAttributes>),
    CompleteWorkflowExecution(Box<CompleteWorkflowExecutionDecisionAttributes>),
    FailWorkflowExecution(Box<FailWorkflowExecutionDecisionAttributes>),
    CancelWorkflowExecution(Box<CancelWorkflowExecutionDecisionAttributes>),
    ContinueAsNewWorkflowExecution(Box<ContinueAsNewWorkflowExecutionDecisionAttributes>),
    StartChildWorkflowExecution(Box<StartChildWorkflowExecutionDecisionAttributes>),
    RequestCancelExternalWorkflowExecution(
        Box<RequestCancelExternalWorkflowExecutionDecisionAttributes>,
    ),
    SignalExternalWorkflowExecution(Box<SignalExternalWorkflowExecutionDecisionAttributes>),
    RecordMarker(Box<RecordMarkerDecisionAttributes>),
    UpsertWorkflowSearchAttributes(Box<UpsertWorkflowSearchAttributesDecisionAttributes>),
}

impl Decision {
    pub fn decision_type(&self) -> DecisionType {
        match self {
            Decision::ScheduleActivityTask(_) => DecisionType::ScheduleActivityTask,
            Decision::RequestCancelActivityTask(_) => DecisionType::RequestCancelActivityTask,
            Decision::StartTimer(_) => DecisionType::StartTimer,
            Decision::CancelTimer(_) => DecisionType::CancelTimer,
            Decision::CompleteWorkflowExecution(_) => DecisionType::CompleteWorkflowExecution,
            Decision::FailWorkflowExecution(_) => DecisionType::FailWorkflowExecution,
            Decision::CancelWorkflowExecution(_) => DecisionType::CancelWorkflowExecution,
            Decision::ContinueAsNewWorkflowExecution(_) => {
                DecisionType::ContinueAsNewWorkflowExecution
            }
            Decision::StartChildWorkflowExecution(_) => DecisionType::StartChildWorkflowExecution,
            Decision::RequestCancelExternalWorkflowExecution(_) => {
                DecisionType::RequestCancelExternalWorkflowExecution
            }
            Decision::SignalExternalWorkflowExecution(_) => {
                DecisionType::SignalExternalWorkflowExecution
            }
            Decision::RecordMarker(_) => DecisionType::RecordMarker,
            Decision::UpsertWorkflowSearchAttributes(_) => {
                DecisionType::UpsertWorkflowSearchAttributes
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleActivityTaskDecisionAttributes {
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub schedule_to_close_timeout_seconds: Option<i32>,
    pub schedule_to_start_timeout_seconds: Option<i32>,
    pub start_to_close_timeout_seconds: Option<i32>,
    pub heartbeat_timeout_seconds: Option<i32>,
    pub retry_policy: Option<RetryPolicy>,
    pub header: Option<Header>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelActivityTaskDecisionAttributes {
    pub activity_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartTimerDecisionAttributes {
    pub timer_id: String,
    pub start_to_fire_timeout_seconds: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelTimerDecisionAttributes {
    pub timer_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompleteWorkflowExecutionDecisionAttributes {
    pub result: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailWorkflowExecutionDecisionAttributes {
    pub reason: Option<String>,
    pub details: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelWorkflowExecutionDecisionAttributes {
    pub details: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinueAsNewWorkflowExecutionDecisionAttributes {
    pub workflow_type: WorkflowType,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub execution_start_to_close_timeout_seconds: Option<i32>,
    pub task_start_to_close_timeout_seconds: Option<i32>,
    pub retry_policy: Option<RetryPolicy>,
    pub cron_schedule: Option<String>,
    pub memo: Option<Memo>,
    pub search_attributes: Option<SearchAttributes>,
    pub header: Option<Header>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartChildWorkflowExecutionDecisionAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub execution_start_to_close_timeout_seconds: Option<i32>,
    pub task_start_to_close_timeout_seconds: Option<i32>,
    pub parent_close_policy: ParentClosePolicy,
    pub workflow_id_reuse_policy: WorkflowIdReusePolicy,
    pub retry_policy: Option<RetryPolicy>,
    pub cron_schedule: Option<String>,
    pub memo: Option<Memo>,
    pub search_attributes: Option<SearchAttributes>,
    pub header: Option<Header>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelExternalWorkflowExecutionDecisionAttributes {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    /// Client-generated cancellation id, echoed back by the service in the
    /// initiated event. Empty for child-workflow-only cancellation.
    pub control: Option<String>,
    pub child_workflow_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalExternalWorkflowExecutionDecisionAttributes {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub signal_name: String,
    pub input: Option<Vec<u8>>,
    /// Client-generated signal id, echoed back by the service.
    pub control: Option<String>,
    pub child_workflow_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMarkerDecisionAttributes {
    pub marker_name: String,
    pub details: Option<Vec<u8>>,
    pub header: Option<Header>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertWorkflowSearchAttributesDecisionAttributes {
    pub search_attributes: SearchAttributes,
}
