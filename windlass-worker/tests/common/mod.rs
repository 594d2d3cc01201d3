//! Shared helpers for building histories and decision tasks by hand.
#![allow(dead_code)] // each test binary uses a different subset

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use windlass_core::history::*;
use windlass_core::types::{TaskList, WorkflowExecution, WorkflowType};
use windlass_worker::{
    DecisionTask, Registry, WorkerOptions, WorkflowCache, WorkflowQuery, WorkflowTaskHandler,
};

pub const TEST_DOMAIN: &str = "unit-test";
pub const TEST_TASK_LIST: &str = "unit-test-tl";

pub fn ts(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).unwrap()
}

pub fn event(event_id: i64, attributes: EventAttributes) -> HistoryEvent {
    HistoryEvent::new(event_id, ts(event_id), attributes)
}

pub fn workflow_started(event_id: i64, workflow_type: &str, input: &[u8]) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::WorkflowExecutionStarted(Box::new(
            WorkflowExecutionStartedEventAttributes {
                workflow_type: WorkflowType {
                    name: workflow_type.to_string(),
                },
                task_list: TaskList::new(TEST_TASK_LIST),
                input: input.to_vec(),
                execution_start_to_close_timeout_seconds: 3600,
                task_start_to_close_timeout_seconds: 10,
                attempt: 1,
                ..Default::default()
            },
        )),
    )
}

pub fn decision_task_scheduled(event_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::DecisionTaskScheduled(Box::new(DecisionTaskScheduledEventAttributes {
            task_list: TaskList::new(TEST_TASK_LIST),
            start_to_close_timeout_seconds: 10,
            attempt: 0,
        })),
    )
}

pub fn decision_task_started(event_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::DecisionTaskStarted(Box::new(DecisionTaskStartedEventAttributes {
            scheduled_event_id: event_id - 1,
            identity: "test-worker".into(),
            request_id: format!("req-{event_id}"),
        })),
    )
}

pub fn decision_task_completed(event_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::DecisionTaskCompleted(Box::new(DecisionTaskCompletedEventAttributes {
            scheduled_event_id: event_id - 2,
            started_event_id: event_id - 1,
            identity: "test-worker".into(),
            binary_checksum: "test-checksum".into(),
        })),
    )
}

pub fn activity_scheduled(event_id: i64, activity_id: &str, activity_type: &str) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::ActivityTaskScheduled(Box::new(ActivityTaskScheduledEventAttributes {
            activity_id: activity_id.to_string(),
            activity_type: windlass_core::ActivityType {
                name: activity_type.to_string(),
            },
            task_list: TaskList::new(TEST_TASK_LIST),
            decision_task_completed_event_id: event_id - 1,
            ..Default::default()
        })),
    )
}

pub fn activity_started(event_id: i64, scheduled_event_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::ActivityTaskStarted(Box::new(ActivityTaskStartedEventAttributes {
            scheduled_event_id,
            identity: "test-worker".into(),
            attempt: 0,
            ..Default::default()
        })),
    )
}

pub fn activity_completed(event_id: i64, scheduled_event_id: i64, result: &[u8]) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::ActivityTaskCompleted(Box::new(ActivityTaskCompletedEventAttributes {
            result: Some(result.to_vec()),
            scheduled_event_id,
            started_event_id: scheduled_event_id + 1,
        })),
    )
}

pub fn activity_failed(
    event_id: i64,
    scheduled_event_id: i64,
    reason: &str,
    details: &[u8],
) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::ActivityTaskFailed(Box::new(ActivityTaskFailedEventAttributes {
            reason: Some(reason.to_string()),
            details: Some(details.to_vec()),
            scheduled_event_id,
            started_event_id: scheduled_event_id + 1,
        })),
    )
}

pub fn timer_started(event_id: i64, timer_id: &str) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::TimerStarted(Box::new(TimerStartedEventAttributes {
            timer_id: timer_id.to_string(),
            start_to_fire_timeout_seconds: 60,
            decision_task_completed_event_id: event_id - 1,
        })),
    )
}

pub fn workflow_signaled(event_id: i64, signal_name: &str, input: &[u8]) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::WorkflowExecutionSignaled(Box::new(
            WorkflowExecutionSignaledEventAttributes {
                signal_name: signal_name.to_string(),
                input: Some(input.to_vec()),
            },
        )),
    )
}

pub fn cancel_requested(event_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::WorkflowExecutionCancelRequested(Box::new(
            WorkflowExecutionCancelRequestedEventAttributes::default(),
        )),
    )
}

pub fn marker_recorded(event_id: i64, marker_name: &str, details: Vec<u8>) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::MarkerRecorded(Box::new(MarkerRecordedEventAttributes {
            marker_name: marker_name.to_string(),
            details: Some(details),
            decision_task_completed_event_id: event_id - 1,
            header: None,
        })),
    )
}

pub fn decision_task(
    workflow_id: &str,
    run_id: &str,
    workflow_type: &str,
    events: Vec<HistoryEvent>,
    previous_started_event_id: i64,
) -> DecisionTask {
    let started_event_id = events.last().map(|e| e.event_id).unwrap_or(0);
    DecisionTask {
        workflow_execution: WorkflowExecution::new(workflow_id, run_id),
        workflow_type: WorkflowType {
            name: workflow_type.to_string(),
        },
        history: History { events },
        previous_started_event_id,
        started_event_id,
        queries: HashMap::new(),
    }
}

pub fn with_query(mut task: DecisionTask, id: &str, query_type: &str) -> DecisionTask {
    task.queries.insert(
        id.to_string(),
        WorkflowQuery {
            query_type: query_type.to_string(),
            args: Vec::new(),
        },
    );
    task
}

pub struct TestWorker {
    pub handler: WorkflowTaskHandler,
    pub cache: Arc<WorkflowCache>,
    pub registry: Arc<Registry>,
}

pub fn test_worker(registry: Arc<Registry>, options: WorkerOptions) -> TestWorker {
    let cache = Arc::new(WorkflowCache::new(16));
    let handler = WorkflowTaskHandler::new(
        TEST_DOMAIN,
        TEST_TASK_LIST,
        registry.clone(),
        cache.clone(),
        options,
    );
    TestWorker {
        handler,
        cache,
        registry,
    }
}
