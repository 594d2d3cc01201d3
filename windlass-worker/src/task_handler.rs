//! Decision task handling.
//!
//! One decision task hands the worker a batch of new history events (plus
//! the already-processed prefix when the execution is not cached). The
//! handler reuses or rebuilds the execution state, applies every event in
//! order, and collects the resulting decisions and query answers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use windlass_core::decision::ContinueAsNewWorkflowExecutionDecisionAttributes;
use windlass_core::history::{EventAttributes, History, WorkflowExecutionStartedEventAttributes};
use windlass_core::types::{
    NonDeterministicWorkflowPolicy, TaskList, WorkflowExecution, WorkflowInfo, WorkflowType,
};
use windlass_core::{Decision, WindlassError};

use crate::cache::{CachedExecution, WorkflowCache, WorkflowExecutionKey};
use crate::event_handler::{ExecutionError, WorkflowEventHandler};
use crate::options::WorkerOptions;
use crate::registry::Registry;

/// A query attached to a decision task.
#[derive(Debug, Clone)]
pub struct WorkflowQuery {
    pub query_type: String,
    pub args: Vec<u8>,
}

/// Outcome of one attached query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTaskResult {
    Answered(Vec<u8>),
    Failed(String),
}

/// One decision task as handed over by the transport.
#[derive(Debug, Clone)]
pub struct DecisionTask {
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub history: History,
    /// Events with ids at or below this were decided on in earlier tasks
    /// and replay without side effects.
    pub previous_started_event_id: i64,
    pub started_event_id: i64,
    pub queries: HashMap<String, WorkflowQuery>,
}

/// What goes back to the service.
#[derive(Debug)]
pub struct DecisionTaskResult {
    pub decisions: Vec<Decision>,
    pub query_results: HashMap<String, QueryTaskResult>,
}

/// Executes decision tasks against the registry, using the sticky cache
/// for continuations.
pub struct WorkflowTaskHandler {
    domain: String,
    task_list: String,
    registry: Arc<Registry>,
    cache: Arc<WorkflowCache>,
    options: WorkerOptions,
}

impl WorkflowTaskHandler {
    pub fn new(
        domain: impl Into<String>,
        task_list: impl Into<String>,
        registry: Arc<Registry>,
        cache: Arc<WorkflowCache>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            domain: domain.into(),
            task_list: task_list.into(),
            registry,
            cache,
            options,
        }
    }

    fn build_workflow_info(
        &self,
        task: &DecisionTask,
        attrs: &WorkflowExecutionStartedEventAttributes,
    ) -> WorkflowInfo {
        let task_list = if attrs.task_list.name.is_empty() {
            TaskList::new(self.task_list.clone())
        } else {
            attrs.task_list.clone()
        };
        WorkflowInfo {
            workflow_execution: task.workflow_execution.clone(),
            workflow_type: task.workflow_type.clone(),
            task_list: task_list.name,
            domain: self.domain.clone(),
            execution_start_to_close_timeout: std::time::Duration::from_secs(
                attrs.execution_start_to_close_timeout_seconds.max(0) as u64,
            ),
            task_start_to_close_timeout: std::time::Duration::from_secs(
                attrs.task_start_to_close_timeout_seconds.max(0) as u64,
            ),
            attempt: attrs.attempt,
            continued_execution_run_id: attrs.continued_execution_run_id.clone(),
            parent_workflow_execution: attrs.parent_workflow_execution.clone(),
            cron_schedule: attrs.cron_schedule.clone(),
            memo: attrs.memo.clone(),
            search_attributes: attrs.search_attributes.clone(),
        }
    }

    /// Process one decision task end to end.
    pub fn process_decision_task(
        &self,
        task: DecisionTask,
    ) -> Result<DecisionTaskResult, ExecutionError> {
        let key = WorkflowExecutionKey::from(&task.workflow_execution);
        let use_cache = !self.options.disable_sticky_execution;

        let entry = match use_cache.then(|| self.cache.get(&key)).flatten() {
            Some(entry) => entry,
            None => {
                let first = task
                    .history
                    .events
                    .first()
                    .ok_or(ExecutionError::PartialHistory)?;
                let EventAttributes::WorkflowExecutionStarted(attrs) = &first.attributes else {
                    // Sticky continuation for an execution this worker no
                    // longer holds; the service must resend full history.
                    return Err(ExecutionError::PartialHistory);
                };
                if let Some(header) = &attrs.header {
                    self.options.extract_header(header);
                }
                let info = self.build_workflow_info(&task, attrs);
                let handler = WorkflowEventHandler::new(info, self.registry.clone(), &self.options);
                Arc::new(Mutex::new(CachedExecution {
                    handler,
                    last_processed_event_id: 0,
                }))
            }
        };

        let mut guard = entry.lock().unwrap_or_else(PoisonError::into_inner);

        let total = task.history.events.len();
        let mut last_seen = guard.last_processed_event_id;
        let mut failure: Option<ExecutionError> = None;
        for (index, event) in task.history.events.iter().enumerate() {
            if event.event_id <= guard.last_processed_event_id {
                // Already applied in a previous task of this sticky run.
                continue;
            }
            if event.event_id <= last_seen {
                failure = Some(ExecutionError::EventOutOfOrder {
                    got: event.event_id,
                    last: last_seen,
                });
                break;
            }
            last_seen = event.event_id;

            let is_replay = event.event_id <= task.previous_started_event_id;
            let is_last = index == total - 1;

            if event.is_decision_task_started() && !is_last {
                // A replayed decision boundary. The markers this batch's
                // code reads were recorded after the boundary event, so
                // preload them before running the batch; afterwards,
                // collect and discard the decisions the batch regenerates,
                // because they were already sent when this history was
                // first produced.
                for upcoming in &task.history.events[index + 1..] {
                    if upcoming.is_decision_task_started() {
                        break;
                    }
                    if let EventAttributes::MarkerRecorded(marker) = &upcoming.attributes {
                        if let Err(error) = guard.handler.preload_marker(marker) {
                            failure = Some(error);
                            break;
                        }
                    }
                }
                if failure.is_some() {
                    break;
                }
                if let Err(error) = guard.handler.process_event(event, is_replay, is_last) {
                    failure = Some(error);
                    break;
                }
                guard.last_processed_event_id = event.event_id;
                let env = guard.handler.env();
                let _ = env
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .decisions_helper
                    .get_decisions(true);
                continue;
            }

            if let Err(error) = guard.handler.process_event(event, is_replay, is_last) {
                failure = Some(error);
                break;
            }
            guard.last_processed_event_id = event.event_id;
        }

        if let Some(error) = failure {
            drop(guard);
            self.cache.remove(&key);
            return Err(error);
        }

        // Translate a completed workflow coroutine into a close decision,
        // applying the non-determinism policy to panics.
        let env = guard.handler.env();
        let completion = env
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_completion();
        let mut workflow_closed = false;
        if let Some(completion) = completion {
            let mut env = env.lock().unwrap_or_else(PoisonError::into_inner);
            match completion.error {
                None => {
                    env.decisions_helper
                        .complete_workflow_execution(completion.result);
                    workflow_closed = true;
                }
                Some(WindlassError::ContinueAsNew(continue_as_new)) => {
                    let options = &continue_as_new.options;
                    let seconds = |d: std::time::Duration| -> Option<i32> {
                        let s = d.as_secs() as i32;
                        (s > 0).then_some(s)
                    };
                    let attributes = ContinueAsNewWorkflowExecutionDecisionAttributes {
                        workflow_type: WorkflowType {
                            name: continue_as_new.workflow_type.clone(),
                        },
                        task_list: TaskList::new(options.task_list.clone()),
                        input: Some(continue_as_new.input.clone()),
                        execution_start_to_close_timeout_seconds: seconds(
                            options.execution_start_to_close_timeout,
                        ),
                        task_start_to_close_timeout_seconds: seconds(
                            options.task_start_to_close_timeout,
                        ),
                        retry_policy: options.retry_policy.clone(),
                        cron_schedule: options.cron_schedule.clone(),
                        memo: options
                            .memo
                            .clone()
                            .map(|fields| windlass_core::Memo { fields }),
                        search_attributes: options.search_attributes.clone().map(
                            |indexed_fields| windlass_core::SearchAttributes { indexed_fields },
                        ),
                        header: None,
                    };
                    env.decisions_helper
                        .continue_as_new_workflow_execution(attributes);
                    workflow_closed = true;
                }
                Some(WindlassError::Canceled(canceled)) => {
                    env.decisions_helper
                        .cancel_workflow_execution(Some(canceled.details));
                    workflow_closed = true;
                }
                Some(WindlassError::Panic(panic)) => {
                    match self.options.non_deterministic_workflow_policy {
                        NonDeterministicWorkflowPolicy::BlockWorkflow => {
                            // Fail the decision task, leave history
                            // untouched so the workflow can be retried or
                            // repaired.
                            drop(env);
                            drop(guard);
                            self.cache.remove(&key);
                            return Err(ExecutionError::Windlass(panic.into()));
                        }
                        NonDeterministicWorkflowPolicy::FailWorkflow => {
                            env.decisions_helper.fail_workflow_execution(
                                "cadenceInternal:Panic".into(),
                                panic.message.clone().into_bytes(),
                            );
                            workflow_closed = true;
                        }
                    }
                }
                Some(other) => {
                    let (reason, details) = other.reason_and_details();
                    env.decisions_helper.fail_workflow_execution(reason, details);
                    workflow_closed = true;
                }
            }
        }

        let mut query_results = HashMap::new();
        for (id, query) in task.queries {
            let result = match guard.handler.process_query(&query.query_type, query.args) {
                Ok(answer) => QueryTaskResult::Answered(answer),
                Err(WindlassError::QueryFailed(message)) => QueryTaskResult::Failed(message),
                Err(error) => QueryTaskResult::Failed(error.to_string()),
            };
            query_results.insert(id, result);
        }

        let decisions = env
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .decisions_helper
            .get_decisions(true);

        drop(guard);
        if workflow_closed || !use_cache {
            self.cache.remove(&key);
        } else {
            self.cache.insert(key, entry);
        }

        Ok(DecisionTaskResult {
            decisions,
            query_results,
        })
    }
}
